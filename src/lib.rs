pub mod core;

pub use core::{
    ByteSource, CmapSink, ContentOperand, ContentOperation, ContentSink, CrossReferenceEntry,
    CrossReferenceTable, DefaultContentSink, Dictionary, DocumentSink, FileSource, Lexer, MemSource,
    Name, NoopCmapSink, NoopOpenTypeSink, Number, ObjectId, ObjectStreamCache, OpCode, OpenTypeSink,
    Parser, ParserConfig, PDFError, PDFResult, StreamParser, StreamType, Token, Value,
    ValueCaptureSink,
};
