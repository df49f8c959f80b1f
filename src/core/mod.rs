pub mod byte_source;
pub mod config;
pub mod content;
pub mod error;
pub mod file_source;
pub mod filter;
pub mod indirect;
pub mod lexer;
pub mod mem_source;
pub mod object_reader;
pub mod object_stream;
pub mod parser;
pub mod sink;
pub mod value;
pub mod xref;

pub use byte_source::ByteSource;
pub use config::ParserConfig;
pub use content::{CmapSink, ContentOperand, ContentOperation, ContentSink, DefaultContentSink, NoopCmapSink, NoopOpenTypeSink, OpCode, OpenTypeSink};
pub use error::{PDFError, PDFResult};
pub use file_source::FileSource;
pub use lexer::{Lexer, Token};
pub use mem_source::MemSource;
pub use object_stream::ObjectStreamCache;
pub use parser::Parser;
pub use sink::{DocumentSink, StreamParser, StreamType, ValueCaptureSink};
pub use value::{Dictionary, Name, Number, ObjectId, Value};
pub use xref::{CrossReferenceEntry, CrossReferenceTable};
