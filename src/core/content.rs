//! The three narrow seams specialized sub-parsers attach to, plus a
//! minimal content-stream tokenizer good enough to exercise the
//! FilterPipeline integration without evaluating graphics state.
//!
//! `OpCode` and its operator-name table are grounded in the corpus's
//! content-stream evaluator; only recognition is kept here, none of the
//! graphics-state interpretation.

use super::byte_source::{ByteSource, EOF};
use super::lexer::{Lexer, Token};
use super::mem_source::MemSource;
use super::sink::StreamParser;
use crate::core::error::{PDFError, PDFResult};
use crate::core::value::{Name, Number};

/// Fed CONTENT-tagged stream bytes. A marker supertrait: anything that can
/// act as a content-stream destination must already know how to consume
/// raw bytes via [`StreamParser`]. [`DefaultContentSink`] is a ready-to-use
/// implementation.
pub trait ContentSink: StreamParser {}

/// Fed FONT_TRUETYPE/FONT_CFF/FONT_OPENTYPE_CFF-tagged bytes. No table
/// parsing is implemented anywhere in this crate; [`NoopOpenTypeSink`] is
/// the only shipped implementation.
pub trait OpenTypeSink: StreamParser {}

/// Fed CMAP-tagged bytes. No CMap grammar is implemented;
/// [`NoopCmapSink`] is the only shipped implementation.
pub trait CmapSink: StreamParser {}

#[derive(Debug, Clone, PartialEq)]
pub enum ContentOperand {
    Number(Number),
    String(Vec<u8>),
    Name(Name),
    Boolean(bool),
    Null,
    Array(Vec<ContentOperand>),
    Dictionary(Vec<(Name, ContentOperand)>),
}

#[derive(Debug, Clone)]
pub struct ContentOperation {
    pub opcode: OpCode,
    pub operands: Vec<ContentOperand>,
}

/// Content-stream operator codes, named after the operator itself where the
/// corpus's evaluator does the same.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpCode {
    SetLineWidth,
    SetLineCap,
    SetLineJoin,
    SetMiterLimit,
    SetDash,
    SetRenderingIntent,
    SetFlatness,
    SetGState,
    Save,
    Restore,
    Transform,
    MoveTo,
    LineTo,
    CurveTo,
    CurveTo2,
    CurveTo3,
    ClosePath,
    Rectangle,
    Stroke,
    CloseStroke,
    Fill,
    EOFill,
    FillStroke,
    EOFillStroke,
    CloseFillStroke,
    CloseEOFillStroke,
    EndPath,
    Clip,
    EOClip,
    BeginText,
    EndText,
    SetCharSpacing,
    SetWordSpacing,
    SetHScale,
    SetLeading,
    SetFont,
    SetTextRenderingMode,
    SetTextRise,
    MoveText,
    SetLeadingMoveText,
    SetTextMatrix,
    NextLine,
    ShowText,
    ShowSpacedText,
    NextLineShowText,
    NextLineSetSpacingShowText,
    SetCharWidth,
    SetCharWidthAndBounds,
    SetStrokeColorSpace,
    SetFillColorSpace,
    SetStrokeColor,
    SetStrokeColorN,
    SetFillColor,
    SetFillColorN,
    SetStrokeGray,
    SetFillGray,
    SetStrokeRGBColor,
    SetFillRGBColor,
    SetStrokeCMYKColor,
    SetFillCMYKColor,
    ShadingFill,
    BeginInlineImage,
    BeginImageData,
    EndInlineImage,
    PaintXObject,
    MarkPoint,
    MarkPointProps,
    BeginMarkedContent,
    BeginMarkedContentProps,
    EndMarkedContent,
    BeginCompat,
    EndCompat,
    /// An operator keyword not in the table above. Kept rather than
    /// dropped so a sink can still see it went by.
    Other(String),
}

impl OpCode {
    pub fn from_command(cmd: &str) -> OpCode {
        match cmd {
            "w" => OpCode::SetLineWidth,
            "J" => OpCode::SetLineCap,
            "j" => OpCode::SetLineJoin,
            "M" => OpCode::SetMiterLimit,
            "d" => OpCode::SetDash,
            "ri" => OpCode::SetRenderingIntent,
            "i" => OpCode::SetFlatness,
            "gs" => OpCode::SetGState,
            "q" => OpCode::Save,
            "Q" => OpCode::Restore,
            "cm" => OpCode::Transform,
            "m" => OpCode::MoveTo,
            "l" => OpCode::LineTo,
            "c" => OpCode::CurveTo,
            "v" => OpCode::CurveTo2,
            "y" => OpCode::CurveTo3,
            "h" => OpCode::ClosePath,
            "re" => OpCode::Rectangle,
            "S" => OpCode::Stroke,
            "s" => OpCode::CloseStroke,
            "f" | "F" => OpCode::Fill,
            "f*" => OpCode::EOFill,
            "B" => OpCode::FillStroke,
            "B*" => OpCode::EOFillStroke,
            "b" => OpCode::CloseFillStroke,
            "b*" => OpCode::CloseEOFillStroke,
            "n" => OpCode::EndPath,
            "W" => OpCode::Clip,
            "W*" => OpCode::EOClip,
            "BT" => OpCode::BeginText,
            "ET" => OpCode::EndText,
            "Tc" => OpCode::SetCharSpacing,
            "Tw" => OpCode::SetWordSpacing,
            "Tz" => OpCode::SetHScale,
            "TL" => OpCode::SetLeading,
            "Tf" => OpCode::SetFont,
            "Tr" => OpCode::SetTextRenderingMode,
            "Ts" => OpCode::SetTextRise,
            "Td" => OpCode::MoveText,
            "TD" => OpCode::SetLeadingMoveText,
            "Tm" => OpCode::SetTextMatrix,
            "T*" => OpCode::NextLine,
            "Tj" => OpCode::ShowText,
            "TJ" => OpCode::ShowSpacedText,
            "'" => OpCode::NextLineShowText,
            "\"" => OpCode::NextLineSetSpacingShowText,
            "d0" => OpCode::SetCharWidth,
            "d1" => OpCode::SetCharWidthAndBounds,
            "CS" => OpCode::SetStrokeColorSpace,
            "cs" => OpCode::SetFillColorSpace,
            "SC" => OpCode::SetStrokeColor,
            "SCN" => OpCode::SetStrokeColorN,
            "sc" => OpCode::SetFillColor,
            "scn" => OpCode::SetFillColorN,
            "G" => OpCode::SetStrokeGray,
            "g" => OpCode::SetFillGray,
            "RG" => OpCode::SetStrokeRGBColor,
            "rg" => OpCode::SetFillRGBColor,
            "K" => OpCode::SetStrokeCMYKColor,
            "k" => OpCode::SetFillCMYKColor,
            "sh" => OpCode::ShadingFill,
            "BI" => OpCode::BeginInlineImage,
            "ID" => OpCode::BeginImageData,
            "EI" => OpCode::EndInlineImage,
            "Do" => OpCode::PaintXObject,
            "MP" => OpCode::MarkPoint,
            "DP" => OpCode::MarkPointProps,
            "BMC" => OpCode::BeginMarkedContent,
            "BDC" => OpCode::BeginMarkedContentProps,
            "EMC" => OpCode::EndMarkedContent,
            "BX" => OpCode::BeginCompat,
            "EX" => OpCode::EndCompat,
            other => OpCode::Other(other.to_string()),
        }
    }
}

fn operand_from_token(token: Token, lexer: &mut Lexer) -> PDFResult<ContentOperand> {
    match token {
        Token::Number(n) => Ok(ContentOperand::Number(n)),
        Token::StringLiteral(b) | Token::HexString(b) => Ok(ContentOperand::String(b)),
        Token::Name(n) => Ok(ContentOperand::Name(n)),
        Token::ArrayStart => read_array(lexer),
        Token::DictStart => read_dict(lexer),
        Token::Keyword(ref k) if k == "true" => Ok(ContentOperand::Boolean(true)),
        Token::Keyword(ref k) if k == "false" => Ok(ContentOperand::Boolean(false)),
        Token::Keyword(ref k) if k == "null" => Ok(ContentOperand::Null),
        other => Err(PDFError::malformed(lexer.position(), format!("unexpected token in operand position: {:?}", other))),
    }
}

fn read_array(lexer: &mut Lexer) -> PDFResult<ContentOperand> {
    let mut items = Vec::new();
    loop {
        let token = lexer.next_token()?;
        match token {
            Token::ArrayEnd => break,
            Token::Eof => return Err(PDFError::truncated(lexer.position())),
            other => items.push(operand_from_token(other, lexer)?),
        }
    }
    Ok(ContentOperand::Array(items))
}

fn read_dict(lexer: &mut Lexer) -> PDFResult<ContentOperand> {
    let mut entries = Vec::new();
    loop {
        let token = lexer.next_token()?;
        match token {
            Token::DictEnd => break,
            Token::Eof => return Err(PDFError::truncated(lexer.position())),
            Token::Name(key) => {
                let value_token = lexer.next_token()?;
                entries.push((key, operand_from_token(value_token, lexer)?));
            }
            _ => return Err(PDFError::malformed(lexer.position(), "dictionary key in operand position must be a name")),
        }
    }
    Ok(ContentOperand::Dictionary(entries))
}

fn is_ws_byte(b: i32) -> bool {
    matches!(b, 0 | 9 | 10 | 12 | 13 | 32)
}

/// Inline image data (`BI ... ID <raw bytes> EI`) has no declared length;
/// per the PDF spec it must be scanned for rather than framed, since the
/// data may itself contain filter-encoded bytes. This is a heuristic scan
/// for whitespace-bounded "EI", matching common practice; a crafted stream
/// whose image data happens to contain that exact sequence will be cut
/// short, but no image bytes are retained or decoded here regardless.
fn skip_inline_image_data(lexer: &mut Lexer) -> PDFResult<()> {
    lexer.skip_whitespace_and_comments()?;
    let source = lexer.source();
    let mut prev_was_ws = true;
    loop {
        let b = source.read_byte()?;
        if b == EOF {
            return Err(PDFError::truncated(source.position()));
        }
        if prev_was_ws && b == b'E' as i32 {
            let save = source.position();
            if source.peek()? == b'I' as i32 {
                source.read_byte()?;
                let next = source.peek()?;
                if next == EOF || is_ws_byte(next) {
                    return Ok(());
                }
            }
            source.seek(save)?;
        }
        prev_was_ws = is_ws_byte(b);
    }
}

/// Tokenizes decoded content-stream bytes into an operand stack plus a
/// bounded log of completed operations. Ships ready to attach via
/// [`Parser::set_content_sink`](super::parser::Parser::set_content_sink);
/// sufficient to exercise the pipeline and tests without any graphics
/// evaluation.
pub struct DefaultContentSink {
    operand_stack: Vec<ContentOperand>,
    operations: Vec<ContentOperation>,
    max_retained_operations: usize,
}

impl DefaultContentSink {
    pub fn new() -> Self {
        DefaultContentSink::with_capacity(4096)
    }

    pub fn with_capacity(max_retained_operations: usize) -> Self {
        DefaultContentSink {
            operand_stack: Vec::new(),
            operations: Vec::new(),
            max_retained_operations,
        }
    }

    pub fn operations(&self) -> &[ContentOperation] {
        &self.operations
    }

    fn record(&mut self, opcode: OpCode) {
        let operands = std::mem::take(&mut self.operand_stack);
        if self.operations.len() >= self.max_retained_operations {
            self.operations.remove(0);
        }
        self.operations.push(ContentOperation { opcode, operands });
    }
}

impl Default for DefaultContentSink {
    fn default() -> Self {
        DefaultContentSink::new()
    }
}

impl ContentSink for DefaultContentSink {}

impl StreamParser for DefaultContentSink {
    fn feed(&mut self, chunk: &[u8]) -> PDFResult<usize> {
        let mut lexer = Lexer::new(Box::new(MemSource::from_bytes(chunk.to_vec())));
        loop {
            let before = lexer.position();
            let token = match lexer.next_token() {
                Ok(t) => t,
                Err(_) => return Ok(chunk.len() - before),
            };
            match token {
                Token::Eof => return Ok(0),
                Token::Number(n) => self.operand_stack.push(ContentOperand::Number(n)),
                Token::StringLiteral(b) | Token::HexString(b) => self.operand_stack.push(ContentOperand::String(b)),
                Token::Name(n) => self.operand_stack.push(ContentOperand::Name(n)),
                Token::ArrayStart => match read_array(&mut lexer) {
                    Ok(operand) => self.operand_stack.push(operand),
                    Err(_) => return Ok(chunk.len() - before),
                },
                Token::DictStart => match read_dict(&mut lexer) {
                    Ok(operand) => self.operand_stack.push(operand),
                    Err(_) => return Ok(chunk.len() - before),
                },
                Token::ArrayEnd | Token::DictEnd => {
                    // stray closer with no matching opener; ignore defensively
                }
                Token::Keyword(kw) => match kw.as_str() {
                    "true" => self.operand_stack.push(ContentOperand::Boolean(true)),
                    "false" => self.operand_stack.push(ContentOperand::Boolean(false)),
                    "null" => self.operand_stack.push(ContentOperand::Null),
                    "ID" => match skip_inline_image_data(&mut lexer) {
                        Ok(()) => self.record(OpCode::BeginImageData),
                        Err(_) => return Ok(chunk.len() - before),
                    },
                    other => self.record(OpCode::from_command(other)),
                },
            }
        }
    }

    fn close(&mut self, remainder: &[u8]) -> PDFResult<()> {
        if remainder.is_empty() {
            return Ok(());
        }
        let _ = self.feed(remainder);
        Ok(())
    }
}

/// No table parsing; consumes and discards everything fed to it.
#[derive(Default)]
pub struct NoopOpenTypeSink;

impl StreamParser for NoopOpenTypeSink {
    fn feed(&mut self, _chunk: &[u8]) -> PDFResult<usize> {
        Ok(0)
    }
}

impl OpenTypeSink for NoopOpenTypeSink {}

/// No CMap grammar; consumes and discards everything fed to it.
#[derive(Default)]
pub struct NoopCmapSink;

impl StreamParser for NoopCmapSink {
    fn feed(&mut self, _chunk: &[u8]) -> PDFResult<usize> {
        Ok(0)
    }
}

impl CmapSink for NoopCmapSink {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_path_operators() {
        let mut sink = DefaultContentSink::new();
        let consumed = sink.feed(b"1 0 0 1 10 20 cm 0 0 100 100 re f").unwrap();
        assert_eq!(consumed, 0);
        let ops: Vec<_> = sink.operations().iter().map(|op| op.opcode.clone()).collect();
        assert_eq!(ops, vec![OpCode::Transform, OpCode::Rectangle, OpCode::Fill]);
        assert_eq!(sink.operations()[0].operands.len(), 6);
        assert_eq!(sink.operations()[1].operands.len(), 4);
    }

    #[test]
    fn test_text_showing_with_array_operand() {
        let mut sink = DefaultContentSink::new();
        sink.feed(b"BT /F1 12 Tf [(Hello) -250 (World)] TJ ET").unwrap();
        let ops = sink.operations();
        assert_eq!(ops[0].opcode, OpCode::BeginText);
        assert_eq!(ops[1].opcode, OpCode::SetFont);
        assert_eq!(ops[2].opcode, OpCode::ShowSpacedText);
        match &ops[2].operands[0] {
            ContentOperand::Array(items) => assert_eq!(items.len(), 3),
            other => panic!("expected array operand, got {:?}", other),
        }
        assert_eq!(ops[3].opcode, OpCode::EndText);
    }

    #[test]
    fn test_unknown_operator_preserved() {
        let mut sink = DefaultContentSink::new();
        sink.feed(b"42 XX").unwrap();
        assert_eq!(sink.operations()[0].opcode, OpCode::Other("XX".to_string()));
    }

    #[test]
    fn test_inline_image_skipped_without_retaining_bytes() {
        let mut sink = DefaultContentSink::new();
        let consumed = sink.feed(b"BI /W 1 /H 1 ID \x00\xff EI").unwrap();
        assert_eq!(consumed, 0);
        let ops: Vec<_> = sink.operations().iter().map(|op| op.opcode.clone()).collect();
        assert_eq!(ops, vec![OpCode::BeginInlineImage, OpCode::BeginImageData]);
    }

    #[test]
    fn test_carry_over_on_incomplete_trailing_token() {
        let mut sink = DefaultContentSink::new();
        // "(unterminated" has no closing paren; the tokenizer must report
        // the whole thing as unconsumed rather than erroring.
        let consumed = sink.feed(b"1 0 0 rg (unterminated").unwrap();
        assert!(consumed > 0);
        assert_eq!(sink.operations()[0].opcode, OpCode::SetFillRGBColor);
    }

    #[test]
    fn test_bounded_operation_log() {
        let mut sink = DefaultContentSink::with_capacity(2);
        sink.feed(b"q Q q Q q Q").unwrap();
        assert_eq!(sink.operations().len(), 2);
    }
}
