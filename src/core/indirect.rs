//! Shared framing for `N G obj ... endobj [stream ... endstream]`.
//!
//! Used by the top-level parser for in-use objects, by the XRefEngine for
//! xref streams, and by the ObjectStreamCache for object-stream
//! containers. Implements the two-pass dance the Lexer's indirect-object
//! handling requires: capture the value once (to learn `/Length` and
//! detect a `stream` keyword) without delivering it to the real sink, then
//! re-seek and re-parse the same bytes into the real sink.

use super::lexer::{Lexer, Token};
use crate::core::error::{PDFError, PDFResult};
use crate::core::object_reader;
use crate::core::sink::{DocumentSink, ValueCaptureSink};
use crate::core::value::{Number, ObjectId, Value};

/// The value captured by the first pass, plus enough bookkeeping to redo
/// the second (real) pass from the same starting offset.
pub struct CapturedObject {
    pub value: Value,
    pub has_stream: bool,
    value_start: usize,
}

/// Reads `N G obj`. If `expected` is given, the header's object number
/// must match it (generation mismatches are not checked here; callers
/// that care compare generations against the xref entry they already
/// have).
pub fn read_header(lexer: &mut Lexer, expected: Option<ObjectId>) -> PDFResult<ObjectId> {
    let n = expect_nonneg_int(lexer)?;
    let g = expect_nonneg_int(lexer)?;
    expect_keyword(lexer, "obj")?;
    let id = ObjectId::new(n as u32, g as u16);
    if let Some(exp) = expected {
        if exp.number != id.number {
            return Err(PDFError::InconsistentObject { id: exp, expected: exp.number, found: id.number });
        }
    }
    Ok(id)
}

fn expect_nonneg_int(lexer: &mut Lexer) -> PDFResult<i64> {
    match lexer.next_token()? {
        Token::Number(Number::Int(n)) if n >= 0 => Ok(n),
        other => Err(PDFError::malformed(lexer.position(), format!("expected a non-negative integer, found {:?}", other))),
    }
}

fn expect_keyword(lexer: &mut Lexer, keyword: &str) -> PDFResult<()> {
    match lexer.next_token()? {
        Token::Keyword(ref k) if k == keyword => Ok(()),
        other => Err(PDFError::malformed(lexer.position(), format!("expected keyword '{}', found {:?}", keyword, other))),
    }
}

/// First pass: capture the object's value without emitting it, and detect
/// whether a `stream` keyword follows. Leaves the lexer positioned
/// wherever the detection probe stopped; callers must reseek via
/// [`emit_and_read_stream`] before doing anything else with this lexer.
pub fn capture_value(lexer: &mut Lexer) -> PDFResult<CapturedObject> {
    let value_start = lexer.position();
    let mut capture = ValueCaptureSink::new();
    object_reader::read_value(lexer, &mut capture)?;
    let value = capture.into_value().unwrap_or(Value::Null);

    let after_value = lexer.position();
    lexer.skip_whitespace_and_comments()?;
    let has_stream = match lexer.next_token()? {
        Token::Keyword(ref k) if k == "stream" => true,
        _ => {
            lexer.seek(after_value)?;
            false
        }
    };
    Ok(CapturedObject { value, has_stream, value_start })
}

/// Second pass: re-parses the same value into `sink` for real, then (if
/// `captured.has_stream`) reads exactly `length` raw stream bytes and
/// consumes `endstream`/`endobj`. `length` must be `Some` whenever
/// `captured.has_stream` is true; it is resolved by the caller between
/// the two passes (the one place a `/Length` indirect reference needs
/// chasing).
pub fn emit_and_read_stream(
    lexer: &mut Lexer,
    sink: &mut dyn DocumentSink,
    captured: &CapturedObject,
    length: Option<usize>,
) -> PDFResult<Option<Vec<u8>>> {
    lexer.seek(captured.value_start)?;
    object_reader::read_value(lexer, sink)?;

    if !captured.has_stream {
        expect_keyword(lexer, "endobj")?;
        return Ok(None);
    }

    expect_keyword(lexer, "stream")?;
    consume_stream_eol(lexer)?;
    let length = length.ok_or_else(|| PDFError::malformed(lexer.position(), "stream has no resolvable /Length"))?;
    let raw = lexer.source().read_exact(length)?;
    lexer.skip_whitespace_and_comments()?;
    expect_keyword(lexer, "endstream")?;
    expect_keyword(lexer, "endobj")?;
    Ok(Some(raw))
}

fn consume_stream_eol(lexer: &mut Lexer) -> PDFResult<()> {
    let offset = lexer.position();
    let source = lexer.source();
    match source.read_byte()? {
        b if b == b'\r' as i32 => {
            if source.peek()? == b'\n' as i32 {
                source.read_byte()?;
            }
            Ok(())
        }
        b if b == b'\n' as i32 => Ok(()),
        _ => Err(PDFError::malformed(offset, "expected a single EOL after 'stream'")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::mem_source::MemSource;
    use crate::core::sink::ValueCaptureSink as CaptureSink;
    use crate::core::value::Dictionary;

    fn lexer_for(bytes: &[u8]) -> Lexer {
        Lexer::new(Box::new(MemSource::from_bytes(bytes.to_vec())))
    }

    #[test]
    fn test_header_without_stream() {
        let mut lexer = lexer_for(b"1 0 obj << /Type /Catalog >> endobj");
        let id = read_header(&mut lexer, None).unwrap();
        assert_eq!(id, ObjectId::new(1, 0));
        let captured = capture_value(&mut lexer).unwrap();
        assert!(!captured.has_stream);
        let mut sink = CaptureSink::new();
        let raw = emit_and_read_stream(&mut lexer, &mut sink, &captured, None).unwrap();
        assert!(raw.is_none());
        assert_eq!(sink.into_value().unwrap().dict_get("Type").unwrap().as_name().unwrap().as_bytes(), b"Catalog");
    }

    #[test]
    fn test_header_mismatch_is_inconsistent() {
        let mut lexer = lexer_for(b"2 0 obj 1 endobj");
        let err = read_header(&mut lexer, Some(ObjectId::new(5, 0))).unwrap_err();
        assert!(matches!(err, PDFError::InconsistentObject { .. }));
    }

    #[test]
    fn test_stream_with_direct_length() {
        let mut lexer = lexer_for(b"3 0 obj << /Length 5 >>\nstream\nhello\nendstream\nendobj");
        read_header(&mut lexer, None).unwrap();
        let captured = capture_value(&mut lexer).unwrap();
        assert!(captured.has_stream);
        let dict: Dictionary = captured.value.as_dict().unwrap().clone();
        let length = dict.get(&crate::core::value::Name::from_str("Length")).unwrap().as_number().unwrap().as_usize().unwrap();
        let mut sink = CaptureSink::new();
        let raw = emit_and_read_stream(&mut lexer, &mut sink, &captured, Some(length)).unwrap();
        assert_eq!(raw.unwrap(), b"hello");
    }

    #[test]
    fn test_stream_crlf_eol() {
        let mut lexer = lexer_for(b"1 0 obj << /Length 2 >>\nstream\r\nhiendstream endobj");
        read_header(&mut lexer, None).unwrap();
        let captured = capture_value(&mut lexer).unwrap();
        let mut sink = CaptureSink::new();
        let raw = emit_and_read_stream(&mut lexer, &mut sink, &captured, Some(2)).unwrap();
        assert_eq!(raw.unwrap(), b"hi");
    }
}
