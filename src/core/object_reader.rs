//! Recursive-descent value reader: turns a [`Lexer`]'s token stream into
//! [`DocumentSink`] events for scalars, arrays, and dictionaries, including
//! the speculative number-vs-reference disambiguation.

use super::lexer::{Lexer, Token};
use crate::core::error::{PDFError, PDFResult};
use crate::core::sink::DocumentSink;
use crate::core::value::{Number, ObjectId};

/// Reads one value (scalar, array, dictionary, or reference) and emits the
/// corresponding events to `sink`.
pub fn read_value(lexer: &mut Lexer, sink: &mut dyn DocumentSink) -> PDFResult<()> {
    let token = lexer.next_token()?;
    read_value_from_token(token, lexer, sink)
}

fn read_value_from_token(token: Token, lexer: &mut Lexer, sink: &mut dyn DocumentSink) -> PDFResult<()> {
    match token {
        Token::Number(Number::Int(n1)) if n1 >= 0 => {
            let after_n1 = lexer.position();
            match try_reference(lexer, n1)? {
                Some(id) => sink.object_reference(id),
                None => {
                    lexer.seek(after_n1)?;
                    sink.number_value(Number::Int(n1))
                }
            }
        }
        Token::Number(n) => sink.number_value(n),
        Token::StringLiteral(bytes) | Token::HexString(bytes) => sink.string_value(&bytes),
        Token::Name(name) => {
            let result = sink.name_value(&name);
            result
        }
        Token::ArrayStart => read_array(lexer, sink),
        Token::DictStart => read_dictionary(lexer, sink),
        Token::Keyword(kw) => match kw.as_str() {
            "true" => sink.boolean_value(true),
            "false" => sink.boolean_value(false),
            "null" => sink.null_value(),
            other => Err(PDFError::malformed(lexer.position(), format!("unexpected keyword '{}'", other))),
        },
        Token::ArrayEnd => Err(PDFError::malformed(lexer.position(), "unexpected ']'")),
        Token::DictEnd => Err(PDFError::malformed(lexer.position(), "unexpected '>>'")),
        Token::Eof => Err(PDFError::truncated(lexer.position())),
    }
}

/// Attempts the `n1 n2 R` pattern. On any deviation the lexer position is
/// left wherever the attempt stopped; the caller is responsible for
/// restoring to the position right after `n1` was read.
fn try_reference(lexer: &mut Lexer, n1: i64) -> PDFResult<Option<ObjectId>> {
    let second = lexer.next_token()?;
    let n2 = match second {
        Token::Number(Number::Int(n2)) if n2 >= 0 => n2,
        _ => return Ok(None),
    };
    let third = lexer.next_token()?;
    match third {
        Token::Keyword(ref kw) if kw == "R" => Ok(Some(ObjectId::new(n1 as u32, n2 as u16))),
        _ => Ok(None),
    }
}

fn read_array(lexer: &mut Lexer, sink: &mut dyn DocumentSink) -> PDFResult<()> {
    sink.start_array()?;
    loop {
        let before = lexer.position();
        let token = lexer.next_token()?;
        if token == Token::ArrayEnd {
            break;
        }
        if token == Token::Eof {
            return Err(PDFError::truncated(lexer.position()));
        }
        let _ = before;
        read_value_from_token(token, lexer, sink)?;
    }
    sink.end_array()
}

fn read_dictionary(lexer: &mut Lexer, sink: &mut dyn DocumentSink) -> PDFResult<()> {
    sink.start_dictionary()?;
    loop {
        let token = lexer.next_token()?;
        match token {
            Token::DictEnd => break,
            Token::Eof => return Err(PDFError::truncated(lexer.position())),
            Token::Name(name) => {
                sink.key(&name)?;
                read_value(lexer, sink)?;
            }
            _ => return Err(PDFError::malformed(lexer.position(), "dictionary key must be a name")),
        }
    }
    sink.end_dictionary()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::mem_source::MemSource;
    use crate::core::sink::ValueCaptureSink;
    use crate::core::value::Value;

    fn lexer_for(bytes: &[u8]) -> Lexer {
        Lexer::new(Box::new(MemSource::from_bytes(bytes.to_vec())))
    }

    #[test]
    fn test_number_not_followed_by_reference() {
        let mut lexer = lexer_for(b"[1 2 3]");
        let mut sink = ValueCaptureSink::new();
        read_value(&mut lexer, &mut sink).unwrap();
        let value = sink.into_value().unwrap();
        let arr = value.as_array().unwrap();
        assert_eq!(arr.len(), 3);
        assert_eq!(arr[0].as_number(), Some(Number::Int(1)));
    }

    #[test]
    fn test_object_reference_recognized() {
        let mut lexer = lexer_for(b"1 0 R");
        let mut sink = ValueCaptureSink::new();
        read_value(&mut lexer, &mut sink).unwrap();
        assert_eq!(sink.into_value(), Some(Value::Reference(ObjectId::new(1, 0))));
    }

    #[test]
    fn test_reference_inside_array_followed_by_plain_numbers() {
        // "5 0 R 7 8" must parse as [reference(5,0), 7, 8]
        let mut lexer = lexer_for(b"[5 0 R 7 8]");
        let mut sink = ValueCaptureSink::new();
        read_value(&mut lexer, &mut sink).unwrap();
        let value = sink.into_value().unwrap();
        let arr = value.as_array().unwrap();
        assert_eq!(arr[0].as_reference(), Some(ObjectId::new(5, 0)));
        assert_eq!(arr[1].as_number(), Some(Number::Int(7)));
        assert_eq!(arr[2].as_number(), Some(Number::Int(8)));
    }

    #[test]
    fn test_two_numbers_not_reference_because_no_r() {
        let mut lexer = lexer_for(b"5 0 obj");
        let mut sink = ValueCaptureSink::new();
        read_value(&mut lexer, &mut sink).unwrap();
        assert_eq!(sink.into_value(), Some(Value::Number(Number::Int(5))));
        // the lexer must be positioned right after the first number, so the
        // next token is the second "0", not "obj".
        assert_eq!(lexer.next_token().unwrap(), Token::Number(Number::Int(0)));
    }

    #[test]
    fn test_dictionary_roundtrip_through_value_capture() {
        let mut lexer = lexer_for(b"<< /Type /Catalog /Pages 2 0 R >>");
        let mut sink = ValueCaptureSink::new();
        read_value(&mut lexer, &mut sink).unwrap();
        let value = sink.into_value().unwrap();
        assert_eq!(value.dict_get("Type").and_then(|v| v.as_name()).map(|n| n.as_bytes()), Some(&b"Catalog"[..]));
        assert_eq!(value.dict_get("Pages").and_then(|v| v.as_reference()), Some(ObjectId::new(2, 0)));
    }

    #[test]
    fn test_nested_array_and_dictionary() {
        let mut lexer = lexer_for(b"<< /Kids [1 0 R 2 0 R] /Count 2 >>");
        let mut sink = ValueCaptureSink::new();
        read_value(&mut lexer, &mut sink).unwrap();
        let value = sink.into_value().unwrap();
        let kids = value.dict_get("Kids").unwrap().as_array().unwrap();
        assert_eq!(kids.len(), 2);
        assert_eq!(value.dict_get("Count").and_then(|v| v.as_number()), Some(Number::Int(2)));
    }

    #[test]
    fn test_malformed_dictionary_key() {
        let mut lexer = lexer_for(b"<< 1 2 >>");
        let mut sink = ValueCaptureSink::new();
        assert!(read_value(&mut lexer, &mut sink).is_err());
    }

    #[test]
    fn test_null_and_booleans() {
        let mut lexer = lexer_for(b"[true false null]");
        let mut sink = ValueCaptureSink::new();
        read_value(&mut lexer, &mut sink).unwrap();
        let value = sink.into_value().unwrap();
        let arr = value.as_array().unwrap();
        assert_eq!(arr, &[Value::Boolean(true), Value::Boolean(false), Value::Null]);
    }
}
