//! Low-level tokenizer over a [`ByteSource`]. Produces [`Token`]s; the
//! recursive-descent value reader lives in
//! [`object_reader`](super::object_reader).

use super::byte_source::{ByteSource, EOF};
use crate::core::error::{PDFError, PDFResult};
use crate::core::value::{Name, Number};

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Number(Number),
    StringLiteral(Vec<u8>),
    HexString(Vec<u8>),
    Name(Name),
    ArrayStart,
    ArrayEnd,
    DictStart,
    DictEnd,
    /// A bare keyword: `obj`, `endobj`, `stream`, `endstream`, `R`, `xref`,
    /// `trailer`, `startxref`, `true`, `false`, `null`, or anything else
    /// that isn't a recognized delimiter-led token. Callers interpret
    /// keywords in context.
    Keyword(String),
    Eof,
}

fn is_whitespace(b: i32) -> bool {
    matches!(b, 0 | 9 | 10 | 12 | 13 | 32)
}

fn is_delimiter(b: i32) -> bool {
    matches!(
        b,
        x if x == b'(' as i32
            || x == b')' as i32
            || x == b'<' as i32
            || x == b'>' as i32
            || x == b'[' as i32
            || x == b']' as i32
            || x == b'{' as i32
            || x == b'}' as i32
            || x == b'/' as i32
            || x == b'%' as i32
    )
}

fn is_regular(b: i32) -> bool {
    b != EOF && !is_whitespace(b) && !is_delimiter(b)
}

pub struct Lexer {
    source: Box<dyn ByteSource>,
}

impl Lexer {
    pub fn new(source: Box<dyn ByteSource>) -> Self {
        Lexer { source }
    }

    pub fn position(&self) -> usize {
        self.source.position()
    }

    pub fn seek(&mut self, offset: usize) -> PDFResult<()> {
        self.source.seek(offset)
    }

    pub fn source(&mut self) -> &mut dyn ByteSource {
        self.source.as_mut()
    }

    pub fn len(&self) -> usize {
        self.source.len()
    }

    /// Skips whitespace and `%`-comments (running to the next CR/LF).
    pub fn skip_whitespace_and_comments(&mut self) -> PDFResult<()> {
        loop {
            let b = self.source.peek()?;
            if is_whitespace(b) {
                self.source.read_byte()?;
            } else if b == b'%' as i32 {
                loop {
                    let c = self.source.read_byte()?;
                    if c == EOF || c == b'\n' as i32 || c == b'\r' as i32 {
                        break;
                    }
                }
            } else {
                break;
            }
        }
        Ok(())
    }

    pub fn next_token(&mut self) -> PDFResult<Token> {
        self.skip_whitespace_and_comments()?;
        let start = self.position();
        let b = self.source.read_byte()?;
        match b {
            EOF => Ok(Token::Eof),
            b if b == b'/' as i32 => self.read_name(),
            b if b == b'(' as i32 => self.read_literal_string(),
            b if b == b'[' as i32 => Ok(Token::ArrayStart),
            b if b == b']' as i32 => Ok(Token::ArrayEnd),
            b if b == b'<' as i32 => {
                if self.source.peek()? == b'<' as i32 {
                    self.source.read_byte()?;
                    Ok(Token::DictStart)
                } else {
                    self.read_hex_string()
                }
            }
            b if b == b'>' as i32 => {
                if self.source.peek()? == b'>' as i32 {
                    self.source.read_byte()?;
                    Ok(Token::DictEnd)
                } else {
                    Err(PDFError::malformed(start, "unexpected '>'"))
                }
            }
            b if b == b'{' as i32 || b == b'}' as i32 => {
                Err(PDFError::malformed(start, "unexpected PostScript brace"))
            }
            b if (b'0' as i32..=b'9' as i32).contains(&b) || b == b'+' as i32 || b == b'-' as i32 || b == b'.' as i32 => {
                self.source.seek(start)?;
                self.read_number()
            }
            _ => {
                self.source.seek(start)?;
                self.read_keyword()
            }
        }
    }

    fn read_name(&mut self) -> PDFResult<Token> {
        let mut bytes = Vec::new();
        loop {
            let b = self.source.peek()?;
            if !is_regular(b) {
                break;
            }
            self.source.read_byte()?;
            if b == b'#' as i32 {
                let h1 = self.source.read_byte()?;
                let h2 = self.source.read_byte()?;
                match (hex_digit(h1), hex_digit(h2)) {
                    (Some(h1), Some(h2)) => bytes.push((h1 << 4) | h2),
                    _ => {
                        bytes.push(b'#');
                        if h1 != EOF {
                            bytes.push(h1 as u8);
                        }
                        if h2 != EOF {
                            bytes.push(h2 as u8);
                        }
                    }
                }
            } else {
                bytes.push(b as u8);
            }
        }
        if bytes.contains(&0) {
            return Err(PDFError::malformed(self.position(), "name contains a null byte"));
        }
        Ok(Token::Name(Name::new(bytes)))
    }

    fn read_literal_string(&mut self) -> PDFResult<Token> {
        let mut bytes = Vec::new();
        let mut depth = 1u32;
        loop {
            let b = self.source.read_byte()?;
            if b == EOF {
                return Err(PDFError::truncated(self.position()));
            }
            match b as u8 {
                b'(' => {
                    depth += 1;
                    bytes.push(b'(');
                }
                b')' => {
                    depth -= 1;
                    if depth == 0 {
                        break;
                    }
                    bytes.push(b')');
                }
                b'\\' => {
                    let esc = self.source.read_byte()?;
                    match esc {
                        EOF => return Err(PDFError::truncated(self.position())),
                        e if e == b'n' as i32 => bytes.push(b'\n'),
                        e if e == b'r' as i32 => bytes.push(b'\r'),
                        e if e == b't' as i32 => bytes.push(b'\t'),
                        e if e == b'b' as i32 => bytes.push(0x08),
                        e if e == b'f' as i32 => bytes.push(0x0c),
                        e if e == b'(' as i32 => bytes.push(b'('),
                        e if e == b')' as i32 => bytes.push(b')'),
                        e if e == b'\\' as i32 => bytes.push(b'\\'),
                        e if e == b'\r' as i32 => {
                            if self.source.peek()? == b'\n' as i32 {
                                self.source.read_byte()?;
                            }
                        }
                        e if e == b'\n' as i32 => {}
                        e if (b'0' as i32..=b'7' as i32).contains(&e) => {
                            let mut value = e - b'0' as i32;
                            for _ in 0..2 {
                                let peeked = self.source.peek()?;
                                if (b'0' as i32..=b'7' as i32).contains(&peeked) {
                                    value = value * 8 + (self.source.read_byte()? - b'0' as i32);
                                } else {
                                    break;
                                }
                            }
                            bytes.push((value & 0xff) as u8);
                        }
                        e => bytes.push(e as u8),
                    }
                }
                other => bytes.push(other),
            }
        }
        Ok(Token::StringLiteral(bytes))
    }

    fn read_hex_string(&mut self) -> PDFResult<Token> {
        let mut nibbles = Vec::new();
        loop {
            let b = self.source.read_byte()?;
            match b {
                EOF => return Err(PDFError::truncated(self.position())),
                b if b == b'>' as i32 => break,
                b => {
                    if let Some(h) = hex_digit(b) {
                        nibbles.push(h);
                    }
                    // invalid hex characters are ignored, per spec
                }
            }
        }
        if nibbles.len() % 2 == 1 {
            nibbles.push(0);
        }
        let bytes = nibbles.chunks(2).map(|pair| (pair[0] << 4) | pair[1]).collect();
        Ok(Token::HexString(bytes))
    }

    fn read_number(&mut self) -> PDFResult<Token> {
        let mut text = String::new();
        let mut is_real = false;
        let b = self.source.peek()?;
        if b == b'+' as i32 || b == b'-' as i32 {
            text.push(self.source.read_byte()? as u8 as char);
        }
        loop {
            let b = self.source.peek()?;
            if (b'0' as i32..=b'9' as i32).contains(&b) {
                text.push(self.source.read_byte()? as u8 as char);
            } else if b == b'.' as i32 && !is_real {
                is_real = true;
                text.push(self.source.read_byte()? as u8 as char);
            } else {
                break;
            }
        }
        if text.is_empty() || text == "-" || text == "+" {
            return Err(PDFError::malformed(self.position(), "invalid number"));
        }
        if is_real {
            let value: f64 = text.parse().unwrap_or(0.0);
            Ok(Token::Number(Number::Real(value)))
        } else {
            match text.parse::<i64>() {
                Ok(value) => Ok(Token::Number(Number::Int(value))),
                Err(_) => {
                    let value: f64 = text.parse().unwrap_or(0.0);
                    Ok(Token::Number(Number::Real(value)))
                }
            }
        }
    }

    fn read_keyword(&mut self) -> PDFResult<Token> {
        let start = self.position();
        let mut text = String::new();
        loop {
            let b = self.source.peek()?;
            if !is_regular(b) {
                break;
            }
            text.push(self.source.read_byte()? as u8 as char);
        }
        if text.is_empty() {
            let b = self.source.read_byte()?;
            return Err(PDFError::malformed(start, format!("unexpected byte 0x{:02x}", b)));
        }
        Ok(Token::Keyword(text))
    }
}

fn hex_digit(b: i32) -> Option<u8> {
    match b {
        b if (b'0' as i32..=b'9' as i32).contains(&b) => Some((b - b'0' as i32) as u8),
        b if (b'a' as i32..=b'f' as i32).contains(&b) => Some((b - b'a' as i32) as u8 + 10),
        b if (b'A' as i32..=b'F' as i32).contains(&b) => Some((b - b'A' as i32) as u8 + 10),
        _ => None,
    }
}
