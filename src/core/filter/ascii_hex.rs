//! ASCIIHexDecode: pairs of hex digits to bytes, whitespace tolerant, `>`
//! terminates early.

use crate::core::error::PDFResult;

pub fn decode_ascii_hex(data: &[u8]) -> PDFResult<Vec<u8>> {
    let mut out = Vec::with_capacity(data.len() / 2);
    let mut high: Option<u8> = None;

    for &b in data {
        if b == b'>' {
            break;
        }
        let digit = match hex_value(b) {
            Some(d) => d,
            None => continue,
        };
        match high.take() {
            Some(h) => out.push((h << 4) | digit),
            None => high = Some(digit),
        }
    }
    if let Some(h) = high {
        out.push(h << 4);
    }
    Ok(out)
}

fn hex_value(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_decode() {
        assert_eq!(decode_ascii_hex(b"4869>").unwrap(), b"Hi");
    }

    #[test]
    fn test_whitespace_ignored() {
        assert_eq!(decode_ascii_hex(b"48 69\n>").unwrap(), b"Hi");
    }

    #[test]
    fn test_odd_digit_count_zero_padded() {
        assert_eq!(decode_ascii_hex(b"4>").unwrap(), vec![0x40]);
    }

    #[test]
    fn test_missing_terminator_still_decodes() {
        assert_eq!(decode_ascii_hex(b"4869").unwrap(), b"Hi");
    }
}
