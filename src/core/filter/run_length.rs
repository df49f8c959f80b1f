//! RunLengthDecode: length-prefixed runs. A length byte 0-127 means "copy
//! the next length+1 bytes literally"; 129-255 means "repeat the next byte
//! 257-length times"; 128 is EOD.

use crate::core::error::{PDFError, PDFResult};

pub fn decode_run_length(data: &[u8]) -> PDFResult<Vec<u8>> {
    let mut out = Vec::new();
    let mut i = 0;

    while i < data.len() {
        let length = data[i];
        i += 1;
        if length == 128 {
            break;
        } else if length < 128 {
            let count = length as usize + 1;
            let end = i + count;
            if end > data.len() {
                return Err(PDFError::filter_error("RunLengthDecode", "literal run exceeds input length"));
            }
            out.extend_from_slice(&data[i..end]);
            i = end;
        } else {
            if i >= data.len() {
                return Err(PDFError::filter_error("RunLengthDecode", "repeat run missing its byte"));
            }
            let byte = data[i];
            i += 1;
            let count = 257 - length as usize;
            out.extend(std::iter::repeat(byte).take(count));
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal_run() {
        assert_eq!(decode_run_length(&[2, b'a', b'b', b'c', 128]).unwrap(), b"abc");
    }

    #[test]
    fn test_repeat_run() {
        assert_eq!(decode_run_length(&[253, b'x', 128]).unwrap(), vec![b'x'; 4]);
    }

    #[test]
    fn test_mixed_runs() {
        let input = [1, b'h', b'i', 255, b'!', 128];
        assert_eq!(decode_run_length(&input).unwrap(), b"hi!!");
    }

    #[test]
    fn test_missing_eod_still_decodes_to_end() {
        assert_eq!(decode_run_length(&[1, b'h', b'i']).unwrap(), b"hi");
    }
}
