//! LZWDecode: variable-width LZW (9-12 bits) with the PDF `EarlyChange`
//! parameter.
//!
//! Tries `weezl` (the well-tested LZW crate the corpus's lopdf ports use)
//! for the default `EarlyChange = 1` case first, falling back to a
//! hand-rolled decoder that honors an explicit `EarlyChange` value weezl
//! does not parameterize.

use crate::core::error::{PDFError, PDFResult};

const CLEAR_CODE: u16 = 256;
const EOD_CODE: u16 = 257;
const FIRST_CODE: u16 = 258;
const MAX_CODE_BITS: u8 = 12;

pub fn decode_lzw(data: &[u8], early_change: i64) -> PDFResult<Vec<u8>> {
    if early_change == 1 {
        if let Ok(out) = decode_weezl(data) {
            return Ok(out);
        }
    }
    decode_custom(data, early_change != 0)
}

fn decode_weezl(data: &[u8]) -> Result<Vec<u8>, ()> {
    use weezl::{decode::Decoder as WeezlDecoder, BitOrder};
    let mut decoder = WeezlDecoder::new(BitOrder::Msb, 8);
    decoder.decode(data).map_err(|_| ())
}

fn decode_custom(data: &[u8], early_change: bool) -> PDFResult<Vec<u8>> {
    let mut output = Vec::new();
    let mut table: Vec<Vec<u8>> = init_table();
    let mut code_bits = 9u8;
    let mut next_code = FIRST_CODE;
    let mut reader = BitReader::new(data);
    let mut prev_code: Option<u16> = None;

    loop {
        let threshold = if early_change { (1u16 << code_bits) - 1 } else { 1u16 << code_bits };
        if code_bits < MAX_CODE_BITS && next_code >= threshold {
            code_bits += 1;
        }

        let code = match reader.read_bits(code_bits) {
            Some(c) => c as u16,
            None => break,
        };

        if code == EOD_CODE {
            break;
        }
        if code == CLEAR_CODE {
            table = init_table();
            code_bits = 9;
            next_code = FIRST_CODE;
            prev_code = None;
            continue;
        }

        let entry = if (code as usize) < table.len() {
            table[code as usize].clone()
        } else if code == next_code {
            let prev = prev_code.ok_or_else(|| PDFError::filter_error("LZWDecode", "code precedes any table entry"))?;
            let mut s = table[prev as usize].clone();
            let first = s[0];
            s.push(first);
            s
        } else {
            return Err(PDFError::filter_error("LZWDecode", format!("invalid code {}", code)));
        };

        output.extend_from_slice(&entry);

        if let Some(prev) = prev_code {
            if next_code < 4096 {
                let mut new_entry = table[prev as usize].clone();
                new_entry.push(entry[0]);
                if (next_code as usize) == table.len() {
                    table.push(new_entry);
                } else {
                    table[next_code as usize] = new_entry;
                }
                next_code += 1;
            }
        }
        prev_code = Some(code);
    }

    Ok(output)
}

fn init_table() -> Vec<Vec<u8>> {
    let mut table = Vec::with_capacity(FIRST_CODE as usize);
    for i in 0..=255u16 {
        table.push(vec![i as u8]);
    }
    table.push(Vec::new()); // 256: CLEAR, unused as a string
    table.push(Vec::new()); // 257: EOD, unused as a string
    table
}

struct BitReader<'a> {
    data: &'a [u8],
    byte_pos: usize,
    bit_pos: u8,
}

impl<'a> BitReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        BitReader { data, byte_pos: 0, bit_pos: 0 }
    }

    fn read_bits(&mut self, n: u8) -> Option<u32> {
        let mut result = 0u32;
        let mut remaining = n;
        while remaining > 0 {
            if self.byte_pos >= self.data.len() {
                return None;
            }
            let bits_left_in_byte = 8 - self.bit_pos;
            let take = remaining.min(bits_left_in_byte);
            let byte = self.data[self.byte_pos];
            let shift = bits_left_in_byte - take;
            let mask = if take == 8 { 0xFF } else { ((1u16 << take) - 1) as u8 << shift };
            let bits = (byte & mask) >> shift;
            result = (result << take) | bits as u32;
            self.bit_pos += take;
            if self.bit_pos >= 8 {
                self.bit_pos = 0;
                self.byte_pos += 1;
            }
            remaining -= take;
        }
        Some(result)
    }
}
