//! ASCII85Decode: groups of 5 base-85 digits to 4 bytes, `z` shorthand for
//! an all-zero group, `~>` terminator.
//!
//! Deviates deliberately from the teacher's zero-padding of a trailing
//! partial group: pads with the value 84 (`'u'`) as the spec requires,
//! since the all-zero pad the teacher uses corrupts the final bytes of a
//! stream whose length isn't a multiple of 4.

use crate::core::error::{PDFError, PDFResult};

const PAD_DIGIT: u32 = 84;

pub fn decode_ascii85(data: &[u8]) -> PDFResult<Vec<u8>> {
    let mut out = Vec::with_capacity(data.len() * 4 / 5);
    let mut group = [0u32; 5];
    let mut group_len = 0usize;

    let mut i = 0;
    while i < data.len() {
        let b = data[i];
        if b == b'~' {
            break;
        }
        if b.is_ascii_whitespace() {
            i += 1;
            continue;
        }
        if b == b'z' {
            if group_len != 0 {
                return Err(PDFError::filter_error("ASCII85Decode", "'z' inside a partial group"));
            }
            out.extend_from_slice(&[0, 0, 0, 0]);
            i += 1;
            continue;
        }
        if !(b'!'..=b'u').contains(&b) {
            return Err(PDFError::filter_error("ASCII85Decode", format!("invalid byte 0x{:02x}", b)));
        }
        group[group_len] = (b - b'!') as u32;
        group_len += 1;
        if group_len == 5 {
            emit_group(&group, 5, &mut out);
            group_len = 0;
        }
        i += 1;
    }

    if group_len > 0 {
        for slot in group.iter_mut().skip(group_len) {
            *slot = PAD_DIGIT;
        }
        emit_group(&group, group_len, &mut out);
    }

    Ok(out)
}

fn emit_group(group: &[u32; 5], len: usize, out: &mut Vec<u8>) {
    let value = group.iter().fold(0u32, |acc, &d| acc.wrapping_mul(85).wrapping_add(d));
    let bytes = value.to_be_bytes();
    let produced = len.saturating_sub(1).max(1).min(4);
    out.extend_from_slice(&bytes[..produced]);
}
