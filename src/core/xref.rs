//! Cross-reference subsystem: locates `startxref`, parses legacy xref
//! tables and xref streams, follows `/Prev` chains, and merges the result
//! into one [`CrossReferenceTable`] where the newest section's entries win.
//!
//! Both table flavors are read through the same top-level [`Lexer`] the
//! rest of the parser uses, since xref byte offsets are always measured
//! from the start of the document, not from some sub-range.

use super::filter;
use super::indirect;
use super::lexer::{Lexer, Token};
use super::mem_source::MemSource;
use super::object_reader;
use crate::core::byte_source::ByteSource;
use crate::core::error::{PDFError, PDFResult};
use crate::core::sink::{DocumentSink, ValueCaptureSink};
use crate::core::value::{Dictionary, Name, Number, ObjectId};
use std::collections::{HashMap, HashSet};

/// One cross-reference table entry, as decoded from either representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrossReferenceEntry {
    Free { next_free_object: u32, generation: u16 },
    InUse { byte_offset: u64, generation: u16 },
    Compressed { container_object_number: u32, index_within_container: u32 },
}

/// Map from the full `(object number, generation)` pair to its entry.
/// Incremental updates can leave more than one generation of the same
/// object number live in the merged table simultaneously (an older section
/// reachable only via `/Prev` still describes its own, now-superseded,
/// generation), so the key must carry generation rather than discard it.
#[derive(Default)]
pub struct CrossReferenceTable {
    entries: HashMap<ObjectId, CrossReferenceEntry>,
}

impl CrossReferenceTable {
    pub fn new() -> Self {
        CrossReferenceTable::default()
    }

    pub fn get(&self, id: ObjectId) -> Option<CrossReferenceEntry> {
        self.entries.get(&id).copied()
    }

    /// Records `entry` for `id` only if nothing is recorded yet. Sections
    /// are always merged newest-to-oldest, so first-write-wins here
    /// implements "newest revision wins".
    pub fn insert_if_absent(&mut self, id: ObjectId, entry: CrossReferenceEntry) {
        self.entries.entry(id).or_insert(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn object_ids(&self) -> impl Iterator<Item = ObjectId> + '_ {
        self.entries.keys().copied()
    }
}

/// A `DocumentSink` that discards everything; used where only the raw
/// stream bytes of an xref-stream object are wanted, and the dictionary
/// value was already captured separately.
struct DiscardSink;
impl DocumentSink for DiscardSink {}

/// Finds the `startxref` keyword in the last kilobyte of the document and
/// returns the byte offset following it.
pub fn locate_startxref(source: &mut dyn ByteSource) -> PDFResult<usize> {
    let len = source.len();
    let tail_len = len.min(1024);
    let tail = source.byte_range(len - tail_len, tail_len)?;
    const MARKER: &[u8] = b"startxref";
    let marker_pos = tail
        .windows(MARKER.len())
        .rposition(|w| w == MARKER)
        .ok_or_else(|| PDFError::malformed(len.saturating_sub(tail_len), "no startxref marker found near end of file"))?;
    let mut lexer = Lexer::new(Box::new(MemSource::from_bytes(tail[marker_pos + MARKER.len()..].to_vec())));
    match lexer.next_token()? {
        Token::Number(Number::Int(n)) if n >= 0 => Ok(n as usize),
        other => Err(PDFError::malformed(len - tail_len + marker_pos, format!("expected an offset after 'startxref', found {:?}", other))),
    }
}

/// Parses the full `/Prev` chain starting at `start_offset`, merging every
/// section's entries into one table. Returns the merged table, the
/// first-encountered (newest) trailer dictionary, and the id under which
/// that trailer should be treated as a synthetic object: `(0, 0)` for a
/// legacy trailer (which is not itself an indirect object), or the xref
/// stream's own id when the newest section is an xref stream (so the
/// traversal controller doesn't re-fetch and re-emit it as a plain object).
pub fn load_chain(lexer: &mut Lexer, start_offset: usize, strict: bool) -> PDFResult<(CrossReferenceTable, Dictionary, ObjectId)> {
    let mut table = CrossReferenceTable::new();
    let mut visited = HashSet::new();
    let mut pending = vec![start_offset];
    let mut newest: Option<(Dictionary, ObjectId)> = None;

    while let Some(offset) = pending.pop() {
        if !visited.insert(offset) {
            continue;
        }
        if offset >= lexer.len() {
            return Err(PDFError::malformed(offset, "xref offset points past end of file"));
        }
        lexer.seek(offset)?;
        lexer.skip_whitespace_and_comments()?;
        let marker = lexer.source().peek()?;
        let (section_trailer, section_root) = if marker == b'x' as i32 {
            parse_legacy_section(lexer, &mut table, strict)?
        } else if (b'0' as i32..=b'9' as i32).contains(&marker) {
            parse_stream_section(lexer, &mut table, strict)?
        } else {
            return Err(PDFError::malformed(offset, "expected 'xref' keyword or an xref-stream object header"));
        };

        if let Some(prev) = section_trailer
            .get(&Name::from_str("Prev"))
            .and_then(|v| v.as_number())
            .and_then(|n| n.as_usize())
        {
            log::trace!("xref section at {} chains to /Prev {}", offset, prev);
            pending.push(prev);
        }

        if newest.is_none() {
            newest = Some((section_trailer, section_root));
        }
    }

    let (trailer, root) = newest.ok_or_else(|| PDFError::malformed(start_offset, "no cross-reference section found"))?;
    Ok((table, trailer, root))
}

fn expect_keyword(lexer: &mut Lexer, keyword: &str) -> PDFResult<()> {
    match lexer.next_token()? {
        Token::Keyword(ref k) if k == keyword => Ok(()),
        other => Err(PDFError::malformed(lexer.position(), format!("expected keyword '{}', found {:?}", keyword, other))),
    }
}

/// `xref` ... one or more `first count` subsections of 20-byte fixed
/// records ... `trailer` `<< ... >>`.
fn parse_legacy_section(lexer: &mut Lexer, table: &mut CrossReferenceTable, strict: bool) -> PDFResult<(Dictionary, ObjectId)> {
    expect_keyword(lexer, "xref")?;
    loop {
        lexer.skip_whitespace_and_comments()?;
        let before = lexer.position();
        let token = lexer.next_token()?;
        match token {
            Token::Keyword(ref k) if k == "trailer" => break,
            Token::Number(Number::Int(first)) if first >= 0 => {
                let count = match lexer.next_token()? {
                    Token::Number(Number::Int(n)) if n >= 0 => n as u32,
                    other => return Err(PDFError::malformed(lexer.position(), format!("expected subsection entry count, found {:?}", other))),
                };
                lexer.skip_whitespace_and_comments()?;
                for i in 0..count {
                    let record = lexer.source().read_exact(20)?;
                    let entry = parse_legacy_record(&record, lexer.position(), strict)?;
                    let generation = match entry {
                        CrossReferenceEntry::Free { generation, .. } => generation,
                        CrossReferenceEntry::InUse { generation, .. } => generation,
                        CrossReferenceEntry::Compressed { .. } => 0,
                    };
                    table.insert_if_absent(ObjectId::new(first as u32 + i, generation), entry);
                }
            }
            other => return Err(PDFError::malformed(before, format!("expected a subsection header or 'trailer', found {:?}", other))),
        }
    }

    let mut capture = ValueCaptureSink::new();
    object_reader::read_value(lexer, &mut capture)?;
    let trailer = capture
        .into_value()
        .and_then(|v| v.as_dict().cloned())
        .ok_or_else(|| PDFError::malformed(lexer.position(), "trailer is not a dictionary"))?;
    Ok((trailer, ObjectId::new(0, 0)))
}

/// Each legacy entry is exactly 20 bytes: a 10-digit byte offset, a space,
/// a 5-digit generation, a space, a type byte (`n`/`f`), then a 2-byte EOL.
fn parse_legacy_record(record: &[u8], offset: usize, strict: bool) -> PDFResult<CrossReferenceEntry> {
    if record.len() != 20 {
        return Err(PDFError::truncated(offset));
    }
    let offset_field = std::str::from_utf8(&record[0..10]).map_err(|_| PDFError::malformed(offset, "xref entry offset field is not ASCII"))?;
    let gen_field = std::str::from_utf8(&record[11..16]).map_err(|_| PDFError::malformed(offset, "xref entry generation field is not ASCII"))?;
    let value: u64 = offset_field.trim().parse().map_err(|_| PDFError::malformed(offset, "invalid xref entry offset field"))?;
    let generation: u16 = gen_field.trim().parse().map_err(|_| PDFError::malformed(offset, "invalid xref entry generation field"))?;
    match record[17] {
        b'n' => Ok(CrossReferenceEntry::InUse { byte_offset: value, generation }),
        b'f' => Ok(CrossReferenceEntry::Free { next_free_object: value as u32, generation }),
        other if strict => Err(PDFError::malformed(offset, format!("invalid xref entry type byte 0x{:02x}", other))),
        _ => Ok(CrossReferenceEntry::Free { next_free_object: 0, generation }),
    }
}

/// `N 0 obj << /Type /XRef /W [..] /Index [..] /Size n >> stream ...
/// endstream endobj`.
fn parse_stream_section(lexer: &mut Lexer, table: &mut CrossReferenceTable, strict: bool) -> PDFResult<(Dictionary, ObjectId)> {
    let id = indirect::read_header(lexer, None)?;
    let captured = indirect::capture_value(lexer)?;
    let dict = captured
        .value
        .as_dict()
        .cloned()
        .ok_or_else(|| PDFError::malformed(lexer.position(), "xref stream object is not a dictionary"))?;
    if !captured.has_stream {
        return Err(PDFError::malformed(lexer.position(), "xref stream object has no stream body"));
    }
    let is_xref = dict
        .get(&Name::from_str("Type"))
        .and_then(|v| v.as_name())
        .map(|n| n.as_bytes() == b"XRef")
        .unwrap_or(false);
    if !is_xref {
        return Err(PDFError::malformed(lexer.position(), "expected /Type /XRef"));
    }

    // The xref stream's own /Length must be a direct integer: resolving an
    // indirect /Length here would require consulting the very table this
    // stream is building.
    let length = dict
        .get(&Name::from_str("Length"))
        .and_then(|v| v.as_number())
        .and_then(|n| n.as_usize())
        .ok_or_else(|| PDFError::malformed(lexer.position(), "xref stream's /Length must be a direct integer"))?;

    let mut discard = DiscardSink;
    let raw = indirect::emit_and_read_stream(lexer, &mut discard, &captured, Some(length))?
        .ok_or_else(|| PDFError::malformed(lexer.position(), "xref stream produced no data"))?;
    let decoded = filter::decode_stream_body(&raw, &dict)?;

    let widths = dict
        .get(&Name::from_str("W"))
        .and_then(|v| v.as_array())
        .ok_or_else(|| PDFError::malformed(lexer.position(), "xref stream missing /W"))?;
    if widths.len() != 3 {
        return Err(PDFError::malformed(lexer.position(), "/W must have exactly 3 elements"));
    }
    let field_width = |i: usize| -> PDFResult<usize> {
        widths[i]
            .as_number()
            .and_then(|n| n.as_usize())
            .ok_or_else(|| PDFError::malformed(lexer.position(), "/W entries must be non-negative integers"))
    };
    let (w0, w1, w2) = (field_width(0)?, field_width(1)?, field_width(2)?);
    let entry_size = w0 + w1 + w2;

    let size = dict
        .get(&Name::from_str("Size"))
        .and_then(|v| v.as_number())
        .and_then(|n| n.as_usize())
        .ok_or_else(|| PDFError::malformed(lexer.position(), "xref stream missing /Size"))?;

    let index_pairs: Vec<(u32, u32)> = match dict.get(&Name::from_str("Index")).and_then(|v| v.as_array()) {
        Some(arr) => {
            if arr.len() % 2 != 0 {
                return Err(PDFError::malformed(lexer.position(), "/Index must contain an even number of integers"));
            }
            let mut pairs = Vec::with_capacity(arr.len() / 2);
            for pair in arr.chunks(2) {
                let first = pair[0]
                    .as_number()
                    .and_then(|n| n.as_usize())
                    .ok_or_else(|| PDFError::malformed(lexer.position(), "/Index entries must be non-negative integers"))? as u32;
                let count = pair[1]
                    .as_number()
                    .and_then(|n| n.as_usize())
                    .ok_or_else(|| PDFError::malformed(lexer.position(), "/Index entries must be non-negative integers"))? as u32;
                pairs.push((first, count));
            }
            pairs
        }
        None => vec![(0, size as u32)],
    };

    let mut pos = 0usize;
    for (first, count) in index_pairs {
        for i in 0..count {
            if pos + entry_size > decoded.len() {
                return Err(PDFError::malformed(pos, "/Index names more entries than the decoded xref stream contains"));
            }
            let field_type = if w0 == 0 { 1 } else { read_be(&decoded[pos..pos + w0]) };
            pos += w0;
            let field2 = read_be(&decoded[pos..pos + w1]);
            pos += w1;
            let field3 = read_be(&decoded[pos..pos + w2]);
            pos += w2;

            let object_number = first + i;
            let (entry, generation) = match field_type {
                0 => (CrossReferenceEntry::Free { next_free_object: field2 as u32, generation: field3 as u16 }, field3 as u16),
                1 => (CrossReferenceEntry::InUse { byte_offset: field2, generation: field3 as u16 }, field3 as u16),
                // Compressed entries are always generation 0: the object lives
                // inside an object stream, which PDF forbids from holding
                // anything but generation-0 objects.
                2 => (CrossReferenceEntry::Compressed { container_object_number: field2 as u32, index_within_container: field3 as u32 }, 0),
                other => {
                    if strict {
                        return Err(PDFError::malformed(pos, format!("invalid xref stream entry type {}", other)));
                    }
                    continue;
                }
            };
            table.insert_if_absent(ObjectId::new(object_number, generation), entry);
        }
    }

    Ok((dict, id))
}

fn read_be(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0u64, |acc, &b| (acc << 8) | b as u64)
}
