//! Filter pipeline and object-stream resolution scenarios.

mod support;

use flate2::write::ZlibEncoder;
use flate2::Compression;
use pdf_stream::{MemSource, ObjectId, Parser};
use std::io::Write;
use support::RecordingSink;

fn zlib_compress(data: &[u8]) -> Vec<u8> {
    let mut enc = ZlibEncoder::new(Vec::new(), Compression::default());
    enc.write_all(data).unwrap();
    enc.finish().unwrap()
}

// S3: a compressed object inside an object stream resolves through pull
// traversal without an `obj`/`endobj` wrapper.
#[test]
fn compressed_object_resolves_from_an_object_stream() {
    // Object stream body: index "7 0" (object 7 at relative offset 0),
    // then, starting at First=4, "<< /Hello true >>".
    let body = b"7 0<< /Hello true >>";
    let mut doc = Vec::new();
    doc.extend_from_slice(b"%PDF-1.5\n");
    let objstm_offset = doc.len();
    doc.extend_from_slice(
        format!("10 0 obj << /Type /ObjStm /N 1 /First 4 /Length {} >> stream\n", body.len()).as_bytes(),
    );
    doc.extend_from_slice(body);
    doc.extend_from_slice(b"\nendstream\nendobj\n");

    // A legacy table can't express a Compressed entry, so build the xref
    // stream by hand: /W [1 2 1], one entry for object 7 (type 2: container
    // 10, index 0) and one for object 10 (type 1: in-use at objstm_offset).
    let xref_body_raw = {
        let mut b = Vec::new();
        // Entries must appear in object-number order 0..=10 (the default
        // /Index [0 Size] run).
        // object 0: free head
        b.extend_from_slice(&[0u8, 0, 0, 0]);
        // objects 1..=6: padding, free
        for _ in 1..=6 {
            b.push(0);
            b.extend_from_slice(&0u16.to_be_bytes());
            b.push(0);
        }
        // object 7: compressed, container 10, index 0
        b.push(2);
        b.extend_from_slice(&10u16.to_be_bytes());
        b.push(0);
        // objects 8..=9: padding, free
        for _ in 8..=9 {
            b.push(0);
            b.extend_from_slice(&0u16.to_be_bytes());
            b.push(0);
        }
        // object 10: in use at objstm_offset
        b.push(1);
        b.extend_from_slice(&(objstm_offset as u16).to_be_bytes());
        b.push(0);
        b
    };
    let xref_body = zlib_compress(&xref_body_raw);

    let xref_offset = doc.len();
    doc.extend_from_slice(
        format!(
            "11 0 obj << /Type /XRef /W [1 2 1] /Size 11 /Root 1 0 R /Filter /FlateDecode /Length {} >> stream\n",
            xref_body.len()
        )
        .as_bytes(),
    );
    doc.extend_from_slice(&xref_body);
    doc.extend_from_slice(b"\nendstream\nendobj\n");
    doc.extend_from_slice(format!("startxref\n{}\n%%EOF", xref_offset).as_bytes());

    let sink = RecordingSink::default();
    let mut parser = Parser::new(sink);
    parser.load(Box::new(MemSource::from_bytes(doc))).unwrap();

    let pull_sink = RecordingSink::default();
    let mut pull = pull_sink.clone();
    parser.parse_object(ObjectId::new(7, 0), &mut pull).unwrap();

    let log = pull_sink.log();
    assert_eq!(log, vec![
        "start_object(7 0 R)",
        "start_dictionary",
        "key(/Hello)",
        "boolean(true)",
        "end_dictionary",
        "end_object",
    ]);
}

// S5: a two-filter chain decodes in the order listed, outermost first.
#[test]
fn filter_chain_applies_in_listed_order() {
    let original = b"chained filter content";
    let inflated_input = zlib_compress(original);
    // ASCII85 is applied on top of the zlib bytes (outermost filter in the
    // array is the first one the encoder applied, so decoding must reverse
    // that: ASCII85 first, then Flate).
    let encoded = ascii85_encode(&inflated_input);

    let mut doc = Vec::new();
    doc.extend_from_slice(b"%PDF-1.4\n");
    let obj1_offset = doc.len();
    doc.extend_from_slice(
        format!(
            "1 0 obj << /Type /Catalog /Filter [/ASCII85Decode /FlateDecode] /Length {} >> stream\n",
            encoded.len()
        )
        .as_bytes(),
    );
    doc.extend_from_slice(&encoded);
    doc.extend_from_slice(b"\nendstream\nendobj\n");
    let xref_offset = doc.len();
    doc.extend_from_slice(
        format!(
            "xref\n0 2\n0000000000 65535 f \n{:010} 00000 n \ntrailer\n<< /Size 2 /Root 1 0 R >>\nstartxref\n{}\n%%EOF",
            obj1_offset, xref_offset
        )
        .as_bytes(),
    );

    let sink = RecordingSink::default();
    let mut parser = Parser::new(sink.clone());
    parser.parse(Box::new(MemSource::from_bytes(doc))).unwrap();

    let log = sink.log();
    assert!(log.contains(&format!("stream_content({} bytes)", original.len())));
}

// Boundary: a stream body of length 0 still round-trips through the
// pipeline and emits a single zero-length `stream_content`.
#[test]
fn zero_length_stream_body_emits_empty_stream_content() {
    let mut doc = Vec::new();
    doc.extend_from_slice(b"%PDF-1.4\n");
    let obj1_offset = doc.len();
    doc.extend_from_slice(b"1 0 obj << /Type /Catalog /Length 0 >> stream\n\nendstream\nendobj\n");
    let xref_offset = doc.len();
    doc.extend_from_slice(
        format!(
            "xref\n0 2\n0000000000 65535 f \n{:010} 00000 n \ntrailer\n<< /Size 2 /Root 1 0 R >>\nstartxref\n{}\n%%EOF",
            obj1_offset, xref_offset
        )
        .as_bytes(),
    );

    let sink = RecordingSink::default();
    let mut parser = Parser::new(sink.clone());
    parser.parse(Box::new(MemSource::from_bytes(doc))).unwrap();
    assert!(sink.log().contains(&"stream_content(0 bytes)".to_string()));
}

/// Minimal ASCII85 encoder sufficient for the filter-chain-order test; not a
/// general-purpose implementation (no `z` shortcut emission).
fn ascii85_encode(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    for chunk in data.chunks(4) {
        let mut buf = [0u8; 4];
        buf[..chunk.len()].copy_from_slice(chunk);
        let value = u32::from_be_bytes(buf);
        let mut digits = [0u8; 5];
        let mut v = value;
        for i in (0..5).rev() {
            digits[i] = (v % 85) as u8;
            v /= 85;
        }
        let take = chunk.len() + 1;
        for &d in &digits[..take] {
            out.push(d + b'!');
        }
    }
    out.extend_from_slice(b"~>");
    out
}
