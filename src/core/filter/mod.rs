//! FilterPipeline: builds a decode chain from a stream dictionary's
//! `/Filter`+`/DecodeParms` (or `/F`+`/DP`), applies it to a raw stream
//! body, and tees the decoded bytes to the document sink and an optional
//! specialized sub-parser with carry-over buffering.

mod ascii85;
mod ascii_hex;
mod flate;
mod lzw;
mod run_length;

use crate::core::error::{PDFError, PDFResult};
use crate::core::sink::{DocumentSink, StreamParser};
use crate::core::value::{Dictionary, Name, Number, Value};

const DEFAULT_CARRY_OVER_CAP: usize = 64 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FilterKind {
    Flate,
    Lzw,
    AsciiHex,
    Ascii85,
    RunLength,
}

fn filter_kind(name: &Name) -> Option<FilterKind> {
    match name.as_bytes() {
        b"FlateDecode" | b"Fl" => Some(FilterKind::Flate),
        b"LZWDecode" | b"LZW" => Some(FilterKind::Lzw),
        b"ASCIIHexDecode" | b"AHx" => Some(FilterKind::AsciiHex),
        b"ASCII85Decode" | b"A85" => Some(FilterKind::Ascii85),
        b"RunLengthDecode" | b"RL" => Some(FilterKind::RunLength),
        _ => None,
    }
}

/// One element of a parsed `/Filter` + `/DecodeParms` pair.
struct FilterStep {
    kind: Option<FilterKind>, // None: unknown filter, pass through unchanged
    params: Option<Dictionary>,
}

/// Reads `/Filter`/`/F` and `/DecodeParms`/`/DP` off a stream dictionary
/// into an ordered list of steps, in the order they appear in `/Filter`.
fn parse_filter_steps(stream_dict: &Dictionary) -> Vec<FilterStep> {
    let filter_value = stream_dict
        .get(&Name::from_str("Filter"))
        .or_else(|| stream_dict.get(&Name::from_str("F")));
    let parms_value = stream_dict
        .get(&Name::from_str("DecodeParms"))
        .or_else(|| stream_dict.get(&Name::from_str("DP")));

    let names: Vec<Name> = match filter_value {
        Some(Value::Name(n)) => vec![n.clone()],
        Some(Value::Array(arr)) => arr.iter().filter_map(|v| v.as_name().cloned()).collect(),
        _ => Vec::new(),
    };

    let parms: Vec<Option<Dictionary>> = match parms_value {
        Some(Value::Dictionary(d)) => vec![Some(d.clone())],
        Some(Value::Array(arr)) => arr
            .iter()
            .map(|v| match v {
                Value::Dictionary(d) => Some(d.clone()),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    };

    names
        .into_iter()
        .enumerate()
        .map(|(i, n)| FilterStep {
            kind: filter_kind(&n),
            params: parms.get(i).cloned().flatten(),
        })
        .collect()
}

fn dict_number(dict: &Dictionary, key: &str) -> Option<Number> {
    dict.get(&Name::from_str(key)).and_then(|v| v.as_number())
}

fn predictor_params(params: &Option<Dictionary>) -> flate::PredictorParams {
    let mut p = flate::PredictorParams::default();
    if let Some(d) = params {
        if let Some(n) = dict_number(d, "Predictor").and_then(|n| n.as_i64()) {
            p.predictor = n;
        }
        if let Some(n) = dict_number(d, "Colors").and_then(|n| n.as_usize()) {
            p.colors = n;
        }
        if let Some(n) = dict_number(d, "BitsPerComponent").and_then(|n| n.as_usize()) {
            p.bits_per_component = n;
        }
        if let Some(n) = dict_number(d, "Columns").and_then(|n| n.as_usize()) {
            p.columns = n;
        }
    }
    p
}

fn early_change(params: &Option<Dictionary>) -> i64 {
    params
        .as_ref()
        .and_then(|d| dict_number(d, "EarlyChange"))
        .and_then(|n| n.as_i64())
        .unwrap_or(1)
}

fn apply_step(data: &[u8], step: &FilterStep) -> PDFResult<Vec<u8>> {
    match step.kind {
        None => {
            log::warn!("unrecognized filter in pipeline; passing {} bytes through unchanged", data.len());
            Ok(data.to_vec())
        }
        Some(FilterKind::Flate) => {
            let inflated = flate::decode_flate(data)?;
            let params = predictor_params(&step.params);
            flate::apply_predictor(&inflated, &params)
        }
        Some(FilterKind::Lzw) => {
            let decoded = lzw::decode_lzw(data, early_change(&step.params))?;
            let params = predictor_params(&step.params);
            flate::apply_predictor(&decoded, &params)
        }
        Some(FilterKind::AsciiHex) => ascii_hex::decode_ascii_hex(data),
        Some(FilterKind::Ascii85) => ascii85::decode_ascii85(data),
        Some(FilterKind::RunLength) => run_length::decode_run_length(data),
    }
}

/// Decodes a raw stream body through the chain named by `stream_dict`'s
/// `/Filter`. Filters are applied in the order listed: the array names the
/// decode pipeline directly (e.g. `[/ASCII85Decode /FlateDecode]` means
/// ASCII85-decode the raw bytes first, then inflate the result), not the
/// reverse of the encode pipeline.
pub fn decode_stream_body(raw: &[u8], stream_dict: &Dictionary) -> PDFResult<Vec<u8>> {
    let steps = parse_filter_steps(stream_dict);
    if steps.is_empty() {
        return Ok(raw.to_vec());
    }
    let mut current = raw.to_vec();
    for step in steps.iter() {
        current = apply_step(&current, step)?;
    }
    Ok(current)
}

/// Terminal node of the FilterPipeline: delivers decoded bytes to the
/// document sink, and, if a sub-parser is attached, tees them through it
/// with carry-over buffering bounded by `carry_over_cap`.
pub struct Dispatcher<'a> {
    sub_parser: Option<&'a mut dyn StreamParser>,
    carry: Vec<u8>,
    carry_over_cap: usize,
}

impl<'a> Dispatcher<'a> {
    pub fn new(sub_parser: Option<&'a mut dyn StreamParser>) -> Self {
        Dispatcher { sub_parser, carry: Vec::new(), carry_over_cap: DEFAULT_CARRY_OVER_CAP }
    }

    /// Pre-allocates the carry-over buffer's backing storage so the common
    /// case (a sub-parser that only ever carries over a small tail) doesn't
    /// reallocate as it grows geometrically toward `carry_over_cap`.
    pub fn with_carry_over_initial(mut self, initial: usize) -> Self {
        self.carry.reserve(initial.min(self.carry_over_cap));
        self
    }

    pub fn with_carry_over_cap(mut self, cap: usize) -> Self {
        self.carry_over_cap = cap;
        self
    }

    /// Delivers one decoded chunk. Since the current FilterPipeline always
    /// decodes a complete `/Length`-bounded body before dispatch, this is
    /// typically called once per stream with the whole decoded buffer; the
    /// carry-over machinery below still applies, so a caller that does
    /// split a large buffer into several `feed` calls gets the same
    /// semantics as a single call.
    pub fn feed(&mut self, sink: &mut dyn DocumentSink, decoded: &[u8]) -> PDFResult<()> {
        sink.stream_content(decoded)?;

        if let Some(parser) = self.sub_parser.as_deref_mut() {
            let mut buf = std::mem::take(&mut self.carry);
            buf.extend_from_slice(decoded);
            let unconsumed = parser.feed(&buf)?;
            if unconsumed > buf.len() {
                return Err(PDFError::malformed(0, "sub-parser reported more unconsumed bytes than it was given"));
            }
            let keep_from = buf.len() - unconsumed;
            self.carry = buf[keep_from..].to_vec();
            if self.carry.len() > self.carry_over_cap {
                return Err(PDFError::malformed(0, "sub-parser carry-over buffer exceeded its cap"));
            }
        }
        Ok(())
    }

    pub fn close(mut self, sink: &mut dyn DocumentSink) -> PDFResult<()> {
        sink.end_stream()?;
        if let Some(parser) = self.sub_parser.take() {
            let remainder = std::mem::take(&mut self.carry);
            parser.close(&remainder)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::value::ObjectId;
    use flate2::write::ZlibEncoder;
    use flate2::Compression;
    use std::io::Write;

    fn zlib_compress(data: &[u8]) -> Vec<u8> {
        let mut enc = ZlibEncoder::new(Vec::new(), Compression::default());
        enc.write_all(data).unwrap();
        enc.finish().unwrap()
    }

    #[test]
    fn test_no_filter_passes_through() {
        let dict = Dictionary::default();
        assert_eq!(decode_stream_body(b"raw bytes", &dict).unwrap(), b"raw bytes");
    }

    #[test]
    fn test_single_flate_filter() {
        let mut dict = Dictionary::default();
        dict.insert(Name::from_str("Filter"), Value::Name(Name::from_str("FlateDecode")));
        let compressed = zlib_compress(b"hello stream");
        assert_eq!(decode_stream_body(&compressed, &dict).unwrap(), b"hello stream");
    }

    #[test]
    fn test_chain_ascii85_then_flate() {
        // Encode: compress first, then ascii85-wrap the compressed bytes.
        // Decoding must reverse that: ascii85-decode first, then inflate.
        let compressed = zlib_compress(b"chained payload");
        let ascii85_wrapped = ascii85_encode_for_test(&compressed);

        let mut dict = Dictionary::default();
        dict.insert(
            Name::from_str("Filter"),
            Value::Array(vec![
                Value::Name(Name::from_str("ASCII85Decode")),
                Value::Name(Name::from_str("FlateDecode")),
            ]),
        );
        assert_eq!(decode_stream_body(&ascii85_wrapped, &dict).unwrap(), b"chained payload");
    }

    fn ascii85_encode_for_test(data: &[u8]) -> Vec<u8> {
        // Minimal encoder sufficient for round-trip testing the decoder
        // above; not part of the crate's public surface.
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
            let n = chunk.len() + 1;
            for &d in &digits[..n] {
                out.push(d + b'!');
            }
        }
        out.extend_from_slice(b"~>");
        out
    }

    #[test]
    fn test_unknown_filter_passes_through() {
        let mut dict = Dictionary::default();
        dict.insert(Name::from_str("Filter"), Value::Name(Name::from_str("Crypt")));
        assert_eq!(decode_stream_body(b"opaque", &dict).unwrap(), b"opaque");
    }

    struct RecordingSink {
        chunks: Vec<Vec<u8>>,
    }
    impl DocumentSink for RecordingSink {
        fn stream_content(&mut self, bytes: &[u8]) -> PDFResult<()> {
            self.chunks.push(bytes.to_vec());
            Ok(())
        }
    }

    struct EchoParser {
        fed: Vec<u8>,
    }
    impl StreamParser for EchoParser {
        fn feed(&mut self, chunk: &[u8]) -> PDFResult<usize> {
            // Consume all but the last byte, to exercise carry-over.
            if chunk.is_empty() {
                return Ok(0);
            }
            self.fed.extend_from_slice(&chunk[..chunk.len() - 1]);
            Ok(1)
        }
        fn close(&mut self, remainder: &[u8]) -> PDFResult<()> {
            self.fed.extend_from_slice(remainder);
            Ok(())
        }
    }

    #[test]
    fn test_dispatcher_tees_to_sink_and_sub_parser_with_carry_over() {
        let mut sink = RecordingSink { chunks: Vec::new() };
        let mut parser = EchoParser { fed: Vec::new() };
        {
            let mut dispatcher = Dispatcher::new(Some(&mut parser));
            dispatcher.feed(&mut sink, b"abc").unwrap();
            dispatcher.feed(&mut sink, b"def").unwrap();
            dispatcher.close(&mut sink).unwrap();
        }
        assert_eq!(sink.chunks, vec![b"abc".to_vec(), b"def".to_vec()]);
        assert_eq!(parser.fed, b"abcdef");
        let _ = ObjectId::new(0, 0);
    }

    #[test]
    fn test_dispatcher_with_carry_over_initial_still_carries_correctly() {
        let mut sink = RecordingSink { chunks: Vec::new() };
        let mut parser = EchoParser { fed: Vec::new() };
        {
            let mut dispatcher = Dispatcher::new(Some(&mut parser)).with_carry_over_initial(4 * 1024);
            dispatcher.feed(&mut sink, b"abc").unwrap();
            dispatcher.close(&mut sink).unwrap();
        }
        assert_eq!(parser.fed, b"abc");
    }
}
