//! Ties the lexer, filter pipeline, cross-reference subsystem, and object
//! stream cache together behind the two traversal modes: a push walk from
//! the trailer, and pull-style on-demand resolution.
//!
//! Borrowing note: several methods below split `self` into disjoint field
//! borrows (a `ResolveCtx` built from direct `&mut self.field` paths,
//! alongside a separately-borrowed `self.document_sink` or a caller-owned
//! sink) rather than taking `&mut self` end to end. This is what lets
//! `/Length` resolution — which may itself parse another indirect object —
//! run to completion before the document sink is ever borrowed for the
//! emit pass, and lets push and pull traversal share one emit
//! implementation despite writing to different sinks.

use super::config::ParserConfig;
use super::content::{CmapSink, ContentSink, OpenTypeSink};
use super::filter;
use super::indirect;
use super::lexer::Lexer;
use super::object_reader;
use super::object_stream::{ObjectStream, ObjectStreamCache};
use super::sink::{DocumentSink, StreamParser, StreamType, ValueCaptureSink};
use super::xref::{self, CrossReferenceEntry, CrossReferenceTable};
use crate::core::byte_source::ByteSource;
use crate::core::error::{PDFError, PDFResult};
use crate::core::value::{Dictionary, Name, ObjectId, Value};
use std::collections::{HashSet, VecDeque};
use std::rc::Rc;

pub struct Parser {
    document_sink: Box<dyn DocumentSink>,
    content_sink: Option<Box<dyn StreamParser>>,
    opentype_sink: Option<Box<dyn StreamParser>>,
    cmap_sink: Option<Box<dyn StreamParser>>,
    config: ParserConfig,
    lexer: Option<Lexer>,
    xref: CrossReferenceTable,
    trailer: Dictionary,
    root_dictionary_id: ObjectId,
    object_stream_cache: ObjectStreamCache,
    visited: HashSet<ObjectId>,
    queue: VecDeque<(ObjectId, StreamType)>,
    resolving: Vec<ObjectId>,
}

impl Parser {
    pub fn new(document_sink: impl DocumentSink + 'static) -> Self {
        Parser::with_config(document_sink, ParserConfig::default())
    }

    pub fn with_config(document_sink: impl DocumentSink + 'static, config: ParserConfig) -> Self {
        Parser {
            document_sink: Box::new(document_sink),
            content_sink: None,
            opentype_sink: None,
            cmap_sink: None,
            object_stream_cache: ObjectStreamCache::new(config.object_stream_cache_capacity),
            config,
            lexer: None,
            xref: CrossReferenceTable::new(),
            trailer: Dictionary::default(),
            root_dictionary_id: ObjectId::new(0, 0),
            visited: HashSet::new(),
            queue: VecDeque::new(),
            resolving: Vec::new(),
        }
    }

    pub fn set_content_sink(&mut self, sink: impl ContentSink + 'static) {
        self.content_sink = Some(Box::new(sink));
    }

    pub fn set_opentype_sink(&mut self, sink: impl OpenTypeSink + 'static) {
        self.opentype_sink = Some(Box::new(sink));
    }

    pub fn set_cmap_sink(&mut self, sink: impl CmapSink + 'static) {
        self.cmap_sink = Some(Box::new(sink));
    }

    pub fn catalog_id(&self) -> Option<ObjectId> {
        self.trailer.get(&Name::from_str("Root")).and_then(|v| v.as_reference())
    }

    pub fn cross_reference_table(&self) -> &CrossReferenceTable {
        &self.xref
    }

    pub fn trailer(&self) -> &Dictionary {
        &self.trailer
    }

    /// Populates the cross-reference table and trailer. No body events are
    /// emitted; use [`parse`](Parser::parse) or
    /// [`parse_object`](Parser::parse_object) for that.
    pub fn load(&mut self, byte_source: Box<dyn ByteSource>) -> PDFResult<()> {
        let mut lexer = Lexer::new(byte_source);
        let start = xref::locate_startxref(lexer.source())?;
        log::debug!("startxref points to offset {}", start);
        let (table, trailer, root_id) = xref::load_chain(&mut lexer, start, self.config.strict)?;
        log::trace!("cross-reference table has {} entries", table.len());

        if trailer.get(&Name::from_str("Root")).and_then(|v| v.as_reference()).is_none() {
            return Err(PDFError::malformed(start, "trailer is missing a /Root entry"));
        }

        self.xref = table;
        self.trailer = trailer;
        self.root_dictionary_id = root_id;
        self.visited.clear();
        self.queue.clear();
        self.resolving.clear();
        self.lexer = Some(lexer);
        Ok(())
    }

    /// Push traversal: loads, then walks the full reachable object graph in
    /// breadth-first discovery order, starting from a synthetic object
    /// standing in for the trailer itself.
    pub fn parse(&mut self, byte_source: Box<dyn ByteSource>) -> PDFResult<()> {
        self.load(byte_source)?;

        let root_dictionary_id = self.root_dictionary_id;
        self.visited.insert(root_dictionary_id);
        self.emit_trailer_as_object(root_dictionary_id)?;

        for key in ["Root", "Info"] {
            if let Some(id) = self.trailer.get(&Name::from_str(key)).and_then(|v| v.as_reference()) {
                if self.visited.insert(id) {
                    self.queue.push_back((id, StreamType::Default));
                }
            }
        }

        while let Some((id, stream_type)) = self.queue.pop_front() {
            self.step_push(id, stream_type)?;
        }
        Ok(())
    }

    /// Pull traversal: resolves exactly one object's events into `sink`,
    /// without consulting or mutating the push-traversal visited set or
    /// queue. References encountered are surfaced to `sink` via
    /// `object_reference` events for the caller to chase selectively.
    pub fn parse_object(&mut self, id: ObjectId, sink: &mut dyn DocumentSink) -> PDFResult<()> {
        let entry = self.xref.get(id);
        let mut ctx = ResolveCtx {
            lexer: &mut self.lexer,
            content_sink: &mut self.content_sink,
            opentype_sink: &mut self.opentype_sink,
            cmap_sink: &mut self.cmap_sink,
            object_stream_cache: &mut self.object_stream_cache,
            xref: &self.xref,
            resolving: &mut self.resolving,
            config: self.config,
        };
        match entry {
            Some(CrossReferenceEntry::InUse { byte_offset, .. }) => {
                ctx.emit_inuse_object(sink, id, byte_offset as usize, StreamType::Default)?;
                Ok(())
            }
            Some(CrossReferenceEntry::Compressed { container_object_number, index_within_container }) => {
                ctx.emit_compressed_object(sink, id, container_object_number, index_within_container)?;
                Ok(())
            }
            Some(CrossReferenceEntry::Free { .. }) | None => Err(PDFError::unresolved(id)),
        }
    }

    fn step_push(&mut self, id: ObjectId, expected_stream_type: StreamType) -> PDFResult<()> {
        let entry = self.xref.get(id);
        let pending = match entry {
            Some(CrossReferenceEntry::InUse { byte_offset, .. }) => {
                let mut ctx = ResolveCtx {
                    lexer: &mut self.lexer,
                    content_sink: &mut self.content_sink,
                    opentype_sink: &mut self.opentype_sink,
                    cmap_sink: &mut self.cmap_sink,
                    object_stream_cache: &mut self.object_stream_cache,
                    xref: &self.xref,
                    resolving: &mut self.resolving,
                    config: self.config,
                };
                ctx.emit_inuse_object(self.document_sink.as_mut(), id, byte_offset as usize, expected_stream_type)?
            }
            Some(CrossReferenceEntry::Compressed { container_object_number, index_within_container }) => {
                let mut ctx = ResolveCtx {
                    lexer: &mut self.lexer,
                    content_sink: &mut self.content_sink,
                    opentype_sink: &mut self.opentype_sink,
                    cmap_sink: &mut self.cmap_sink,
                    object_stream_cache: &mut self.object_stream_cache,
                    xref: &self.xref,
                    resolving: &mut self.resolving,
                    config: self.config,
                };
                ctx.emit_compressed_object(self.document_sink.as_mut(), id, container_object_number, index_within_container)?
            }
            Some(CrossReferenceEntry::Free { .. }) | None => {
                log::warn!("object {} has no in-use cross-reference entry; skipping", id);
                Vec::new()
            }
        };

        for (ref_id, stream_type) in pending {
            if self.visited.insert(ref_id) {
                self.queue.push_back((ref_id, stream_type));
            }
        }
        Ok(())
    }

    fn emit_trailer_as_object(&mut self, id: ObjectId) -> PDFResult<()> {
        let trailer_value = Value::Dictionary(self.trailer.clone());
        let mut pending = Vec::new();
        {
            let mut traversal = TraversalSink {
                inner: self.document_sink.as_mut(),
                current_key: None,
                current_type: None,
                pending: &mut pending,
            };
            traversal.start_object(id)?;
            emit_value(&mut traversal, &trailer_value)?;
            traversal.end_object()?;
        }
        for (ref_id, stream_type) in pending {
            if self.visited.insert(ref_id) {
                self.queue.push_back((ref_id, stream_type));
            }
        }
        Ok(())
    }
}

/// The disjoint slice of `Parser`'s fields object resolution needs, minus
/// the document sink (which push and pull traversal supply differently).
struct ResolveCtx<'a> {
    lexer: &'a mut Option<Lexer>,
    content_sink: &'a mut Option<Box<dyn StreamParser>>,
    opentype_sink: &'a mut Option<Box<dyn StreamParser>>,
    cmap_sink: &'a mut Option<Box<dyn StreamParser>>,
    object_stream_cache: &'a mut ObjectStreamCache,
    xref: &'a CrossReferenceTable,
    resolving: &'a mut Vec<ObjectId>,
    config: ParserConfig,
}

impl<'a> ResolveCtx<'a> {
    fn lexer_mut(&mut self) -> PDFResult<&mut Lexer> {
        self.lexer.as_mut().ok_or_else(|| PDFError::malformed(0, "parser has not been loaded with a byte source"))
    }

    fn capture(&mut self, id: ObjectId, byte_offset: usize) -> PDFResult<(indirect::CapturedObject, Dictionary)> {
        let lexer = self.lexer_mut()?;
        lexer.seek(byte_offset)?;
        indirect::read_header(lexer, Some(id))?;
        let captured = indirect::capture_value(lexer)?;
        let dict = captured.value.as_dict().cloned().unwrap_or_default();
        Ok((captured, dict))
    }

    fn resolve_value(&mut self, id: ObjectId) -> PDFResult<Value> {
        if self.resolving.contains(&id) {
            return Err(PDFError::malformed(0, format!("cycle detected while resolving {}", id)));
        }
        self.resolving.push(id);
        let result = self.resolve_value_uncached(id);
        self.resolving.pop();
        result
    }

    fn resolve_value_uncached(&mut self, id: ObjectId) -> PDFResult<Value> {
        match self.xref.get(id) {
            Some(CrossReferenceEntry::InUse { byte_offset, .. }) => {
                let (captured, _dict) = self.capture(id, byte_offset as usize)?;
                Ok(captured.value)
            }
            Some(CrossReferenceEntry::Compressed { container_object_number, index_within_container }) => {
                self.resolve_compressed_value(container_object_number, index_within_container, id)
            }
            _ => Err(PDFError::unresolved(id)),
        }
    }

    fn resolve_compressed_value(&mut self, container_object_number: u32, index_within_container: u32, expected_id: ObjectId) -> PDFResult<Value> {
        let stream = self.load_object_stream(container_object_number)?;
        let (source, object_number) = stream.object_source(index_within_container as usize)?;
        if object_number != expected_id.number {
            return Err(PDFError::InconsistentObject { id: expected_id, expected: expected_id.number, found: object_number });
        }
        let mut lexer = Lexer::new(Box::new(source));
        let mut capture = ValueCaptureSink::new();
        object_reader::read_value(&mut lexer, &mut capture)?;
        capture.into_value().ok_or_else(|| PDFError::malformed(0, "object-stream entry produced no value"))
    }

    fn resolve_length(&mut self, dict: &Dictionary) -> PDFResult<usize> {
        match dict.get(&Name::from_str("Length")) {
            Some(Value::Number(n)) => n.as_usize().ok_or_else(|| PDFError::malformed(0, "/Length is negative")),
            Some(Value::Reference(id)) => {
                let id = *id;
                let resolved = self.resolve_value(id)?;
                resolved
                    .as_number()
                    .and_then(|n| n.as_usize())
                    .ok_or_else(|| PDFError::malformed(0, "/Length did not resolve to a non-negative integer"))
            }
            _ => Err(PDFError::malformed(0, "stream has no /Length")),
        }
    }

    fn load_object_stream(&mut self, container_object_number: u32) -> PDFResult<Rc<ObjectStream>> {
        if let Some(cached) = self.object_stream_cache.get(container_object_number) {
            return Ok(cached);
        }
        let container_id = ObjectId::new(container_object_number, 0);
        let byte_offset = match self.xref.get(container_id) {
            Some(CrossReferenceEntry::InUse { byte_offset, .. }) => byte_offset as usize,
            _ => return Err(PDFError::unresolved(container_id)),
        };

        let (captured, dict) = self.capture(container_id, byte_offset)?;
        if !captured.has_stream {
            return Err(PDFError::malformed(byte_offset, "object-stream container has no stream body"));
        }
        let length = self.resolve_length(&dict)?;

        let raw = {
            let lexer = self.lexer_mut()?;
            let mut discard = DiscardSink;
            indirect::emit_and_read_stream(lexer, &mut discard, &captured, Some(length))?
                .ok_or_else(|| PDFError::malformed(byte_offset, "object-stream container produced no data"))?
        };
        let decoded = filter::decode_stream_body(&raw, &dict)?;

        let n = dict
            .get(&Name::from_str("N"))
            .and_then(|v| v.as_number())
            .and_then(|v| v.as_usize())
            .ok_or_else(|| PDFError::malformed(byte_offset, "object stream missing /N"))?;
        let first = dict
            .get(&Name::from_str("First"))
            .and_then(|v| v.as_number())
            .and_then(|v| v.as_usize())
            .ok_or_else(|| PDFError::malformed(byte_offset, "object stream missing /First"))?;

        let stream = Rc::new(ObjectStream::parse(decoded, n, first)?);
        log::trace!("decoded object stream {} ({} entries)", container_object_number, stream.object_count());
        self.object_stream_cache.put(container_object_number, Rc::clone(&stream));
        Ok(stream)
    }

    /// Seeks to `byte_offset`, parses the indirect object header and
    /// value, emits its events to `sink`, and — if it carries a stream —
    /// decodes and dispatches the stream body. Returns references
    /// discovered while emitting, tagged with their inferred stream type.
    fn emit_inuse_object(
        &mut self,
        sink: &mut dyn DocumentSink,
        id: ObjectId,
        byte_offset: usize,
        expected_stream_type: StreamType,
    ) -> PDFResult<Vec<(ObjectId, StreamType)>> {
        let (captured, dict) = self.capture(id, byte_offset)?;
        let length = if captured.has_stream { Some(self.resolve_length(&dict)?) } else { None };

        let mut pending = Vec::new();
        let raw = {
            let lexer = self.lexer_mut()?;
            let mut traversal = TraversalSink {
                inner: sink,
                current_key: None,
                current_type: None,
                pending: &mut pending,
            };
            traversal.start_object(id)?;
            indirect::emit_and_read_stream(lexer, &mut traversal, &captured, length)?
        };

        // The stream, if any, is the object's final nested construct: it must
        // be emitted before `end_object` so it brackets inside the object
        // rather than arriving as a detached sibling after it closes.
        if let Some(raw) = raw {
            let stream_type = if is_object_stream_dict(&dict) { StreamType::ObjectStream } else { expected_stream_type };
            self.decode_and_dispatch(sink, &raw, &dict, stream_type)?;
        }
        sink.end_object()?;
        Ok(pending)
    }

    /// Object-stream entries have no `obj`/`endobj` wrapper and never carry
    /// their own stream; just parse the one value at the computed offset.
    fn emit_compressed_object(
        &mut self,
        sink: &mut dyn DocumentSink,
        id: ObjectId,
        container_object_number: u32,
        index_within_container: u32,
    ) -> PDFResult<Vec<(ObjectId, StreamType)>> {
        let stream = self.load_object_stream(container_object_number)?;
        let (source, object_number) = stream.object_source(index_within_container as usize)?;
        if object_number != id.number {
            return Err(PDFError::InconsistentObject { id, expected: id.number, found: object_number });
        }
        let mut lexer = Lexer::new(Box::new(source));
        let mut pending = Vec::new();
        {
            let mut traversal = TraversalSink {
                inner: sink,
                current_key: None,
                current_type: None,
                pending: &mut pending,
            };
            traversal.start_object(id)?;
            object_reader::read_value(&mut lexer, &mut traversal)?;
            traversal.end_object()?;
        }
        Ok(pending)
    }

    fn decode_and_dispatch(&mut self, sink: &mut dyn DocumentSink, raw: &[u8], dict: &Dictionary, stream_type: StreamType) -> PDFResult<()> {
        let decoded = filter::decode_stream_body(raw, dict)?;
        let sub_parser: Option<&mut dyn StreamParser> = match stream_type {
            StreamType::Content => self.content_sink.as_deref_mut(),
            StreamType::FontTrueType | StreamType::FontOpenTypeCff | StreamType::FontCff => self.opentype_sink.as_deref_mut(),
            StreamType::Cmap => self.cmap_sink.as_deref_mut(),
            _ => None,
        };
        sink.start_stream()?;
        let mut dispatcher = filter::Dispatcher::new(sub_parser)
            .with_carry_over_cap(self.config.carry_over_cap)
            .with_carry_over_initial(self.config.carry_over_initial);
        dispatcher.feed(sink, &decoded)?;
        dispatcher.close(sink)?;
        Ok(())
    }
}

fn is_object_stream_dict(dict: &Dictionary) -> bool {
    dict.get(&Name::from_str("Type")).and_then(|v| v.as_name()).map(|n| n.as_bytes() == b"ObjStm").unwrap_or(false)
}

/// Infers a reference's stream type from the dictionary key it was found
/// under and the enclosing dictionary's last-seen `/Type`.
fn infer_stream_type(current_key: Option<&Name>, current_type: Option<&Name>) -> StreamType {
    let key = match current_key {
        Some(k) => k,
        None => return StreamType::Default,
    };
    match key.as_bytes() {
        b"Contents" => {
            let is_page_or_xobject = current_type.map(|t| t.as_bytes() == b"Page" || t.as_bytes() == b"XObject").unwrap_or(false);
            if is_page_or_xobject {
                StreamType::Content
            } else {
                StreamType::Default
            }
        }
        b"ToUnicode" => StreamType::Cmap,
        b"Metadata" => StreamType::Metadata,
        b"FontFile" => StreamType::FontType1,
        b"FontFile2" => StreamType::FontTrueType,
        b"FontFile3" => StreamType::FontCff,
        _ => StreamType::Default,
    }
}

/// Forwards every event to `inner` while tracking `current_key`/
/// `current_type` for [`infer_stream_type`] and collecting discovered
/// references. Scoped to a single object: a fresh instance is built for
/// every `emit_*` call, so context never leaks between objects.
struct TraversalSink<'a> {
    inner: &'a mut dyn DocumentSink,
    current_key: Option<Name>,
    current_type: Option<Name>,
    pending: &'a mut Vec<(ObjectId, StreamType)>,
}

impl<'a> DocumentSink for TraversalSink<'a> {
    fn start_object(&mut self, id: ObjectId) -> PDFResult<()> {
        self.inner.start_object(id)
    }
    fn end_object(&mut self) -> PDFResult<()> {
        self.inner.end_object()
    }
    fn start_dictionary(&mut self) -> PDFResult<()> {
        self.inner.start_dictionary()
    }
    fn key(&mut self, name: &Name) -> PDFResult<()> {
        self.current_key = Some(name.clone());
        self.inner.key(name)
    }
    fn end_dictionary(&mut self) -> PDFResult<()> {
        self.inner.end_dictionary()
    }
    fn start_array(&mut self) -> PDFResult<()> {
        self.inner.start_array()
    }
    fn end_array(&mut self) -> PDFResult<()> {
        self.inner.end_array()
    }
    fn boolean_value(&mut self, value: bool) -> PDFResult<()> {
        self.inner.boolean_value(value)
    }
    fn number_value(&mut self, value: crate::core::value::Number) -> PDFResult<()> {
        self.inner.number_value(value)
    }
    fn string_value(&mut self, bytes: &[u8]) -> PDFResult<()> {
        self.inner.string_value(bytes)
    }
    fn name_value(&mut self, name: &Name) -> PDFResult<()> {
        if self.current_key.as_ref().map(|k| k.as_bytes() == b"Type").unwrap_or(false) {
            self.current_type = Some(name.clone());
        }
        self.inner.name_value(name)
    }
    fn null_value(&mut self) -> PDFResult<()> {
        self.inner.null_value()
    }
    fn object_reference(&mut self, id: ObjectId) -> PDFResult<()> {
        let stream_type = infer_stream_type(self.current_key.as_ref(), self.current_type.as_ref());
        self.pending.push((id, stream_type));
        self.inner.object_reference(id)
    }
    fn start_stream(&mut self) -> PDFResult<()> {
        self.inner.start_stream()
    }
    fn stream_content(&mut self, bytes: &[u8]) -> PDFResult<()> {
        self.inner.stream_content(bytes)
    }
    fn end_stream(&mut self) -> PDFResult<()> {
        self.inner.end_stream()
    }
}

/// Replays a previously-captured [`Value`] tree as sink events; used only
/// to re-emit the trailer dictionary as a synthetic object, since it was
/// captured once by the xref engine and never has its own byte range to
/// re-parse through the Lexer.
fn emit_value(sink: &mut dyn DocumentSink, value: &Value) -> PDFResult<()> {
    match value {
        Value::Null => sink.null_value(),
        Value::Boolean(b) => sink.boolean_value(*b),
        Value::Number(n) => sink.number_value(*n),
        Value::String(s) => sink.string_value(s),
        Value::Name(n) => sink.name_value(n),
        Value::Reference(id) => sink.object_reference(*id),
        Value::Array(items) => {
            sink.start_array()?;
            for item in items {
                emit_value(sink, item)?;
            }
            sink.end_array()
        }
        Value::Dictionary(dict) => {
            sink.start_dictionary()?;
            for (key, val) in dict {
                sink.key(key)?;
                emit_value(sink, val)?;
            }
            sink.end_dictionary()
        }
    }
}

struct DiscardSink;
impl DocumentSink for DiscardSink {}
