//! Event sinks: the document-sink contract the application implements, the
//! internal value-capture sink the Lexer uses to peek at dictionaries
//! before re-emitting them, and the `StreamParser` contract specialized
//! sub-parsers implement.

use crate::core::error::PDFResult;
use crate::core::value::{Dictionary, Name, Number, ObjectId, Value};

/// The full event alphabet a document sink may receive. Every method
/// defaults to a no-op so an application only overrides what it cares
/// about. A sink returning `Err` aborts the current `parse`/`parse_object`
/// call; the parser does not attempt to recover partial state.
pub trait DocumentSink {
    fn start_object(&mut self, _id: ObjectId) -> PDFResult<()> {
        Ok(())
    }
    fn end_object(&mut self) -> PDFResult<()> {
        Ok(())
    }
    fn start_dictionary(&mut self) -> PDFResult<()> {
        Ok(())
    }
    fn key(&mut self, _name: &Name) -> PDFResult<()> {
        Ok(())
    }
    fn end_dictionary(&mut self) -> PDFResult<()> {
        Ok(())
    }
    fn start_array(&mut self) -> PDFResult<()> {
        Ok(())
    }
    fn end_array(&mut self) -> PDFResult<()> {
        Ok(())
    }
    fn boolean_value(&mut self, _value: bool) -> PDFResult<()> {
        Ok(())
    }
    fn number_value(&mut self, _value: Number) -> PDFResult<()> {
        Ok(())
    }
    fn string_value(&mut self, _bytes: &[u8]) -> PDFResult<()> {
        Ok(())
    }
    fn name_value(&mut self, _name: &Name) -> PDFResult<()> {
        Ok(())
    }
    fn null_value(&mut self) -> PDFResult<()> {
        Ok(())
    }
    fn object_reference(&mut self, _id: ObjectId) -> PDFResult<()> {
        Ok(())
    }
    fn start_stream(&mut self) -> PDFResult<()> {
        Ok(())
    }
    /// `bytes` is a transient decoded chunk; implementations must copy if
    /// they need to retain it past this call.
    fn stream_content(&mut self, _bytes: &[u8]) -> PDFResult<()> {
        Ok(())
    }
    fn end_stream(&mut self) -> PDFResult<()> {
        Ok(())
    }
}

/// A stream-type tag inferred by the traversal controller from context
/// (current dictionary key, enclosing `/Type`), used to pick which
/// specialized sub-parser (if any) is attached to a stream's decoded
/// bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamType {
    Default,
    Content,
    Cmap,
    Metadata,
    FontType1,
    FontTrueType,
    FontOpenTypeCff,
    FontCff,
    IccProfile,
    ObjectStream,
    XrefStream,
}

/// Contract for a specialized sub-parser fed decoded stream bytes by the
/// filter pipeline's terminal dispatcher.
///
/// `feed` may consume only a prefix of `chunk`; the unconsumed suffix
/// length it returns is retained by the dispatcher and re-presented,
/// prefixed to the next chunk, on the following call (carry-over
/// buffering). `close` offers any remaining bytes one last time before the
/// sub-parser is dropped.
pub trait StreamParser {
    /// Returns the number of trailing bytes of `chunk` that were not
    /// consumed and should be carried over to the next call.
    fn feed(&mut self, chunk: &[u8]) -> PDFResult<usize>;

    fn close(&mut self, remainder: &[u8]) -> PDFResult<()> {
        let _ = remainder;
        Ok(())
    }
}

/// Internal sink used by the Lexer to materialize a value (typically a
/// stream dictionary, an xref-stream dictionary, or an object-stream
/// entry) without delivering it to the application sink. Implemented as an
/// explicit stack machine: `start_array`/`start_dictionary` push a new
/// container, scalars/composites attach to the top container, `key` sets
/// the pending key, `end_*` pops and attaches to the parent (or becomes
/// the final result at depth zero).
#[derive(Default)]
pub struct ValueCaptureSink {
    stack: Vec<Container>,
    pending_key: Option<Name>,
    result: Option<Value>,
}

enum Container {
    Array(Vec<Value>),
    Dictionary(Dictionary),
}

impl ValueCaptureSink {
    pub fn new() -> Self {
        ValueCaptureSink::default()
    }

    /// The completed top-level value, if a full scalar or composite has
    /// been captured.
    pub fn into_value(self) -> Option<Value> {
        self.result
    }

    pub fn value(&self) -> Option<&Value> {
        self.result.as_ref()
    }

    fn attach(&mut self, value: Value) -> PDFResult<()> {
        match self.stack.last_mut() {
            Some(Container::Array(arr)) => arr.push(value),
            Some(Container::Dictionary(dict)) => {
                let key = self.pending_key.take().ok_or_else(|| {
                    crate::core::error::PDFError::malformed(0, "value without a preceding key")
                })?;
                dict.insert(key, value);
            }
            None => self.result = Some(value),
        }
        Ok(())
    }
}

impl DocumentSink for ValueCaptureSink {
    fn start_dictionary(&mut self) -> PDFResult<()> {
        self.stack.push(Container::Dictionary(Dictionary::default()));
        Ok(())
    }

    fn key(&mut self, name: &Name) -> PDFResult<()> {
        self.pending_key = Some(name.clone());
        Ok(())
    }

    fn end_dictionary(&mut self) -> PDFResult<()> {
        match self.stack.pop() {
            Some(Container::Dictionary(dict)) => self.attach(Value::Dictionary(dict)),
            _ => Err(crate::core::error::PDFError::malformed(0, "unbalanced end_dictionary")),
        }
    }

    fn start_array(&mut self) -> PDFResult<()> {
        self.stack.push(Container::Array(Vec::new()));
        Ok(())
    }

    fn end_array(&mut self) -> PDFResult<()> {
        match self.stack.pop() {
            Some(Container::Array(arr)) => self.attach(Value::Array(arr)),
            _ => Err(crate::core::error::PDFError::malformed(0, "unbalanced end_array")),
        }
    }

    fn boolean_value(&mut self, value: bool) -> PDFResult<()> {
        self.attach(Value::Boolean(value))
    }

    fn number_value(&mut self, value: Number) -> PDFResult<()> {
        self.attach(Value::Number(value))
    }

    fn string_value(&mut self, bytes: &[u8]) -> PDFResult<()> {
        self.attach(Value::String(bytes.to_vec()))
    }

    fn name_value(&mut self, name: &Name) -> PDFResult<()> {
        self.attach(Value::Name(name.clone()))
    }

    fn null_value(&mut self) -> PDFResult<()> {
        self.attach(Value::Null)
    }

    fn object_reference(&mut self, id: ObjectId) -> PDFResult<()> {
        self.attach(Value::Reference(id))
    }
}
