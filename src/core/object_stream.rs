//! `ObjectStream`: a decoded `/Type /ObjStm` body plus its index table, and
//! `ObjectStreamCache`, the bounded LRU cache of them the
//! [`Parser`](super::parser::Parser) resolves `Compressed` xref entries
//! through.
//!
//! The cache keys on container object number (generation is always 0 for
//! object streams) and stores `Rc<ObjectStream>` so concurrently-live
//! borrows from different compressed entries in the same container share
//! one decoded buffer, mirroring the `LruCache<u32, Rc<_>, FxHasher>`
//! pattern the corpus's xref table uses for parsed objects.

use super::lexer::Lexer;
use super::mem_source::MemSource;
use crate::core::error::{PDFError, PDFResult};
use crate::core::value::Number;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::rc::Rc;
use std::sync::Arc;

/// A decoded object-stream body: `first` is the byte offset (within
/// `bytes`) where the first contained object's data begins, and the i-th
/// object starts at `first + relative_offsets[i]` and runs until the next
/// object's start (or the end of the buffer for the last one).
pub struct ObjectStream {
    bytes: Arc<Vec<u8>>,
    first: usize,
    object_numbers: Vec<u32>,
    relative_offsets: Vec<usize>,
}

impl ObjectStream {
    /// Parses the `N` `(object_number, relative_offset)` pairs out of the
    /// index region (`decoded[0..first]`, conceptually) and retains the
    /// decoded body for later slicing.
    pub fn parse(decoded: Vec<u8>, n: usize, first: usize) -> PDFResult<Self> {
        let bytes = Arc::new(decoded);
        let mut lexer = Lexer::new(Box::new(MemSource::from_arc(Arc::clone(&bytes), 0, bytes.len())));
        let mut object_numbers = Vec::with_capacity(n);
        let mut relative_offsets = Vec::with_capacity(n);
        for _ in 0..n {
            let num = expect_uint(&mut lexer)?;
            let off = expect_uint(&mut lexer)?;
            object_numbers.push(num as u32);
            relative_offsets.push(off as usize);
        }
        for &off in &relative_offsets {
            if first.checked_add(off).map_or(true, |abs| abs > bytes.len()) {
                return Err(PDFError::malformed(first + off, "object-stream index entry exceeds decoded stream length"));
            }
        }
        Ok(ObjectStream { bytes, first, object_numbers, relative_offsets })
    }

    /// A read-only `MemSource` over the `index`-th contained object's raw
    /// bytes, plus the object number the index table recorded for it (the
    /// caller cross-checks this against the xref entry it was resolving).
    pub fn object_source(&self, index: usize) -> PDFResult<(MemSource, u32)> {
        let start = self
            .first
            .checked_add(*self.relative_offsets.get(index).ok_or_else(|| PDFError::malformed(0, "object-stream index out of range"))?)
            .ok_or_else(|| PDFError::malformed(0, "object-stream offset overflow"))?;
        let end = if index + 1 < self.relative_offsets.len() {
            self.first + self.relative_offsets[index + 1]
        } else {
            self.bytes.len()
        };
        if end < start || end > self.bytes.len() {
            return Err(PDFError::malformed(start, "object-stream entry bounds invalid"));
        }
        let source = MemSource::from_arc(Arc::clone(&self.bytes), start, end - start);
        Ok((source, self.object_numbers[index]))
    }

    pub fn object_count(&self) -> usize {
        self.object_numbers.len()
    }
}

fn expect_uint(lexer: &mut Lexer) -> PDFResult<i64> {
    use super::lexer::Token;
    match lexer.next_token()? {
        Token::Number(Number::Int(n)) if n >= 0 => Ok(n),
        other => Err(PDFError::malformed(lexer.position(), format!("expected a non-negative integer in object-stream index, found {:?}", other))),
    }
}

/// Bounded cache of decoded object streams, keyed by container object
/// number.
pub struct ObjectStreamCache {
    entries: LruCache<u32, Rc<ObjectStream>, std::hash::BuildHasherDefault<rustc_hash::FxHasher>>,
}

impl ObjectStreamCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap();
        ObjectStreamCache {
            entries: LruCache::with_hasher(capacity, std::hash::BuildHasherDefault::default()),
        }
    }

    pub fn get(&mut self, container_object_number: u32) -> Option<Rc<ObjectStream>> {
        self.entries.get(&container_object_number).cloned()
    }

    pub fn put(&mut self, container_object_number: u32, stream: Rc<ObjectStream>) {
        if let Some((evicted, _)) = self.entries.push(container_object_number, stream) {
            if evicted != container_object_number {
                log::debug!("object stream cache evicted container {}", evicted);
            }
        }
    }
}
