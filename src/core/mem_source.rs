//! In-memory [`ByteSource`]. Backs application-supplied in-memory
//! documents as well as the decoded bodies of object streams and xref
//! streams, which the Lexer re-enters with a fresh `MemSource` rather than
//! a sub-range view of the file.

use super::byte_source::{ByteSource, EOF};
use crate::core::error::PDFResult;
use std::sync::Arc;

/// A lightweight in-memory reader backed by `Arc<Vec<u8>>`, so cheap
/// sub-sources can share the parent buffer instead of copying it.
pub struct MemSource {
    bytes: Arc<Vec<u8>>,
    start: usize,
    len: usize,
    pos: usize,
}

impl MemSource {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        let len = bytes.len();
        MemSource {
            bytes: Arc::new(bytes),
            start: 0,
            len,
            pos: 0,
        }
    }

    pub fn from_arc(bytes: Arc<Vec<u8>>, start: usize, len: usize) -> Self {
        MemSource { bytes, start, len, pos: start }
    }

    /// A sub-source sharing the same backing buffer, starting at `start`
    /// (absolute offset into this source's own address space) for `len`
    /// bytes.
    pub fn sub_source(&self, start: usize, len: usize) -> Self {
        MemSource::from_arc(Arc::clone(&self.bytes), self.start + start, len)
    }

    fn end(&self) -> usize {
        self.start + self.len
    }
}

impl ByteSource for MemSource {
    fn len(&self) -> usize {
        self.len
    }

    fn position(&self) -> usize {
        self.pos - self.start
    }

    fn seek(&mut self, offset: usize) -> PDFResult<()> {
        self.pos = self.start + offset;
        Ok(())
    }

    fn read_byte(&mut self) -> PDFResult<i32> {
        if self.pos >= self.end() {
            return Ok(EOF);
        }
        let byte = self.bytes[self.pos];
        self.pos += 1;
        Ok(byte as i32)
    }

    fn peek_at(&mut self, delta: usize) -> PDFResult<i32> {
        let at = self.pos + delta;
        if at >= self.end() {
            return Ok(EOF);
        }
        Ok(self.bytes[at] as i32)
    }

    fn read_exact(&mut self, n: usize) -> PDFResult<Vec<u8>> {
        let end = self.pos + n;
        if end > self.end() {
            return Err(crate::core::error::PDFError::truncated(self.position()));
        }
        let out = self.bytes[self.pos..end].to_vec();
        self.pos = end;
        Ok(out)
    }

    fn byte_range(&mut self, start: usize, len: usize) -> PDFResult<Vec<u8>> {
        let abs_start = self.start + start;
        let abs_end = abs_start + len;
        if abs_end > self.end() {
            return Err(crate::core::error::PDFError::truncated(start + len));
        }
        Ok(self.bytes[abs_start..abs_end].to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_and_seek() {
        let mut src = MemSource::from_bytes(vec![10, 20, 30, 40]);
        assert_eq!(src.read_byte().unwrap(), 10);
        src.seek(3).unwrap();
        assert_eq!(src.read_byte().unwrap(), 40);
        assert_eq!(src.read_byte().unwrap(), EOF);
    }

    #[test]
    fn test_sub_source_shares_buffer() {
        let src = MemSource::from_bytes(vec![1, 2, 3, 4, 5, 6]);
        let mut sub = src.sub_source(2, 3);
        assert_eq!(sub.len(), 3);
        assert_eq!(sub.read_byte().unwrap(), 3);
        assert_eq!(sub.read_byte().unwrap(), 4);
        assert_eq!(sub.read_byte().unwrap(), 5);
        assert_eq!(sub.read_byte().unwrap(), EOF);
        assert_eq!(Arc::strong_count(&src.bytes), 2);
    }

    #[test]
    fn test_read_exact_truncated() {
        let mut src = MemSource::from_bytes(vec![1, 2]);
        assert!(src.read_exact(5).is_err());
    }

    #[test]
    fn test_byte_range_independent_of_cursor() {
        let mut src = MemSource::from_bytes(vec![1, 2, 3, 4, 5]);
        src.seek(4).unwrap();
        let range = src.byte_range(0, 2).unwrap();
        assert_eq!(range, vec![1, 2]);
        assert_eq!(src.position(), 4);
    }
}
