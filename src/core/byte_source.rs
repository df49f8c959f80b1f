//! A seekable, chunk-buffered byte reader over a random-access source.
//!
//! `ByteSource` is the single abstraction the Lexer reads through. Two
//! implementations ship: [`FileSource`](super::file_source::FileSource) for
//! disk-backed documents and [`MemSource`](super::mem_source::MemSource) for
//! in-memory buffers (used directly by callers and internally to back
//! object-stream and xref-stream decoded bodies).

use crate::core::error::PDFResult;

/// Sentinel returned by [`ByteSource::read_byte`] and [`ByteSource::peek`]
/// at end of source. No valid PDF byte value can be negative, so `i32` is
/// wide enough to carry both a byte (0..=255) and this sentinel.
pub const EOF: i32 = -1;

pub trait ByteSource {
    /// Total number of bytes in the source.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current absolute read position.
    fn position(&self) -> usize;

    /// Move the read position to an absolute offset. Seeking past the end
    /// of the source is allowed; subsequent reads report EOF.
    fn seek(&mut self, offset: usize) -> PDFResult<()>;

    /// Read one byte and advance, or [`EOF`] at end of source.
    fn read_byte(&mut self) -> PDFResult<i32>;

    /// Inspect the next byte without advancing, or [`EOF`].
    fn peek(&mut self) -> PDFResult<i32> {
        self.peek_at(0)
    }

    /// Inspect the byte `delta` positions ahead of the cursor without
    /// advancing, or [`EOF`] if that position is at or past the end.
    fn peek_at(&mut self, delta: usize) -> PDFResult<i32>;

    /// Read exactly `n` bytes, advancing the cursor. Fails with
    /// `Truncated` if fewer than `n` bytes remain.
    fn read_exact(&mut self, n: usize) -> PDFResult<Vec<u8>>;

    /// Advance the cursor by `n` bytes without materializing them.
    fn skip(&mut self, n: usize) -> PDFResult<()> {
        let start = self.position();
        self.seek(start + n)
    }

    /// A read-only view of `len` bytes starting at `start`, independent of
    /// the current cursor. Used to build sub-sources over object-stream and
    /// xref-stream payloads without copying the parent buffer where
    /// possible.
    fn byte_range(&mut self, start: usize, len: usize) -> PDFResult<Vec<u8>>;
}
