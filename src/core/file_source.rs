//! File-backed [`ByteSource`] with a fixed-size read window.
//!
//! Unlike the teacher's `FileChunkedStream`/`ChunkManager` pair, there is no
//! progressive network loading to account for here: the file is a local,
//! fully-available random-access source, so a single refillable window is
//! enough. The window is refilled whenever the cursor leaves it; callers
//! doing mostly-sequential scans (the common case for PDF syntax) pay one
//! refill per 8 KiB.

use super::byte_source::{ByteSource, EOF};
use crate::core::error::{PDFError, PDFResult};
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

pub const WINDOW_SIZE: usize = 8 * 1024;

pub struct FileSource {
    file: File,
    length: usize,
    window: Vec<u8>,
    /// Absolute offset of `window[0]`.
    window_start: usize,
    /// Absolute cursor position.
    pos: usize,
}

impl FileSource {
    pub fn open<P: AsRef<Path>>(path: P) -> PDFResult<Self> {
        let mut file = File::open(path)?;
        let length = file.seek(SeekFrom::End(0))? as usize;
        file.seek(SeekFrom::Start(0))?;
        let mut source = FileSource {
            file,
            length,
            window: Vec::new(),
            window_start: 0,
            pos: 0,
        };
        source.fill_window(0)?;
        Ok(source)
    }

    fn window_end(&self) -> usize {
        self.window_start + self.window.len()
    }

    fn fill_window(&mut self, at: usize) -> PDFResult<()> {
        if at >= self.length {
            self.window_start = at;
            self.window.clear();
            return Ok(());
        }
        self.file.seek(SeekFrom::Start(at as u64))?;
        let want = WINDOW_SIZE.min(self.length - at);
        let mut buf = vec![0u8; want];
        self.file.read_exact(&mut buf)?;
        self.window = buf;
        self.window_start = at;
        Ok(())
    }

    fn byte_at(&mut self, at: usize) -> PDFResult<i32> {
        if at >= self.length {
            return Ok(EOF);
        }
        if at < self.window_start || at >= self.window_end() {
            self.fill_window(at)?;
        }
        Ok(self.window[at - self.window_start] as i32)
    }
}

impl ByteSource for FileSource {
    fn len(&self) -> usize {
        self.length
    }

    fn position(&self) -> usize {
        self.pos
    }

    fn seek(&mut self, offset: usize) -> PDFResult<()> {
        self.pos = offset;
        Ok(())
    }

    fn read_byte(&mut self) -> PDFResult<i32> {
        let byte = self.byte_at(self.pos)?;
        if byte != EOF {
            self.pos += 1;
        }
        Ok(byte)
    }

    fn peek_at(&mut self, delta: usize) -> PDFResult<i32> {
        self.byte_at(self.pos + delta)
    }

    fn read_exact(&mut self, n: usize) -> PDFResult<Vec<u8>> {
        if self.pos + n > self.length {
            return Err(PDFError::truncated(self.pos));
        }
        let mut out = Vec::with_capacity(n);
        for i in 0..n {
            out.push(self.byte_at(self.pos + i)? as u8);
        }
        self.pos += n;
        Ok(out)
    }

    fn byte_range(&mut self, start: usize, len: usize) -> PDFResult<Vec<u8>> {
        if start + len > self.length {
            return Err(PDFError::truncated(start + len));
        }
        let mut out = Vec::with_capacity(len);
        for i in 0..len {
            out.push(self.byte_at(start + i)? as u8);
        }
        Ok(out)
    }
}
