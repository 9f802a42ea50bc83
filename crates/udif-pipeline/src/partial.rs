//! Partial pipeline - provides a window into a subset of a stream

use std::io::{self, Read, Seek, SeekFrom};

/// A pipeline that exposes only a portion of an underlying stream.
///
/// Block-table runs address their payload as `(offset, length)` pairs inside the
/// container; wrapping the container in a `PartialPipeline` lets a decoder consume
/// exactly one run without being able to read past it.
///
/// # Example
///
/// ```rust,no_run
/// use udif_pipeline::PartialPipeline;
/// use std::io::{Cursor, Read};
///
/// let cursor = Cursor::new(vec![0u8; 4096]);
///
/// // A raw run stored at bytes 1024..1536 of the container
/// let mut run = PartialPipeline::new(cursor, 1024, 512);
/// let mut sector = Vec::new();
/// run.read_to_end(&mut sector).unwrap();
/// assert_eq!(sector.len(), 512);
/// ```
pub struct PartialPipeline<R: Read + Seek> {
    inner: R,
    start: u64,
    length: u64,
    position: u64,
}

impl<R: Read + Seek> PartialPipeline<R> {
    /// Create a new partial pipeline over `length` bytes starting at `start`
    ///
    /// The inner stream is repositioned on every read, so it may be shared with
    /// other users between calls.
    pub fn new(inner: R, start: u64, length: u64) -> Self {
        Self {
            inner,
            start,
            length,
            position: 0,
        }
    }

    /// Get the start offset of this window in the inner stream
    pub fn start(&self) -> u64 {
        self.start
    }

    /// Get the length of this window
    pub fn length(&self) -> u64 {
        self.length
    }

    /// Get the current position within this window
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Get the remaining bytes from current position to end
    pub fn remaining(&self) -> u64 {
        self.length.saturating_sub(self.position)
    }

    /// Release the inner stream
    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read + Seek> Read for PartialPipeline<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let remaining = self.remaining();
        if remaining == 0 || buf.is_empty() {
            return Ok(0);
        }

        let to_read = (buf.len() as u64).min(remaining) as usize;

        let absolute_pos = self
            .start
            .checked_add(self.position)
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "Window offset overflow"))?;
        self.inner.seek(SeekFrom::Start(absolute_pos))?;

        let bytes_read = self.inner.read(&mut buf[..to_read])?;
        self.position += bytes_read as u64;

        Ok(bytes_read)
    }
}

impl<R: Read + Seek> Seek for PartialPipeline<R> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let new_pos = match pos {
            SeekFrom::Start(offset) => offset as i128,
            SeekFrom::End(offset) => self.length as i128 + offset as i128,
            SeekFrom::Current(offset) => self.position as i128 + offset as i128,
        };

        if new_pos < 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "Seek before beginning of partial pipeline",
            ));
        }

        if new_pos > self.length as i128 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "Seek beyond end of partial pipeline",
            ));
        }

        self.position = new_pos as u64;
        Ok(self.position)
    }
}
