//! Shared pipeline - many independent cursors over one byte source

use std::io::{self, Read, Seek, SeekFrom};
use std::sync::{Arc, Mutex};
use udif_core::ReadSeek;

/// A clonable handle onto a single underlying stream.
///
/// Every clone keeps its own position; the inner stream is locked for the
/// duration of each seek+read pair, so readers drawn from the same container
/// can be used from different threads.
#[derive(Clone)]
pub struct SharedPipeline {
    inner: Arc<Mutex<Box<dyn ReadSeek>>>,
    length: u64,
    position: u64,
}

impl SharedPipeline {
    /// Wrap a stream of known length
    pub fn new(inner: Box<dyn ReadSeek>, length: u64) -> Self {
        Self {
            inner: Arc::new(Mutex::new(inner)),
            length,
            position: 0,
        }
    }

    /// Total length of the underlying stream
    pub fn length(&self) -> u64 {
        self.length
    }

    /// Current position of this handle
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Positional read that does not touch this handle's cursor
    ///
    /// Returns the number of bytes read, which is short only at end of stream.
    pub fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        if offset >= self.length {
            return Ok(0);
        }

        let to_read = (buf.len() as u64).min(self.length - offset) as usize;

        let mut inner = self
            .inner
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "Shared pipeline lock poisoned"))?;
        inner.seek(SeekFrom::Start(offset))?;

        let mut total = 0;
        while total < to_read {
            match inner.read(&mut buf[total..to_read]) {
                Ok(0) => break,
                Ok(n) => total += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }

        Ok(total)
    }
}

impl Read for SharedPipeline {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.read_at(buf, self.position)?;
        self.position += n as u64;
        Ok(n)
    }
}

impl Seek for SharedPipeline {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let new_pos = match pos {
            SeekFrom::Start(offset) => offset as i128,
            SeekFrom::End(offset) => self.length as i128 + offset as i128,
            SeekFrom::Current(offset) => self.position as i128 + offset as i128,
        };

        if new_pos < 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "Seek before beginning of shared pipeline",
            ));
        }

        self.position = new_pos as u64;
        Ok(self.position)
    }
}
