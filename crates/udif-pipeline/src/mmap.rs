//! Memory-mapped pipeline for container files

use memmap2::Mmap;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;
use udif_core::MAX_MMAP_SIZE;

/// A pipeline backed by a memory-mapped file.
///
/// DMG discovery reads the trailer at the end of the file, then the XML metadata,
/// then scattered compressed runs; a mapping turns each of those into a memcpy.
///
/// # Example
///
/// ```rust,no_run
/// use udif_pipeline::MmapPipeline;
/// use std::path::Path;
///
/// let pipeline = MmapPipeline::open(Path::new("image.dmg")).unwrap();
/// println!("{} bytes mapped", pipeline.len());
/// ```
pub struct MmapPipeline {
    mmap: Mmap,
    position: u64,
}

impl MmapPipeline {
    /// Open and map a file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened, is not a regular file,
    /// exceeds [`MAX_MMAP_SIZE`], or cannot be mapped
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = File::open(path)?;
        Self::from_file(&file)
    }

    /// Map an already opened file
    ///
    /// # Safety
    ///
    /// Uses `unsafe` for memory mapping. The mapping is read-only and the file
    /// is validated as a regular file first; the file must not be truncated
    /// while the mapping is alive (caller responsibility).
    pub fn from_file(file: &File) -> io::Result<Self> {
        let metadata = file.metadata()?;

        if !metadata.is_file() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "Only regular files can be memory-mapped",
            ));
        }

        if metadata.len() > MAX_MMAP_SIZE {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "File size {} exceeds memory mapping limit {}",
                    metadata.len(),
                    MAX_MMAP_SIZE
                ),
            ));
        }

        // SAFETY: regular file, bounded size, valid descriptor, read-only mapping
        let mmap = unsafe { Mmap::map(file)? };

        Ok(Self { mmap, position: 0 })
    }

    /// Get the length of the mapped region
    pub fn len(&self) -> u64 {
        self.mmap.len() as u64
    }

    /// Check if the mapped region is empty
    pub fn is_empty(&self) -> bool {
        self.mmap.is_empty()
    }

    /// Get the current position
    pub fn position(&self) -> u64 {
        self.position
    }
}

impl Read for MmapPipeline {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let len = self.len();
        if self.position >= len {
            return Ok(0);
        }

        let start = self.position as usize;
        let to_read = buf.len().min((len - self.position) as usize);

        buf[..to_read].copy_from_slice(&self.mmap[start..start + to_read]);
        self.position += to_read as u64;

        Ok(to_read)
    }
}

impl Seek for MmapPipeline {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let new_pos = match pos {
            SeekFrom::Start(offset) => offset as i128,
            SeekFrom::End(offset) => self.len() as i128 + offset as i128,
            SeekFrom::Current(offset) => self.position as i128 + offset as i128,
        };

        if new_pos < 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "Seek before beginning of file",
            ));
        }

        // Seeking past EOF is allowed; reads there return 0
        self.position = new_pos as u64;
        Ok(self.position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn mapped(data: &[u8]) -> (NamedTempFile, MmapPipeline) {
        let mut tmpfile = NamedTempFile::new().unwrap();
        tmpfile.write_all(data).unwrap();
        tmpfile.flush().unwrap();
        let pipeline = MmapPipeline::open(tmpfile.path()).unwrap();
        (tmpfile, pipeline)
    }

    #[test]
    fn test_mmap_trailer_read() {
        let mut data = vec![0u8; 1024];
        data[512..516].copy_from_slice(b"koly");
        let (_file, mut pipeline) = mapped(&data);

        assert_eq!(pipeline.len(), 1024);
        pipeline.seek(SeekFrom::End(-512)).unwrap();

        let mut magic = [0u8; 4];
        pipeline.read_exact(&mut magic).unwrap();
        assert_eq!(&magic, b"koly");
        assert_eq!(pipeline.position(), 516);
    }

    #[test]
    fn test_mmap_read_past_end() {
        let (_file, mut pipeline) = mapped(&[1, 2, 3]);

        pipeline.seek(SeekFrom::Start(10)).unwrap();
        let mut buf = [0u8; 4];
        assert_eq!(pipeline.read(&mut buf).unwrap(), 0);
        assert!(pipeline.seek(SeekFrom::Current(-20)).is_err());
    }

    #[test]
    fn test_mmap_length() {
        let data: Vec<u8> = (0..100).collect();
        let (_file, pipeline) = mapped(&data);

        assert!(!pipeline.is_empty());
        assert_eq!(pipeline.len(), 100);
    }
}
