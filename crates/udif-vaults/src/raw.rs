//! Raw vault - the random-access byte source under every image
//!
//! A plain file (optionally memory mapped) or any in-memory stream. DMG
//! containers are read through a `RawVault`; raw sector images are used as-is.

use std::fs::File;
use std::path::Path;
use udif_core::{ReadSeek, Result, Vault};
use udif_pipeline::cached::DEFAULT_PAGE_SIZE;
use udif_pipeline::MmapPipeline;

/// Default number of pages held by a container's reader cache
pub const DEFAULT_CACHE_PAGES: u64 = 40_000;

/// Configuration for opening a vault
#[derive(Debug, Clone)]
pub struct VaultConfig {
    /// Use memory mapping for direct action (high performance)
    pub use_mmap: bool,
    /// Byte capacity of the cache shared by a container's partition readers
    pub cache_capacity: u64,
    /// Page size of cached partition readers
    pub cache_page_size: usize,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            use_mmap: true,
            cache_capacity: DEFAULT_CACHE_PAGES * DEFAULT_PAGE_SIZE as u64,
            cache_page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

/// Raw vault - a simple passthrough to the underlying file
///
/// # Example
///
/// ```rust,no_run
/// use udif_vaults::{RawVault, VaultConfig};
/// use udif_core::Vault;
/// use std::path::Path;
///
/// # fn main() -> udif_core::Result<()> {
/// let vault = RawVault::open(Path::new("disk.img"), VaultConfig::default())?;
/// println!("{}: {} bytes", vault.identify(), vault.length());
/// # Ok(())
/// # }
/// ```
pub struct RawVault {
    pipeline: Box<dyn ReadSeek>,
    length: u64,
}

impl RawVault {
    /// Open a file as a raw vault
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or mapped
    pub fn open(path: &Path, config: VaultConfig) -> Result<Self> {
        let file = File::open(path)?;
        let length = file.metadata()?.len();

        let pipeline: Box<dyn ReadSeek> = if config.use_mmap && length > 0 {
            // Direct action: memory-mapped file
            Box::new(MmapPipeline::from_file(&file)?)
        } else {
            Box::new(file)
        };

        tracing::debug!(
            "Opened {} ({} bytes, mmap: {})",
            path.display(),
            length,
            config.use_mmap
        );

        Ok(Self { pipeline, length })
    }

    /// Wrap any readable and seekable stream of known length
    pub fn from_stream<R: ReadSeek + 'static>(stream: R, length: u64) -> Self {
        Self {
            pipeline: Box::new(stream),
            length,
        }
    }
}

impl Vault for RawVault {
    fn identify(&self) -> &str {
        "Raw sector image"
    }

    fn length(&self) -> u64 {
        self.length
    }

    fn content(&mut self) -> &mut dyn ReadSeek {
        &mut *self.pipeline
    }

    fn into_content(self: Box<Self>) -> Box<dyn ReadSeek> {
        self.pipeline
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Read, Seek, SeekFrom, Write};
    use tempfile::NamedTempFile;

    #[test]
    fn test_raw_vault_from_stream() {
        let data: Vec<u8> = (0..100).collect();
        let mut vault = RawVault::from_stream(Cursor::new(data), 100);

        assert_eq!(vault.identify(), "Raw sector image");
        assert_eq!(vault.length(), 100);

        vault.content().seek(SeekFrom::Start(50)).unwrap();
        let mut buf = [0u8; 5];
        vault.content().read_exact(&mut buf).unwrap();
        assert_eq!(&buf, &[50, 51, 52, 53, 54]);
    }

    #[test]
    fn test_into_content_keeps_stream() {
        let data: Vec<u8> = (0..100).collect();
        let vault: Box<dyn Vault> = Box::new(RawVault::from_stream(Cursor::new(data), 100));

        let mut stream = vault.into_content();
        stream.seek(SeekFrom::Start(98)).unwrap();
        let mut rest = Vec::new();
        stream.read_to_end(&mut rest).unwrap();
        assert_eq!(rest, vec![98, 99]);
    }

    #[test]
    fn test_default_config() {
        let config = VaultConfig::default();
        assert!(config.use_mmap);
        assert_eq!(config.cache_page_size, 4096);
        assert_eq!(config.cache_capacity, 40_000 * 4096);
    }

    #[test]
    fn test_raw_vault_open_file() {
        let mut tmpfile = NamedTempFile::new().unwrap();
        let data: Vec<u8> = (0u8..=255).cycle().take(1000).collect();
        tmpfile.write_all(&data).unwrap();
        tmpfile.flush().unwrap();

        for use_mmap in [true, false] {
            let config = VaultConfig {
                use_mmap,
                ..VaultConfig::default()
            };
            let mut vault = RawVault::open(tmpfile.path(), config).unwrap();
            assert_eq!(vault.length(), 1000);

            let mut buf = [0u8; 10];
            vault.content().read_exact(&mut buf).unwrap();
            assert_eq!(&buf, &[0, 1, 2, 3, 4, 5, 6, 7, 8, 9]);
        }
    }

    #[test]
    fn test_raw_vault_open_empty_file() {
        let tmpfile = NamedTempFile::new().unwrap();
        let vault = RawVault::open(tmpfile.path(), VaultConfig::default()).unwrap();
        assert_eq!(vault.length(), 0);
    }

    #[test]
    fn test_raw_vault_open_missing_file() {
        let result = RawVault::open(Path::new("/nonexistent/disk.img"), VaultConfig::default());
        assert!(matches!(result, Err(udif_core::Error::Io(_))));
    }
}
