//! DMG vault - Apple UDIF disk images
//!
//! A UDIF container ends with a 512-byte `koly` trailer that locates an XML
//! property list. The plist's `blkx` array holds one base64-encoded block
//! table per partition (plus `-1` for the whole disk); each table maps the
//! partition's sectors onto raw or compressed runs stored in the data fork.
//!
//! # Discovery
//!
//! Partitions are listed from the plist descriptors when possible. Images whose
//! descriptors cannot be parsed fall back to reading the embedded Apple
//! Partition Map or GPT through the nested block tables; see [`discovery`].
//!
//! # Example
//!
//! ```rust,no_run
//! use udif_vaults::{DmgVault, VaultConfig};
//! use udif_core::ZoneTable;
//! use std::io::Read;
//! use std::path::Path;
//!
//! # fn main() -> udif_core::Result<()> {
//! let dmg = DmgVault::open(Path::new("installer.dmg"), VaultConfig::default())?;
//! for zone in dmg.enumerate_zones() {
//!     println!("{}", zone);
//! }
//!
//! let mut reader = dmg.reader_for_partition(0)?;
//! let mut boot = [0u8; 1024];
//! reader.read_exact(&mut boot)?;
//! # Ok(())
//! # }
//! ```

pub mod base64;
pub mod discovery;
pub mod partition;
pub mod plist;
pub mod types;

#[cfg(test)]
pub(crate) mod fixtures;

pub use discovery::{BlockTableSource, DiscoveryPath, MetadataDiscovery};
pub use partition::DmgPartitionPipeline;
pub use plist::{parse_name_and_type, BlkxEntry, MetadataDocument};
pub use types::{BlkxTable, BlockRun, BlockType, KolyBlock, UdifChecksum};

use crate::raw::{RawVault, VaultConfig};
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::Arc;
use udif_core::{Error, ReadSeek, Result, Vault, Zone, ZoneTable};
use udif_pipeline::{CacheZone, CachedPipeline, SharedPipeline};

/// An opened UDIF disk image with its resolved partition list
///
/// Construction reads the trailer and metadata, then runs discovery. It either
/// succeeds with a non-empty partition list or fails; there is no partially
/// opened state. All readers handed out share one [`CacheZone`].
pub struct DmgVault {
    container: SharedPipeline,
    koly: KolyBlock,
    metadata: MetadataDocument,
    zones: Vec<Zone>,
    discovery_path: DiscoveryPath,
    cache: Arc<CacheZone>,
}

impl DmgVault {
    /// Open a DMG file
    ///
    /// # Errors
    ///
    /// Returns `Io` if the file cannot be opened, `InvalidVault` for a bad
    /// trailer or metadata, and `UnsupportedScheme` if no partitions can be found
    pub fn open(path: &Path, config: VaultConfig) -> Result<Self> {
        let vault = RawVault::open(path, config.clone())?;
        Self::from_vault(Box::new(vault), config)
    }

    /// Interpret an already opened byte source as a DMG
    ///
    /// # Errors
    ///
    /// Same as [`DmgVault::open`]
    pub fn from_vault(vault: Box<dyn Vault>, config: VaultConfig) -> Result<Self> {
        let length = vault.length();
        let container = SharedPipeline::new(vault.into_content(), length);

        let koly = load_trailer(&container)?;
        let blob = load_metadata(&container, &koly)?;
        let metadata = MetadataDocument::parse(&blob)?;

        tracing::debug!(
            "UDIF v{} trailer: plist at {} ({} bytes), {} blkx entries",
            koly.version,
            koly.plist_offset,
            koly.plist_length,
            metadata.entries().len()
        );

        let mut dmg = Self {
            container,
            koly,
            metadata,
            zones: Vec::new(),
            discovery_path: DiscoveryPath::Metadata,
            cache: Arc::new(CacheZone::new(config.cache_capacity, config.cache_page_size)),
        };

        let (path, zones) = discovery::discover(&dmg.metadata, &dmg)?;
        tracing::info!("Found {} partitions from {}", zones.len(), path);

        dmg.zones = zones;
        dmg.discovery_path = path;
        Ok(dmg)
    }

    /// Check whether a stream ends with a UDIF trailer
    ///
    /// Never fails: any I/O error or a stream shorter than the trailer
    /// counts as "not a DMG".
    pub fn is_dmg(stream: &mut dyn ReadSeek) -> bool {
        probe_trailer(stream).unwrap_or(false)
    }

    /// The decoded trailer
    pub fn koly(&self) -> &KolyBlock {
        &self.koly
    }

    /// The parsed metadata property list
    pub fn metadata(&self) -> &MetadataDocument {
        &self.metadata
    }

    /// Which discovery path produced the partition list
    pub fn discovery_path(&self) -> DiscoveryPath {
        self.discovery_path
    }

    /// The cache shared by every partition reader of this image
    pub fn cache_zone(&self) -> &Arc<CacheZone> {
        &self.cache
    }

    /// Number of resolved partitions
    pub fn partition_count(&self) -> usize {
        self.zones.len()
    }

    /// Size of the container in bytes
    pub fn container_length(&self) -> u64 {
        self.container.length()
    }

    /// A cached reader over the partition at `index` in the resolved list
    ///
    /// The block table is looked up again by scanning IDs from `-1` upward for
    /// one whose first sector lands on the partition's offset. A table whose
    /// size also matches wins over an offset-only match, so the whole-disk
    /// table cannot shadow a partition that starts at sector 0. The reader is
    /// cached in the shared zone under `"part-<index>"`.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if `index` is out of range, the partition is empty
    /// (its block table was missing at discovery), or no block table matches
    pub fn reader_for_partition(&self, index: usize) -> Result<Box<dyn ReadSeek>> {
        udif_core::validate_partition_index(index, self.zones.len())?;
        let zone = &self.zones[index];

        if zone.length == 0 {
            return Err(Error::not_found(format!(
                "Partition {} ({}) has no block table",
                index, zone.name
            )));
        }

        let last_id = self
            .metadata
            .highest_id()
            .unwrap_or(discovery::WHOLE_DISK_ID)
            .max(self.zones.len() as i64 + 1);

        let mut exact = None;
        let mut offset_only = None;

        for id in discovery::WHOLE_DISK_ID..=last_id {
            let table = match self.block_table(id)? {
                Some(table) => table,
                None => continue,
            };

            if table.offset()? != zone.offset {
                continue;
            }

            if table.length()? == zone.length {
                exact = Some((id, table));
                break;
            }

            if offset_only.is_none() {
                offset_only = Some((id, table));
            }
        }

        let (id, table) = exact.or(offset_only).ok_or_else(|| {
            Error::not_found(format!(
                "No block table starts at offset {} for partition {}",
                zone.offset, index
            ))
        })?;

        tracing::debug!("Partition {} ({}) uses block table {}", index, zone.name, id);

        let reader = DmgPartitionPipeline::new(self.container.clone(), &table)?;
        let length = reader.length();
        Ok(Box::new(CachedPipeline::new(
            reader,
            length,
            Arc::clone(&self.cache),
            format!("part-{}", index),
        )))
    }
}

impl BlockTableSource for DmgVault {
    fn block_table(&self, index: i64) -> Result<Option<BlkxTable>> {
        let data = match self.metadata.block_data(index) {
            Some(data) => data,
            None => return Ok(None),
        };

        let bytes = match base64::decode(data) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!("Block table {} has undecodable data: {}", index, e);
                return Ok(None);
            }
        };

        BlkxTable::from_bytes(&bytes).map(Some)
    }

    fn block_reader(&self, index: i64) -> Result<Option<Box<dyn ReadSeek>>> {
        match self.block_table(index)? {
            Some(table) => {
                let reader = DmgPartitionPipeline::new(self.container.clone(), &table)?;
                Ok(Some(Box::new(reader)))
            }
            None => Ok(None),
        }
    }
}

impl ZoneTable for DmgVault {
    fn identify(&self) -> &str {
        "Apple UDIF disk image"
    }

    fn enumerate_zones(&self) -> &[Zone] {
        &self.zones
    }
}

fn probe_trailer(stream: &mut dyn ReadSeek) -> io::Result<bool> {
    let length = stream.seek(SeekFrom::End(0))?;
    if length < KolyBlock::SIZE as u64 {
        return Ok(false);
    }

    stream.seek(SeekFrom::Start(length - KolyBlock::SIZE as u64))?;
    let mut magic = [0u8; 4];
    stream.read_exact(&mut magic)?;
    Ok(KolyBlock::has_magic(&magic))
}

/// Read and decode the last 512 bytes of the container
fn load_trailer(container: &SharedPipeline) -> Result<KolyBlock> {
    let length = container.length();
    if length < KolyBlock::SIZE as u64 {
        return Err(Error::invalid_vault(format!(
            "Container too small for a KOLY block: {} bytes",
            length
        )));
    }

    let mut trailer = [0u8; KolyBlock::SIZE];
    let bytes_read = container.read_at(&mut trailer, length - KolyBlock::SIZE as u64)?;
    if bytes_read != KolyBlock::SIZE {
        return Err(Error::invalid_vault(format!(
            "Short read of KOLY block: {} of {} bytes",
            bytes_read,
            KolyBlock::SIZE
        )));
    }

    KolyBlock::from_bytes(&trailer)
}

/// Read the metadata blob the trailer points at
fn load_metadata(container: &SharedPipeline, koly: &KolyBlock) -> Result<Vec<u8>> {
    if koly.plist_length == 0 {
        return Err(Error::invalid_vault("Container has no metadata"));
    }

    let in_range = koly
        .plist_offset
        .checked_add(koly.plist_length)
        .map_or(false, |end| end <= container.length());
    if !in_range {
        return Err(Error::invalid_vault(format!(
            "Metadata range {}+{} lies outside the container",
            koly.plist_offset, koly.plist_length
        )));
    }

    let size = udif_core::validate_allocation_size(
        koly.plist_length,
        udif_core::MAX_METADATA_SIZE,
        "Metadata",
    )?;

    let mut blob = vec![0u8; size];
    let bytes_read = container.read_at(&mut blob, koly.plist_offset)?;
    if bytes_read != size {
        return Err(Error::invalid_vault(format!(
            "Short read of metadata: {} of {} bytes",
            bytes_read, size
        )));
    }

    Ok(blob)
}
