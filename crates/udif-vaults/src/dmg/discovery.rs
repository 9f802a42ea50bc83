//! Partition discovery
//!
//! Two paths, tried in order:
//!
//! 1. **Metadata**: every `blkx` entry with a non-negative ID names a partition
//!    through its `"<name> (<type> : <id>)"` descriptor; its block table gives
//!    offset and size. If the first such entry cannot be read, the whole path
//!    yields [`MetadataDiscovery::Fallback`]. Later bad entries are skipped.
//! 2. **Scheme probing**: the whole-disk block table (ID `-1`) is probed for an
//!    Apple Partition Map, then for a GPT protective MBR, and the matching
//!    parser runs over the nested block tables. Anything else is
//!    `UnsupportedScheme`.
//!
//! Only one path's result is kept.

use super::plist::{parse_name_and_type, MetadataDocument};
use super::types::BlkxTable;
use std::fmt;
use udif_core::{Error, ReadSeek, Result, Zone, ZoneTable};
use udif_zones::{ApmZoneTable, GptZoneTable};

/// Block table ID of the whole-disk view
pub const WHOLE_DISK_ID: i64 = -1;

/// Block table ID holding the Apple partition map entries
pub const APM_MAP_ID: i64 = 0;

/// Block table ID holding the GPT partition entry array
pub const GPT_ENTRIES_ID: i64 = 1;

/// Access to decoded block tables and readers over them
///
/// `Ok(None)` means "no table with that ID", which is an expected answer
/// while probing, not an error.
pub trait BlockTableSource {
    /// Decode the block table with the given ID
    fn block_table(&self, index: i64) -> Result<Option<BlkxTable>>;

    /// A reader over the sectors described by the block table with the given ID
    fn block_reader(&self, index: i64) -> Result<Option<Box<dyn ReadSeek>>>;
}

/// Outcome of the metadata path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetadataDiscovery {
    /// Partitions recovered from the property list
    Success(Vec<Zone>),
    /// The property list cannot describe the partitions
    Fallback,
}

/// Which path produced the partition list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoveryPath {
    Metadata,
    AppleMap,
    Gpt,
}

impl fmt::Display for DiscoveryPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiscoveryPath::Metadata => write!(f, "plist metadata"),
            DiscoveryPath::AppleMap => write!(f, "Apple Partition Map"),
            DiscoveryPath::Gpt => write!(f, "GUID Partition Table"),
        }
    }
}

/// Run the metadata path
///
/// # Errors
///
/// Propagates failures decoding a block table that does exist
pub fn discover_from_metadata(
    metadata: &MetadataDocument,
    source: &dyn BlockTableSource,
) -> Result<MetadataDiscovery> {
    let mut zones: Vec<Zone> = Vec::new();

    for entry in metadata.partition_entries() {
        let id = entry.id.unwrap_or_default();

        let parsed = entry.display_name().and_then(parse_name_and_type);
        let (name, zone_type) = match parsed {
            Some(parsed) => parsed,
            None if zones.is_empty() => {
                tracing::warn!("First blkx entry (ID {}) has no usable descriptor", id);
                return Ok(MetadataDiscovery::Fallback);
            }
            None => {
                tracing::warn!("Skipping blkx entry (ID {}) with no usable descriptor", id);
                continue;
            }
        };

        let (offset, length) = match source.block_table(id)? {
            Some(table) => (table.offset()?, table.length()?),
            None => {
                tracing::warn!("No block table for partition {} (ID {})", name, id);
                (0, 0)
            }
        };

        tracing::debug!("Partition {} ({}) at {} length {}", name, zone_type, offset, length);
        zones.push(Zone::new(zones.len(), name, zone_type, offset, length));
    }

    if zones.is_empty() {
        tracing::warn!("Metadata lists no partitions");
        return Ok(MetadataDiscovery::Fallback);
    }

    Ok(MetadataDiscovery::Success(zones))
}

fn require_reader(source: &dyn BlockTableSource, index: i64, what: &str) -> Result<Box<dyn ReadSeek>> {
    source.block_reader(index)?.ok_or_else(|| {
        Error::unsupported_scheme(format!("No {} block table (ID {})", what, index))
    })
}

/// Run the scheme probing path
///
/// # Errors
///
/// Returns `UnsupportedScheme` if a required block table is missing, no
/// scheme is recognized, or the recognized scheme lists no partitions;
/// parser failures are propagated
pub fn discover_from_scheme(source: &dyn BlockTableSource) -> Result<(DiscoveryPath, Vec<Zone>)> {
    let mut whole_disk = require_reader(source, WHOLE_DISK_ID, "whole-disk")?;

    let (path, zones) = if ApmZoneTable::is_apple_disk(&mut *whole_disk) {
        let mut map = require_reader(source, APM_MAP_ID, "partition map")?;
        let table = ApmZoneTable::parse(&mut *whole_disk, Some(&mut *map))?;
        (DiscoveryPath::AppleMap, table.enumerate_zones().to_vec())
    } else if GptZoneTable::is_gpt_disk(&mut *whole_disk) {
        let mut entries = require_reader(source, GPT_ENTRIES_ID, "GPT entry")?;
        let table = GptZoneTable::parse_entries(&mut *entries, udif_core::SECTOR_SIZE as u32)?;
        (DiscoveryPath::Gpt, table.enumerate_zones().to_vec())
    } else {
        return Err(Error::unsupported_scheme("Unknown partition table type"));
    };

    if zones.is_empty() {
        return Err(Error::unsupported_scheme(format!("{} lists no partitions", path)));
    }

    Ok((path, zones))
}

/// Run both paths in order and keep the first result
pub fn discover(
    metadata: &MetadataDocument,
    source: &dyn BlockTableSource,
) -> Result<(DiscoveryPath, Vec<Zone>)> {
    match discover_from_metadata(metadata, source)? {
        MetadataDiscovery::Success(zones) => Ok((DiscoveryPath::Metadata, zones)),
        MetadataDiscovery::Fallback => {
            tracing::warn!("Falling back to partition scheme probing");
            discover_from_scheme(source)
        }
    }
}
