//! Apple Partition Map (APM) implementation
//!
//! Block 0 holds the Driver Descriptor Map (`"ER"`), followed by one 512-byte
//! `"PM"` entry per partition. Disk images usually store the map entries as a
//! block table of their own, so the entries can be read from a separate stream.

use std::io::{self, Read, Seek, SeekFrom};
use udif_core::{Error, ReadSeek, Result, Zone, ZoneTable};

/// Driver Descriptor Map signature ("ER")
pub const DDM_SIGNATURE: u16 = 0x4552;

/// Partition map entry signature ("PM")
pub const PM_SIGNATURE: u16 = 0x504D;

/// Size of one partition map entry
pub const ENTRY_SIZE: usize = 512;

/// One decoded partition map entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApmEntry {
    /// Total number of entries in the map
    pub map_entries: u32,
    pub start_block: u32,
    pub block_count: u32,
    pub name: String,
    pub partition_type: String,
}

impl ApmEntry {
    /// Decode an entry, or `None` when the block is short or unsigned
    pub fn from_bytes(data: &[u8]) -> Option<Self> {
        if data.len() < ENTRY_SIZE || be_u16(data, 0) != PM_SIGNATURE {
            return None;
        }

        Some(Self {
            map_entries: be_u32(data, 4),
            start_block: be_u32(data, 8),
            block_count: be_u32(data, 12),
            name: fixed_string(&data[16..48]),
            partition_type: fixed_string(&data[48..80]),
        })
    }
}

fn be_u16(data: &[u8], offset: usize) -> u16 {
    u16::from_be_bytes([data[offset], data[offset + 1]])
}

fn be_u32(data: &[u8], offset: usize) -> u32 {
    u32::from_be_bytes([data[offset], data[offset + 1], data[offset + 2], data[offset + 3]])
}

fn fixed_string(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).trim().to_string()
}

/// Read one entry-sized block, returning `false` at end of stream
fn read_block(stream: &mut dyn ReadSeek, buf: &mut [u8; ENTRY_SIZE]) -> Result<bool> {
    match stream.read_exact(buf) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(false),
        Err(e) => Err(e.into()),
    }
}

/// Apple Partition Map
#[derive(Debug, Clone)]
pub struct ApmZoneTable {
    zones: Vec<Zone>,
    block_size: u32,
}

impl ApmZoneTable {
    /// Check for a Driver Descriptor Map at the start of a stream
    ///
    /// Never fails: unreadable or short streams are simply not Apple disks.
    pub fn is_apple_disk(stream: &mut dyn ReadSeek) -> bool {
        let mut signature = [0u8; 2];
        stream.seek(SeekFrom::Start(0)).is_ok()
            && stream.read_exact(&mut signature).is_ok()
            && u16::from_be_bytes(signature) == DDM_SIGNATURE
    }

    /// Parse the partition map
    ///
    /// `block0` must start with the Driver Descriptor Map, which supplies the
    /// block size. Entries are read from `map` at offset 0 when given,
    /// otherwise from `block0` starting one block in. Reading stops at the
    /// first entry without the `"PM"` signature, after the entry count
    /// announced by the map, or at end of stream.
    ///
    /// # Errors
    ///
    /// Returns an error if the DDM is missing, the block size is unusable, or
    /// a stream fails for a reason other than reaching its end
    pub fn parse(block0: &mut dyn ReadSeek, map: Option<&mut dyn ReadSeek>) -> Result<Self> {
        block0.seek(SeekFrom::Start(0))?;
        let mut ddm = [0u8; ENTRY_SIZE];
        block0.read_exact(&mut ddm)?;

        let signature = be_u16(&ddm, 0);
        if signature != DDM_SIGNATURE {
            return Err(Error::invalid_zone_table(format!(
                "Invalid driver descriptor signature: 0x{:04X}",
                signature
            )));
        }

        let block_size = match be_u16(&ddm, 2) as u32 {
            0 => 512,
            size => size,
        };
        udif_core::validate_sector_size(block_size)?;

        let stream: &mut dyn ReadSeek = match map {
            Some(map) => {
                map.seek(SeekFrom::Start(0))?;
                map
            }
            None => {
                block0.seek(SeekFrom::Start(block_size as u64))?;
                block0
            }
        };

        let mut zones = Vec::new();
        let mut expected = u32::MAX;
        let mut block = [0u8; ENTRY_SIZE];

        while (zones.len() as u64) < expected as u64
            && zones.len() < udif_core::MAX_PARTITION_COUNT
        {
            if !read_block(stream, &mut block)? {
                break;
            }

            let entry = match ApmEntry::from_bytes(&block) {
                Some(entry) => entry,
                None => {
                    tracing::debug!("APM entry {} has no PM signature, stopping", zones.len());
                    break;
                }
            };

            if zones.is_empty() {
                expected = entry.map_entries;
            }

            tracing::debug!(
                "APM entry {}: {} ({}) blocks {}+{}",
                zones.len(),
                entry.name,
                entry.partition_type,
                entry.start_block,
                entry.block_count
            );

            zones.push(Zone::new(
                zones.len(),
                entry.name,
                entry.partition_type,
                entry.start_block as u64 * block_size as u64,
                entry.block_count as u64 * block_size as u64,
            ));
        }

        Ok(Self { zones, block_size })
    }

    /// Block size announced by the Driver Descriptor Map
    pub fn block_size(&self) -> u32 {
        self.block_size
    }
}

impl ZoneTable for ApmZoneTable {
    fn identify(&self) -> &str {
        "Apple Partition Map"
    }

    fn enumerate_zones(&self) -> &[Zone] {
        &self.zones
    }
}
