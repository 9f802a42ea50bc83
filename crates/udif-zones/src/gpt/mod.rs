//! GPT (GUID Partition Table) partition table implementation

pub mod types;

use crate::mbr::MbrZoneTable;
use std::io::{Read, Seek, SeekFrom};
use udif_core::{Error, ReadSeek, Result, Zone, ZoneTable};
use types::{GptHeader, GptPartitionEntry};

/// GPT partition table
///
/// # Structure
///
/// ```text
/// LBA 0:    Protective MBR (for backward compatibility)
/// LBA 1:    Primary GPT header
/// LBA 2-33: Partition entries array (typically 128 entries)
/// LBA 34+:  Usable disk space
/// ...
/// Last 33:  Backup partition entries array
/// Last 1:   Backup GPT header
/// ```
///
/// Disk images split these regions into separate block tables: the protective
/// MBR is one table and the entry array another, so besides the whole-disk
/// [`parse`](Self::parse) there is [`parse_entries`](Self::parse_entries) for a
/// detached entry array with no header in front of it.
#[derive(Debug, Clone)]
pub struct GptZoneTable {
    zones: Vec<Zone>,
    header: Option<GptHeader>,
}

impl GptZoneTable {
    /// Number of entries in a standard entry array
    pub const MAX_ENTRIES: usize = 128;

    /// Check whether a stream starts with a GPT protective MBR
    ///
    /// Never fails: unreadable or short streams are simply not GPT disks.
    pub fn is_gpt_disk(stream: &mut dyn ReadSeek) -> bool {
        match MbrZoneTable::parse(stream, 512) {
            Ok(mbr) => mbr.is_gpt_protective(),
            Err(_) => false,
        }
    }

    /// Parse a GPT from the start of a whole disk, verifying both CRC32 checksums
    ///
    /// # Errors
    ///
    /// Returns an error if the header signature is invalid, a checksum does not
    /// match, or the stream cannot be read
    pub fn parse(stream: &mut dyn ReadSeek, sector_size: u32) -> Result<Self> {
        udif_core::validate_sector_size(sector_size)?;

        stream.seek(SeekFrom::Start(sector_size as u64))?;
        let mut header_bytes = vec![0u8; sector_size as usize];
        stream.read_exact(&mut header_bytes)?;

        let header = GptHeader::from_bytes(&header_bytes)
            .ok_or_else(|| Error::invalid_zone_table("Invalid GPT header signature"))?;

        if !header.verify_header_crc32(&header_bytes) {
            return Err(Error::ChecksumVerification(
                "GPT header CRC32 verification failed".to_string(),
            ));
        }

        let entry_size = header.partition_entry_size as usize;
        if entry_size < GptPartitionEntry::ENTRY_SIZE {
            return Err(Error::invalid_zone_table(format!(
                "GPT entry size {} is smaller than {}",
                entry_size,
                GptPartitionEntry::ENTRY_SIZE
            )));
        }

        let total = udif_core::validate_allocation_size(
            header.num_partition_entries as u64 * entry_size as u64,
            udif_core::MAX_ALLOCATION_SIZE,
            "GPT partition entries",
        )?;
        let entries_offset = udif_core::checked_multiply_u64(
            header.partition_entries_lba,
            sector_size as u64,
            "GPT entries offset",
        )?;

        stream.seek(SeekFrom::Start(entries_offset))?;
        let mut entries = vec![0u8; total];
        stream.read_exact(&mut entries)?;

        if !header.verify_partition_entries_crc32(&entries) {
            return Err(Error::ChecksumVerification(
                "GPT partition entries CRC32 verification failed".to_string(),
            ));
        }

        let zones = Self::zones_from_entries(&entries, entry_size, sector_size);
        Ok(Self {
            zones,
            header: Some(header),
        })
    }

    /// Parse a detached partition entry array starting at offset 0 of `stream`
    ///
    /// Reads up to [`MAX_ENTRIES`](Self::MAX_ENTRIES) 128-byte entries, stopping
    /// early at end of stream. Unused entries are skipped.
    pub fn parse_entries(stream: &mut dyn ReadSeek, sector_size: u32) -> Result<Self> {
        udif_core::validate_sector_size(sector_size)?;

        stream.seek(SeekFrom::Start(0))?;
        let mut entries = Vec::with_capacity(Self::MAX_ENTRIES * GptPartitionEntry::ENTRY_SIZE);
        (&mut *stream)
            .take((Self::MAX_ENTRIES * GptPartitionEntry::ENTRY_SIZE) as u64)
            .read_to_end(&mut entries)?;

        tracing::debug!("Read {} bytes of detached GPT entries", entries.len());

        let zones = Self::zones_from_entries(&entries, GptPartitionEntry::ENTRY_SIZE, sector_size);
        Ok(Self { zones, header: None })
    }

    fn zones_from_entries(bytes: &[u8], entry_size: usize, sector_size: u32) -> Vec<Zone> {
        bytes
            .chunks(entry_size)
            .enumerate()
            .filter_map(|(i, chunk)| GptPartitionEntry::from_bytes(chunk).map(|entry| (i, entry)))
            .filter(|(_, entry)| !entry.is_unused())
            .map(|(i, entry)| {
                let name = if entry.name.is_empty() {
                    format!("Partition {}", i + 1)
                } else {
                    entry.name.clone()
                };

                Zone::new(
                    i,
                    name,
                    entry.partition_type_guid.to_string(),
                    entry.first_lba.saturating_mul(sector_size as u64),
                    entry.size_lba().saturating_mul(sector_size as u64),
                )
            })
            .collect()
    }

    /// Get the disk GUID, if a header was parsed
    pub fn disk_guid(&self) -> Option<&[u8; 16]> {
        self.header.as_ref().map(|header| &header.disk_guid)
    }

    /// Get the GPT header, if a header was parsed
    pub fn header(&self) -> Option<&GptHeader> {
        self.header.as_ref()
    }
}

impl ZoneTable for GptZoneTable {
    fn identify(&self) -> &str {
        "GUID Partition Table"
    }

    fn enumerate_zones(&self) -> &[Zone] {
        &self.zones
    }
}
