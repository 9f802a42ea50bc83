//! MBR (Master Boot Record) partition table implementation
//!
//! Inside a DMG the MBR shows up as the whole-disk block table of a GPT image
//! (the protective MBR), so its main job here is recognizing GPT disks.

pub mod types;

use std::io::{Read, Seek, SeekFrom};
use udif_core::{Error, ReadSeek, Result, Zone, ZoneTable};
pub use types::MbrPartitionType;

/// MBR partition table
///
/// # Structure
///
/// ```text
/// Offset  Size  Field
/// ------  ----  -----
/// 0x000   446   Bootstrap code
/// 0x1BE   16    Partition entry 1
/// 0x1CE   16    Partition entry 2
/// 0x1DE   16    Partition entry 3
/// 0x1EE   16    Partition entry 4
/// 0x1FE   2     Boot signature (0xAA55)
/// ```
#[derive(Debug, Clone)]
pub struct MbrZoneTable {
    zones: Vec<Zone>,
    partition_types: Vec<MbrPartitionType>,
    disk_signature: u32,
}

impl MbrZoneTable {
    /// The boot signature that must be present at offset 0x1FE
    pub const BOOT_SIGNATURE: u16 = 0xAA55;

    /// Size of the MBR in bytes (always 512)
    pub const MBR_SIZE: usize = 512;

    /// Offset of the first partition entry
    pub const PARTITION_TABLE_OFFSET: usize = 0x1BE;

    /// Offset of the disk signature
    pub const DISK_SIGNATURE_OFFSET: usize = 0x1B8;

    /// Offset of the boot signature
    pub const BOOT_SIGNATURE_OFFSET: usize = 0x1FE;

    /// Size of each partition entry
    pub const PARTITION_ENTRY_SIZE: usize = 16;

    /// Number of partition entries in MBR
    pub const NUM_PARTITIONS: usize = 4;

    /// Parse an MBR from the start of a stream
    ///
    /// # Errors
    ///
    /// Returns an error if the sector cannot be read or the boot signature is invalid
    pub fn parse(stream: &mut dyn ReadSeek, sector_size: u32) -> Result<Self> {
        stream.seek(SeekFrom::Start(0))?;
        let mut mbr = [0u8; Self::MBR_SIZE];
        stream.read_exact(&mut mbr)?;

        let boot_signature = u16::from_le_bytes([
            mbr[Self::BOOT_SIGNATURE_OFFSET],
            mbr[Self::BOOT_SIGNATURE_OFFSET + 1],
        ]);

        if boot_signature != Self::BOOT_SIGNATURE {
            return Err(Error::invalid_zone_table(format!(
                "Invalid MBR boot signature: expected 0x{:04X}, got 0x{:04X}",
                Self::BOOT_SIGNATURE,
                boot_signature
            )));
        }

        let disk_signature = u32::from_le_bytes([
            mbr[Self::DISK_SIGNATURE_OFFSET],
            mbr[Self::DISK_SIGNATURE_OFFSET + 1],
            mbr[Self::DISK_SIGNATURE_OFFSET + 2],
            mbr[Self::DISK_SIGNATURE_OFFSET + 3],
        ]);

        let mut zones = Vec::new();
        let mut partition_types = Vec::new();

        for i in 0..Self::NUM_PARTITIONS {
            let offset = Self::PARTITION_TABLE_OFFSET + i * Self::PARTITION_ENTRY_SIZE;
            let entry = &mbr[offset..offset + Self::PARTITION_ENTRY_SIZE];

            let partition_type = MbrPartitionType(entry[4]);
            let lba_start = u32::from_le_bytes([entry[8], entry[9], entry[10], entry[11]]);
            let lba_length = u32::from_le_bytes([entry[12], entry[13], entry[14], entry[15]]);

            // Skip empty partitions
            if partition_type == MbrPartitionType::EMPTY || lba_length == 0 {
                continue;
            }

            zones.push(Zone::new(
                i,
                format!("Partition {}", i + 1),
                partition_type.to_string(),
                lba_start as u64 * sector_size as u64,
                lba_length as u64 * sector_size as u64,
            ));
            partition_types.push(partition_type);
        }

        Ok(Self {
            zones,
            partition_types,
            disk_signature,
        })
    }

    /// Get the disk signature
    pub fn disk_signature(&self) -> u32 {
        self.disk_signature
    }

    /// Check if this MBR contains a GPT protective partition
    pub fn is_gpt_protective(&self) -> bool {
        self.partition_types.contains(&MbrPartitionType::GPT_PROTECTIVE)
    }
}

impl ZoneTable for MbrZoneTable {
    fn identify(&self) -> &str {
        "Master Boot Record"
    }

    fn enumerate_zones(&self) -> &[Zone] {
        &self.zones
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Cursor;

    /// Build a 512-byte MBR with the given (type, lba_start, lba_length) entries
    pub(crate) fn build_mbr(entries: &[(u8, u32, u32)]) -> Vec<u8> {
        let mut mbr = vec![0u8; 512];
        mbr[0x1B8..0x1BC].copy_from_slice(&0x78563412u32.to_le_bytes());

        for (i, &(kind, start, length)) in entries.iter().enumerate() {
            let offset = 0x1BE + i * 16;
            mbr[offset + 4] = kind;
            mbr[offset + 8..offset + 12].copy_from_slice(&start.to_le_bytes());
            mbr[offset + 12..offset + 16].copy_from_slice(&length.to_le_bytes());
        }

        mbr[0x1FE] = 0x55;
        mbr[0x1FF] = 0xAA;
        mbr
    }

    #[test]
    fn test_parse_valid_mbr() {
        let mut cursor = Cursor::new(build_mbr(&[(0x0C, 2048, 2048)]));
        let table = MbrZoneTable::parse(&mut cursor, 512).unwrap();

        assert_eq!(table.identify(), "Master Boot Record");
        assert_eq!(table.disk_signature(), 0x12345678);

        let zones = table.enumerate_zones();
        assert_eq!(zones.len(), 1);
        assert_eq!(zones[0].offset, 2048 * 512);
        assert_eq!(zones[0].length, 2048 * 512);
        assert_eq!(zones[0].zone_type, "FAT32 (LBA)");
        assert_eq!(zones[0].name, "Partition 1");
        assert!(!table.is_gpt_protective());
    }

    #[test]
    fn test_parse_invalid_boot_signature() {
        let mut mbr = build_mbr(&[]);
        mbr[0x1FE] = 0x00;

        let result = MbrZoneTable::parse(&mut Cursor::new(mbr), 512);
        assert!(matches!(result, Err(Error::InvalidZoneTable(_))));
    }

    #[test]
    fn test_gpt_protective_detection() {
        let mut cursor = Cursor::new(build_mbr(&[(0xEE, 1, 0xFFFF)]));
        let table = MbrZoneTable::parse(&mut cursor, 512).unwrap();
        assert!(table.is_gpt_protective());
    }

    #[test]
    fn test_short_stream_fails() {
        let result = MbrZoneTable::parse(&mut Cursor::new(vec![0u8; 100]), 512);
        assert!(matches!(result, Err(Error::Io(_))));
    }
}
