//! GPT partition types and structures

use std::fmt;
use uuid::Uuid;

fn le_u32(bytes: &[u8], offset: usize) -> u32 {
    let mut raw = [0u8; 4];
    raw.copy_from_slice(&bytes[offset..offset + 4]);
    u32::from_le_bytes(raw)
}

fn le_u64(bytes: &[u8], offset: usize) -> u64 {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&bytes[offset..offset + 8]);
    u64::from_le_bytes(raw)
}

fn guid(bytes: &[u8], offset: usize) -> [u8; 16] {
    let mut raw = [0u8; 16];
    raw.copy_from_slice(&bytes[offset..offset + 16]);
    raw
}

/// GPT partition type GUID, stored in its on-disk (mixed-endian) byte order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartitionTypeGuid(pub [u8; 16]);

impl PartitionTypeGuid {
    /// Unused entry
    pub const UNUSED: Self = Self([0; 16]);

    /// EFI System Partition (C12A7328-F81F-11D2-BA4B-00A0C93EC93B)
    pub const EFI_SYSTEM: Self = Self([
        0x28, 0x73, 0x2a, 0xc1, 0x1f, 0xf8, 0xd2, 0x11,
        0xba, 0x4b, 0x00, 0xa0, 0xc9, 0x3e, 0xc9, 0x3b,
    ]);

    /// Apple HFS+ (48465300-0000-11AA-AA11-00306543ECAC)
    pub const APPLE_HFS: Self = Self([
        0x00, 0x53, 0x46, 0x48, 0x00, 0x00, 0xaa, 0x11,
        0xaa, 0x11, 0x00, 0x30, 0x65, 0x43, 0xec, 0xac,
    ]);

    /// Apple APFS container (7C3457EF-0000-11AA-AA11-00306543ECAC)
    pub const APPLE_APFS: Self = Self([
        0xef, 0x57, 0x34, 0x7c, 0x00, 0x00, 0xaa, 0x11,
        0xaa, 0x11, 0x00, 0x30, 0x65, 0x43, 0xec, 0xac,
    ]);

    /// Apple Boot / Recovery HD (426F6F74-0000-11AA-AA11-00306543ECAC)
    pub const APPLE_BOOT: Self = Self([
        0x74, 0x6f, 0x6f, 0x42, 0x00, 0x00, 0xaa, 0x11,
        0xaa, 0x11, 0x00, 0x30, 0x65, 0x43, 0xec, 0xac,
    ]);

    /// Microsoft Basic Data (FAT, NTFS, exFAT)
    pub const MICROSOFT_BASIC_DATA: Self = Self([
        0xa2, 0xa0, 0xd0, 0xeb, 0xe5, 0xb9, 0x33, 0x44,
        0x87, 0xc0, 0x68, 0xb6, 0xb7, 0x26, 0x99, 0xc7,
    ]);

    /// Linux filesystem
    pub const LINUX_FILESYSTEM: Self = Self([
        0xaf, 0x3d, 0xc6, 0x0f, 0x83, 0x84, 0x72, 0x47,
        0x8e, 0x79, 0x3d, 0x69, 0xd8, 0x47, 0x7d, 0xe4,
    ]);

    /// Human-readable name for well-known types
    pub fn known_name(&self) -> Option<&'static str> {
        match *self {
            Self::UNUSED => Some("Unused"),
            Self::EFI_SYSTEM => Some("EFI System"),
            Self::APPLE_HFS => Some("Apple HFS+"),
            Self::APPLE_APFS => Some("Apple APFS"),
            Self::APPLE_BOOT => Some("Apple Boot"),
            Self::MICROSOFT_BASIC_DATA => Some("Microsoft Basic Data"),
            Self::LINUX_FILESYSTEM => Some("Linux filesystem"),
            _ => None,
        }
    }

    /// The GUID in its canonical textual form
    pub fn to_uuid(&self) -> Uuid {
        Uuid::from_bytes_le(self.0)
    }
}

impl fmt::Display for PartitionTypeGuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.known_name() {
            Some(name) => f.write_str(name),
            None => write!(f, "{}", self.to_uuid().hyphenated()),
        }
    }
}

/// GPT partition entry (128 bytes on disk)
#[derive(Debug, Clone)]
pub struct GptPartitionEntry {
    pub partition_type_guid: PartitionTypeGuid,
    pub unique_partition_guid: [u8; 16],
    /// First LBA (inclusive)
    pub first_lba: u64,
    /// Last LBA (inclusive)
    pub last_lba: u64,
    pub attributes: u64,
    /// Partition name (UTF-16LE, up to 36 characters)
    pub name: String,
}

impl GptPartitionEntry {
    /// Size of a partition entry in bytes
    pub const ENTRY_SIZE: usize = 128;

    /// Parse a partition entry, or `None` if fewer than 128 bytes are given
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < Self::ENTRY_SIZE {
            return None;
        }

        Some(Self {
            partition_type_guid: PartitionTypeGuid(guid(bytes, 0)),
            unique_partition_guid: guid(bytes, 16),
            first_lba: le_u64(bytes, 32),
            last_lba: le_u64(bytes, 40),
            attributes: le_u64(bytes, 48),
            name: Self::parse_name(&bytes[56..128]),
        })
    }

    /// Check if this entry is unused
    pub fn is_unused(&self) -> bool {
        self.partition_type_guid == PartitionTypeGuid::UNUSED
    }

    /// Get the size of this partition in LBA sectors
    pub fn size_lba(&self) -> u64 {
        if self.last_lba >= self.first_lba {
            self.last_lba - self.first_lba + 1
        } else {
            0
        }
    }

    fn parse_name(bytes: &[u8]) -> String {
        let units: Vec<u16> = bytes
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .take_while(|&unit| unit != 0)
            .collect();

        String::from_utf16_lossy(&units)
    }
}

/// GPT header
#[derive(Debug, Clone)]
pub struct GptHeader {
    pub signature: [u8; 8],
    pub revision: u32,
    pub header_size: u32,
    pub header_crc32: u32,
    pub current_lba: u64,
    pub backup_lba: u64,
    pub first_usable_lba: u64,
    pub last_usable_lba: u64,
    pub disk_guid: [u8; 16],
    pub partition_entries_lba: u64,
    pub num_partition_entries: u32,
    pub partition_entry_size: u32,
    pub partition_entries_crc32: u32,
}

impl GptHeader {
    /// GPT header signature
    pub const SIGNATURE: &'static [u8; 8] = b"EFI PART";

    /// Typical GPT header size
    pub const HEADER_SIZE: usize = 92;

    /// Parse a GPT header, or `None` if the bytes are short or unsigned
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < Self::HEADER_SIZE || &bytes[0..8] != Self::SIGNATURE {
            return None;
        }

        let mut signature = [0u8; 8];
        signature.copy_from_slice(&bytes[0..8]);

        Some(Self {
            signature,
            revision: le_u32(bytes, 8),
            header_size: le_u32(bytes, 12),
            header_crc32: le_u32(bytes, 16),
            current_lba: le_u64(bytes, 24),
            backup_lba: le_u64(bytes, 32),
            first_usable_lba: le_u64(bytes, 40),
            last_usable_lba: le_u64(bytes, 48),
            disk_guid: guid(bytes, 56),
            partition_entries_lba: le_u64(bytes, 72),
            num_partition_entries: le_u32(bytes, 80),
            partition_entry_size: le_u32(bytes, 84),
            partition_entries_crc32: le_u32(bytes, 88),
        })
    }

    /// Verify the header CRC32, computed with the CRC field zeroed
    pub fn verify_header_crc32(&self, header_bytes: &[u8]) -> bool {
        let size = self.header_size as usize;
        if size < Self::HEADER_SIZE || header_bytes.len() < size {
            return false;
        }

        let mut header_for_crc = header_bytes[..size].to_vec();
        header_for_crc[16..20].fill(0);

        crc32fast::hash(&header_for_crc) == self.header_crc32
    }

    /// Verify the CRC32 of the partition entry array
    pub fn verify_partition_entries_crc32(&self, partition_entries_bytes: &[u8]) -> bool {
        let expected_size = self.num_partition_entries as usize * self.partition_entry_size as usize;

        if partition_entries_bytes.len() < expected_size {
            return false;
        }

        crc32fast::hash(&partition_entries_bytes[..expected_size]) == self.partition_entries_crc32
    }
}
