//! MBR partition type codes

use std::fmt;

/// MBR partition type byte
///
/// Only the codes that matter when probing disk images are named; any other
/// value is carried through unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MbrPartitionType(pub u8);

impl MbrPartitionType {
    /// Empty/unused partition entry
    pub const EMPTY: Self = Self(0x00);
    /// FAT32, LBA
    pub const FAT32_LBA: Self = Self(0x0C);
    /// Linux native (ext2/ext3/ext4)
    pub const LINUX_NATIVE: Self = Self(0x83);
    /// Apple HFS/HFS+ hybrid marker
    pub const APPLE_HFS: Self = Self(0xAF);
    /// GPT protective MBR
    pub const GPT_PROTECTIVE: Self = Self(0xEE);
    /// EFI system partition
    pub const EFI_SYSTEM: Self = Self(0xEF);

    /// Get a human-readable name for this partition type
    pub fn name(&self) -> &'static str {
        match *self {
            Self::EMPTY => "Empty",
            Self::FAT32_LBA => "FAT32 (LBA)",
            Self::LINUX_NATIVE => "Linux",
            Self::APPLE_HFS => "Apple HFS",
            Self::GPT_PROTECTIVE => "GPT Protective",
            Self::EFI_SYSTEM => "EFI System",
            _ => "Unknown",
        }
    }
}

impl fmt::Display for MbrPartitionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            "Unknown" => write!(f, "Unknown (0x{:02X})", self.0),
            name => write!(f, "{}", name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partition_type_names() {
        assert_eq!(MbrPartitionType(0xEE).name(), "GPT Protective");
        assert_eq!(MbrPartitionType(0xAF).name(), "Apple HFS");
        assert_eq!(MbrPartitionType(0x42).to_string(), "Unknown (0x42)");
    }
}
