//! Core types for UDIF

use serde::{Deserialize, Serialize};
use std::fmt;

/// Sector size used by UDIF block tables (always 512 bytes)
pub const SECTOR_SIZE: u64 = 512;

/// Format size in human-readable format
pub fn format_size(size: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = size as f64;
    let mut unit_idx = 0;

    while size >= 1024.0 && unit_idx < UNITS.len() - 1 {
        size /= 1024.0;
        unit_idx += 1;
    }

    if unit_idx == 0 {
        format!("{} {}", size as u64, UNITS[unit_idx])
    } else {
        format!("{:.2} {}", size, UNITS[unit_idx])
    }
}

/// A zone (partition) within a disk image
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Zone {
    /// Index of this zone as reported by its zone table
    pub index: usize,

    /// Display name (e.g., "Apple", "disk image", "EFI System Partition")
    pub name: String,

    /// Scheme-specific partition type tag (e.g., "Apple_HFS", "EFI System")
    pub zone_type: String,

    /// Offset from start of the virtual disk in bytes
    pub offset: u64,

    /// Length of zone in bytes
    pub length: u64,
}

impl Zone {
    /// Create a new zone
    pub fn new(
        index: usize,
        name: impl Into<String>,
        zone_type: impl Into<String>,
        offset: u64,
        length: u64,
    ) -> Self {
        Self {
            index,
            name: name.into(),
            zone_type: zone_type.into(),
            offset,
            length,
        }
    }

    /// Byte offset one past the end of this zone
    pub fn end(&self) -> u64 {
        self.offset.saturating_add(self.length)
    }
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Zone {} \"{}\" [{} @ 0x{:08X}, {}]",
            self.index,
            self.name,
            self.zone_type,
            self.offset,
            format_size(self.length)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(1024), "1.00 KB");
        assert_eq!(format_size(1024 * 1024), "1.00 MB");
        assert_eq!(format_size(1536 * 1024), "1.50 MB");
    }

    #[test]
    fn test_zone_creation() {
        let zone = Zone::new(0, "Apple", "Apple_partition_map", 0x200, 0x7E00);
        assert_eq!(zone.index, 0);
        assert_eq!(zone.name, "Apple");
        assert_eq!(zone.zone_type, "Apple_partition_map");
        assert_eq!(zone.offset, 0x200);
        assert_eq!(zone.length, 0x7E00);
        assert_eq!(zone.end(), 0x8000);
    }

    #[test]
    fn test_zone_display() {
        let zone = Zone::new(1, "disk image", "Apple_HFS", 51200, 102400);
        let text = zone.to_string();
        assert!(text.contains("disk image"));
        assert!(text.contains("Apple_HFS"));
        assert!(text.contains("0x0000C800"));
        assert!(text.contains("100.00 KB"));
    }
}
