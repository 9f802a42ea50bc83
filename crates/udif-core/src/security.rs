//! Security validation constants and helpers
//!
//! This module defines limits and validation functions that keep parsing of
//! untrusted disk images from exhausting memory or overflowing arithmetic.

use crate::types::SECTOR_SIZE;
use crate::Error;

/// Maximum sector size we'll accept (4KB - common for advanced format)
pub const MAX_SECTOR_SIZE: u32 = 4096;

/// Maximum allocation size for single buffer (256 MB)
pub const MAX_ALLOCATION_SIZE: usize = 256 * 1024 * 1024;

/// Maximum size of the embedded XML metadata blob (64 MB)
pub const MAX_METADATA_SIZE: usize = 64 * 1024 * 1024;

/// Maximum partition count (128 for GPT, padded for safety)
pub const MAX_PARTITION_COUNT: usize = 256;

/// Maximum number of runs in a single block table
pub const MAX_BLOCK_RUN_COUNT: usize = 1_000_000;

/// Maximum file size for memory mapping (16 GB - practical limit for most systems)
pub const MAX_MMAP_SIZE: u64 = 16 * 1024 * 1024 * 1024;

/// Validate that a size is within allocation limits
///
/// # Security
/// Prevents memory exhaustion attacks from malicious disk images
pub fn validate_allocation_size(size: u64, limit: usize, context: &str) -> crate::Result<usize> {
    if size > limit as u64 {
        return Err(Error::invalid_vault(format!(
            "{} size {} exceeds limit {}",
            context, size, limit
        )));
    }

    size.try_into()
        .map_err(|_| Error::invalid_vault(format!("{} size exceeds platform limits", context)))
}

/// Safely multiply two u64 values with overflow checking
///
/// # Security
/// Prevents integer overflow in size calculations
pub fn checked_multiply_u64(a: u64, b: u64, context: &str) -> crate::Result<u64> {
    a.checked_mul(b)
        .ok_or_else(|| Error::invalid_vault(format!("{}: multiplication overflow", context)))
}

/// Convert a 512-byte sector count into bytes
pub fn sectors_to_bytes(sectors: u64, context: &str) -> crate::Result<u64> {
    checked_multiply_u64(sectors, SECTOR_SIZE, context)
}

/// Validate sector size is reasonable
pub fn validate_sector_size(sector_size: u32) -> crate::Result<()> {
    if sector_size == 0 || sector_size > MAX_SECTOR_SIZE {
        return Err(Error::invalid_zone_table(format!(
            "Invalid sector size: {} (must be 1-{})",
            sector_size, MAX_SECTOR_SIZE
        )));
    }

    // Sector size should be power of 2
    if !sector_size.is_power_of_two() {
        return Err(Error::invalid_zone_table(format!(
            "Sector size {} is not a power of 2",
            sector_size
        )));
    }

    Ok(())
}

/// Validate partition index is within bounds
pub fn validate_partition_index(index: usize, max: usize) -> crate::Result<()> {
    if index >= max {
        return Err(Error::not_found(format!(
            "Partition index {} out of range (0-{})",
            index,
            max.saturating_sub(1)
        )));
    }
    Ok(())
}
