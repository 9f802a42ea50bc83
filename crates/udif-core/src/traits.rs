//! Core traits for UDIF

use crate::types::Zone;
use std::io::{Read, Seek};

/// Trait for vaults (random-access byte sources)
pub trait Vault: Send {
    /// Get a human-readable identifier for this vault type
    fn identify(&self) -> &str;

    /// Get the total size of the vault in bytes
    fn length(&self) -> u64;

    /// Get a readable and seekable stream to the vault content
    fn content(&mut self) -> &mut dyn ReadSeek;

    /// Take ownership of the underlying stream
    fn into_content(self: Box<Self>) -> Box<dyn ReadSeek>;
}

/// Trait for partition lists (zone tables)
pub trait ZoneTable: Send + Sync {
    /// Get a human-readable identifier for this zone table type
    fn identify(&self) -> &str;

    /// Get all zones in discovery order
    fn enumerate_zones(&self) -> &[Zone];

    /// Get a specific zone by position
    fn get_zone(&self, index: usize) -> Option<&Zone> {
        self.enumerate_zones().get(index)
    }
}

/// Combined trait for Read + Seek
pub trait ReadSeek: Read + Seek + Send {}

/// Blanket implementation for any type that implements Read + Seek
impl<T: Read + Seek + Send> ReadSeek for T {}
