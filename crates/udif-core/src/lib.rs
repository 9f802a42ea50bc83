//! # UDIF Core
//!
//! Core traits, types, and error handling shared by the UDIF workspace.
//!
//! This crate provides the foundational abstractions for working with Apple disk images:
//! - **Vaults**: Byte sources a disk image is read from (raw files, in-memory streams)
//! - **Zones**: Partitions resolved from a container or a classic partition table
//! - **Zone tables**: Anything that can enumerate zones (DMG metadata, APM, GPT, MBR)
//!
//! ## Terminology
//!
//! - **Vault** = Random-access byte source with a known length
//! - **Zone** = Partition (name, type, byte offset, byte length)
//! - **Zone table** = Partition list producer
//! - **Pipeline** = Read + Seek stream adapter
//!
//! ## Example
//!
//! ```rust,no_run
//! use udif_core::{Vault, ZoneTable, Result};
//!
//! fn describe(vault: &dyn Vault, table: &dyn ZoneTable) -> Result<()> {
//!     println!("Vault: {} ({} bytes)", vault.identify(), vault.length());
//!     for zone in table.enumerate_zones() {
//!         println!("  {}", zone);
//!     }
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod security;
pub mod traits;
pub mod types;

// Re-export commonly used items
pub use error::{Error, Result};
pub use security::*;
pub use traits::{ReadSeek, Vault, ZoneTable};
pub use types::{format_size, Zone, SECTOR_SIZE};
