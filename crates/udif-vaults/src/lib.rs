//! # UDIF Vaults
//!
//! Byte sources and the Apple UDIF (DMG) container reader.
//!
//! - **RawVault**: a plain file or stream, memory mapped when possible
//! - **DmgVault**: a UDIF disk image resolved into partitions, each readable
//!   through a cached [`DmgPartitionPipeline`]
//!
//! ## Example
//!
//! ```rust,no_run
//! use udif_vaults::factory::{open_image, OpenedImage};
//! use udif_vaults::VaultConfig;
//! use udif_core::ZoneTable;
//! use std::path::Path;
//!
//! # fn main() -> udif_core::Result<()> {
//! if let OpenedImage::Dmg(dmg) = open_image(Path::new("disk.dmg"), VaultConfig::default())? {
//!     println!("{} partitions via {}", dmg.partition_count(), dmg.discovery_path());
//!     for zone in dmg.enumerate_zones() {
//!         println!("  {}", zone);
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod dmg;
pub mod factory;
pub mod raw;

pub use dmg::{DiscoveryPath, DmgPartitionPipeline, DmgVault, KolyBlock};
pub use factory::{detect_vault_type, open_image, open_image_as, supported_formats, OpenedImage, VaultType};
pub use raw::{RawVault, VaultConfig};
