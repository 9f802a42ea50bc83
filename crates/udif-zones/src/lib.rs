//! # UDIF Zones
//!
//! Classic partition table parsers used when a disk image's own metadata
//! cannot describe its partitions:
//! - **APM**: Apple Partition Map (driver descriptor + `"PM"` entries)
//! - **GPT**: GUID Partition Table, whole-disk or as a detached entry array
//! - **MBR**: Master Boot Record, mostly as the GPT protective MBR
//!
//! ## Example
//!
//! ```rust,no_run
//! use udif_zones::{ApmZoneTable, GptZoneTable};
//! use udif_core::ZoneTable;
//! use std::fs::File;
//!
//! let mut file = File::open("disk.img").unwrap();
//! if ApmZoneTable::is_apple_disk(&mut file) {
//!     let table = ApmZoneTable::parse(&mut file, None).unwrap();
//!     for zone in table.enumerate_zones() {
//!         println!("  {}", zone);
//!     }
//! } else if GptZoneTable::is_gpt_disk(&mut file) {
//!     let table = GptZoneTable::parse(&mut file, 512).unwrap();
//!     println!("{} partitions", table.enumerate_zones().len());
//! }
//! ```

pub mod apm;
pub mod gpt;
pub mod mbr;

pub use apm::ApmZoneTable;
pub use gpt::GptZoneTable;
pub use mbr::MbrZoneTable;
