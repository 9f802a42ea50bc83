//! # UDIF Pipeline
//!
//! Read + Seek stream adapters used to present container data as independent streams.
//!
//! - **PartialPipeline**: Window into a subset of a stream (for raw and compressed runs)
//! - **MmapPipeline**: Memory-mapped file access
//! - **SharedPipeline**: Clonable handle onto one byte source, each clone with its own cursor
//! - **CacheZone** / **CachedPipeline**: Bounded page cache shared by many readers
//!
//! ## Example
//!
//! ```rust,no_run
//! use udif_pipeline::{CacheZone, CachedPipeline, MmapPipeline, SharedPipeline};
//! use std::io::Read;
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! let mmap = MmapPipeline::open(Path::new("image.dmg")).unwrap();
//! let length = mmap.len();
//! let shared = SharedPipeline::new(Box::new(mmap), length);
//!
//! let zone = Arc::new(CacheZone::new(16 * 1024 * 1024, 4096));
//! let mut cached = CachedPipeline::new(shared.clone(), length, zone, "whole-file");
//!
//! let mut buf = [0u8; 512];
//! cached.read_exact(&mut buf).unwrap();
//! ```

pub mod cached;
pub mod mmap;
pub mod partial;
pub mod shared;

pub use cached::{CacheStats, CacheZone, CachedPipeline};
pub use mmap::MmapPipeline;
pub use partial::PartialPipeline;
pub use shared::SharedPipeline;
