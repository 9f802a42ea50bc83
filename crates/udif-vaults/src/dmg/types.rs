//! UDIF on-disk structures: the koly trailer and mish block tables
//!
//! All multi-byte fields are big-endian.

use std::fmt;
use udif_core::{Error, Result};

fn be_u32(data: &[u8], offset: usize) -> u32 {
    let mut raw = [0u8; 4];
    raw.copy_from_slice(&data[offset..offset + 4]);
    u32::from_be_bytes(raw)
}

fn be_u64(data: &[u8], offset: usize) -> u64 {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&data[offset..offset + 8]);
    u64::from_be_bytes(raw)
}

/// UDIF checksum descriptor (type, size in bits, up to 128 bytes of data)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UdifChecksum {
    pub checksum_type: u32,
    pub bit_count: u32,
    pub data: [u8; 128],
}

impl UdifChecksum {
    fn from_bytes(data: &[u8], offset: usize) -> Self {
        let mut raw = [0u8; 128];
        raw.copy_from_slice(&data[offset + 8..offset + 136]);
        Self {
            checksum_type: be_u32(data, offset),
            bit_count: be_u32(data, offset + 4),
            data: raw,
        }
    }
}

/// The 512-byte trailer at the end of every UDIF container
///
/// # Structure
///
/// ```text
/// Offset  Size  Field
/// ------  ----  -----
/// 0       4     Magic "koly"
/// 4       4     Version
/// 8       4     Header size (512)
/// 12      4     Flags
/// 16      8     Running data fork offset
/// 24      8     Data fork offset
/// 32      8     Data fork length
/// 40      8     Resource fork offset
/// 48      8     Resource fork length
/// 56      4     Segment number
/// 60      4     Segment count
/// 64      16    Segment ID
/// 80      136   Data fork checksum
/// 216     8     XML plist offset
/// 224     8     XML plist length
/// 232     120   Reserved
/// 352     136   Master checksum
/// 488     4     Image variant
/// 492     8     Sector count
/// 500     12    Reserved
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KolyBlock {
    pub version: u32,
    pub header_size: u32,
    pub flags: u32,
    pub running_data_fork_offset: u64,
    pub data_fork_offset: u64,
    pub data_fork_length: u64,
    pub rsrc_fork_offset: u64,
    pub rsrc_fork_length: u64,
    pub segment_number: u32,
    pub segment_count: u32,
    pub segment_id: [u8; 16],
    pub data_checksum: UdifChecksum,
    /// Offset of the embedded XML property list
    pub plist_offset: u64,
    /// Length of the embedded XML property list
    pub plist_length: u64,
    pub master_checksum: UdifChecksum,
    pub image_variant: u32,
    pub sector_count: u64,
}

impl KolyBlock {
    /// Trailer magic
    pub const MAGIC: &'static [u8; 4] = b"koly";

    /// Size of the trailer in bytes
    pub const SIZE: usize = 512;

    /// Decode a trailer
    ///
    /// # Errors
    ///
    /// Returns `InvalidVault` if fewer than 512 bytes are given or the magic is wrong
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < Self::SIZE {
            return Err(Error::invalid_vault(format!(
                "KOLY block too short: {} bytes",
                data.len()
            )));
        }

        if &data[0..4] != Self::MAGIC {
            return Err(Error::invalid_vault("Invalid KOLY block signature"));
        }

        let mut segment_id = [0u8; 16];
        segment_id.copy_from_slice(&data[64..80]);

        Ok(Self {
            version: be_u32(data, 4),
            header_size: be_u32(data, 8),
            flags: be_u32(data, 12),
            running_data_fork_offset: be_u64(data, 16),
            data_fork_offset: be_u64(data, 24),
            data_fork_length: be_u64(data, 32),
            rsrc_fork_offset: be_u64(data, 40),
            rsrc_fork_length: be_u64(data, 48),
            segment_number: be_u32(data, 56),
            segment_count: be_u32(data, 60),
            segment_id,
            data_checksum: UdifChecksum::from_bytes(data, 80),
            plist_offset: be_u64(data, 216),
            plist_length: be_u64(data, 224),
            master_checksum: UdifChecksum::from_bytes(data, 352),
            image_variant: be_u32(data, 488),
            sector_count: be_u64(data, 492),
        })
    }

    /// Check the magic of a candidate trailer without decoding it
    pub fn has_magic(data: &[u8]) -> bool {
        data.len() >= 4 && &data[0..4] == Self::MAGIC
    }
}

/// Run (chunk) types found in a block table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockType {
    ZeroFill,
    Raw,
    Ignore,
    Adc,
    Zlib,
    Bzip2,
    Lzfse,
    Lzvn,
    Comment,
    End,
    Unknown(u32),
}

impl From<u32> for BlockType {
    fn from(value: u32) -> Self {
        match value {
            0x0000_0000 => BlockType::ZeroFill,
            0x0000_0001 => BlockType::Raw,
            0x0000_0002 => BlockType::Ignore,
            0x8000_0004 => BlockType::Adc,
            0x8000_0005 => BlockType::Zlib,
            0x8000_0006 => BlockType::Bzip2,
            0x8000_0007 => BlockType::Lzfse,
            0x8000_0008 => BlockType::Lzvn,
            0x7FFF_FFFE => BlockType::Comment,
            0xFFFF_FFFF => BlockType::End,
            other => BlockType::Unknown(other),
        }
    }
}

impl From<BlockType> for u32 {
    fn from(value: BlockType) -> Self {
        match value {
            BlockType::ZeroFill => 0x0000_0000,
            BlockType::Raw => 0x0000_0001,
            BlockType::Ignore => 0x0000_0002,
            BlockType::Adc => 0x8000_0004,
            BlockType::Zlib => 0x8000_0005,
            BlockType::Bzip2 => 0x8000_0006,
            BlockType::Lzfse => 0x8000_0007,
            BlockType::Lzvn => 0x8000_0008,
            BlockType::Comment => 0x7FFF_FFFE,
            BlockType::End => 0xFFFF_FFFF,
            BlockType::Unknown(other) => other,
        }
    }
}

impl fmt::Display for BlockType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockType::ZeroFill => write!(f, "zero-fill"),
            BlockType::Raw => write!(f, "raw"),
            BlockType::Ignore => write!(f, "ignore"),
            BlockType::Adc => write!(f, "ADC"),
            BlockType::Zlib => write!(f, "zlib"),
            BlockType::Bzip2 => write!(f, "bzip2"),
            BlockType::Lzfse => write!(f, "LZFSE"),
            BlockType::Lzvn => write!(f, "LZVN"),
            BlockType::Comment => write!(f, "comment"),
            BlockType::End => write!(f, "end"),
            BlockType::Unknown(code) => write!(f, "unknown (0x{:08X})", code),
        }
    }
}

/// One run of a block table
///
/// `sector_number` is relative to the table's first sector;
/// `compressed_offset` is relative to the table's data offset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockRun {
    pub block_type: BlockType,
    pub comment: u32,
    pub sector_number: u64,
    pub sector_count: u64,
    pub compressed_offset: u64,
    pub compressed_length: u64,
}

impl BlockRun {
    /// Size of a run record in bytes
    pub const SIZE: usize = 40;

    fn from_bytes(data: &[u8]) -> Self {
        Self {
            block_type: BlockType::from(be_u32(data, 0)),
            comment: be_u32(data, 4),
            sector_number: be_u64(data, 8),
            sector_count: be_u64(data, 16),
            compressed_offset: be_u64(data, 24),
            compressed_length: be_u64(data, 32),
        }
    }

    /// Whether this run describes sectors (as opposed to a marker)
    pub fn has_data(&self) -> bool {
        !matches!(self.block_type, BlockType::Comment | BlockType::End) && self.sector_count > 0
    }
}

/// A decoded block table ("mish" structure from a blkx Data field)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlkxTable {
    pub version: u32,
    /// First sector of the partition on the virtual disk
    pub first_sector_number: u64,
    /// Number of 512-byte sectors in the partition
    pub sector_count: u64,
    /// Base offset of run data in the container
    pub data_offset: u64,
    pub buffers_needed: u32,
    pub block_descriptors: u32,
    pub checksum: UdifChecksum,
    pub runs: Vec<BlockRun>,
}

impl BlkxTable {
    /// Table magic
    pub const MAGIC: &'static [u8; 4] = b"mish";

    /// Size of the fixed header, including the run count
    pub const HEADER_SIZE: usize = 204;

    /// Decode a block table
    ///
    /// Runs beyond the end of `data` are dropped with a warning.
    ///
    /// # Errors
    ///
    /// Returns `InvalidVault` if the header is short, the magic is wrong, or the
    /// run count exceeds [`udif_core::MAX_BLOCK_RUN_COUNT`]
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < Self::HEADER_SIZE {
            return Err(Error::invalid_vault(format!(
                "Block table too short: {} bytes",
                data.len()
            )));
        }

        if &data[0..4] != Self::MAGIC {
            return Err(Error::invalid_vault("Invalid block table signature"));
        }

        let run_count = be_u32(data, 200) as usize;
        if run_count > udif_core::MAX_BLOCK_RUN_COUNT {
            return Err(Error::invalid_vault(format!(
                "Block table declares {} runs (limit {})",
                run_count,
                udif_core::MAX_BLOCK_RUN_COUNT
            )));
        }

        let available = (data.len() - Self::HEADER_SIZE) / BlockRun::SIZE;
        if available < run_count {
            tracing::warn!(
                "Block table declares {} runs but only {} are present",
                run_count,
                available
            );
        }

        let runs = data[Self::HEADER_SIZE..]
            .chunks_exact(BlockRun::SIZE)
            .take(run_count)
            .map(BlockRun::from_bytes)
            .collect();

        Ok(Self {
            version: be_u32(data, 4),
            first_sector_number: be_u64(data, 8),
            sector_count: be_u64(data, 16),
            data_offset: be_u64(data, 24),
            buffers_needed: be_u32(data, 32),
            block_descriptors: be_u32(data, 36),
            checksum: UdifChecksum::from_bytes(data, 64),
            runs,
        })
    }

    /// Byte offset of the partition on the virtual disk
    pub fn offset(&self) -> Result<u64> {
        udif_core::sectors_to_bytes(self.first_sector_number, "block table first sector")
    }

    /// Byte length of the partition
    pub fn length(&self) -> Result<u64> {
        udif_core::sectors_to_bytes(self.sector_count, "block table sector count")
    }
}

#[cfg(test)]
mod tests {
    use super::super::fixtures;
    use super::*;

    #[test]
    fn test_block_type_conversion() {
        assert_eq!(BlockType::from(0x8000_0005), BlockType::Zlib);
        assert_eq!(BlockType::from(0xFFFF_FFFF), BlockType::End);
        assert_eq!(BlockType::from(0x1234), BlockType::Unknown(0x1234));
        assert_eq!(u32::from(BlockType::Bzip2), 0x8000_0006);
        assert_eq!(BlockType::Lzfse.to_string(), "LZFSE");
    }

    #[test]
    fn test_blkx_table_decode() {
        let data = fixtures::mish(100, 200, 4096, &[(0x8000_0005, 0, 200, 0, 1234), (0xFFFF_FFFF, 200, 0, 1234, 0)]);
        let table = BlkxTable::from_bytes(&data).unwrap();

        assert_eq!(table.first_sector_number, 100);
        assert_eq!(table.sector_count, 200);
        assert_eq!(table.data_offset, 4096);
        assert_eq!(table.offset().unwrap(), 51200);
        assert_eq!(table.length().unwrap(), 102400);
        assert_eq!(table.runs.len(), 2);
        assert_eq!(table.runs[0].block_type, BlockType::Zlib);
        assert_eq!(table.runs[0].compressed_length, 1234);
        assert!(table.runs[0].has_data());
        assert!(!table.runs[1].has_data());
    }

    #[test]
    fn test_blkx_table_rejects_bad_signature() {
        let mut data = fixtures::mish(0, 1, 4096, &[]);
        data[0] = b'x';
        assert!(matches!(BlkxTable::from_bytes(&data), Err(Error::InvalidVault(_))));
        assert!(matches!(BlkxTable::from_bytes(&data[..100]), Err(Error::InvalidVault(_))));
    }

    #[test]
    fn test_blkx_table_truncated_runs() {
        let mut data = fixtures::mish(0, 20, 4096, &[(1, 0, 10, 0, 5120), (1, 10, 10, 5120, 5120)]);
        data.truncate(BlkxTable::HEADER_SIZE + BlockRun::SIZE + 7);

        let table = BlkxTable::from_bytes(&data).unwrap();
        assert_eq!(table.runs.len(), 1);
    }

    #[test]
    fn test_blkx_table_sector_overflow() {
        let data = fixtures::mish(u64::MAX / 2, 1, 4096, &[]);
        let table = BlkxTable::from_bytes(&data).unwrap();
        assert!(table.offset().is_err());
    }

    #[test]
    fn test_koly_decode() {
        let mut data = vec![0u8; 512];
        data[0..4].copy_from_slice(b"koly");
        data[4..8].copy_from_slice(&4u32.to_be_bytes());
        data[8..12].copy_from_slice(&512u32.to_be_bytes());
        data[216..224].copy_from_slice(&0x1000u64.to_be_bytes());
        data[224..232].copy_from_slice(&0x2a0u64.to_be_bytes());
        data[352..356].copy_from_slice(&2u32.to_be_bytes());
        data[356..360].copy_from_slice(&32u32.to_be_bytes());
        data[360..364].copy_from_slice(&0xDEAD_BEEFu32.to_be_bytes());
        data[488..492].copy_from_slice(&1u32.to_be_bytes());
        data[492..500].copy_from_slice(&2048u64.to_be_bytes());

        let koly = KolyBlock::from_bytes(&data).unwrap();
        assert_eq!(koly.version, 4);
        assert_eq!(koly.header_size, 512);
        assert_eq!(koly.plist_offset, 0x1000);
        assert_eq!(koly.plist_length, 0x2a0);
        assert_eq!(koly.master_checksum.checksum_type, 2);
        assert_eq!(koly.master_checksum.bit_count, 32);
        assert_eq!(&koly.master_checksum.data[0..4], &[0xDE, 0xAD, 0xBE, 0xEF]);
        assert_eq!(koly.image_variant, 1);
        assert_eq!(koly.sector_count, 2048);
    }

    #[test]
    fn test_koly_reserved_area_is_ignored() {
        let mut data = vec![0u8; 512];
        data[0..4].copy_from_slice(b"koly");
        for byte in &mut data[232..352] {
            *byte = 0xFF;
        }
        data[488..492].copy_from_slice(&2u32.to_be_bytes());
        data[492..500].copy_from_slice(&0x0010_0000u64.to_be_bytes());
        for byte in &mut data[500..512] {
            *byte = 0xFF;
        }

        let koly = KolyBlock::from_bytes(&data).unwrap();
        assert_eq!(koly.master_checksum.checksum_type, 0);
        assert_eq!(koly.master_checksum.bit_count, 0);
        assert_eq!(koly.image_variant, 2);
        assert_eq!(koly.sector_count, 0x0010_0000);
    }

    #[test]
    fn test_koly_rejects_bad_magic_and_short_input() {
        let mut data = vec![0u8; 512];
        data[0..4].copy_from_slice(b"kolx");
        assert!(matches!(KolyBlock::from_bytes(&data), Err(Error::InvalidVault(_))));
        assert!(matches!(KolyBlock::from_bytes(b"koly"), Err(Error::InvalidVault(_))));
        assert!(KolyBlock::has_magic(b"koly"));
        assert!(!KolyBlock::has_magic(b"ko"));
    }
}
