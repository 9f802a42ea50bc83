//! Partition reader: executes a block table's run list over the container

use super::types::{BlkxTable, BlockRun, BlockType};
use bzip2::read::BzDecoder;
use flate2::read::ZlibDecoder;
use std::io::{self, Read, Seek, SeekFrom};
use udif_core::{Error, Result, SECTOR_SIZE};
use udif_pipeline::{PartialPipeline, SharedPipeline};

/// Decoded contents of the most recently used run
struct RunCache {
    run: Option<usize>,
    data: Vec<u8>,
}

/// A `Read + Seek` view of one partition, reconstructed from its block table
///
/// The virtual length is `sector_count x 512`. Zero-fill and ignored runs read
/// as zeros, raw runs are copied, zlib and bzip2 runs are inflated. Sectors no
/// run covers also read as zeros. The last decoded run stays in memory, so
/// sequential reads decode each run once.
pub struct DmgPartitionPipeline {
    container: SharedPipeline,
    data_offset: u64,
    /// Runs that carry sectors, ordered by start sector
    runs: Vec<BlockRun>,
    length: u64,
    position: u64,
    cache: RunCache,
}

impl DmgPartitionPipeline {
    /// Build a reader over `table`, reading run data from `container`
    ///
    /// # Errors
    ///
    /// Returns `InvalidVault` if the table's size overflows
    pub fn new(container: SharedPipeline, table: &BlkxTable) -> Result<Self> {
        let length = table.length()?;

        let mut runs: Vec<BlockRun> = table.runs.iter().filter(|run| run.has_data()).cloned().collect();
        runs.sort_by_key(|run| run.sector_number);

        Ok(Self {
            container,
            data_offset: table.data_offset,
            runs,
            length,
            position: 0,
            cache: RunCache {
                run: None,
                data: Vec::new(),
            },
        })
    }

    /// Virtual length in bytes
    pub fn length(&self) -> u64 {
        self.length
    }

    fn run_start(run: &BlockRun) -> u64 {
        run.sector_number.saturating_mul(SECTOR_SIZE)
    }

    fn run_end(run: &BlockRun) -> u64 {
        run.sector_number
            .saturating_add(run.sector_count)
            .saturating_mul(SECTOR_SIZE)
    }

    /// Index of the run covering `offset`, or the start of the next run if none does
    fn locate(&self, offset: u64) -> (Option<usize>, u64) {
        let next = self.runs.partition_point(|run| Self::run_end(run) <= offset);

        match self.runs.get(next) {
            Some(run) if Self::run_start(run) <= offset => (Some(next), Self::run_end(run)),
            Some(run) => (None, Self::run_start(run)),
            None => (None, self.length),
        }
    }

    fn decode_run(&self, index: usize) -> Result<Vec<u8>> {
        let run = &self.runs[index];
        let size = udif_core::validate_allocation_size(
            run.sector_count.saturating_mul(SECTOR_SIZE),
            udif_core::MAX_ALLOCATION_SIZE,
            "block run",
        )?;

        let start = self
            .data_offset
            .checked_add(run.compressed_offset)
            .ok_or_else(|| Error::invalid_vault("Run data offset overflow"))?;
        let source = PartialPipeline::new(self.container.clone(), start, run.compressed_length);

        let mut data = Vec::with_capacity(size);
        match run.block_type {
            BlockType::ZeroFill | BlockType::Ignore => {}
            BlockType::Raw => {
                source.take(size as u64).read_to_end(&mut data)?;
            }
            BlockType::Zlib => {
                ZlibDecoder::new(source).take(size as u64).read_to_end(&mut data)?;
            }
            BlockType::Bzip2 => {
                BzDecoder::new(source).take(size as u64).read_to_end(&mut data)?;
            }
            other => {
                return Err(Error::unsupported(format!(
                    "{} compressed runs are not supported",
                    other
                )));
            }
        }

        if data.len() < size {
            tracing::debug!(
                "Run {} ({}) produced {} of {} bytes, padding with zeros",
                index,
                run.block_type,
                data.len(),
                size
            );
            data.resize(size, 0);
        }

        Ok(data)
    }

    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        if offset >= self.length || buf.is_empty() {
            return Ok(0);
        }

        let (run, end) = self.locate(offset);
        let end = end.min(self.length);
        let to_read = (buf.len() as u64).min(end - offset) as usize;

        let index = match run {
            Some(index) => index,
            None => {
                buf[..to_read].fill(0);
                return Ok(to_read);
            }
        };

        if matches!(self.runs[index].block_type, BlockType::ZeroFill | BlockType::Ignore) {
            buf[..to_read].fill(0);
            return Ok(to_read);
        }

        if self.cache.run != Some(index) {
            self.cache.data = self.decode_run(index)?;
            self.cache.run = Some(index);
        }

        let run_offset = (offset - Self::run_start(&self.runs[index])) as usize;
        buf[..to_read].copy_from_slice(&self.cache.data[run_offset..run_offset + to_read]);
        Ok(to_read)
    }
}

impl Read for DmgPartitionPipeline {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let bytes_read = self.read_at(self.position, buf).map_err(Error::into_io)?;
        self.position += bytes_read as u64;
        Ok(bytes_read)
    }
}

impl Seek for DmgPartitionPipeline {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let new_pos = match pos {
            SeekFrom::Start(offset) => offset as i128,
            SeekFrom::End(offset) => self.length as i128 + offset as i128,
            SeekFrom::Current(offset) => self.position as i128 + offset as i128,
        };

        if new_pos < 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "Seek before beginning of partition",
            ));
        }

        self.position = new_pos as u64;
        Ok(self.position)
    }
}
