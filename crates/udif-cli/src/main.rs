//! udif - inspect Apple disk images
//!
//! Lists the partitions of a DMG (or a raw MBR/GPT image) and extracts them.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;
use udif_core::{format_size, ReadSeek, Vault, Zone, ZoneTable};
use udif_pipeline::PartialPipeline;
use udif_vaults::factory::{open_image, OpenedImage};
use udif_vaults::{DmgVault, RawVault, VaultConfig};
use udif_zones::{GptZoneTable, MbrZoneTable};

const SECTOR_SIZE: u32 = 512;

#[derive(Parser)]
#[command(name = "udif")]
#[command(about = "Apple UDIF disk image reader", long_about = None)]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(long, default_value = "warn", global = true)]
    log_level: String,

    /// Read the image through regular file I/O instead of a memory map
    #[arg(long, global = true)]
    no_mmap: bool,

    /// Byte capacity of the partition reader cache
    #[arg(long, global = true)]
    cache_capacity: Option<u64>,
}

#[derive(Subcommand)]
enum Command {
    /// Show container information
    Info {
        image: PathBuf,
    },

    /// List partitions
    Zones {
        image: PathBuf,

        /// Print the partition list as JSON
        #[arg(long)]
        json: bool,
    },

    /// Write one partition's contents to a file
    Extract {
        image: PathBuf,

        /// Position in the partition list
        index: usize,

        output: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();

    let mut config = VaultConfig {
        use_mmap: !cli.no_mmap,
        ..VaultConfig::default()
    };
    if let Some(capacity) = cli.cache_capacity {
        config.cache_capacity = capacity;
    }

    match cli.command {
        Command::Info { image } => cmd_info(&image, config),
        Command::Zones { image, json } => cmd_zones(&image, config, json),
        Command::Extract { image, index, output } => cmd_extract(&image, config, index, &output),
    }
}

fn open(path: &Path, config: VaultConfig) -> Result<OpenedImage> {
    open_image(path, config).with_context(|| format!("Cannot open {}", path.display()))
}

/// Partition table of a raw image: GPT behind a protective MBR, else MBR
fn raw_zones(vault: &mut RawVault) -> Result<(String, Vec<Zone>)> {
    let mbr = MbrZoneTable::parse(vault.content(), SECTOR_SIZE)
        .context("No recognized partition table found")?;

    if mbr.is_gpt_protective() {
        let gpt = GptZoneTable::parse(vault.content(), SECTOR_SIZE)?;
        return Ok((gpt.identify().to_string(), gpt.enumerate_zones().to_vec()));
    }

    Ok((mbr.identify().to_string(), mbr.enumerate_zones().to_vec()))
}

fn cmd_info(path: &Path, config: VaultConfig) -> Result<()> {
    println!("=== Image Information ===");
    println!("Path:        {}", path.display());

    match open(path, config)? {
        OpenedImage::Dmg(dmg) => {
            let koly = dmg.koly();
            println!("Type:        {}", dmg.identify());
            println!("Size:        {}", format_size(dmg.container_length()));
            println!();
            println!("=== KOLY Trailer ===");
            println!("Version:     {}", koly.version);
            println!("Flags:       0x{:08X}", koly.flags);
            println!("Data fork:   {} + {}", koly.data_fork_offset, format_size(koly.data_fork_length));
            println!("Metadata:    {} + {}", koly.plist_offset, format_size(koly.plist_length));
            println!("Segment:     {} of {}", koly.segment_number, koly.segment_count);
            println!("Variant:     {}", koly.image_variant);
            println!("Disk size:   {} ({} sectors)", format_size(koly.sector_count.saturating_mul(512)), koly.sector_count);
            println!();
            println!("=== Partitions ===");
            println!("Source:      {}", dmg.discovery_path());
            println!("Count:       {}", dmg.partition_count());
        }
        OpenedImage::Raw(mut raw) => {
            println!("Type:        {}", raw.identify());
            println!("Size:        {}", format_size(raw.length()));
            println!();

            match raw_zones(&mut raw) {
                Ok((scheme, zones)) => {
                    println!("=== Partitions ===");
                    println!("Source:      {}", scheme);
                    println!("Count:       {}", zones.len());
                }
                Err(e) => println!("{}", e),
            }
        }
    }

    Ok(())
}

fn cmd_zones(path: &Path, config: VaultConfig, json: bool) -> Result<()> {
    let (source, zones) = match open(path, config)? {
        OpenedImage::Dmg(dmg) => (dmg.discovery_path().to_string(), dmg.enumerate_zones().to_vec()),
        OpenedImage::Raw(mut raw) => raw_zones(&mut raw)?,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&zones)?);
        return Ok(());
    }

    println!("Partition list from {}", source);
    println!();

    if zones.is_empty() {
        println!("No partitions found.");
        return Ok(());
    }

    println!("{:<5} {:<24} {:<24} {:>14} {:>12}", "Index", "Name", "Type", "Offset", "Size");
    println!("{}", "-".repeat(83));

    for zone in &zones {
        println!(
            "{:<5} {:<24} {:<24} {:>14} {:>12}",
            zone.index,
            zone.name,
            zone.zone_type,
            zone.offset,
            format_size(zone.length)
        );
    }

    Ok(())
}

fn cmd_extract(path: &Path, config: VaultConfig, index: usize, output: &Path) -> Result<()> {
    let (zone, mut reader): (Zone, Box<dyn ReadSeek>) = match open(path, config)? {
        OpenedImage::Dmg(dmg) => {
            let zone = partition(&dmg, index)?;
            (zone, dmg.reader_for_partition(index)?)
        }
        OpenedImage::Raw(mut raw) => {
            let (_, zones) = raw_zones(&mut raw)?;
            let zone = match zones.get(index) {
                Some(zone) => zone.clone(),
                None => bail!("Partition {} does not exist ({} partitions)", index, zones.len()),
            };
            let content = Box::new(raw).into_content();
            let window = PartialPipeline::new(content, zone.offset, zone.length);
            (zone, Box::new(window))
        }
    };

    let file = File::create(output).with_context(|| format!("Cannot create {}", output.display()))?;
    let mut writer = BufWriter::new(file);

    tracing::info!("Extracting {} ({}) to {}", zone.name, format_size(zone.length), output.display());
    let written = io::copy(&mut reader, &mut writer)?;
    writer.flush()?;

    println!("Wrote {} ({}) to {}", zone.name, format_size(written), output.display());
    Ok(())
}

fn partition(dmg: &DmgVault, index: usize) -> Result<Zone> {
    match dmg.get_zone(index) {
        Some(zone) => Ok(zone.clone()),
        None => bail!("Partition {} does not exist ({} partitions)", index, dmg.partition_count()),
    }
}
