//! Vault factory for automatic format detection

use crate::{DmgVault, RawVault, VaultConfig};
use std::fs::File;
use std::path::Path;
use udif_core::Result;

/// Detected vault type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VaultType {
    /// Apple UDIF disk image (.dmg)
    Dmg,
    /// Raw sector image (.img, .dsk, .iso, etc.)
    Raw,
}

impl VaultType {
    /// Get a human-readable name for this vault type
    pub fn name(&self) -> &'static str {
        match self {
            VaultType::Dmg => "Apple Disk Image",
            VaultType::Raw => "Raw Sector Image",
        }
    }
}

/// An opened image of either kind
pub enum OpenedImage {
    Dmg(DmgVault),
    Raw(RawVault),
}

/// Detect the vault type from a file path
///
/// A `koly` trailer wins regardless of extension; otherwise the extension
/// decides, and anything unrecognised is treated as raw.
pub fn detect_vault_type(path: &Path) -> Result<VaultType> {
    let mut file = File::open(path)?;

    if DmgVault::is_dmg(&mut file) {
        return Ok(VaultType::Dmg);
    }

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase);

    if matches!(extension.as_deref(), Some("dmg") | Some("udif")) {
        tracing::warn!("{} has a DMG extension but no KOLY trailer", path.display());
    }

    Ok(VaultType::Raw)
}

/// Open an image with automatic detection
pub fn open_image(path: &Path, config: VaultConfig) -> Result<OpenedImage> {
    let vault_type = detect_vault_type(path)?;
    open_image_as(path, vault_type, config)
}

/// Open an image with a specific type (skip auto-detection)
pub fn open_image_as(path: &Path, vault_type: VaultType, config: VaultConfig) -> Result<OpenedImage> {
    tracing::debug!("Opening {} as {}", path.display(), vault_type.name());

    match vault_type {
        VaultType::Dmg => Ok(OpenedImage::Dmg(DmgVault::open(path, config)?)),
        VaultType::Raw => Ok(OpenedImage::Raw(RawVault::open(path, config)?)),
    }
}

/// Get information about supported vault types
pub fn supported_formats() -> Vec<(&'static str, &'static [&'static str])> {
    vec![
        ("Apple Disk Image", &["dmg", "udif"]),
        ("Raw Sector Image", &["img", "ima", "dsk", "iso", "bin", "raw", "dd"]),
    ]
}
