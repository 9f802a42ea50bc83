//! Forgiving base64 decoding for plist `<data>` fields
//!
//! Real metadata blobs carry line breaks, tabs and occasionally stray bytes
//! inside their base64 text. Anything outside the standard alphabet is
//! skipped, and decoding stops at the first `=`.

use ::base64::alphabet;
use ::base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use ::base64::Engine;
use udif_core::{Error, Result};

/// Standard alphabet, padding optional, non-zero trailing bits accepted
const FORGIVING: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_allow_trailing_bits(true)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

fn is_alphabet(c: u8) -> bool {
    c.is_ascii_alphanumeric() || c == b'+' || c == b'/'
}

/// Decode base64 text, skipping non-alphabet characters
///
/// A trailing group of `k` characters (2 or 3) yields `k - 1` bytes; a lone
/// trailing character yields nothing.
///
/// # Errors
///
/// Returns `Encoding` if no bytes were produced
pub fn decode(input: &str) -> Result<Vec<u8>> {
    let mut text: Vec<u8> = input
        .bytes()
        .take_while(|&c| c != b'=')
        .filter(|&c| is_alphabet(c))
        .collect();

    if text.len() % 4 == 1 {
        text.pop();
    }

    let output = FORGIVING
        .decode(&text)
        .map_err(|e| Error::encoding(format!("base64: {}", e)))?;

    if output.is_empty() {
        return Err(Error::encoding("base64 input produced no data"));
    }

    Ok(output)
}
