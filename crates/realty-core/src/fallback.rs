use std::collections::HashSet;
use std::path::Path;

use serde::Deserialize;

use crate::listing::ListingRecord;
use crate::ConfigError;

const BUILTIN_FALLBACK_YAML: &str = include_str!("../data/fallback_listings.yaml");

#[derive(Debug, Deserialize)]
pub struct FallbackFile {
    pub listings: Vec<ListingRecord>,
}

/// Load and validate the fallback listing dataset from a YAML file.
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be read, parsed, or fails validation.
pub fn load_fallback_listings(path: &Path) -> Result<Vec<ListingRecord>, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FallbackFileIo {
        path: path.display().to_string(),
        source: e,
    })?;

    parse_fallback_listings(&content)
}

/// Where a loaded fallback dataset came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackSource {
    File,
    Builtin,
}

/// Loads the fallback dataset from `path`, or the compiled-in copy when no
/// file exists there. A file that exists but is invalid is an error.
///
/// # Errors
///
/// Returns `ConfigError` if an existing file cannot be read, parsed, or
/// fails validation.
pub fn load_fallback_or_builtin(
    path: &Path,
) -> Result<(Vec<ListingRecord>, FallbackSource), ConfigError> {
    if path.exists() {
        Ok((load_fallback_listings(path)?, FallbackSource::File))
    } else {
        Ok((builtin_fallback_listings()?, FallbackSource::Builtin))
    }
}

/// The fallback dataset compiled into the binary.
///
/// # Errors
///
/// Returns `ConfigError` only if the embedded YAML is invalid, which the
/// crate's tests rule out.
pub fn builtin_fallback_listings() -> Result<Vec<ListingRecord>, ConfigError> {
    parse_fallback_listings(BUILTIN_FALLBACK_YAML)
}

fn parse_fallback_listings(content: &str) -> Result<Vec<ListingRecord>, ConfigError> {
    let file: FallbackFile = serde_yaml::from_str(content)?;
    validate_listings(&file.listings)?;
    Ok(file.listings)
}

fn validate_listings(listings: &[ListingRecord]) -> Result<(), ConfigError> {
    if listings.is_empty() {
        return Err(ConfigError::Validation(
            "fallback dataset must contain at least one listing".to_string(),
        ));
    }

    let mut seen_ids = HashSet::new();
    for listing in listings {
        if listing.id.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "listing at '{}' has an empty id",
                listing.address
            )));
        }
        if !seen_ids.insert(listing.id.as_str()) {
            return Err(ConfigError::Validation(format!(
                "duplicate listing id: '{}'",
                listing.id
            )));
        }
    }

    Ok(())
}
