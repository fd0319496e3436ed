//! Common paths for Photoframe data storage
//!
//! All Photoframe data is stored under ~/.config/photoframe/ on all platforms:
//! - config.toml - User configuration
//! - image-cache/ - Cached image payloads, one file per key

use anyhow::{Context, Result};
use std::fs;
use std::path::PathBuf;

/// Name of the cache directory inside the data directory
pub const CACHE_DIR_NAME: &str = "image-cache";

/// Get the Photoframe data directory (~/.config/photoframe/)
///
/// This is consistent across all platforms for simplicity.
pub fn photoframe_dir() -> Result<PathBuf> {
    let home = dirs::home_dir().context("Could not determine home directory")?;
    let dir = home.join(".config").join("photoframe");
    fs::create_dir_all(&dir).context("Failed to create photoframe directory")?;
    Ok(dir)
}

/// Get the config file path (~/.config/photoframe/config.toml)
pub fn config_path() -> Result<PathBuf> {
    Ok(photoframe_dir()?.join("config.toml"))
}

/// Default image cache directory (~/.config/photoframe/image-cache)
///
/// Does not touch the filesystem; the cache store creates it on open. Falls
/// back to the system temp directory when there is no home directory.
pub fn default_cache_dir() -> PathBuf {
    dirs::home_dir().map_or_else(
        || std::env::temp_dir().join("photoframe").join(CACHE_DIR_NAME),
        |home| home.join(".config").join("photoframe").join(CACHE_DIR_NAME),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_cache_dir_name() {
        let dir = default_cache_dir();
        assert!(dir.ends_with(CACHE_DIR_NAME));
        assert!(dir.parent().unwrap().ends_with("photoframe"));
    }
}
