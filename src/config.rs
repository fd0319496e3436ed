//! Configuration module for Photoframe

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::cache::CacheSettings;
use crate::logging::Logger;
use crate::paths;

/// Application configuration
///
/// Keys are snake_case; the camelCase names used by the slideshow's own
/// settings file are accepted as aliases.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Keep downloaded images on disk
    #[serde(default = "default_enable_image_cache", alias = "enableImageCache")]
    pub enable_image_cache: bool,

    /// Cache ceiling in megabytes (values <= 0 fall back to the default)
    #[serde(default = "default_image_cache_max_size", alias = "imageCacheMaxSize")]
    pub image_cache_max_size: i64,

    /// Number of upcoming images to preload
    #[serde(
        default = "default_image_cache_preload_count",
        alias = "imageCachePreloadCount"
    )]
    pub image_cache_preload_count: usize,

    /// Milliseconds between preload downloads
    #[serde(
        default = "default_image_cache_preload_delay",
        alias = "imageCachePreloadDelay"
    )]
    pub image_cache_preload_delay: u64,

    /// Seconds before a single preload download is abandoned
    #[serde(
        default = "default_image_cache_preload_timeout",
        alias = "imageCachePreloadTimeout"
    )]
    pub image_cache_preload_timeout: u64,

    /// Fraction of the ceiling eviction shrinks usage to
    #[serde(default = "default_image_cache_headroom", alias = "imageCacheHeadroom")]
    pub image_cache_headroom: f64,

    /// Seconds an in-memory index entry stays valid
    #[serde(default = "default_image_cache_index_ttl", alias = "imageCacheIndexTtl")]
    pub image_cache_index_ttl: u64,

    /// Cache directory (default: ~/.config/photoframe/image-cache)
    #[serde(default, alias = "imageCacheDir", skip_serializing_if = "Option::is_none")]
    pub image_cache_dir: Option<PathBuf>,

    /// Bearer token sent when downloading from the photo library
    #[serde(default, alias = "remoteApiKey", skip_serializing_if = "Option::is_none")]
    pub remote_api_key: Option<String>,
}

fn default_enable_image_cache() -> bool {
    true
}

fn default_image_cache_max_size() -> i64 {
    500
}

fn default_image_cache_preload_count() -> usize {
    10
}

fn default_image_cache_preload_delay() -> u64 {
    500
}

fn default_image_cache_preload_timeout() -> u64 {
    30
}

fn default_image_cache_headroom() -> f64 {
    0.9
}

fn default_image_cache_index_ttl() -> u64 {
    3600
}

impl Default for Config {
    fn default() -> Self {
        Self {
            enable_image_cache: default_enable_image_cache(),
            image_cache_max_size: default_image_cache_max_size(),
            image_cache_preload_count: default_image_cache_preload_count(),
            image_cache_preload_delay: default_image_cache_preload_delay(),
            image_cache_preload_timeout: default_image_cache_preload_timeout(),
            image_cache_headroom: default_image_cache_headroom(),
            image_cache_index_ttl: default_image_cache_index_ttl(),
            image_cache_dir: None,
            remote_api_key: None,
        }
    }
}

impl Config {
    /// Get the default config file path
    pub fn default_path() -> Result<PathBuf> {
        paths::config_path()
    }

    /// Load config from the default path or create default
    pub fn load() -> Result<Self> {
        let path = Self::default_path()?;
        Self::load_from(&path)
    }

    /// Load config from a specific path
    pub fn load_from(path: &PathBuf) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path).context("Failed to read config file")?;
            toml::from_str(&content).context("Failed to parse config file")
        } else {
            Ok(Self::default())
        }
    }

    /// Validated cache settings; invalid values are logged and replaced by defaults
    pub fn cache_settings(&self, logger: &dyn Logger) -> CacheSettings {
        CacheSettings::from_config(self, logger)
    }

    /// Save config to a specific path
    pub fn save_to(&self, path: &PathBuf) -> Result<()> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, content).context("Failed to write config file")?;

        Ok(())
    }
}
