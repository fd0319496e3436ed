//! Validated cache settings derived from the user configuration.

use std::path::PathBuf;
use std::time::Duration;

use crate::config::Config;
use crate::error::{CacheError, Result};
use crate::logging::Logger;
use crate::paths;

/// Default ceiling in megabytes
pub const DEFAULT_MAX_SIZE_MB: u64 = 500;
/// Default number of images warmed ahead
pub const DEFAULT_PRELOAD_COUNT: usize = 10;
/// Default pause between preload downloads
pub const DEFAULT_PRELOAD_DELAY: Duration = Duration::from_millis(500);
/// Default per-item preload timeout
pub const DEFAULT_PRELOAD_TIMEOUT: Duration = Duration::from_secs(30);
/// Default fraction of the ceiling eviction shrinks usage to
pub const DEFAULT_HEADROOM: f64 = 0.9;
/// Default lifetime of in-memory index entries
pub const DEFAULT_INDEX_TTL: Duration = Duration::from_secs(60 * 60);

const BYTES_PER_MB: u64 = 1024 * 1024;
/// Largest ceiling whose byte count fits in a `u64`
const MAX_SIZE_MB: u64 = u64::MAX / BYTES_PER_MB;

/// Everything the cache needs to run, already validated.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheSettings {
    /// Caching on or off
    pub enabled: bool,
    /// Directory holding cache files
    pub cache_dir: PathBuf,
    /// Ceiling in megabytes, always > 0
    pub max_size_mb: u64,
    /// Upcoming images to preload
    pub preload_count: usize,
    /// Pause between preload downloads
    pub preload_delay: Duration,
    /// Give up on a single preload download after this long
    pub preload_timeout: Duration,
    /// Eviction target as a fraction of the ceiling, in (0, 1]
    pub headroom: f64,
    /// Soft lifetime of in-memory index entries
    pub index_ttl: Duration,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            cache_dir: paths::default_cache_dir(),
            max_size_mb: DEFAULT_MAX_SIZE_MB,
            preload_count: DEFAULT_PRELOAD_COUNT,
            preload_delay: DEFAULT_PRELOAD_DELAY,
            preload_timeout: DEFAULT_PRELOAD_TIMEOUT,
            headroom: DEFAULT_HEADROOM,
            index_ttl: DEFAULT_INDEX_TTL,
        }
    }
}

impl CacheSettings {
    /// Build settings from the config, replacing invalid values with defaults.
    pub fn from_config(config: &Config, logger: &dyn Logger) -> Self {
        let max_size_mb = or_default(
            check_max_size(config.image_cache_max_size),
            DEFAULT_MAX_SIZE_MB,
            logger,
        );
        let headroom = or_default(
            check_headroom(config.image_cache_headroom),
            DEFAULT_HEADROOM,
            logger,
        );
        let preload_timeout = or_default(
            check_timeout(config.image_cache_preload_timeout),
            DEFAULT_PRELOAD_TIMEOUT,
            logger,
        );

        Self {
            enabled: config.enable_image_cache,
            cache_dir: config
                .image_cache_dir
                .clone()
                .unwrap_or_else(paths::default_cache_dir),
            max_size_mb,
            preload_count: config.image_cache_preload_count,
            preload_delay: Duration::from_millis(config.image_cache_preload_delay),
            preload_timeout,
            headroom,
            index_ttl: Duration::from_secs(config.image_cache_index_ttl),
        }
    }

    /// Ceiling in bytes
    pub const fn max_size_bytes(&self) -> u64 {
        self.max_size_mb.saturating_mul(BYTES_PER_MB)
    }

    /// Use a different cache directory
    pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = dir.into();
        self
    }
}

fn or_default<T>(checked: Result<T>, default: T, logger: &dyn Logger) -> T {
    checked.unwrap_or_else(|e| {
        logger.warn(&format!("{e}, using default"));
        default
    })
}

fn check_max_size(mb: i64) -> Result<u64> {
    match u64::try_from(mb) {
        Ok(mb) if mb > 0 && mb <= MAX_SIZE_MB => Ok(mb),
        _ => Err(CacheError::Config(format!(
            "image_cache_max_size must be between 1 and {MAX_SIZE_MB} MB, got {mb}"
        ))),
    }
}

fn check_headroom(headroom: f64) -> Result<f64> {
    if headroom > 0.0 && headroom <= 1.0 {
        Ok(headroom)
    } else {
        Err(CacheError::Config(format!(
            "image_cache_headroom must be in (0, 1], got {headroom}"
        )))
    }
}

fn check_timeout(secs: u64) -> Result<Duration> {
    if secs == 0 {
        Err(CacheError::Config(
            "image_cache_preload_timeout must be positive".into(),
        ))
    } else {
        Ok(Duration::from_secs(secs))
    }
}
