//! Error types for the image cache

use std::path::PathBuf;
use std::time::Duration;

/// Errors raised inside the cache subsystem.
///
/// These never reach the slideshow engine: the [`ImageCache`](crate::cache::ImageCache)
/// facade logs them and falls back to a miss or `false`.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// Filesystem operation failed
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        /// File or directory being accessed
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Downloader reported a failure or returned nothing
    #[error("download failed: {0}")]
    Download(String),

    /// Downloader did not complete in time
    #[error("download timed out after {0:?}")]
    Timeout(Duration),

    /// Invalid configuration value
    #[error("configuration error: {0}")]
    Config(String),
}

impl CacheError {
    /// Wrap an I/O error with the path it happened on.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result alias for cache operations
pub type Result<T> = std::result::Result<T, CacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_display_includes_path() {
        let err = CacheError::io(
            "/tmp/cache/abc",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        let msg = err.to_string();
        assert!(msg.contains("/tmp/cache/abc"));
        assert!(msg.contains("denied"));
    }

    #[test]
    fn test_config_display() {
        let err = CacheError::Config("image_cache_headroom must be in (0, 1], got 2".into());
        assert_eq!(
            err.to_string(),
            "configuration error: image_cache_headroom must be in (0, 1], got 2"
        );
    }

    #[test]
    fn test_timeout_display() {
        let err = CacheError::Timeout(Duration::from_secs(30));
        assert_eq!(err.to_string(), "download timed out after 30s");
    }
}
