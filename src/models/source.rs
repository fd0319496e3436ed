//! Image source type definitions

use serde::{Deserialize, Serialize};

/// Where an image is loaded from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageSource {
    /// Fetched from the remote photo library (cacheable, preloadable)
    #[default]
    Remote,
    /// Read from the local filesystem
    Local,
}

impl ImageSource {
    /// Get the display name
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Remote => "remote",
            Self::Local => "local",
        }
    }

    /// Whether images from this source go through the cache
    pub const fn is_remote(&self) -> bool {
        matches!(self, Self::Remote)
    }
}

impl std::fmt::Display for ImageSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_matches_serde_name() {
        assert_eq!(ImageSource::Remote.to_string(), "remote");
        assert_eq!(ImageSource::Local.to_string(), "local");
        assert_eq!(ImageSource::default(), ImageSource::Remote);
    }

    #[test]
    fn test_serde_lowercase() {
        let json = serde_json::to_string(&ImageSource::Local).unwrap();
        assert_eq!(json, "\"local\"");
        let parsed: ImageSource = serde_json::from_str("\"remote\"").unwrap();
        assert!(parsed.is_remote());
    }
}
