//! Image descriptor handed over by the slideshow engine

use serde::{Deserialize, Serialize};

use super::ImageSource;

/// An upcoming slideshow image
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageDescriptor {
    /// URL or path naming the image; the cache key is derived from it
    #[serde(alias = "url", alias = "path")]
    pub identifier: String,
    /// Where the image comes from
    #[serde(default)]
    pub source: ImageSource,
    /// Optional caption
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl ImageDescriptor {
    /// Create a descriptor for an image served by the remote library
    pub fn remote(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            source: ImageSource::Remote,
            title: None,
        }
    }

    /// Create a descriptor for a local file
    pub fn local(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            source: ImageSource::Local,
            title: None,
        }
    }

    /// Whether the image may be fetched from the remote source
    pub const fn is_remote(&self) -> bool {
        self.source.is_remote()
    }

    /// Parse a JSON array of descriptors
    pub fn list_from_json(json: &str) -> serde_json::Result<Vec<Self>> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_from_json_defaults_to_remote() {
        let json = r#"[
            {"identifier": "https://photos.example/api/assets/1/thumbnail"},
            {"path": "/srv/photos/beach.jpg", "source": "local"},
            {"url": "https://photos.example/api/assets/2/thumbnail", "title": "Dunes"}
        ]"#;
        let images = ImageDescriptor::list_from_json(json).unwrap();
        assert_eq!(images.len(), 3);
        assert!(images[0].is_remote());
        assert!(!images[1].is_remote());
        assert_eq!(images[1].identifier, "/srv/photos/beach.jpg");
        assert_eq!(images[2].title.as_deref(), Some("Dunes"));
    }

    #[test]
    fn test_constructors() {
        let img = ImageDescriptor::remote("a");
        assert_eq!(img.source, ImageSource::Remote);
        assert!(img.title.is_none());
        assert!(!ImageDescriptor::local("b").is_remote());
    }
}
