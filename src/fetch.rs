//! HTTP downloader for preloading images from the photo library.

use std::sync::Arc;
use std::time::Duration;

use crate::cache::{Completion, Downloader};
use crate::models::ImageDescriptor;

/// Fetches remote images over HTTP(S) with an optional bearer token.
#[derive(Clone)]
pub struct HttpDownloader {
    client: reqwest::Client,
    api_key: Option<String>,
}

impl HttpDownloader {
    /// Create a downloader whose requests give up after `timeout`.
    pub fn new(timeout: Duration, api_key: Option<String>) -> Self {
        // Create a reqwest client for downloading images
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("photoframe/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_default();
        Self { client, api_key }
    }

    /// Wrap in a shared handle for [`ImageCache::preload_images`](crate::cache::ImageCache::preload_images).
    pub fn shared(self) -> Arc<dyn Downloader> {
        Arc::new(self)
    }

    /// Download the raw bytes behind an identifier.
    pub async fn fetch(&self, url: &str) -> Result<Vec<u8>, Box<dyn std::error::Error + Send + Sync>> {
        tracing::debug!("Downloading image: {url}");

        let mut request = self.client.get(url);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        let response = request.send().await?;

        if !response.status().is_success() {
            return Err(format!("HTTP {}", response.status()).into());
        }

        Ok(response.bytes().await?.to_vec())
    }
}

impl Downloader for HttpDownloader {
    fn download(&self, image: ImageDescriptor, done: Completion) {
        let this = self.clone();
        tokio::spawn(async move {
            match this.fetch(&image.identifier).await {
                Ok(bytes) => done.complete(Some(bytes)),
                Err(e) => done.fail(e),
            }
        });
    }
}
