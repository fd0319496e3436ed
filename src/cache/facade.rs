//! The image cache as seen by the slideshow.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::OnceCell;

use super::encoding;
use super::preload::{Downloader, PreloadScheduler};
use super::settings::CacheSettings;
use super::store::{CacheEntryInfo, CacheStore};
use crate::logging::SharedLogger;
use crate::models::ImageDescriptor;

/// Snapshot returned by [`ImageCache::get_stats`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Caching is active
    pub enabled: bool,
    /// Ceiling in bytes
    pub max_size_bytes: u64,
    /// Images preloaded ahead
    pub preload_count: usize,
    /// Bytes currently stored
    pub used_bytes: u64,
}

struct Active {
    store: Arc<CacheStore>,
    scheduler: PreloadScheduler,
}

struct Inner {
    settings: CacheSettings,
    logger: SharedLogger,
    /// Set once by `initialize`; `None` means disabled or failed.
    active: OnceCell<Option<Active>>,
}

/// Cache facade used by the slideshow engine.
///
/// Never fails loudly: when disabled, not initialized, or broken, every call
/// degrades to a miss, `false` or `None` and the slideshow loads uncached.
#[derive(Clone)]
pub struct ImageCache {
    inner: Arc<Inner>,
}

impl ImageCache {
    /// Create an uninitialized cache.
    pub fn new(settings: CacheSettings, logger: SharedLogger) -> Self {
        Self {
            inner: Arc::new(Inner {
                settings,
                logger,
                active: OnceCell::new(),
            }),
        }
    }

    /// Open the cache directory. Returns whether caching is active.
    ///
    /// Runs at most once: a failure disables the cache for the lifetime of
    /// this instance.
    pub async fn initialize(&self) -> bool {
        let inner = &self.inner;
        let active = inner
            .active
            .get_or_init(|| async move {
                if !inner.settings.enabled {
                    inner.logger.info("Image cache disabled by configuration");
                    return None;
                }
                match CacheStore::open(&inner.settings, Arc::clone(&inner.logger)).await {
                    Ok(store) => {
                        let store = Arc::new(store);
                        let scheduler = PreloadScheduler::new(
                            Arc::clone(&store),
                            &inner.settings,
                            Arc::clone(&inner.logger),
                        );
                        Some(Active { store, scheduler })
                    }
                    Err(e) => {
                        inner
                            .logger
                            .error(&format!("Image cache disabled, initialization failed: {e}"));
                        None
                    }
                }
            })
            .await;
        active.is_some()
    }

    fn active(&self) -> Option<&Active> {
        self.inner.active.get().and_then(Option::as_ref)
    }

    /// Caching is initialized and active.
    pub fn is_enabled(&self) -> bool {
        self.active().is_some()
    }

    /// Cached payload for an identifier, if any.
    pub async fn get(&self, identifier: &str) -> Option<Vec<u8>> {
        let active = self.active()?;
        match active.store.get(identifier).await {
            Ok(payload) => payload,
            Err(e) => {
                self.inner
                    .logger
                    .warn(&format!("Cache read failed for {identifier}: {e}"));
                None
            }
        }
    }

    /// Cached payload rendered as a `data:` URI.
    pub async fn get_data_uri(&self, identifier: &str) -> Option<String> {
        self.get(identifier)
            .await
            .map(|bytes| encoding::to_data_uri(&bytes))
    }

    /// Store a payload. Returns whether it was written.
    pub async fn set(&self, identifier: &str, payload: &[u8]) -> bool {
        let Some(active) = self.active() else {
            return false;
        };
        match active.store.set(identifier, payload).await {
            Ok(()) => true,
            Err(e) => {
                self.inner
                    .logger
                    .error(&format!("Cache write failed for {identifier}: {e}"));
                false
            }
        }
    }

    /// Warm the cache for upcoming images in the background.
    pub fn preload_images(&self, images: Vec<ImageDescriptor>, downloader: Arc<dyn Downloader>) {
        if let Some(active) = self.active() {
            active.scheduler.preload_images(images, downloader);
        }
    }

    /// Wait for the current preload drain, if any, to finish.
    pub async fn wait_for_preload(&self) {
        if let Some(active) = self.active() {
            active.scheduler.wait_idle().await;
        }
    }

    /// Remove everything from the cache. Returns whether it succeeded.
    pub async fn clear(&self) -> bool {
        let Some(active) = self.active() else {
            return false;
        };
        match active.store.clear().await {
            Ok(_) => true,
            Err(e) => {
                self.inner
                    .logger
                    .error(&format!("Failed to clear image cache: {e}"));
                false
            }
        }
    }

    /// Limits and usage, or `None` when the cache is not active.
    pub async fn get_stats(&self) -> Option<CacheStats> {
        let active = self.active()?;
        Some(CacheStats {
            enabled: true,
            max_size_bytes: self.inner.settings.max_size_bytes(),
            preload_count: self.inner.settings.preload_count,
            used_bytes: active.store.usage_bytes().await,
        })
    }

    /// Cache files on disk, oldest first.
    pub async fn entries(&self) -> Vec<CacheEntryInfo> {
        let Some(active) = self.active() else {
            return Vec::new();
        };
        match active.store.entries().await {
            Ok(mut entries) => {
                entries.sort_by(|a, b| a.last_modified.cmp(&b.last_modified));
                entries
            }
            Err(e) => {
                self.inner
                    .logger
                    .warn(&format!("Failed to list image cache: {e}"));
                Vec::new()
            }
        }
    }
}
