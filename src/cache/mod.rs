//! Bounded on-disk image cache with background preloading.
//!
//! This module keeps downloaded slideshow images in a flat directory, one
//! file per SHA-256 key, bounded by a byte ceiling with oldest-first
//! eviction, and warms it ahead of the slideshow with a single background
//! preload task.
//!
//! ```text
//!            ImageCache (facade)
//!             │            │
//!             ▼            ▼
//!      PreloadScheduler ─► CacheStore ─► MemoryIndex
//!                          │   │
//!                          │   └──────► SizeAccountant
//!                          ▼
//!                      derive_key
//! ```

pub mod accountant;
pub mod encoding;
pub mod facade;
pub mod index;
pub mod key;
pub mod preload;
pub mod settings;
pub mod store;

pub use accountant::SizeAccountant;
pub use facade::{CacheStats, ImageCache};
pub use key::{CacheKey, derive_key};
pub use preload::{Completion, Downloader, PreloadScheduler, downloader_fn};
pub use settings::CacheSettings;
pub use store::{CacheEntryInfo, CacheStore, EvictionReport};
