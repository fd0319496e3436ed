//! # Photoframe
//!
//! Bounded local image cache with background preloading for a photo
//! slideshow fed by a remote photo library.
//!
//! ## Overview
//!
//! The slideshow asks the cache for the image it is about to show and stores
//! what it had to download. Whenever it learns the upcoming images it hands
//! them to the cache, which fetches the next few in the background, one at a
//! time, so the display never waits on the network.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Slideshow engine                        │
//! │        get / set / preload_images / clear / get_stats       │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    ImageCache (facade)                      │
//! │     Degrades to "uncached" on any failure, never panics     │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!          ┌───────────────────┼───────────────────┐
//!          ▼                   ▼                   ▼
//! ┌─────────────────┐ ┌─────────────────┐ ┌─────────────────┐
//! │ PreloadScheduler│ │   CacheStore    │ │     Config      │
//! │                 │ │                 │ │                 │
//! │ • Single drain  │ │ • Key = SHA-256 │ │ • TOML file     │
//! │ • Skip cached   │ │ • Memory index  │ │ • Validation    │
//! │ • Timeout/delay │ │ • Size ceiling  │ │ • Defaults      │
//! └─────────────────┘ └─────────────────┘ └─────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`cache`] - Store, eviction, preloading and the facade
//! - [`config`] - Configuration management
//! - [`error`] - Cache error type
//! - [`fetch`] - HTTP downloader used for preloading
//! - [`logging`] - Injected logger and tracing setup
//! - [`models`] - Image descriptors
//! - [`paths`] - Config and cache locations
//!
//! ## Example
//!
//! ```no_run
//! use photoframe::cache::{CacheSettings, ImageCache};
//! use photoframe::logging::TracingLogger;
//!
//! # async fn demo() {
//! let cache = ImageCache::new(CacheSettings::default(), TracingLogger::shared());
//! cache.initialize().await;
//!
//! let url = "https://photos.example/api/assets/42/thumbnail";
//! if cache.get(url).await.is_none() {
//!     let bytes = vec![/* downloaded */];
//!     cache.set(url, &bytes).await;
//! }
//! # }
//! ```

#![doc(html_root_url = "https://docs.rs/photoframe/0.1.0")]
#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::option_if_let_else)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::significant_drop_tightening)]

pub mod cache;
pub mod config;
pub mod error;
pub mod fetch;
pub mod logging;
pub mod models;
pub mod paths;

// Re-export main types for convenience
pub use cache::{CacheSettings, CacheStats, ImageCache};
pub use config::Config;
pub use error::CacheError;
pub use models::{ImageDescriptor, ImageSource};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
