//! Logging capability handed to cache components
//!
//! Cache components never log through a global; each one receives a
//! [`Logger`] at construction. The binary uses [`TracingLogger`], tests swap
//! in a recording fake.

use std::sync::Arc;

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Minimal leveled logging interface
pub trait Logger: Send + Sync {
    /// Verbose diagnostics
    fn debug(&self, message: &str);
    /// Normal operational events
    fn info(&self, message: &str);
    /// Recoverable problems
    fn warn(&self, message: &str);
    /// Failures of a single operation
    fn error(&self, message: &str);
}

/// Shared logger handle
pub type SharedLogger = Arc<dyn Logger>;

/// Forwards to `tracing` under the `photoframe::cache` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl TracingLogger {
    /// Create a shared tracing-backed logger.
    pub fn shared() -> SharedLogger {
        Arc::new(Self)
    }
}

impl Logger for TracingLogger {
    fn debug(&self, message: &str) {
        tracing::debug!(target: "photoframe::cache", "{message}");
    }

    fn info(&self, message: &str) {
        tracing::info!(target: "photoframe::cache", "{message}");
    }

    fn warn(&self, message: &str) {
        tracing::warn!(target: "photoframe::cache", "{message}");
    }

    fn error(&self, message: &str) {
        tracing::error!(target: "photoframe::cache", "{message}");
    }
}

/// Install the global `tracing` subscriber (RUST_LOG=debug for verbose output).
pub fn init_tracing() {
    let _ = tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
}
