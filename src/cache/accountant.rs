//! Running byte total and the eviction decision.

use std::path::Path;

use tokio::fs;

use super::key::CacheKey;
use crate::error::{CacheError, Result};

/// Tracks aggregate bytes stored in the cache directory.
///
/// Only confirmed writes and deletions move the total. It is never persisted;
/// [`scan_dir`] recomputes it on startup.
#[derive(Debug, Clone)]
pub struct SizeAccountant {
    used: u64,
    ceiling: u64,
    headroom: f64,
}

impl SizeAccountant {
    /// `headroom` is the fraction of the ceiling eviction shrinks usage to.
    pub const fn new(ceiling: u64, headroom: f64) -> Self {
        Self {
            used: 0,
            ceiling,
            headroom,
        }
    }

    /// Replace the total with a freshly scanned value.
    pub const fn reset_to(&mut self, total: u64) {
        self.used = total;
    }

    /// Record a confirmed write.
    pub const fn add(&mut self, bytes: u64) {
        self.used = self.used.saturating_add(bytes);
    }

    /// Record a confirmed deletion.
    pub const fn subtract(&mut self, bytes: u64) {
        self.used = self.used.saturating_sub(bytes);
    }

    /// An entry of `old` bytes was replaced by one of `new` bytes.
    pub const fn apply_delta(&mut self, old: u64, new: u64) {
        self.subtract(old);
        self.add(new);
    }

    /// Bytes currently accounted for.
    pub const fn used(&self) -> u64 {
        self.used
    }

    /// Configured maximum in bytes.
    pub const fn ceiling(&self) -> u64 {
        self.ceiling
    }

    /// Usage is over the ceiling.
    pub const fn needs_eviction(&self) -> bool {
        self.used > self.ceiling
    }

    /// Usage eviction stops at.
    pub fn eviction_target(&self) -> u64 {
        (self.ceiling as f64 * self.headroom).floor() as u64
    }

    /// Usage is at or below the eviction target.
    pub fn within_target(&self) -> bool {
        self.used <= self.eviction_target()
    }
}

/// Sum the sizes of all cache files in `dir`.
///
/// Files whose names are not cache keys are ignored. A missing directory
/// counts as empty.
pub async fn scan_dir(dir: &Path) -> Result<u64> {
    let mut entries = match fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(CacheError::io(dir, e)),
    };

    let mut total = 0u64;
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| CacheError::io(dir, e))?
    {
        let name = entry.file_name();
        if name.to_str().and_then(CacheKey::parse).is_none() {
            continue;
        }
        // Files may disappear between listing and stat.
        if let Ok(meta) = entry.metadata().await
            && meta.is_file()
        {
            total += meta.len();
        }
    }
    Ok(total)
}
