//! Disk-backed payload store with an in-memory index and a byte budget.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::fs;
use tokio::sync::Mutex;

use super::accountant::{SizeAccountant, scan_dir};
use super::index::MemoryIndex;
use super::key::{CacheKey, derive_key};
use super::settings::CacheSettings;
use crate::error::{CacheError, Result};
use crate::logging::SharedLogger;

/// A cache file as seen on disk
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheEntryInfo {
    /// File name / derived key
    pub key: String,
    /// Payload length in bytes
    pub size_bytes: u64,
    /// File modification time (eviction order)
    pub last_modified: DateTime<Utc>,
}

/// Outcome of one eviction pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EvictionReport {
    /// Files deleted
    pub evicted: usize,
    /// Bytes released
    pub freed_bytes: u64,
    /// Files that could not be deleted
    pub failed: usize,
    /// Usage after the pass
    pub remaining_bytes: u64,
}

struct StoreState {
    index: MemoryIndex,
    accountant: SizeAccountant,
}

/// One directory of cache files, one file per key.
///
/// Index and accountant sit behind a single async mutex; `set`, eviction and
/// `clear` hold it for their whole duration, so size deltas and index updates
/// never interleave with another task's.
pub struct CacheStore {
    dir: PathBuf,
    state: Mutex<StoreState>,
    logger: SharedLogger,
    /// Paths whose removal fails, to exercise partial eviction.
    #[cfg(test)]
    pinned: std::sync::Mutex<Vec<PathBuf>>,
}

impl CacheStore {
    /// Create the cache directory if needed and seed the size total from a scan.
    ///
    /// Fails only on I/O errors other than "already exists".
    pub async fn open(settings: &CacheSettings, logger: SharedLogger) -> Result<Self> {
        let dir = settings.cache_dir.clone();
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| CacheError::io(&dir, e))?;

        let used = scan_dir(&dir).await?;
        let mut accountant = SizeAccountant::new(settings.max_size_bytes(), settings.headroom);
        accountant.reset_to(used);

        logger.info(&format!(
            "Image cache opened at {} ({} bytes used of {})",
            dir.display(),
            used,
            accountant.ceiling()
        ));

        let store = Self {
            dir,
            state: Mutex::new(StoreState {
                index: MemoryIndex::new(settings.index_ttl),
                accountant,
            }),
            logger,
            #[cfg(test)]
            pinned: std::sync::Mutex::default(),
        };

        // A restart may find the directory already over a lowered ceiling.
        {
            let mut state = store.state.lock().await;
            if state.accountant.needs_eviction()
                && let Err(e) = store.evict_locked(&mut state).await
            {
                store.logger.error(&format!("Eviction failed: {e}"));
            }
        }

        Ok(store)
    }

    /// Directory holding the cache files
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// On-disk location for a key
    pub fn path_for(&self, key: &CacheKey) -> PathBuf {
        self.dir.join(key)
    }

    /// Read a payload, preferring the in-memory index.
    pub async fn get(&self, identifier: &str) -> Result<Option<Vec<u8>>> {
        let key = derive_key(identifier);
        let path = self.path_for(&key);
        let mut state = self.state.lock().await;

        if let Some(bytes) = state.index.get(&key) {
            match fs::try_exists(&path).await {
                Ok(true) => return Ok(Some((*bytes).clone())),
                Ok(false) => {
                    self.logger
                        .debug(&format!("Cache file {key} vanished, dropping index entry"));
                    state.index.remove(&key);
                    return Ok(None);
                }
                Err(e) => return Err(CacheError::io(&path, e)),
            }
        }

        match fs::read(&path).await {
            Ok(bytes) => {
                state.index.insert(key, Arc::new(bytes.clone()));
                Ok(Some(bytes))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(CacheError::io(&path, e)),
        }
    }

    /// Whether a file exists for the identifier, without reading it.
    pub async fn contains(&self, identifier: &str) -> bool {
        let path = self.path_for(&derive_key(identifier));
        fs::try_exists(&path).await.unwrap_or(false)
    }

    /// Write (or overwrite) the payload for an identifier.
    ///
    /// Evicts before returning when the write pushes usage over the ceiling.
    pub async fn set(&self, identifier: &str, payload: &[u8]) -> Result<()> {
        let key = derive_key(identifier);
        let path = self.path_for(&key);
        let mut state = self.state.lock().await;

        let previous = match fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => meta.len(),
            _ => 0,
        };

        if let Err(e) = fs::write(&path, payload).await {
            state.index.remove(&key);
            self.discard_partial(&mut state, &path, previous).await;
            return Err(CacheError::io(&path, e));
        }

        state.accountant.apply_delta(previous, payload.len() as u64);
        state.index.insert(key.clone(), Arc::new(payload.to_vec()));
        self.logger.debug(&format!(
            "Cached {} bytes as {key} ({} bytes used, {} indexed)",
            payload.len(),
            state.accountant.used(),
            state.index.len()
        ));

        if state.accountant.needs_eviction()
            && let Err(e) = self.evict_locked(&mut state).await
        {
            self.logger.error(&format!("Eviction failed: {e}"));
        }
        Ok(())
    }

    /// A failed write may leave a truncated file behind; remove it so it is
    /// never served, and settle the accountant with whatever remains.
    async fn discard_partial(&self, state: &mut StoreState, path: &Path, previous: u64) {
        match fs::remove_file(path).await {
            Ok(()) => state.accountant.subtract(previous),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                state.accountant.subtract(previous);
            }
            Err(e) => {
                let left = fs::metadata(path)
                    .await
                    .ok()
                    .filter(std::fs::Metadata::is_file)
                    .map_or(0, |m| m.len());
                state.accountant.apply_delta(previous, left);
                self.logger.error(&format!(
                    "Could not remove partial cache file {}: {e}",
                    path.display()
                ));
            }
        }
    }

    /// Delete oldest files until usage falls to the eviction target.
    pub async fn evict_old_files(&self) -> Result<EvictionReport> {
        let mut state = self.state.lock().await;
        self.evict_locked(&mut state).await
    }

    async fn evict_locked(&self, state: &mut StoreState) -> Result<EvictionReport> {
        let mut files = self.entries().await?;
        files.sort_by(|a, b| {
            a.last_modified
                .cmp(&b.last_modified)
                .then_with(|| a.key.cmp(&b.key))
        });

        // The listing is authoritative; fold in any drift from outside changes.
        let listed: u64 = files.iter().map(|f| f.size_bytes).sum();
        if listed != state.accountant.used() {
            self.logger.debug(&format!(
                "Cache size drift: tracked {} bytes, found {listed}",
                state.accountant.used()
            ));
            state.accountant.reset_to(listed);
        }

        let target = state.accountant.eviction_target();
        let mut report = EvictionReport::default();

        for file in files {
            if state.accountant.within_target() {
                break;
            }
            let path = self.dir.join(&file.key);
            match self.remove_cache_file(&path).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    self.logger
                        .warn(&format!("Failed to evict {}: {e}", path.display()));
                    report.failed += 1;
                    continue;
                }
            }
            state.accountant.subtract(file.size_bytes);
            if let Some(key) = CacheKey::parse(&file.key) {
                state.index.remove(&key);
            }
            report.evicted += 1;
            report.freed_bytes += file.size_bytes;
        }

        report.remaining_bytes = state.accountant.used();
        if !state.accountant.within_target() {
            self.logger.warn(&format!(
                "Eviction could not reach target: {} bytes used, target {target}",
                report.remaining_bytes
            ));
        } else {
            self.logger.info(&format!(
                "Evicted {} cache files ({} bytes), {} bytes used",
                report.evicted, report.freed_bytes, report.remaining_bytes
            ));
        }
        Ok(report)
    }

    async fn remove_cache_file(&self, path: &Path) -> std::io::Result<()> {
        if self.is_pinned(path) {
            return Err(std::io::ErrorKind::PermissionDenied.into());
        }
        fs::remove_file(path).await
    }

    #[cfg(test)]
    fn is_pinned(&self, path: &Path) -> bool {
        self.pinned.lock().unwrap().iter().any(|p| p == path)
    }

    #[cfg(not(test))]
    #[allow(clippy::unused_self)]
    const fn is_pinned(&self, _path: &Path) -> bool {
        false
    }

    /// Remove every cache file and reset usage. Returns the number removed.
    pub async fn clear(&self) -> Result<usize> {
        let mut state = self.state.lock().await;
        state.index.clear();

        let files = self.entries().await?;
        let mut removed = 0;
        let mut left = 0u64;
        for file in files {
            let path = self.dir.join(&file.key);
            match self.remove_cache_file(&path).await {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    self.logger
                        .warn(&format!("Failed to remove {}: {e}", path.display()));
                    left += file.size_bytes;
                }
            }
        }
        state.accountant.reset_to(left);
        self.logger
            .info(&format!("Cleared image cache ({removed} files)"));
        Ok(removed)
    }

    /// Bytes currently accounted for
    pub async fn usage_bytes(&self) -> u64 {
        self.state.lock().await.accountant.used()
    }

    /// List cache files with their size and modification time.
    ///
    /// A missing directory yields an empty list.
    pub async fn entries(&self) -> Result<Vec<CacheEntryInfo>> {
        let mut dir = match fs::read_dir(&self.dir).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(CacheError::io(&self.dir, e)),
        };

        let mut files = Vec::new();
        while let Some(entry) = dir
            .next_entry()
            .await
            .map_err(|e| CacheError::io(&self.dir, e))?
        {
            let Some(key) = entry.file_name().to_str().and_then(CacheKey::parse) else {
                continue;
            };
            let Ok(meta) = entry.metadata().await else {
                continue;
            };
            if !meta.is_file() {
                continue;
            }
            let modified = meta
                .modified()
                .map_or_else(|_| Utc::now(), DateTime::<Utc>::from);
            files.push(CacheEntryInfo {
                key: key.as_str().to_string(),
                size_bytes: meta.len(),
                last_modified: modified,
            });
        }
        Ok(files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::testing::{Level, RecordingLogger};
    use std::time::{Duration, SystemTime};
    use tempfile::{TempDir, tempdir};

    const KB: usize = 1024;

    fn settings(dir: &TempDir, max_mb: u64) -> CacheSettings {
        CacheSettings {
            cache_dir: dir.path().join("image-cache"),
            max_size_mb: max_mb,
            ..CacheSettings::default()
        }
    }

    async fn open(dir: &TempDir, max_mb: u64) -> (CacheStore, Arc<RecordingLogger>) {
        let logger = RecordingLogger::shared();
        let store = CacheStore::open(&settings(dir, max_mb), logger.clone())
            .await
            .unwrap();
        (store, logger)
    }

    /// Pin a file's mtime so eviction order does not depend on clock resolution.
    fn set_mtime(path: &Path, secs_ago: u64) {
        let file = std::fs::File::options().write(true).open(path).unwrap();
        file.set_modified(SystemTime::now() - Duration::from_secs(secs_ago))
            .unwrap();
    }

    #[tokio::test]
    async fn test_open_creates_directory_and_is_idempotent() {
        let dir = tempdir().unwrap();
        let (store, _) = open(&dir, 10).await;
        assert!(store.dir().is_dir());
        drop(store);
        let (again, _) = open(&dir, 10).await;
        assert_eq!(again.usage_bytes().await, 0);
    }

    #[tokio::test]
    async fn test_open_fails_when_path_is_a_file() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("image-cache");
        std::fs::write(&blocker, b"not a dir").unwrap();
        let result = CacheStore::open(&settings(&dir, 10), RecordingLogger::shared()).await;
        assert!(matches!(result, Err(CacheError::Io { .. })));
    }

    #[tokio::test]
    async fn test_round_trip_and_overwrite() {
        let dir = tempdir().unwrap();
        let (store, _) = open(&dir, 10).await;

        store.set("https://p/1.jpg", b"first").await.unwrap();
        assert_eq!(store.get("https://p/1.jpg").await.unwrap().unwrap(), b"first");

        store.set("https://p/1.jpg", b"second!").await.unwrap();
        assert_eq!(store.get("https://p/1.jpg").await.unwrap().unwrap(), b"second!");
        assert_eq!(store.usage_bytes().await, 7);
        assert_eq!(store.entries().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_file_name_is_derived_key() {
        let dir = tempdir().unwrap();
        let (store, _) = open(&dir, 10).await;
        store.set("/photos/a.jpg", b"abc").await.unwrap();
        let path = store.dir().join(derive_key("/photos/a.jpg").as_str());
        assert_eq!(std::fs::read(path).unwrap(), b"abc");
    }

    #[tokio::test]
    async fn test_get_backfills_from_disk_after_restart() {
        let dir = tempdir().unwrap();
        {
            let (store, _) = open(&dir, 10).await;
            store.set("id", b"persisted").await.unwrap();
        }
        let (store, _) = open(&dir, 10).await;
        assert_eq!(store.usage_bytes().await, 9);
        assert_eq!(store.get("id").await.unwrap().unwrap(), b"persisted");
        assert!(store.get("other").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_vanished_file_is_a_miss() {
        let dir = tempdir().unwrap();
        let (store, logger) = open(&dir, 10).await;
        store.set("id", b"data").await.unwrap();
        std::fs::remove_file(store.path_for(&derive_key("id"))).unwrap();

        assert!(store.get("id").await.unwrap().is_none());
        assert_eq!(logger.count(Level::Debug, "vanished"), 1);
        assert!(store.get("id").await.unwrap().is_none());
        assert!(!store.contains("id").await);
    }

    #[tokio::test]
    async fn test_failed_write_leaves_accounting_untouched() {
        let dir = tempdir().unwrap();
        let (store, _) = open(&dir, 10).await;
        store.set("ok", b"12345").await.unwrap();

        // A directory squatting on the key's path makes the write fail.
        std::fs::create_dir(store.path_for(&derive_key("blocked"))).unwrap();
        let err = store.set("blocked", b"payload").await.unwrap_err();
        assert!(matches!(err, CacheError::Io { .. }));
        assert_eq!(store.usage_bytes().await, 5);
    }

    #[tokio::test]
    async fn test_scenario_three_half_megabyte_payloads() {
        let dir = tempdir().unwrap();
        let (store, _) = open(&dir, 1).await;
        let payload = vec![7u8; 500 * KB];

        store.set("first", &payload).await.unwrap();
        set_mtime(&store.path_for(&derive_key("first")), 30);
        store.set("second", &payload).await.unwrap();
        set_mtime(&store.path_for(&derive_key("second")), 20);
        store.set("third", &payload).await.unwrap();

        assert!(store.usage_bytes().await <= 900 * KB as u64);
        assert!(store.get("first").await.unwrap().is_none());
        assert!(store.get("second").await.unwrap().is_none());
        assert_eq!(store.get("third").await.unwrap().unwrap(), payload);
    }

    #[tokio::test]
    async fn test_eviction_removes_oldest_first_until_target() {
        let dir = tempdir().unwrap();
        let (store, _) = open(&dir, 1).await;
        let chunk = vec![1u8; 200 * KB];

        // Insert in an order that differs from mtime order.
        for (id, age) in [("c", 10), ("a", 50), ("d", 5), ("b", 30)] {
            store.set(id, &chunk).await.unwrap();
            set_mtime(&store.path_for(&derive_key(id)), age);
        }
        assert_eq!(store.usage_bytes().await, 800 * KB as u64);

        store.set("e", &chunk).await.unwrap();
        set_mtime(&store.path_for(&derive_key("e")), 1);
        store.set("f", &chunk).await.unwrap();

        // 1200 KB > 1024 KB: drop "a" (1000 KB) then "b" (800 KB <= 921.6 KB).
        assert!(store.get("a").await.unwrap().is_none());
        assert!(store.get("b").await.unwrap().is_none());
        for id in ["c", "d", "e", "f"] {
            assert!(store.get(id).await.unwrap().is_some(), "{id} should survive");
        }
        assert_eq!(store.usage_bytes().await, 800 * KB as u64);
    }

    #[tokio::test]
    async fn test_evict_reconciles_files_added_behind_its_back() {
        let dir = tempdir().unwrap();
        let (store, _) = open(&dir, 1).await;
        store.set("tracked", &vec![0u8; 200 * KB]).await.unwrap();

        for (id, age) in [("old", 90), ("older", 120)] {
            let path = store.path_for(&derive_key(id));
            std::fs::write(&path, vec![0u8; 500 * KB]).unwrap();
            set_mtime(&path, age);
        }
        assert_eq!(store.usage_bytes().await, 200 * KB as u64);

        let report = store.evict_old_files().await.unwrap();
        assert_eq!(
            report,
            EvictionReport {
                evicted: 1,
                freed_bytes: 500 * KB as u64,
                failed: 0,
                remaining_bytes: 700 * KB as u64,
            }
        );
        assert!(!store.contains("older").await);
        assert!(store.contains("old").await);
        assert_eq!(store.usage_bytes().await, 700 * KB as u64);
    }

    #[tokio::test]
    async fn test_eviction_skips_undeletable_files_and_tolerates_overage() {
        let dir = tempdir().unwrap();
        let (store, logger) = open(&dir, 1).await;
        let chunk = vec![3u8; 300 * KB];
        for (id, age) in [("a", 50), ("b", 40), ("c", 30)] {
            store.set(id, &chunk).await.unwrap();
            set_mtime(&store.path_for(&derive_key(id)), age);
        }
        let pin = |id: &str| store.pinned.lock().unwrap().push(store.path_for(&derive_key(id)));
        pin("a");

        let late = store.path_for(&derive_key("d"));
        std::fs::write(&late, &chunk).unwrap();
        set_mtime(&late, 20);

        // "a" is oldest but cannot be removed; "b" goes instead.
        let report = store.evict_old_files().await.unwrap();
        assert_eq!(report.failed, 1);
        assert_eq!(report.evicted, 1);
        assert_eq!(report.remaining_bytes, 900 * KB as u64);
        assert!(store.contains("a").await);
        assert!(!store.contains("b").await);
        assert!(store.contains("c").await);
        assert_eq!(logger.count(Level::Warn, "Failed to evict"), 1);
        assert_eq!(logger.count(Level::Warn, "could not reach"), 0);

        // Nothing left that can go: the overage is accepted with a warning.
        pin("c");
        pin("d");
        let extra = store.path_for(&derive_key("e"));
        std::fs::write(&extra, &chunk).unwrap();
        pin("e");

        let report = store.evict_old_files().await.unwrap();
        assert_eq!(report.evicted, 0);
        assert_eq!(report.failed, 4);
        assert_eq!(report.remaining_bytes, 1200 * KB as u64);
        assert_eq!(logger.count(Level::Warn, "could not reach"), 1);
        assert_eq!(store.get("a").await.unwrap().unwrap(), chunk);
    }

    #[tokio::test]
    async fn test_oversized_payload_is_evicted_with_the_rest() {
        let dir = tempdir().unwrap();
        let (store, logger) = open(&dir, 1).await;
        let target = store.state.lock().await.accountant.eviction_target();
        let huge = vec![0u8; 2 * 1024 * KB];

        store.set("huge", &huge).await.unwrap();
        // The only candidate is the new file itself; it goes too.
        assert!(store.usage_bytes().await <= target);
        assert!(store.get("huge").await.unwrap().is_none());
        assert_eq!(logger.count(Level::Warn, "could not reach"), 0);
    }

    #[tokio::test]
    async fn test_clear_is_idempotent_and_ignores_foreign_files() {
        let dir = tempdir().unwrap();
        let (store, _) = open(&dir, 10).await;
        store.set("a", b"aaa").await.unwrap();
        store.set("b", b"bbbb").await.unwrap();
        std::fs::write(store.dir().join("README"), b"keep me").unwrap();

        assert_eq!(store.clear().await.unwrap(), 2);
        assert_eq!(store.usage_bytes().await, 0);
        assert!(store.get("a").await.unwrap().is_none());
        assert!(store.get("b").await.unwrap().is_none());
        assert!(store.dir().join("README").exists());

        assert_eq!(store.clear().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_clear_with_missing_directory() {
        let dir = tempdir().unwrap();
        let (store, _) = open(&dir, 10).await;
        std::fs::remove_dir(store.dir()).unwrap();
        assert_eq!(store.clear().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_open_evicts_when_existing_files_exceed_ceiling() {
        let dir = tempdir().unwrap();
        let cache_dir = dir.path().join("image-cache");
        std::fs::create_dir_all(&cache_dir).unwrap();
        for (i, id) in ["x", "y", "z"].iter().enumerate() {
            let path = cache_dir.join(derive_key(id).as_str());
            std::fs::write(&path, vec![0u8; 500 * KB]).unwrap();
            set_mtime(&path, 100 - i as u64 * 10);
        }

        let (store, _) = open(&dir, 1).await;
        assert_eq!(store.usage_bytes().await, 500 * KB as u64);
        assert!(store.contains("z").await);
        assert!(!store.contains("x").await);
    }
}
