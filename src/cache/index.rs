//! In-memory index over the cache directory.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::key::CacheKey;

/// Index entry for one cached payload
#[derive(Debug, Clone)]
pub struct IndexedPayload {
    /// Payload bytes as last written or read
    pub bytes: Arc<Vec<u8>>,
    /// When the entry was (re)inserted; used for the soft TTL
    pub inserted_at: Instant,
}

/// Soft-TTL map from key to payload.
///
/// Entries expire from memory only; the file on disk is unaffected and will
/// be read again on the next lookup.
#[derive(Debug)]
pub struct MemoryIndex {
    entries: HashMap<CacheKey, IndexedPayload>,
    ttl: Duration,
}

impl MemoryIndex {
    /// Create an empty index whose entries live for `ttl`.
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            ttl,
        }
    }

    /// Look up a live entry. Expired entries are dropped and reported absent.
    pub fn get(&mut self, key: &CacheKey) -> Option<Arc<Vec<u8>>> {
        let expired = match self.entries.get(key) {
            Some(entry) => entry.inserted_at.elapsed() > self.ttl,
            None => return None,
        };
        if expired {
            self.entries.remove(key);
            return None;
        }
        self.entries.get(key).map(|e| Arc::clone(&e.bytes))
    }

    /// Insert or refresh an entry, sweeping expired ones first.
    pub fn insert(&mut self, key: CacheKey, bytes: Arc<Vec<u8>>) {
        self.purge_expired();
        self.entries.insert(
            key,
            IndexedPayload {
                bytes,
                inserted_at: Instant::now(),
            },
        );
    }

    /// Remove an entry if present.
    pub fn remove(&mut self, key: &CacheKey) -> bool {
        self.entries.remove(key).is_some()
    }

    /// Drop every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Drop entries older than the TTL.
    pub fn purge_expired(&mut self) {
        let ttl = self.ttl;
        self.entries.retain(|_, e| e.inserted_at.elapsed() <= ttl);
    }

    /// Number of entries (including not yet swept expired ones).
    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::key::derive_key;

    fn payload(bytes: &[u8]) -> Arc<Vec<u8>> {
        Arc::new(bytes.to_vec())
    }

    #[test]
    fn test_insert_get_remove() {
        let mut index = MemoryIndex::new(Duration::from_secs(60));
        let key = derive_key("a");
        index.insert(key.clone(), payload(b"abc"));

        assert_eq!(index.get(&key).unwrap().as_slice(), b"abc");
        assert!(index.remove(&key));
        assert!(!index.remove(&key));
        assert!(index.get(&key).is_none());
    }

    #[test]
    fn test_entries_expire_after_ttl() {
        let mut index = MemoryIndex::new(Duration::ZERO);
        let key = derive_key("a");
        index.insert(key.clone(), payload(b"abc"));
        std::thread::sleep(Duration::from_millis(5));

        assert_eq!(index.len(), 1);
        assert!(index.get(&key).is_none());
        assert_eq!(index.len(), 0);
    }

    #[test]
    fn test_insert_sweeps_expired() {
        let mut index = MemoryIndex::new(Duration::from_millis(1));
        index.insert(derive_key("old"), payload(b"1"));
        std::thread::sleep(Duration::from_millis(5));
        index.insert(derive_key("new"), payload(b"2"));
        assert_eq!(index.len(), 1);
    }
}
