//! Content-addressed cache keys.

use sha2::{Digest, Sha256};

/// Length of a rendered key (SHA-256 as hex)
pub const KEY_LEN: usize = 64;

/// Filesystem-safe name of a cache entry, derived from an image identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    /// Recognise a file name that was produced by [`derive_key`].
    pub fn parse(file_name: &str) -> Option<Self> {
        let well_formed = file_name.len() == KEY_LEN
            && file_name
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        well_formed.then(|| Self(file_name.to_string()))
    }

    /// The hex digest
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<std::path::Path> for CacheKey {
    fn as_ref(&self) -> &std::path::Path {
        std::path::Path::new(&self.0)
    }
}

/// Derive the cache key for an identifier (URL or path).
///
/// Pure and stable across processes: the same identifier always yields the
/// same key.
pub fn derive_key(identifier: &str) -> CacheKey {
    CacheKey(hex::encode(Sha256::digest(identifier.as_bytes())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_key_is_deterministic() {
        let url = "https://photos.example/api/assets/42/thumbnail?size=preview";
        assert_eq!(derive_key(url), derive_key(url));
    }

    #[test]
    fn test_derive_key_known_vector() {
        // sha256("abc")
        assert_eq!(
            derive_key("abc").as_str(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_distinct_identifiers_give_distinct_keys() {
        let a = derive_key("/photos/2021/a.jpg");
        let b = derive_key("/photos/2021/b.jpg");
        assert_ne!(a, b);
    }

    #[test]
    fn test_key_shape_is_filesystem_safe() {
        let key = derive_key("https://x/y?z=1&w=ä");
        assert_eq!(key.as_str().len(), KEY_LEN);
        assert!(CacheKey::parse(key.as_str()).is_some());
    }

    #[test]
    fn test_parse_rejects_foreign_files() {
        assert!(CacheKey::parse(".DS_Store").is_none());
        assert!(CacheKey::parse(&"A".repeat(KEY_LEN)).is_none());
        assert!(CacheKey::parse(&"a".repeat(KEY_LEN - 1)).is_none());
        assert!(CacheKey::parse(&"0".repeat(KEY_LEN)).is_some());
    }
}
