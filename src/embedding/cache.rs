//! Content-hash cache for embedding vectors.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};

use sha2::{Digest, Sha256};

/// Process-lifetime cache keyed by SHA-256 of provider key and text.
///
/// Identical texts, from any document, are embedded once. Entries never
/// expire; growth is bounded only by the distinct texts seen.
pub struct EmbeddingCache {
    provider_key: String,
    entries: RwLock<HashMap<String, Vec<f32>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

/// Cache counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
}

impl EmbeddingCache {
    pub fn new(provider_key: impl Into<String>) -> Self {
        Self {
            provider_key: provider_key.into(),
            entries: RwLock::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Content hash used as the cache key for `text`.
    pub fn key_for(&self, text: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.provider_key.as_bytes());
        hasher.update(b":");
        hasher.update(text.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    pub fn get(&self, key: &str) -> Option<Vec<f32>> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        match entries.get(key) {
            Some(vector) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(vector.clone())
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    pub fn insert(&self, key: String, vector: Vec<f32>) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, vector);
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_is_stable_and_provider_scoped() {
        let a = EmbeddingCache::new("model-a");
        let b = EmbeddingCache::new("model-b");
        assert_eq!(a.key_for("text"), a.key_for("text"));
        assert_ne!(a.key_for("text"), a.key_for("text "));
        assert_ne!(a.key_for("text"), b.key_for("text"));
    }

    #[test]
    fn test_hits_and_misses() {
        let cache = EmbeddingCache::new("m");
        let key = cache.key_for("hello");
        assert!(cache.get(&key).is_none());
        cache.insert(key.clone(), vec![1.0, 2.0]);
        assert_eq!(cache.get(&key), Some(vec![1.0, 2.0]));
        assert_eq!(
            cache.stats(),
            CacheStats {
                entries: 1,
                hits: 1,
                misses: 1
            }
        );
    }
}
