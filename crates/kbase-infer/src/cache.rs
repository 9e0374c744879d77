//! Content-hash embedding cache.
//!
//! Keys are the SHA-256 of the exact input text. Eviction is by insertion
//! order, not recency: once the entry count exceeds the ceiling, the oldest
//! inserted entries are dropped in one sweep. Default: 10 000 entries,
//! dropping 5 000 at a time.

use std::collections::{HashMap, VecDeque};

use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::embedder::EmbeddingVector;

pub const DEFAULT_MAX_ENTRIES: usize = 10_000;
pub const DEFAULT_EVICT_COUNT: usize = 5_000;

/// Thread-safe FIFO cache for embeddings.
pub struct EmbeddingCache {
    inner: Mutex<CacheInner>,
}

struct CacheInner {
    entries: HashMap<String, EmbeddingVector>,
    /// Keys in first-insertion order.
    order: VecDeque<String>,
    max_entries: usize,
    evict_count: usize,
}

/// Cache key for a text: hex SHA-256 of its UTF-8 bytes.
pub fn content_key(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}

impl EmbeddingCache {
    /// Create a cache that drops `evict_count` oldest entries once it holds more than `max_entries`.
    pub fn new(max_entries: usize, evict_count: usize) -> Self {
        Self {
            inner: Mutex::new(CacheInner {
                entries: HashMap::new(),
                order: VecDeque::new(),
                max_entries,
                evict_count: evict_count.max(1),
            }),
        }
    }

    /// Get a cached embedding by key.
    pub fn get(&self, key: &str) -> Option<EmbeddingVector> {
        self.inner.lock().entries.get(key).cloned()
    }

    /// Insert an embedding. Overwriting an existing key keeps its original age.
    pub fn put(&self, key: String, embedding: EmbeddingVector) {
        let mut inner = self.inner.lock();

        if let Some(existing) = inner.entries.get_mut(&key) {
            *existing = embedding;
            return;
        }

        inner.order.push_back(key.clone());
        inner.entries.insert(key, embedding);

        if inner.entries.len() > inner.max_entries {
            let evict = inner.evict_count.min(inner.order.len());
            for _ in 0..evict {
                if let Some(oldest) = inner.order.pop_front() {
                    inner.entries.remove(&oldest);
                }
            }
            debug!(
                "Embedding cache evicted {} oldest entries ({} remain)",
                evict,
                inner.entries.len()
            );
        }
    }

    /// Whether `key` is cached.
    pub fn contains(&self, key: &str) -> bool {
        self.inner.lock().entries.contains_key(key)
    }

    /// Number of entries in the cache.
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove all entries, returning how many there were.
    pub fn clear(&self) -> usize {
        let mut inner = self.inner.lock();
        let count = inner.entries.len();
        inner.entries.clear();
        inner.order.clear();
        count
    }
}

impl Default for EmbeddingCache {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ENTRIES, DEFAULT_EVICT_COUNT)
    }
}
