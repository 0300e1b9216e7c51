//! Response caching for policy queries.
//!
//! The client only ever reads and writes the cache; eviction and clearing
//! are up to whoever owns it. Keep an `Arc` to the cache to clear it from
//! outside the client.

use lru::LruCache;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Key/value store for decoded query responses.
pub trait Cache: Send + Sync {
    /// Look up a previously stored response.
    fn get(&self, key: &str) -> Option<Value>;

    /// Store a response.
    fn set(&self, key: String, value: Value);

    /// Drop every entry.
    fn clear(&self);
}

impl<C: Cache + ?Sized> Cache for Arc<C> {
    fn get(&self, key: &str) -> Option<Value> {
        (**self).get(key)
    }

    fn set(&self, key: String, value: Value) {
        (**self).set(key, value)
    }

    fn clear(&self) {
        (**self).clear()
    }
}

/// A cache that never holds anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCache;

impl Cache for NoCache {
    fn get(&self, _key: &str) -> Option<Value> {
        None
    }

    fn set(&self, _key: String, _value: Value) {}

    fn clear(&self) {}
}

/// Compute the cache key for a normalized resource path and input.
///
/// Object keys are hashed in sorted order, so two documents with the same
/// content map to the same key however they were built.
pub fn cache_key(resource_path: &str, input: Option<&Value>) -> String {
    let mut canonical = String::new();
    match input {
        Some(value) => write_canonical(value, &mut canonical),
        None => canonical.push_str("null"),
    }
    let hash = blake3::hash(canonical.as_bytes());
    format!("{}:{}", resource_path, hash.to_hex())
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            out.push('{');
            for (i, (key, value)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(value, out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

/// In-memory LRU cache with optional expiry.
pub struct MemoryCache {
    entries: Mutex<LruCache<String, CachedEntry>>,
    ttl: Option<Duration>,
    hits: AtomicU64,
    misses: AtomicU64,
}

struct CachedEntry {
    value: Value,
    expires_at: Option<Instant>,
}

impl CachedEntry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.map_or(false, |at| at <= now)
    }
}

impl MemoryCache {
    /// Create a cache holding at most `max_entries` responses, without expiry.
    pub fn new(max_entries: usize) -> Self {
        Self::build(max_entries, None)
    }

    /// Create a cache whose entries expire `ttl` after being stored.
    pub fn with_ttl(max_entries: usize, ttl: Duration) -> Self {
        Self::build(max_entries, Some(ttl))
    }

    fn build(max_entries: usize, ttl: Option<Duration>) -> Self {
        let capacity = NonZeroUsize::new(max_entries).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Number of stored entries, expired ones included until evicted.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Check if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Remove all expired entries.
    pub fn evict_expired(&self) {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        let expired: Vec<String> = entries
            .iter()
            .filter(|(_, entry)| entry.is_expired(now))
            .map(|(key, _)| key.clone())
            .collect();
        for key in expired {
            entries.pop(&key);
        }
    }

    /// Get cache statistics.
    pub fn stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        let hit_rate = if total > 0 {
            (hits as f64 / total as f64) * 100.0
        } else {
            0.0
        };

        CacheStats {
            hits,
            misses,
            size: self.len(),
            hit_rate,
        }
    }
}

impl Cache for MemoryCache {
    fn get(&self, key: &str) -> Option<Value> {
        let mut entries = self.entries.lock();

        if let Some(entry) = entries.get(key) {
            if !entry.is_expired(Instant::now()) {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Some(entry.value.clone());
            }
            entries.pop(key);
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    fn set(&self, key: String, value: Value) {
        let entry = CachedEntry {
            value,
            expires_at: self.ttl.map(|ttl| Instant::now() + ttl),
        };
        self.entries.lock().put(key, entry);
    }

    fn clear(&self) {
        self.entries.lock().clear();
    }
}

/// Cache statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheStats {
    /// Number of cache hits
    pub hits: u64,
    /// Number of cache misses
    pub misses: u64,
    /// Current cache size
    pub size: usize,
    /// Hit rate percentage
    pub hit_rate: f64,
}
