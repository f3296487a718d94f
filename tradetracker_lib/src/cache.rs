//! In-memory TTL cache backed by `DashMap` for concurrent access.

use dashmap::DashMap;
use std::time::{Duration, Instant};

/// A single cached value with its insertion and expiration times.
struct CacheEntry {
    value: String,
    stored_at: Instant,
    expires_at: Instant,
}

/// Thread-safe in-memory cache with time-to-live expiration.
///
/// Entries are stored as serialized JSON strings; the last write for a key
/// wins. Expired entries are lazily evicted on the next `get` call for that
/// key.
pub struct MemoryCache {
    store: DashMap<String, CacheEntry>,
    ttl: Duration,
}

impl MemoryCache {
    /// Creates a new cache with the given time-to-live for entries.
    pub fn new(ttl: Duration) -> Self {
        Self {
            store: DashMap::new(),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Returns the cached value for `key`, or `None` if missing or expired.
    pub fn get(&self, key: &str) -> Option<String> {
        let entry = self.store.get(key)?;
        if Instant::now() > entry.expires_at {
            drop(entry);
            self.store.remove(key);
            return None;
        }
        Some(entry.value.clone())
    }

    /// How long ago the live entry for `key` was written.
    pub fn age(&self, key: &str) -> Option<Duration> {
        let entry = self.store.get(key)?;
        if Instant::now() > entry.expires_at {
            return None;
        }
        Some(entry.stored_at.elapsed())
    }

    /// Inserts or overwrites a cache entry. The entry expires after the configured TTL.
    pub fn set(&self, key: String, value: String) {
        let now = Instant::now();
        self.store.insert(
            key,
            CacheEntry {
                value,
                stored_at: now,
                expires_at: now + self.ttl,
            },
        );
    }

    /// Removes all entries from the cache.
    pub fn clear(&self) {
        self.store.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_set_and_get() {
        let cache = MemoryCache::new(Duration::from_secs(60));
        cache.set("report:fifo".to_string(), "{}".to_string());
        assert_eq!(cache.get("report:fifo"), Some("{}".to_string()));
    }

    #[test]
    fn cache_miss() {
        let cache = MemoryCache::new(Duration::from_secs(60));
        assert_eq!(cache.get("report:lifo"), None);
        assert_eq!(cache.age("report:lifo"), None);
    }

    #[test]
    fn cache_expiration() {
        let cache = MemoryCache::new(Duration::from_millis(1));
        cache.set("key1".to_string(), "value1".to_string());
        std::thread::sleep(Duration::from_millis(10));
        assert_eq!(cache.get("key1"), None);
        assert_eq!(cache.age("key1"), None);
    }

    #[test]
    fn cache_latest_write_wins() {
        let cache = MemoryCache::new(Duration::from_secs(60));
        cache.set("key1".to_string(), "old".to_string());
        cache.set("key1".to_string(), "new".to_string());
        assert_eq!(cache.get("key1"), Some("new".to_string()));
    }

    #[test]
    fn cache_age_is_tracked() {
        let cache = MemoryCache::new(Duration::from_secs(60));
        cache.set("key1".to_string(), "v".to_string());
        let age = cache.age("key1").unwrap();
        assert!(age < Duration::from_secs(5));
    }

    #[test]
    fn cache_clear_drops_everything() {
        let cache = MemoryCache::new(Duration::from_secs(60));
        cache.set("b".to_string(), "2".to_string());
        cache.set("c".to_string(), "3".to_string());
        assert_eq!(cache.get("b"), Some("2".to_string()));
        cache.clear();
        assert_eq!(cache.get("b"), None);
        assert_eq!(cache.get("c"), None);
    }
}
