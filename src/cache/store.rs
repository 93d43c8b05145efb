//! Main Cache - Shared Group Cache
//!
//! Thread-safe wrapper around one [`LruCache`] of [`ByteView`]s. Every
//! operation takes the mutex only for in-memory list/map surgery; nothing
//! here blocks on I/O.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;

use super::byteview::ByteView;
use super::lru::LruCache;

/// Main cache statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Bytes accounted (keys + values)
    pub bytes: u64,
    /// Number of entries
    pub items: u64,
    /// Lookups answered from the cache
    pub hits: u64,
    /// Lookups that missed
    pub misses: u64,
    /// Entries evicted to honor the byte budget
    pub evictions: u64,
}

/// Mutex-guarded LRU of cached values
pub struct MainCache {
    /// LRU store
    lru: Mutex<LruCache<ByteView>>,
    /// Hit count
    hits: AtomicU64,
    /// Miss count
    misses: AtomicU64,
    /// Eviction count (fed by the LRU eviction callback)
    evictions: Arc<AtomicU64>,
}

impl MainCache {
    /// Create a cache with a byte budget (0 = unbounded)
    pub fn new(max_bytes: usize) -> Self {
        let evictions = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&evictions);
        let lru = LruCache::with_eviction_callback(max_bytes, move |key, _value: ByteView| {
            counter.fetch_add(1, Ordering::Relaxed);
            tracing::trace!(key = %key, "evicted from main cache");
        });

        Self {
            lru: Mutex::new(lru),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions,
        }
    }

    /// Get a value, promoting it on a hit
    pub fn get(&self, key: &str) -> Option<ByteView> {
        let value = self.lru.lock().get(key).cloned();
        match value {
            Some(_) => self.hits.fetch_add(1, Ordering::Relaxed),
            None => self.misses.fetch_add(1, Ordering::Relaxed),
        };
        value
    }

    /// Insert or replace a value (may evict)
    pub fn put(&self, key: &str, value: ByteView) {
        self.lru.lock().put(key, value);
    }

    /// Get a value without promoting it or counting a lookup
    pub fn peek(&self, key: &str) -> Option<ByteView> {
        self.lru.lock().peek(key).cloned()
    }

    /// Check presence without promoting or counting a lookup
    pub fn contains(&self, key: &str) -> bool {
        self.lru.lock().peek(key).is_some()
    }

    /// Get number of entries
    pub fn len(&self) -> usize {
        self.lru.lock().len()
    }

    /// Check if cache is empty
    pub fn is_empty(&self) -> bool {
        self.lru.lock().is_empty()
    }

    /// Bytes currently held
    pub fn bytes(&self) -> usize {
        self.lru.lock().used_bytes()
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        let (bytes, items) = {
            let lru = self.lru.lock();
            (lru.used_bytes() as u64, lru.len() as u64)
        };
        CacheStats {
            bytes,
            items,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }
}

impl std::fmt::Debug for MainCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MainCache")
            .field("lru", &*self.lru.lock())
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_main_cache_put_get() {
        let cache = MainCache::new(0);
        cache.put("Tom", ByteView::from("630"));

        assert_eq!(cache.get("Tom").map(|v| v.to_string()), Some("630".into()));
        assert!(cache.get("Jack").is_none());

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.items, 1);
        assert_eq!(stats.bytes, 6);
    }

    #[test]
    fn test_main_cache_counts_evictions() {
        let cache = MainCache::new(10);
        for i in 0..5 {
            cache.put(&format!("k{}", i), ByteView::from("vvv"));
        }

        let stats = cache.stats();
        assert_eq!(stats.items, 2);
        assert_eq!(stats.evictions, 3);
        assert!(stats.bytes <= 10);
        assert!(cache.contains("k4"));
        assert!(!cache.contains("k0"));
    }

    #[test]
    fn test_main_cache_concurrent_access() {
        use std::thread;

        let cache = Arc::new(MainCache::new(0));
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let cache = Arc::clone(&cache);
                thread::spawn(move || {
                    for i in 0..500 {
                        let key = format!("obj-{}-{}", t, i);
                        cache.put(&key, ByteView::from(vec![i as u8; 16]));
                        assert!(cache.get(&key).is_some());
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(cache.len(), 4000);
        assert_eq!(cache.stats().hits, 4000);
    }
}
