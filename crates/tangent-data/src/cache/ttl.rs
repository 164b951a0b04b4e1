//! In-memory cache with per-entry expiry.
//!
//! Read-mostly: lookups take a shared lock, refreshes take the write lock
//! briefly. A poisoned lock behaves like an empty cache.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::RwLock;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    expires_at: Instant,
}

impl<V> CacheEntry<V> {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// Keyed values that expire a fixed time after insertion.
#[derive(Debug)]
pub struct TtlCache<K, V> {
    entries: RwLock<HashMap<K, CacheEntry<V>>>,
    ttl: Duration,
}

impl<K: Eq + Hash, V: Clone> TtlCache<K, V> {
    /// Create a cache whose entries live for `ttl`.
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    /// Time-to-live of new entries.
    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Cached value if present and not expired.
    pub fn get(&self, key: &K) -> Option<V> {
        let entries = self.entries.read().ok()?;
        entries
            .get(key)
            .filter(|entry| !entry.is_expired(Instant::now()))
            .map(|entry| entry.value.clone())
    }

    /// Insert or replace a value.
    pub fn insert(&self, key: K, value: V) {
        let entry = CacheEntry {
            value,
            expires_at: Instant::now() + self.ttl,
        };
        if let Ok(mut entries) = self.entries.write() {
            entries.insert(key, entry);
        }
    }

    /// Drop one entry.
    pub fn invalidate(&self, key: &K) {
        if let Ok(mut entries) = self.entries.write() {
            entries.remove(key);
        }
    }

    /// Drop every entry.
    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.write() {
            entries.clear();
        }
    }

    /// Number of live (unexpired) entries.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .read()
            .map(|entries| entries.values().filter(|e| !e.is_expired(now)).count())
            .unwrap_or(0)
    }

    /// Whether there are no live entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_get() {
        let cache = TtlCache::new(Duration::from_secs(3600));
        cache.insert("^IRX".to_string(), 0.0525);

        assert_eq!(cache.get(&"^IRX".to_string()), Some(0.0525));
        assert_eq!(cache.get(&"SPY".to_string()), None);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_expiry() {
        let cache = TtlCache::new(Duration::ZERO);
        cache.insert("AAPL", 1.2);

        assert_eq!(cache.get(&"AAPL"), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_invalidate_and_clear() {
        let cache = TtlCache::new(Duration::from_secs(60));
        cache.insert("AAPL", Some(1.2));
        cache.insert("SPY", None);

        cache.invalidate(&"AAPL");
        assert_eq!(cache.get(&"AAPL"), None);
        assert_eq!(cache.get(&"SPY"), Some(None));

        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_concurrent_readers() {
        let cache = std::sync::Arc::new(TtlCache::new(Duration::from_secs(60)));
        cache.insert(1_u32, 0.04_f64);

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let cache = cache.clone();
                std::thread::spawn(move || cache.get(&1))
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap(), Some(0.04));
        }
    }
}
