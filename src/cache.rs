//! Bounded TTL Cache
//!
//! A thread-safe least-recently-used cache with a fixed capacity and an
//! optional time-to-live per entry. This is the storage primitive underneath
//! rate limiting and attack-wave tracking: both need "remember this key for a
//! while, forget it under memory pressure" semantics.
//!
//! Expiry is lazy: an expired entry is detected and evicted on the `get` that
//! would have returned it. Recency is tracked with generation stamps in a
//! side queue, so no entry ever needs to move inside the map.

use std::collections::VecDeque;
use std::hash::Hash;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

struct Entry<V> {
    value: V,
    expires_at: Option<Instant>,
    generation: u64,
}

struct Inner<K, V> {
    map: FxHashMap<K, Entry<V>>,
    /// Recency queue, oldest first. A queued stamp is stale (and skipped)
    /// when the entry has been touched again since it was pushed.
    order: VecDeque<(K, u64)>,
    next_generation: u64,
}

/// A thread-safe LRU cache with per-entry TTL.
///
/// A `capacity` of zero is clamped to one. A `ttl` of zero disables
/// time-based expiry entirely; size-based eviction still applies.
pub struct TtlCache<K, V> {
    inner: Mutex<Inner<K, V>>,
    capacity: usize,
    ttl: Duration,
}

impl<K: Eq + Hash + Clone, V: Clone> TtlCache<K, V> {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            inner: Mutex::new(Inner {
                map: FxHashMap::default(),
                order: VecDeque::new(),
                next_generation: 0,
            }),
            capacity: capacity.max(1),
            ttl,
        }
    }

    /// Returns the value for `key` if present and not expired, refreshing its
    /// recency. An expired entry is removed as a side effect.
    pub fn get(&self, key: &K) -> Option<V> {
        let mut inner = self.inner.lock();
        let now = Instant::now();
        let generation = inner.bump_generation();

        let mut expired = false;
        let value = inner.map.get_mut(key).and_then(|entry| {
            if entry.expires_at.is_some_and(|at| now >= at) {
                expired = true;
                None
            } else {
                entry.generation = generation;
                Some(entry.value.clone())
            }
        });
        if expired {
            inner.map.remove(key);
            return None;
        }
        let value = value?;
        inner.touch(key.clone(), generation);
        Some(value)
    }

    /// Inserts or updates `key`, marking it most recently used. Evicts the
    /// least recently used entry when the capacity would be exceeded.
    pub fn set(&self, key: K, value: V) {
        let mut inner = self.inner.lock();
        let expires_at = (!self.ttl.is_zero()).then(|| Instant::now() + self.ttl);
        let generation = inner.bump_generation();

        if let Some(entry) = inner.map.get_mut(&key) {
            entry.value = value;
            entry.expires_at = expires_at;
            entry.generation = generation;
            inner.touch(key, generation);
            return;
        }

        while inner.map.len() >= self.capacity {
            inner.evict_lru();
        }
        inner.map.insert(
            key.clone(),
            Entry {
                value,
                expires_at,
                generation,
            },
        );
        inner.touch(key, generation);
    }

    /// Removes `key` from the cache. Missing keys are ignored.
    pub fn delete(&self, key: &K) {
        self.inner.lock().map.remove(key);
    }

    /// Removes all entries.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.map.clear();
        inner.order.clear();
    }

    /// Number of entries currently stored, including not-yet-collected
    /// expired ones.
    pub fn len(&self) -> usize {
        self.inner.lock().map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of the current keys, in no particular order.
    pub fn keys(&self) -> Vec<K> {
        self.inner.lock().map.keys().cloned().collect()
    }
}

impl<K: Eq + Hash + Clone, V> Inner<K, V> {
    fn bump_generation(&mut self) -> u64 {
        self.next_generation += 1;
        self.next_generation
    }

    fn touch(&mut self, key: K, generation: u64) {
        self.order.push_back((key, generation));
        self.trim_front();
        // Bound queue growth from repeated touches of the same keys.
        if self.order.len() > self.map.len().saturating_mul(2) + 64 {
            self.compact();
        }
    }

    /// Drops stale stamps from the queue front so the true LRU entry is
    /// always near the head.
    fn trim_front(&mut self) {
        while let Some((key, generation)) = self.order.front() {
            let live = self
                .map
                .get(key)
                .is_some_and(|entry| entry.generation == *generation);
            if live {
                break;
            }
            self.order.pop_front();
        }
    }

    fn compact(&mut self) {
        let map = &self.map;
        self.order.retain(|(key, generation)| {
            map.get(key)
                .is_some_and(|entry| entry.generation == *generation)
        });
    }

    fn evict_lru(&mut self) {
        self.trim_front();
        if let Some((key, _)) = self.order.pop_front() {
            self.map.remove(&key);
        } else if let Some(key) = self.map.keys().next().cloned() {
            // Queue and map out of sync should not happen; evict arbitrarily
            // rather than loop forever.
            self.map.remove(&key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn get_returns_last_set_value() {
        let cache = TtlCache::new(10, Duration::ZERO);
        cache.set("a", 1);
        cache.set("a", 2);
        assert_eq!(cache.get(&"a"), Some(2));
        assert_eq!(cache.get(&"b"), None);
    }

    #[test]
    fn capacity_evicts_least_recently_used() {
        let cache = TtlCache::new(3, Duration::ZERO);
        cache.set("a", 1);
        cache.set("b", 2);
        cache.set("c", 3);
        // Touch "a" so "b" becomes the LRU entry.
        assert_eq!(cache.get(&"a"), Some(1));
        cache.set("d", 4);

        assert_eq!(cache.get(&"a"), Some(1));
        assert_eq!(cache.get(&"b"), None);
        assert_eq!(cache.get(&"c"), Some(3));
        assert_eq!(cache.get(&"d"), Some(4));
        assert_eq!(cache.len(), 3);
    }

    #[test]
    fn entries_expire_after_ttl() {
        let cache = TtlCache::new(10, Duration::from_millis(30));
        cache.set("a", 1);
        assert_eq!(cache.get(&"a"), Some(1));
        thread::sleep(Duration::from_millis(60));
        assert_eq!(cache.get(&"a"), None);
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn set_refreshes_expiry() {
        let cache = TtlCache::new(10, Duration::from_millis(80));
        cache.set("a", 1);
        thread::sleep(Duration::from_millis(50));
        cache.set("a", 2);
        thread::sleep(Duration::from_millis(50));
        // 100ms after the first set, but only 50ms after the refresh.
        assert_eq!(cache.get(&"a"), Some(2));
    }

    #[test]
    fn zero_ttl_never_expires() {
        let cache = TtlCache::new(10, Duration::ZERO);
        cache.set("a", 1);
        thread::sleep(Duration::from_millis(20));
        assert_eq!(cache.get(&"a"), Some(1));
    }

    #[test]
    fn zero_capacity_is_clamped() {
        let cache = TtlCache::new(0, Duration::ZERO);
        cache.set("a", 1);
        assert_eq!(cache.get(&"a"), Some(1));
        cache.set("b", 2);
        assert_eq!(cache.get(&"a"), None);
        assert_eq!(cache.get(&"b"), Some(2));
    }

    #[test]
    fn delete_and_clear() {
        let cache = TtlCache::new(10, Duration::ZERO);
        cache.set("a", 1);
        cache.set("b", 2);
        cache.delete(&"a");
        cache.delete(&"missing");
        assert_eq!(cache.get(&"a"), None);
        assert_eq!(cache.len(), 1);
        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn keys_snapshot() {
        let cache = TtlCache::new(10, Duration::ZERO);
        cache.set("a", 1);
        cache.set("b", 2);
        let mut keys = cache.keys();
        keys.sort_unstable();
        assert_eq!(keys, vec!["a", "b"]);
    }

    #[test]
    fn concurrent_access_is_safe() {
        use std::sync::Arc;
        let cache = Arc::new(TtlCache::new(64, Duration::ZERO));
        let mut handles = Vec::new();
        for t in 0..4u64 {
            let cache = Arc::clone(&cache);
            handles.push(thread::spawn(move || {
                for i in 0..500u64 {
                    cache.set(format!("key-{}", i % 100), t * 1000 + i);
                    cache.get(&format!("key-{}", (i + 7) % 100));
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
        assert!(cache.len() <= 64);
    }
}
