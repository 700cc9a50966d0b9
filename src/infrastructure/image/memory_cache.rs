//! In-memory LRU cache bounded by aggregate entry cost.

use std::hash::Hash;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use lru::LruCache;
use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::domain::entities::{DecodedImage, ImageId};

/// Default ceiling for decoded image bytes kept in memory.
pub const DEFAULT_CACHE_BYTES: u64 = 8 * 1024 * 1024;

/// Computes the cost of one entry.
pub type Weigher<K, V> = Box<dyn Fn(&K, &V) -> u64 + Send + Sync>;

/// Receives every entry that leaves the cache.
pub type RemovalListener<K, V> = Box<dyn Fn(RemovalNotice<K, V>) + Send + Sync>;

/// Describes an entry that left the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemovalNotice<K, V> {
    /// True when removed to satisfy the ceiling or by `clear`.
    pub evicted: bool,
    /// Key of the removed entry.
    pub key: K,
    /// Value that left the cache.
    pub old_value: V,
    /// The replacing value when the entry was overwritten by `put`.
    pub new_value: Option<V>,
}

struct Entries<K: Hash + Eq, V> {
    lru: LruCache<K, V>,
    weight: u64,
}

/// Key-value store whose summed entry cost never exceeds a ceiling.
///
/// Least recently used entries are evicted first. All operations take a
/// single internal lock, so the cache can be shared between the thread that
/// owns the views and the fetch workers. Removal listeners run after the
/// lock is released.
pub struct BoundedCache<K: Hash + Eq, V> {
    entries: Mutex<Entries<K, V>>,
    max_weight: u64,
    weigher: Weigher<K, V>,
    listener: Option<RemovalListener<K, V>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<K, V> BoundedCache<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    /// Creates a cache where every entry costs one unit.
    #[must_use]
    pub fn new(max_weight: u64) -> Self {
        Self {
            entries: Mutex::new(Entries {
                lru: LruCache::unbounded(),
                weight: 0,
            }),
            max_weight,
            weigher: Box::new(|_, _| 1),
            listener: None,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Replaces the cost function.
    #[must_use]
    pub fn with_weigher(mut self, weigher: impl Fn(&K, &V) -> u64 + Send + Sync + 'static) -> Self {
        self.weigher = Box::new(weigher);
        self
    }

    /// Installs a listener notified once per removed entry.
    #[must_use]
    pub fn with_listener(
        mut self,
        listener: impl Fn(RemovalNotice<K, V>) + Send + Sync + 'static,
    ) -> Self {
        self.listener = Some(Box::new(listener));
        self
    }

    /// Returns the value for `key` and marks it most recently used.
    pub fn get(&self, key: &K) -> Option<V> {
        let value = self.entries.lock().lru.get(key).cloned();
        if value.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
        value
    }

    /// Returns the value for `key` without touching recency or statistics.
    pub fn peek(&self, key: &K) -> Option<V> {
        self.entries.lock().lru.peek(key).cloned()
    }

    /// Returns true if `key` is cached, without touching recency.
    pub fn contains_key(&self, key: &K) -> bool {
        self.entries.lock().lru.contains(key)
    }

    /// Stores `value` as the most recently used entry, then evicts from the
    /// least recently used end until the ceiling holds again.
    ///
    /// Returns the value previously stored under `key`. A value costing more
    /// than the whole ceiling is evicted straight away.
    pub fn put(&self, key: K, value: V) -> Option<V> {
        let cost = (self.weigher)(&key, &value);
        let mut notices = Vec::new();

        let previous = {
            let mut entries = self.entries.lock();
            entries.weight = entries.weight.saturating_add(cost);
            let previous = entries.lru.put(key.clone(), value.clone());
            if let Some(old) = &previous {
                entries.weight = entries.weight.saturating_sub((self.weigher)(&key, old));
                notices.push(RemovalNotice {
                    evicted: false,
                    key,
                    old_value: old.clone(),
                    new_value: Some(value),
                });
            }
            self.trim(&mut entries, self.max_weight, &mut notices);
            previous
        };

        self.notify(notices);
        previous
    }

    /// Removes `key`, returning its value.
    pub fn remove(&self, key: &K) -> Option<V> {
        let removed = {
            let mut entries = self.entries.lock();
            let removed = entries.lru.pop(key);
            if let Some(old) = &removed {
                entries.weight = entries.weight.saturating_sub((self.weigher)(key, old));
            }
            removed
        };

        if let Some(old) = &removed {
            self.notify(vec![RemovalNotice {
                evicted: false,
                key: key.clone(),
                old_value: old.clone(),
                new_value: None,
            }]);
        }
        removed
    }

    /// Evicts every entry, notifying the listener for each.
    pub fn clear(&self) {
        let mut notices = Vec::new();
        {
            let mut entries = self.entries.lock();
            self.trim(&mut entries, 0, &mut notices);
        }
        debug!(count = notices.len(), "Cleared bounded cache");
        self.notify(notices);
    }

    /// Copies the live entries, least recently used first.
    pub fn snapshot(&self) -> Vec<(K, V)> {
        self.entries
            .lock()
            .lru
            .iter()
            .rev()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.entries.lock().lru.len()
    }

    /// Returns true if nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Summed cost of the live entries.
    pub fn weight(&self) -> u64 {
        self.entries.lock().weight
    }

    /// The configured ceiling.
    #[must_use]
    pub const fn max_weight(&self) -> u64 {
        self.max_weight
    }

    /// Returns cache statistics.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        let hit_rate = if total > 0 {
            (hits as f64 / total as f64) * 100.0
        } else {
            0.0
        };
        let (size, weight) = {
            let entries = self.entries.lock();
            (entries.lru.len(), entries.weight)
        };
        CacheStats {
            hits,
            misses,
            hit_rate,
            size,
            weight,
        }
    }

    fn trim(
        &self,
        entries: &mut Entries<K, V>,
        limit: u64,
        notices: &mut Vec<RemovalNotice<K, V>>,
    ) {
        while entries.weight > limit || (limit == 0 && !entries.lru.is_empty()) {
            let Some((key, old_value)) = entries.lru.pop_lru() else {
                entries.weight = 0;
                break;
            };
            entries.weight = entries
                .weight
                .saturating_sub((self.weigher)(&key, &old_value));
            trace!(weight = entries.weight, limit, "Evicted least recently used entry");
            notices.push(RemovalNotice {
                evicted: true,
                key,
                old_value,
                new_value: None,
            });
        }
    }

    fn notify(&self, notices: Vec<RemovalNotice<K, V>>) {
        if let Some(listener) = &self.listener {
            for notice in notices {
                listener(notice);
            }
        }
    }
}

/// Cache of post-processed images, weighted by pixel bytes.
pub type ImageCache = BoundedCache<ImageId, Arc<DecodedImage>>;

impl BoundedCache<ImageId, Arc<DecodedImage>> {
    /// Creates an image cache holding at most `max_bytes` of pixels.
    #[must_use]
    pub fn for_images(max_bytes: u64) -> Self {
        Self::new(max_bytes).with_weigher(|_, image| image.byte_size())
    }
}

/// Statistics about cache performance.
#[derive(Debug, Clone)]
pub struct CacheStats {
    /// Number of cache hits.
    pub hits: u64,
    /// Number of cache misses.
    pub misses: u64,
    /// Hit rate as a percentage.
    pub hit_rate: f64,
    /// Current number of cached entries.
    pub size: usize,
    /// Summed cost of cached entries.
    pub weight: u64,
}

impl std::fmt::Display for CacheStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Cache: {} entries ({} bytes), {:.1}% hit rate ({} hits, {} misses)",
            self.size, self.weight, self.hit_rate, self.hits, self.misses
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    type Notices = Arc<Mutex<Vec<RemovalNotice<&'static str, u64>>>>;

    fn weighted(max: u64) -> (BoundedCache<&'static str, u64>, Notices) {
        let notices: Notices = Arc::default();
        let sink = notices.clone();
        let cache = BoundedCache::new(max)
            .with_weigher(|_, cost: &u64| *cost)
            .with_listener(move |notice| sink.lock().push(notice));
        (cache, notices)
    }

    #[test]
    fn test_cache_put_and_get() {
        let cache = BoundedCache::new(10);
        assert_eq!(cache.put("k", 1), None);
        assert_eq!(cache.get(&"k"), Some(1));
        assert_eq!(cache.put("k", 2), Some(1));
        assert_eq!(cache.get(&"k"), Some(2));
    }

    #[test]
    fn test_cost_eviction_scenario() {
        let (cache, notices) = weighted(1000);
        cache.put("k1", 600);
        cache.put("k2", 600);

        assert_eq!(cache.snapshot(), vec![("k2", 600)]);
        assert_eq!(cache.weight(), 600);

        let notices = notices.lock();
        assert_eq!(notices.len(), 1);
        assert_eq!(
            notices[0],
            RemovalNotice {
                evicted: true,
                key: "k1",
                old_value: 600,
                new_value: None,
            }
        );
    }

    #[test]
    fn test_get_promotes_entry() {
        let (cache, _) = weighted(3);
        cache.put("a", 1);
        cache.put("b", 1);
        cache.put("c", 1);

        cache.get(&"a");
        cache.put("d", 1);

        assert!(cache.contains_key(&"a"));
        assert!(!cache.contains_key(&"b"));
    }

    #[test]
    fn test_peek_does_not_promote() {
        let (cache, _) = weighted(2);
        cache.put("a", 1);
        cache.put("b", 1);

        assert_eq!(cache.peek(&"a"), Some(1));
        cache.put("c", 1);

        assert_eq!(cache.peek(&"a"), None);
        assert_eq!(cache.stats().hits, 0);
    }

    #[test]
    fn test_snapshot_is_lru_first() {
        let (cache, _) = weighted(10);
        cache.put("a", 1);
        cache.put("b", 1);
        cache.put("c", 1);
        cache.get(&"a");

        let keys: Vec<_> = cache.snapshot().into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["b", "c", "a"]);
    }

    #[test]
    fn test_oversized_value_is_evicted_immediately() {
        let (cache, notices) = weighted(100);
        cache.put("small", 10);
        cache.put("huge", 500);

        assert!(cache.is_empty());
        assert_eq!(cache.weight(), 0);
        let keys: Vec<_> = notices.lock().iter().map(|n| n.key).collect();
        assert_eq!(keys, vec!["small", "huge"]);
    }

    #[test]
    fn test_replacement_notifies_with_new_value() {
        let (cache, notices) = weighted(100);
        cache.put("k", 10);
        cache.put("k", 20);

        assert_eq!(cache.weight(), 20);
        let notices = notices.lock();
        assert_eq!(notices.len(), 1);
        assert!(!notices[0].evicted);
        assert_eq!(notices[0].old_value, 10);
        assert_eq!(notices[0].new_value, Some(20));
    }

    #[test]
    fn test_remove_and_clear_notify_once_each() {
        let (cache, notices) = weighted(100);
        cache.put("a", 1);
        cache.put("b", 2);
        cache.put("c", 3);

        assert_eq!(cache.remove(&"a"), Some(1));
        assert_eq!(cache.remove(&"a"), None);
        cache.clear();

        assert!(cache.is_empty());
        assert_eq!(cache.weight(), 0);
        let notices = notices.lock();
        let keys: Vec<_> = notices.iter().map(|n| (n.key, n.evicted)).collect();
        assert_eq!(keys, vec![("a", false), ("b", true), ("c", true)]);
    }

    #[test]
    fn test_clear_evicts_zero_cost_entries() {
        let (cache, notices) = weighted(100);
        cache.put("free", 0);
        cache.clear();

        assert!(cache.is_empty());
        assert_eq!(notices.lock().len(), 1);
    }

    #[test]
    fn test_concurrent_puts_and_gets_keep_ceiling() {
        const THREADS: u64 = 8;
        const PUTS_PER_THREAD: u64 = 500;

        let removed = Arc::new(AtomicU64::new(0));
        let counter = removed.clone();
        let cache = BoundedCache::new(1_000)
            .with_weigher(|_, cost: &u64| *cost)
            .with_listener(move |_: RemovalNotice<u64, u64>| {
                counter.fetch_add(1, Ordering::SeqCst);
            });

        std::thread::scope(|scope| {
            for thread in 0..THREADS {
                let cache = &cache;
                scope.spawn(move || {
                    for i in 0..PUTS_PER_THREAD {
                        let key = (thread * 31 + i) % 64;
                        cache.put(key, 10 + (i % 7) * 20);
                        let _ = cache.get(&((key + 1) % 64));
                        assert!(cache.weight() <= cache.max_weight());
                    }
                });
            }
        });

        let live = u64::try_from(cache.len()).expect("entry count fits");
        assert!(cache.weight() <= 1_000);
        assert_eq!(
            cache.weight(),
            cache.snapshot().iter().map(|(_, cost)| cost).sum::<u64>()
        );
        assert_eq!(
            removed.load(Ordering::SeqCst),
            THREADS * PUTS_PER_THREAD - live
        );
        let stats = cache.stats();
        assert_eq!(stats.hits + stats.misses, THREADS * PUTS_PER_THREAD);
    }

    #[test]
    fn test_cache_stats() {
        let cache = BoundedCache::new(10);
        cache.put("k", 1);
        let _ = cache.get(&"k");
        let _ = cache.get(&"missing");

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.size, 1);
        assert!((stats.hit_rate - 50.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_image_cache_weighs_pixels() {
        let cache = ImageCache::for_images(1000);
        cache.put(
            ImageId::new("a"),
            Arc::new(DecodedImage::solid(10, 10, [0, 0, 0, 255])),
        );
        assert_eq!(cache.weight(), 400);

        cache.put(
            ImageId::new("b"),
            Arc::new(DecodedImage::solid(10, 10, [0, 0, 0, 255])),
        );
        cache.put(
            ImageId::new("c"),
            Arc::new(DecodedImage::solid(10, 10, [0, 0, 0, 255])),
        );
        assert!(!cache.contains_key(&ImageId::new("a")));
        assert_eq!(cache.weight(), 800);
    }

    proptest! {
        #[test]
        fn prop_weight_never_exceeds_ceiling(
            ops in prop::collection::vec((0usize..8, 0u64..400, any::<bool>()), 1..64)
        ) {
            const KEYS: [&str; 8] = ["a", "b", "c", "d", "e", "f", "g", "h"];
            let (cache, notices) = weighted(1000);
            let mut inserted = 0usize;

            for (k, cost, touch) in ops {
                let key = KEYS[k];
                if touch {
                    let _ = cache.get(&key);
                } else {
                    cache.put(key, cost);
                    inserted += 1;

                    prop_assert!(
                        cache.contains_key(&key) || cost > 1000,
                        "most recent key evicted while others remained"
                    );
                }

                let live: u64 = cache.snapshot().iter().map(|(_, c)| *c).sum();
                prop_assert!(live <= 1000);
                prop_assert_eq!(live, cache.weight());
            }

            let removed = notices.lock().len();
            prop_assert_eq!(inserted, removed + cache.len());
        }
    }
}
