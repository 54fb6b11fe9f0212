//! Query result cache storage.

use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use lru::LruCache;
use metrics::counter;
use tracing::debug;

use crate::domain::events::EventRecord;

use super::config::CacheConfig;
use super::keys::QuerySignature;
use super::lock::mutex_lock;

const SOURCE: &str = "cache::store";
pub(crate) const METRIC_QUERY_CACHE_HIT: &str = "eventfeed_query_cache_hit_total";
pub(crate) const METRIC_QUERY_CACHE_MISS: &str = "eventfeed_query_cache_miss_total";
pub(crate) const METRIC_QUERY_CACHE_EVICT: &str = "eventfeed_query_cache_evict_total";
pub(crate) const METRIC_QUERY_CACHE_INVALIDATE: &str = "eventfeed_query_cache_invalidate_total";

/// LRU map from query signature to the ordered result list of that query.
///
/// Lookups refresh recency, so both `get` and `put` take the single mutex.
/// Values are cloned in and out; callers never share storage with the cache.
///
/// Every `invalidate_all` advances a generation. A result read from the store
/// under an older generation is refused by `put`, so a read that raced an
/// ingest never repopulates the cache with pre-ingest data.
pub struct QueryResultCache {
    entries: Mutex<LruCache<QuerySignature, Vec<EventRecord>>>,
    generation: AtomicU64,
    capacity: NonZeroUsize,
}

impl QueryResultCache {
    /// Create an empty cache with the configured capacity.
    pub fn new(config: &CacheConfig) -> Self {
        let capacity = config.query_cache_capacity_non_zero();
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            generation: AtomicU64::new(0),
            capacity,
        }
    }

    /// Look up a cached result, marking the entry most recently used on hit.
    pub fn get(&self, signature: &QuerySignature) -> Option<Vec<EventRecord>> {
        let found = mutex_lock(&self.entries, SOURCE, "get")
            .get(signature)
            .cloned();

        match found {
            Some(results) => {
                counter!(METRIC_QUERY_CACHE_HIT).increment(1);
                debug!(?signature, results = results.len(), "Query cache hit");
                Some(results)
            }
            None => {
                counter!(METRIC_QUERY_CACHE_MISS).increment(1);
                debug!(?signature, "Query cache miss");
                None
            }
        }
    }

    /// Current invalidation generation. Capture it before reading the store.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Insert or replace the result for `signature`, read under `generation`.
    ///
    /// Returns the signature evicted to make room, if any. Replacing an
    /// existing key refreshes its recency and never evicts. Nothing is stored
    /// when the cache was invalidated after `generation` was captured.
    pub fn put(
        &self,
        signature: QuerySignature,
        results: Vec<EventRecord>,
        generation: u64,
    ) -> Option<QuerySignature> {
        let mut entries = mutex_lock(&self.entries, SOURCE, "put");
        let current = self.generation.load(Ordering::SeqCst);
        if current != generation {
            drop(entries);
            debug!(?signature, generation, current, "Skipped stale query result");
            return None;
        }
        let displaced = entries.push(signature.clone(), results);
        drop(entries);

        let evicted = displaced
            .map(|(key, _)| key)
            .filter(|key| *key != signature);
        if let Some(key) = &evicted {
            counter!(METRIC_QUERY_CACHE_EVICT).increment(1);
            debug!(signature = ?key, "Evicted least recently used query result");
        }
        evicted
    }

    /// Drop every cached result and advance the generation.
    ///
    /// Returns the number of entries dropped.
    pub fn invalidate_all(&self) -> usize {
        let mut entries = mutex_lock(&self.entries, SOURCE, "invalidate_all");
        let dropped = entries.len();
        entries.clear();
        self.generation.fetch_add(1, Ordering::SeqCst);
        drop(entries);

        counter!(METRIC_QUERY_CACHE_INVALIDATE).increment(1);
        debug!(dropped, "Invalidated query cache");
        dropped
    }

    pub fn len(&self) -> usize {
        mutex_lock(&self.entries, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity.get()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use time::OffsetDateTime;

    use crate::domain::events::EventKind;

    use super::*;

    fn signature(subject_id: i64) -> QuerySignature {
        QuerySignature {
            subject_id: Some(subject_id),
            kind: None,
            category: None,
            related_item_id: None,
            from: None,
            to: None,
        }
    }

    fn results(id: i64) -> Vec<EventRecord> {
        vec![EventRecord {
            id,
            subject_id: id,
            kind: EventKind::View,
            related_item_id: None,
            category: None,
            occurred_at: OffsetDateTime::now_utc(),
        }]
    }

    fn store(
        cache: &QueryResultCache,
        signature: QuerySignature,
        results: Vec<EventRecord>,
    ) -> Option<QuerySignature> {
        cache.put(signature, results, cache.generation())
    }

    fn cache_with_capacity(capacity: usize) -> QueryResultCache {
        QueryResultCache::new(&CacheConfig {
            query_cache_capacity: capacity,
            ..Default::default()
        })
    }

    #[test]
    fn evicts_least_recently_inserted_without_reads() {
        let cache = cache_with_capacity(2);
        assert!(store(&cache, signature(1), results(1)).is_none());
        assert!(store(&cache, signature(2), results(2)).is_none());

        let evicted = store(&cache, signature(3), results(3));
        assert_eq!(evicted, Some(signature(1)));
        assert!(cache.get(&signature(1)).is_none());
        assert!(cache.get(&signature(2)).is_some());
        assert!(cache.get(&signature(3)).is_some());
    }

    #[test]
    fn get_refreshes_recency() {
        let cache = cache_with_capacity(2);
        store(&cache, signature(1), results(1));
        store(&cache, signature(2), results(2));
        assert!(cache.get(&signature(1)).is_some());

        let evicted = store(&cache, signature(3), results(3));
        assert_eq!(evicted, Some(signature(2)));
        assert!(cache.get(&signature(1)).is_some());
        assert!(cache.get(&signature(2)).is_none());
    }

    #[test]
    fn replacing_a_key_refreshes_without_eviction() {
        let cache = cache_with_capacity(2);
        store(&cache, signature(1), results(1));
        store(&cache, signature(2), results(2));

        assert!(store(&cache, signature(1), results(10)).is_none());
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get(&signature(1)), Some(results(10)));

        let evicted = store(&cache, signature(3), results(3));
        assert_eq!(evicted, Some(signature(2)));
    }

    #[test]
    fn returned_results_are_independent_copies() {
        let cache = cache_with_capacity(4);
        store(&cache, signature(1), results(1));

        let mut first = cache.get(&signature(1)).expect("cached");
        first.clear();

        assert_eq!(cache.get(&signature(1)), Some(results(1)));
    }

    #[test]
    fn invalidate_all_empties_cache() {
        let cache = cache_with_capacity(4);
        store(&cache, signature(1), results(1));
        store(&cache, signature(2), results(2));

        assert_eq!(cache.invalidate_all(), 2);
        assert!(cache.is_empty());
        assert!(cache.get(&signature(1)).is_none());
        assert_eq!(cache.capacity(), 4);
    }

    #[test]
    fn put_refuses_results_read_before_invalidation() {
        let cache = cache_with_capacity(4);
        let before = cache.generation();

        cache.invalidate_all();
        assert!(cache.put(signature(1), results(1), before).is_none());
        assert!(cache.is_empty());

        store(&cache, signature(1), results(1));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn concurrent_access_stays_within_capacity() {
        let cache = Arc::new(cache_with_capacity(8));

        let handles: Vec<_> = (0..4)
            .map(|worker| {
                let cache = Arc::clone(&cache);
                thread::spawn(move || {
                    for seq in 0..200 {
                        let key = worker * 1_000 + seq % 16;
                        if cache.get(&signature(key)).is_none() {
                            store(&cache, signature(key), results(key));
                        }
                        assert!(cache.len() <= 8);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().expect("cache worker should finish");
        }

        assert!(cache.len() <= 8);
    }
}
