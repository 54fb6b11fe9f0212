//! Bounded log of recently ingested events.
//!
//! Backs the "recent" and "summary" dashboard views without touching the store.

use std::collections::{BTreeMap, VecDeque};
use std::num::NonZeroUsize;
use std::sync::Mutex;

use metrics::{counter, gauge};
use tracing::debug;

use crate::domain::events::{EventKind, EventRecord};

use super::config::CacheConfig;
use super::lock::mutex_lock;

const SOURCE: &str = "cache::recent";
pub(crate) const METRIC_RECENT_LOG_LEN: &str = "eventfeed_recent_log_len";
pub(crate) const METRIC_RECENT_LOG_EVICT: &str = "eventfeed_recent_log_evict_total";

/// Fixed-capacity FIFO of the most recently persisted events.
///
/// Appending at capacity evicts the oldest event inside the same critical
/// section, so readers never see the log above capacity or half-updated.
pub struct BoundedEventLog {
    events: Mutex<VecDeque<EventRecord>>,
    capacity: NonZeroUsize,
}

impl BoundedEventLog {
    /// Create an empty log sized by the given configuration.
    pub fn new(config: &CacheConfig) -> Self {
        let capacity = config.recent_log_capacity_non_zero();
        Self {
            events: Mutex::new(VecDeque::with_capacity(capacity.get())),
            capacity,
        }
    }

    /// Append `event` as the newest element, evicting the oldest ones past capacity.
    pub fn append(&self, event: EventRecord) {
        let mut events = mutex_lock(&self.events, SOURCE, "append");
        events.push_back(event);

        let mut evicted = 0u64;
        while events.len() > self.capacity.get() {
            if let Some(oldest) = events.pop_front() {
                debug!(event_id = oldest.id, "Evicted oldest event from recent log");
                evicted += 1;
            }
        }
        let len = events.len();
        drop(events);

        if evicted > 0 {
            counter!(METRIC_RECENT_LOG_EVICT).increment(evicted);
        }
        gauge!(METRIC_RECENT_LOG_LEN).set(len as f64);
    }

    /// Point-in-time copy of every retained event, oldest first.
    pub fn snapshot(&self) -> Vec<EventRecord> {
        mutex_lock(&self.events, SOURCE, "snapshot")
            .iter()
            .cloned()
            .collect()
    }

    /// The `k` most recently appended events, oldest of the selection first.
    pub fn recent(&self, k: usize) -> Vec<EventRecord> {
        let events = mutex_lock(&self.events, SOURCE, "recent");
        let skip = events.len().saturating_sub(k);
        events.iter().skip(skip).cloned().collect()
    }

    /// Count retained events by kind, optionally restricted to one category.
    ///
    /// The category match is exact; `None` counts every retained event.
    pub fn summarize(&self, category: Option<&str>) -> BTreeMap<EventKind, u64> {
        let events = mutex_lock(&self.events, SOURCE, "summarize");
        let mut counts = BTreeMap::new();
        for event in events.iter().filter(|event| match category {
            Some(wanted) => event.category.as_deref() == Some(wanted),
            None => true,
        }) {
            *counts.entry(event.kind).or_insert(0) += 1;
        }
        counts
    }

    pub fn len(&self) -> usize {
        mutex_lock(&self.events, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity.get()
    }
}
