//! Cache configuration.
//!
//! Sizes the recent-event log and the query result cache via `eventfeed.toml`.

use std::num::NonZeroUsize;

use serde::Deserialize;

pub(crate) const DEFAULT_RECENT_LOG_CAPACITY: usize = 500;
pub(crate) const DEFAULT_RECENT_WINDOW: usize = 20;
pub(crate) const DEFAULT_QUERY_CACHE_CAPACITY: usize = 100;

/// Cache configuration from `eventfeed.toml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum events retained by the recent-event log.
    pub recent_log_capacity: usize,
    /// Number of events returned by the "recent" view.
    pub recent_window: usize,
    /// Maximum query signatures held by the result cache.
    pub query_cache_capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            recent_log_capacity: DEFAULT_RECENT_LOG_CAPACITY,
            recent_window: DEFAULT_RECENT_WINDOW,
            query_cache_capacity: DEFAULT_QUERY_CACHE_CAPACITY,
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            recent_log_capacity: settings.recent_log_capacity.get(),
            recent_window: settings.recent_window.get(),
            query_cache_capacity: settings.query_cache_capacity.get(),
        }
    }
}

impl CacheConfig {
    /// Returns the log capacity as NonZeroUsize, clamping to 1 if zero.
    pub fn recent_log_capacity_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.recent_log_capacity).unwrap_or(NonZeroUsize::MIN)
    }

    /// Returns the query cache capacity as NonZeroUsize, clamping to 1 if zero.
    pub fn query_cache_capacity_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.query_cache_capacity).unwrap_or(NonZeroUsize::MIN)
    }
}
