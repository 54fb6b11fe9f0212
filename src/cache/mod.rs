//! In-process event caches.
//!
//! Two independent structures back the read side of the service:
//!
//! - **Recent log**: a bounded FIFO of the latest persisted events, used by the
//!   "recent" and "summary" views.
//! - **Query cache**: an LRU map from [`QuerySignature`] to a materialized query
//!   result, cleared wholesale on every successful ingest.
//!
//! Each structure guards its state with its own mutex; they never share a lock.
//!
//! ## Configuration
//!
//! Capacities come from the `[cache]` section of `eventfeed.toml`:
//!
//! ```toml
//! [cache]
//! recent_log_capacity = 500
//! recent_window = 20
//! query_cache_capacity = 100
//! ```

mod config;
mod keys;
mod lock;
mod recent;
mod store;

pub use config::CacheConfig;
pub use keys::QuerySignature;
pub use recent::BoundedEventLog;
pub use store::QueryResultCache;

pub(crate) use recent::{METRIC_RECENT_LOG_EVICT, METRIC_RECENT_LOG_LEN};
pub(crate) use store::{
    METRIC_QUERY_CACHE_EVICT, METRIC_QUERY_CACHE_HIT, METRIC_QUERY_CACHE_INVALIDATE,
    METRIC_QUERY_CACHE_MISS,
};
