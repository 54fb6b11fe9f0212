//! Repository traits describing persistence adapters.

use async_trait::async_trait;
use thiserror::Error;
use time::OffsetDateTime;

use crate::domain::events::{EventKind, EventRecord};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("integrity error: {message}")]
    Integrity { message: String },
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

/// Optional filters for event lookups. `None` means "no restriction".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventQueryFilter {
    pub subject_id: Option<i64>,
    pub kind: Option<EventKind>,
    pub category: Option<String>,
    pub related_item_id: Option<i64>,
    pub from: Option<OffsetDateTime>,
    pub to: Option<OffsetDateTime>,
}

#[derive(Debug, Clone)]
pub struct NewEventParams {
    pub subject_id: i64,
    pub kind: EventKind,
    pub related_item_id: Option<i64>,
    pub category: Option<String>,
    /// Store assigns the current time when absent.
    pub occurred_at: Option<OffsetDateTime>,
}

#[async_trait]
pub trait EventsRepo: Send + Sync {
    /// Store a new event and return it with its assigned id and timestamp.
    async fn persist(&self, params: NewEventParams) -> Result<EventRecord, RepoError>;

    /// Events matching every present filter, newest first.
    ///
    /// `from` and `to` are inclusive bounds on `occurred_at`.
    async fn query_with_filters(
        &self,
        filter: &EventQueryFilter,
    ) -> Result<Vec<EventRecord>, RepoError>;

    async fn health_check(&self) -> Result<(), RepoError>;
}
