//! Ingested activity events and their kinds.

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::error::DomainError;

/// Kind of user activity an event records (mirrors Postgres enum `event_kind`).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, sqlx::Type,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "event_kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    View,
    AddToCart,
    Purchase,
}

impl EventKind {
    pub const ALL: [EventKind; 3] = [Self::View, Self::AddToCart, Self::Purchase];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::View => "VIEW",
            Self::AddToCart => "ADD_TO_CART",
            Self::Purchase => "PURCHASE",
        }
    }

    /// Parse a caller-supplied kind, ignoring case and surrounding whitespace.
    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        let normalized = raw.trim().to_ascii_uppercase();
        if normalized.is_empty() {
            return Err(DomainError::validation("event kind is required"));
        }
        normalized.parse().map_err(|_| {
            DomainError::validation(format!(
                "invalid event kind `{}`: must be VIEW, ADD_TO_CART, or PURCHASE (case-insensitive)",
                raw.trim()
            ))
        })
    }
}

impl Display for EventKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "VIEW" => Ok(Self::View),
            "ADD_TO_CART" => Ok(Self::AddToCart),
            "PURCHASE" => Ok(Self::Purchase),
            _ => Err(()),
        }
    }
}

/// A persisted event. Never mutated after the store assigns its id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventRecord {
    pub id: i64,
    pub subject_id: i64,
    pub kind: EventKind,
    pub related_item_id: Option<i64>,
    pub category: Option<String>,
    pub occurred_at: OffsetDateTime,
}
