use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::application::events::{CacheStats, EventInput};
use crate::domain::events::{EventKind, EventRecord};

use super::error::ApiErrorMessage;

#[derive(Debug, Deserialize, Serialize)]
pub struct EventCreateRequest {
    pub subject_id: Option<i64>,
    #[serde(default)]
    pub kind: String,
    pub related_item_id: Option<i64>,
    pub category: Option<String>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub occurred_at: Option<OffsetDateTime>,
}

impl From<EventCreateRequest> for EventInput {
    fn from(request: EventCreateRequest) -> Self {
        Self {
            subject_id: request.subject_id,
            kind: request.kind,
            related_item_id: request.related_item_id,
            category: request.category,
            occurred_at: request.occurred_at,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct EventListQuery {
    pub subject_id: Option<i64>,
    pub kind: Option<String>,
    pub category: Option<String>,
    pub related_item_id: Option<i64>,
    pub from: Option<String>,
    pub to: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SummaryQuery {
    pub category: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventView {
    pub id: i64,
    pub subject_id: i64,
    pub kind: EventKind,
    pub related_item_id: Option<i64>,
    pub category: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub occurred_at: OffsetDateTime,
}

impl From<EventRecord> for EventView {
    fn from(record: EventRecord) -> Self {
        Self {
            id: record.id,
            subject_id: record.subject_id,
            kind: record.kind,
            related_item_id: record.related_item_id,
            category: record.category,
            occurred_at: record.occurred_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchItemStatus {
    Created,
    Failed,
}

#[derive(Debug, Serialize)]
pub struct BatchItemResult {
    pub index: usize,
    pub status: BatchItemStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event: Option<EventView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ApiErrorMessage>,
}

#[derive(Debug, Serialize)]
pub struct BatchResponse {
    pub created: usize,
    pub failed: usize,
    pub results: Vec<BatchItemResult>,
}

#[derive(Debug, Serialize)]
pub struct SummaryResponse {
    pub category: Option<String>,
    pub total: u64,
    pub counts: BTreeMap<EventKind, u64>,
}

#[derive(Debug, Serialize)]
pub struct CacheStatsResponse {
    pub size: usize,
    pub capacity: usize,
    pub message: String,
}

impl From<CacheStats> for CacheStatsResponse {
    fn from(stats: CacheStats) -> Self {
        Self {
            size: stats.size,
            capacity: stats.capacity,
            message: stats.message(),
        }
    }
}
