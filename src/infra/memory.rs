//! Process-local event store used when no database is configured.

use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use time::OffsetDateTime;

use crate::application::repos::{EventQueryFilter, EventsRepo, NewEventParams, RepoError};
use crate::domain::events::EventRecord;

/// Vec-backed [`EventsRepo`]. Contents vanish with the process.
#[derive(Default)]
pub struct InMemoryEventsRepo {
    state: Mutex<MemoryState>,
}

#[derive(Default)]
struct MemoryState {
    next_id: i64,
    events: Vec<EventRecord>,
}

impl InMemoryEventsRepo {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn matches(filter: &EventQueryFilter, event: &EventRecord) -> bool {
    filter.subject_id.is_none_or(|id| event.subject_id == id)
        && filter.kind.is_none_or(|kind| event.kind == kind)
        && filter
            .category
            .as_deref()
            .is_none_or(|category| event.category.as_deref() == Some(category))
        && filter
            .related_item_id
            .is_none_or(|id| event.related_item_id == Some(id))
        && filter.from.is_none_or(|from| event.occurred_at >= from)
        && filter.to.is_none_or(|to| event.occurred_at <= to)
}

#[async_trait]
impl EventsRepo for InMemoryEventsRepo {
    async fn persist(&self, params: NewEventParams) -> Result<EventRecord, RepoError> {
        let mut state = self.state();
        state.next_id += 1;

        let record = EventRecord {
            id: state.next_id,
            subject_id: params.subject_id,
            kind: params.kind,
            related_item_id: params.related_item_id,
            category: params.category,
            occurred_at: params.occurred_at.unwrap_or_else(OffsetDateTime::now_utc),
        };
        state.events.push(record.clone());
        Ok(record)
    }

    async fn query_with_filters(
        &self,
        filter: &EventQueryFilter,
    ) -> Result<Vec<EventRecord>, RepoError> {
        let mut results: Vec<EventRecord> = self
            .state()
            .events
            .iter()
            .filter(|event| matches(filter, event))
            .cloned()
            .collect();

        results.sort_by(|a, b| {
            b.occurred_at
                .cmp(&a.occurred_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        Ok(results)
    }

    async fn health_check(&self) -> Result<(), RepoError> {
        Ok(())
    }
}
