//! Event ingestion and the cached read paths built on top of it.

use std::collections::BTreeMap;
use std::sync::Arc;

use metrics::counter;
use thiserror::Error;
use time::OffsetDateTime;
use tracing::{debug, info};

use crate::application::repos::{EventQueryFilter, EventsRepo, NewEventParams, RepoError};
use crate::cache::{BoundedEventLog, CacheConfig, QueryResultCache, QuerySignature};
use crate::domain::error::DomainError;
use crate::domain::events::{EventKind, EventRecord};

const SOURCE: &str = "application::events";
pub(crate) const METRIC_INGEST: &str = "eventfeed_ingest_total";

#[derive(Debug, Error)]
pub enum EventError {
    #[error(transparent)]
    Validation(#[from] DomainError),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

/// Caller-supplied event before validation.
#[derive(Debug, Clone, Default)]
pub struct EventInput {
    pub subject_id: Option<i64>,
    pub kind: String,
    pub related_item_id: Option<i64>,
    pub category: Option<String>,
    pub occurred_at: Option<OffsetDateTime>,
}

impl EventInput {
    fn validate(self) -> Result<NewEventParams, DomainError> {
        let subject_id = self
            .subject_id
            .ok_or_else(|| DomainError::validation("subject_id is required"))?;
        let kind = EventKind::parse(&self.kind)?;

        Ok(NewEventParams {
            subject_id,
            kind,
            related_item_id: self.related_item_id,
            category: non_blank(self.category),
            occurred_at: self.occurred_at,
        })
    }
}

/// Raw query filters as received from a caller.
#[derive(Debug, Clone, Default)]
pub struct EventQuery {
    pub subject_id: Option<i64>,
    pub kind: Option<String>,
    pub category: Option<String>,
    pub related_item_id: Option<i64>,
    pub from: Option<OffsetDateTime>,
    pub to: Option<OffsetDateTime>,
}

impl EventQuery {
    /// Normalize into a store filter. Blank strings count as absent.
    pub fn into_filter(self) -> Result<EventQueryFilter, DomainError> {
        let kind = non_blank(self.kind)
            .map(|raw| EventKind::parse(&raw))
            .transpose()?;

        if let (Some(from), Some(to)) = (self.from, self.to)
            && from > to
        {
            return Err(DomainError::validation("`from` must not be later than `to`"));
        }

        Ok(EventQueryFilter {
            subject_id: self.subject_id,
            kind,
            category: non_blank(self.category),
            related_item_id: self.related_item_id,
            from: self.from,
            to: self.to,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub size: usize,
    pub capacity: usize,
}

impl CacheStats {
    pub fn message(&self) -> String {
        format!("Cache contains {}/{} entries", self.size, self.capacity)
    }
}

/// Owns the recent-event log and the query cache, and keeps both in step
/// with the durable store.
///
/// Ingest runs `validate → persist → log → invalidate`; nothing past a failed
/// step executes, so a rejected or unpersisted event never reaches either cache.
pub struct IngestCoordinator {
    repo: Arc<dyn EventsRepo>,
    log: BoundedEventLog,
    cache: QueryResultCache,
    recent_window: usize,
}

impl IngestCoordinator {
    pub fn new(repo: Arc<dyn EventsRepo>, config: &CacheConfig) -> Self {
        Self {
            repo,
            log: BoundedEventLog::new(config),
            cache: QueryResultCache::new(config),
            recent_window: config.recent_window,
        }
    }

    pub async fn ingest(&self, input: EventInput) -> Result<EventRecord, EventError> {
        let params = match input.validate() {
            Ok(params) => params,
            Err(err) => {
                counter!(METRIC_INGEST, "outcome" => "rejected").increment(1);
                return Err(err.into());
            }
        };

        let record = match self.repo.persist(params).await {
            Ok(record) => record,
            Err(err) => {
                counter!(METRIC_INGEST, "outcome" => "failed").increment(1);
                return Err(err.into());
            }
        };

        self.log.append(record.clone());
        self.cache.invalidate_all();
        counter!(METRIC_INGEST, "outcome" => "stored").increment(1);

        debug!(
            target = SOURCE,
            event_id = record.id,
            subject_id = record.subject_id,
            kind = %record.kind,
            "Ingested event"
        );
        Ok(record)
    }

    /// Ingest each input independently, in order. One failure never blocks the rest.
    pub async fn ingest_batch(
        &self,
        inputs: Vec<EventInput>,
    ) -> Vec<Result<EventRecord, EventError>> {
        let mut results = Vec::with_capacity(inputs.len());
        for input in inputs {
            results.push(self.ingest(input).await);
        }
        results
    }

    /// Events matching `query`, newest first, served from the cache when possible.
    pub async fn query_events(&self, query: EventQuery) -> Result<Vec<EventRecord>, EventError> {
        let filter = query.into_filter()?;
        let signature = QuerySignature::from(&filter);

        if let Some(cached) = self.cache.get(&signature) {
            return Ok(cached);
        }

        // An ingest committing during the read bumps the generation, and the
        // now-stale result is then kept out of the cache.
        let generation = self.cache.generation();
        let results = self.repo.query_with_filters(&filter).await?;
        self.cache.put(signature, results.clone(), generation);
        Ok(results)
    }

    /// The most recent events from the in-memory log, oldest first.
    pub fn recent_events(&self) -> Vec<EventRecord> {
        self.log.recent(self.recent_window)
    }

    /// Counts by kind over the recent log. `category` must match exactly.
    pub fn event_summary(&self, category: Option<&str>) -> BTreeMap<EventKind, u64> {
        self.log.summarize(category)
    }

    pub fn cache_stats(&self) -> CacheStats {
        CacheStats {
            size: self.cache.len(),
            capacity: self.cache.capacity(),
        }
    }

    pub fn clear_cache(&self) {
        let dropped = self.cache.invalidate_all();
        info!(target = SOURCE, dropped, "Cleared query cache");
    }

    pub async fn health_check(&self) -> Result<(), RepoError> {
        self.repo.health_check().await
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.and_then(|raw| {
        let trimmed = raw.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use crate::infra::memory::InMemoryEventsRepo;

    use super::*;

    /// Counts store calls and optionally fails writes.
    struct CountingRepo {
        inner: InMemoryEventsRepo,
        queries: AtomicUsize,
        fail_persist: bool,
    }

    impl CountingRepo {
        fn new(fail_persist: bool) -> Self {
            Self {
                inner: InMemoryEventsRepo::new(),
                queries: AtomicUsize::new(0),
                fail_persist,
            }
        }
    }

    #[async_trait]
    impl EventsRepo for CountingRepo {
        async fn persist(&self, params: NewEventParams) -> Result<EventRecord, RepoError> {
            if self.fail_persist {
                return Err(RepoError::from_persistence("store unavailable"));
            }
            self.inner.persist(params).await
        }

        async fn query_with_filters(
            &self,
            filter: &EventQueryFilter,
        ) -> Result<Vec<EventRecord>, RepoError> {
            self.queries.fetch_add(1, Ordering::SeqCst);
            self.inner.query_with_filters(filter).await
        }

        async fn health_check(&self) -> Result<(), RepoError> {
            Ok(())
        }
    }

    fn coordinator(repo: Arc<CountingRepo>) -> IngestCoordinator {
        IngestCoordinator::new(repo, &CacheConfig::default())
    }

    fn input(subject_id: i64, kind: &str, category: Option<&str>) -> EventInput {
        EventInput {
            subject_id: Some(subject_id),
            kind: kind.to_string(),
            related_item_id: Some(42),
            category: category.map(str::to_string),
            occurred_at: None,
        }
    }

    #[tokio::test]
    async fn ingest_normalizes_kind_before_persisting_and_logging() {
        let repo = Arc::new(CountingRepo::new(false));
        let events = coordinator(repo.clone());

        let record = events.ingest(input(1, "view", Some("books"))).await.unwrap();
        assert_eq!(record.kind, EventKind::View);

        let recent = events.recent_events();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].kind, EventKind::View);
        assert_eq!(events.event_summary(None).get(&EventKind::View), Some(&1));
    }

    #[tokio::test]
    async fn rejected_kind_leaves_log_and_cache_untouched() {
        let repo = Arc::new(CountingRepo::new(false));
        let events = coordinator(repo.clone());
        events.query_events(EventQuery::default()).await.unwrap();
        assert_eq!(events.cache_stats().size, 1);

        let err = events.ingest(input(1, "unknown", None)).await.unwrap_err();
        assert!(matches!(err, EventError::Validation(_)));
        assert!(events.recent_events().is_empty());
        assert_eq!(events.cache_stats().size, 1);
    }

    #[tokio::test]
    async fn missing_subject_is_rejected() {
        let events = coordinator(Arc::new(CountingRepo::new(false)));
        let err = events
            .ingest(EventInput {
                kind: "VIEW".to_string(),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(err.to_string().contains("subject_id is required"));
    }

    #[tokio::test]
    async fn persist_failure_skips_log_and_invalidation() {
        let repo = Arc::new(CountingRepo::new(true));
        let events = coordinator(repo.clone());
        events.query_events(EventQuery::default()).await.unwrap();

        let err = events.ingest(input(1, "PURCHASE", None)).await.unwrap_err();
        assert!(matches!(err, EventError::Repo(RepoError::Persistence(_))));
        assert!(events.recent_events().is_empty());
        assert_eq!(events.cache_stats().size, 1);
    }

    #[tokio::test]
    async fn successful_ingest_empties_query_cache() {
        let repo = Arc::new(CountingRepo::new(false));
        let events = coordinator(repo.clone());
        events.ingest(input(1, "VIEW", None)).await.unwrap();

        events.query_events(EventQuery::default()).await.unwrap();
        events
            .query_events(EventQuery {
                subject_id: Some(1),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(events.cache_stats().size, 2);

        events.ingest(input(2, "VIEW", None)).await.unwrap();
        assert_eq!(events.cache_stats().size, 0);

        let all = events.query_events(EventQuery::default()).await.unwrap();
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn repeated_query_is_served_from_cache() {
        let repo = Arc::new(CountingRepo::new(false));
        let events = coordinator(repo.clone());
        events.ingest(input(1, "VIEW", Some("books"))).await.unwrap();

        let query = EventQuery {
            kind: Some("view".to_string()),
            ..Default::default()
        };
        let mut first = events.query_events(query.clone()).await.unwrap();
        first.clear();

        // Upper-case kind normalizes to the same signature.
        let second = events
            .query_events(EventQuery {
                kind: Some("VIEW".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(second.len(), 1);
        assert_eq!(repo.queries.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn blank_filters_count_as_absent() {
        let repo = Arc::new(CountingRepo::new(false));
        let events = coordinator(repo.clone());
        events.ingest(input(1, "VIEW", Some("books"))).await.unwrap();

        events.query_events(EventQuery::default()).await.unwrap();
        let results = events
            .query_events(EventQuery {
                kind: Some("  ".to_string()),
                category: Some(String::new()),
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(repo.queries.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unknown_kind_filter_is_a_validation_error() {
        let events = coordinator(Arc::new(CountingRepo::new(false)));
        let err = events
            .query_events(EventQuery {
                kind: Some("bogus".to_string()),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, EventError::Validation(_)));
        assert_eq!(events.cache_stats().size, 0);
    }

    #[tokio::test]
    async fn batch_items_succeed_or_fail_independently() {
        let events = coordinator(Arc::new(CountingRepo::new(false)));
        let results = events
            .ingest_batch(vec![
                input(1, "VIEW", None),
                input(2, "nope", None),
                input(3, "add_to_cart", None),
            ])
            .await;

        assert!(results[0].is_ok());
        assert!(results[1].is_err());
        assert_eq!(
            results[2].as_ref().map(|record| record.kind).ok(),
            Some(EventKind::AddToCart)
        );
        assert_eq!(events.recent_events().len(), 2);
    }

    #[tokio::test]
    async fn summary_totals_match_log_length_and_respect_category() {
        let events = coordinator(Arc::new(CountingRepo::new(false)));
        events.ingest(input(1, "VIEW", Some("books"))).await.unwrap();
        events.ingest(input(1, "PURCHASE", Some("books"))).await.unwrap();
        events.ingest(input(2, "VIEW", Some("games"))).await.unwrap();

        let all = events.event_summary(None);
        assert_eq!(all.values().sum::<u64>(), 3);

        let games = events.event_summary(Some("games"));
        assert_eq!(games.get(&EventKind::View), Some(&1));
        assert_eq!(games.get(&EventKind::Purchase), None);
    }

    #[tokio::test]
    async fn summary_category_is_matched_exactly() {
        let events = coordinator(Arc::new(CountingRepo::new(false)));
        events.ingest(input(1, "VIEW", Some("games"))).await.unwrap();

        assert_eq!(events.event_summary(Some("games")).get(&EventKind::View), Some(&1));
        assert!(events.event_summary(Some(" games ")).is_empty());
    }

    #[tokio::test]
    async fn recent_events_are_capped_by_window() {
        let config = CacheConfig {
            recent_window: 2,
            ..Default::default()
        };
        let events = IngestCoordinator::new(Arc::new(CountingRepo::new(false)), &config);
        for subject in 1..=4 {
            events.ingest(input(subject, "VIEW", None)).await.unwrap();
        }

        let subjects: Vec<i64> = events
            .recent_events()
            .iter()
            .map(|record| record.subject_id)
            .collect();
        assert_eq!(subjects, vec![3, 4]);
    }

    #[tokio::test]
    async fn clear_cache_and_stats_message() {
        let events = coordinator(Arc::new(CountingRepo::new(false)));
        events.query_events(EventQuery::default()).await.unwrap();

        let stats = events.cache_stats();
        assert_eq!(stats.message(), "Cache contains 1/100 entries");

        events.clear_cache();
        assert_eq!(events.cache_stats().size, 0);
    }

    #[test]
    fn reversed_time_range_is_rejected() {
        let now = OffsetDateTime::now_utc();
        let err = EventQuery {
            from: Some(now),
            to: Some(now - time::Duration::hours(1)),
            ..Default::default()
        }
        .into_filter()
        .unwrap_err();
        assert!(err.to_string().contains("`from`"));
    }
}
