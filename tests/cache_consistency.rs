//! Query cache consistency under concurrent ingest.
//!
//! A read that misses the cache and is still waiting on the store must not
//! repopulate the cache after an ingest has invalidated it.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::Notify;

use eventfeed::application::events::{EventInput, EventQuery, IngestCoordinator};
use eventfeed::application::repos::{EventQueryFilter, EventsRepo, NewEventParams, RepoError};
use eventfeed::cache::CacheConfig;
use eventfeed::domain::events::EventRecord;
use eventfeed::infra::memory::InMemoryEventsRepo;

/// Store whose reads can be parked after fetching, until released.
struct StallingRepo {
    inner: InMemoryEventsRepo,
    stall_reads: AtomicBool,
    read_fetched: Notify,
    release_read: Notify,
}

impl StallingRepo {
    fn new() -> Self {
        Self {
            inner: InMemoryEventsRepo::new(),
            stall_reads: AtomicBool::new(false),
            read_fetched: Notify::new(),
            release_read: Notify::new(),
        }
    }
}

#[async_trait]
impl EventsRepo for StallingRepo {
    async fn persist(&self, params: NewEventParams) -> Result<EventRecord, RepoError> {
        self.inner.persist(params).await
    }

    async fn query_with_filters(
        &self,
        filter: &EventQueryFilter,
    ) -> Result<Vec<EventRecord>, RepoError> {
        let results = self.inner.query_with_filters(filter).await?;
        if self.stall_reads.load(Ordering::SeqCst) {
            self.read_fetched.notify_one();
            self.release_read.notified().await;
        }
        Ok(results)
    }

    async fn health_check(&self) -> Result<(), RepoError> {
        Ok(())
    }
}

fn view(subject_id: i64) -> EventInput {
    EventInput {
        subject_id: Some(subject_id),
        kind: "VIEW".to_string(),
        ..Default::default()
    }
}

#[tokio::test]
async fn read_racing_an_ingest_does_not_cache_stale_results() {
    let repo = Arc::new(StallingRepo::new());
    let events = Arc::new(IngestCoordinator::new(
        repo.clone(),
        &CacheConfig::default(),
    ));

    repo.stall_reads.store(true, Ordering::SeqCst);
    let reader = {
        let events = Arc::clone(&events);
        tokio::spawn(async move { events.query_events(EventQuery::default()).await })
    };
    repo.read_fetched.notified().await;

    events.ingest(view(1)).await.expect("ingest while read is parked");
    assert_eq!(events.cache_stats().size, 0);

    repo.release_read.notify_one();
    let stale = reader
        .await
        .expect("reader task should finish")
        .expect("parked read should succeed");
    assert!(stale.is_empty());
    assert_eq!(events.cache_stats().size, 0);

    repo.stall_reads.store(false, Ordering::SeqCst);
    let fresh = events
        .query_events(EventQuery::default())
        .await
        .expect("query after ingest");
    assert_eq!(fresh.len(), 1);
    assert_eq!(fresh[0].subject_id, 1);
    assert_eq!(events.cache_stats().size, 1);
}

#[tokio::test]
async fn read_without_concurrent_ingest_is_cached() {
    let repo = Arc::new(StallingRepo::new());
    let events = IngestCoordinator::new(repo.clone(), &CacheConfig::default());
    events.ingest(view(1)).await.expect("ingest");

    let first = events
        .query_events(EventQuery::default())
        .await
        .expect("first query");
    assert_eq!(first.len(), 1);
    assert_eq!(events.cache_stats().size, 1);
}
