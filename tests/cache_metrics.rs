use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use metrics_util::debugging::DebuggingRecorder;

use eventfeed::application::events::{EventInput, EventQuery, IngestCoordinator};
use eventfeed::application::repos::{EventQueryFilter, EventsRepo, NewEventParams, RepoError};
use eventfeed::cache::CacheConfig;
use eventfeed::domain::events::EventRecord;
use eventfeed::infra::memory::InMemoryEventsRepo;

struct RejectingRepo;

#[async_trait]
impl EventsRepo for RejectingRepo {
    async fn persist(&self, _params: NewEventParams) -> Result<EventRecord, RepoError> {
        Err(RepoError::from_persistence("write refused"))
    }

    async fn query_with_filters(
        &self,
        _filter: &EventQueryFilter,
    ) -> Result<Vec<EventRecord>, RepoError> {
        Ok(Vec::new())
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

fn by_subject(subject_id: i64) -> EventQuery {
    EventQuery {
        subject_id: Some(subject_id),
        ..Default::default()
    }
}

#[tokio::test]
async fn cache_paths_emit_expected_metric_keys() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    recorder
        .install()
        .expect("debug metrics recorder should install in this test process");

    let config = CacheConfig {
        recent_log_capacity: 1,
        recent_window: 1,
        query_cache_capacity: 1,
    };
    let events = IngestCoordinator::new(Arc::new(InMemoryEventsRepo::new()), &config);

    // Log eviction, gauge and stored outcome.
    events.ingest(view(1)).await.expect("first ingest");
    events.ingest(view(2)).await.expect("second ingest");

    // Query cache miss, hit and eviction.
    events.query_events(by_subject(1)).await.expect("miss");
    events.query_events(by_subject(1)).await.expect("hit");
    events.query_events(by_subject(2)).await.expect("evicting miss");

    // Explicit invalidation and a rejected ingest.
    events.clear_cache();
    events
        .ingest(EventInput {
            subject_id: Some(3),
            kind: "SHARE".to_string(),
            ..Default::default()
        })
        .await
        .expect_err("unknown kind");

    let failing = IngestCoordinator::new(Arc::new(RejectingRepo), &config);
    failing.ingest(view(4)).await.expect_err("store refuses writes");

    let snapshot = snapshotter.snapshot().into_vec();

    let names: HashSet<String> = snapshot
        .iter()
        .map(|(composite_key, _, _, _)| composite_key.key().name().to_string())
        .collect();

    let expected = [
        "eventfeed_query_cache_hit_total",
        "eventfeed_query_cache_miss_total",
        "eventfeed_query_cache_evict_total",
        "eventfeed_query_cache_invalidate_total",
        "eventfeed_recent_log_len",
        "eventfeed_recent_log_evict_total",
        "eventfeed_ingest_total",
    ];

    for metric in expected {
        assert!(names.contains(metric), "missing metric: {metric}");
    }

    let outcomes: HashSet<String> = snapshot
        .iter()
        .map(|(composite_key, _, _, _)| composite_key.key())
        .filter(|key| key.name() == "eventfeed_ingest_total")
        .flat_map(|key| key.labels().map(|label| label.value().to_string()))
        .collect();

    for outcome in ["stored", "rejected", "failed"] {
        assert!(outcomes.contains(outcome), "missing ingest outcome: {outcome}");
    }
}
