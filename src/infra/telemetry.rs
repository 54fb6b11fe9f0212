use std::sync::Once;

use metrics::{Unit, describe_counter, describe_gauge};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::application::events::METRIC_INGEST;
use crate::cache::{
    METRIC_QUERY_CACHE_EVICT, METRIC_QUERY_CACHE_HIT, METRIC_QUERY_CACHE_INVALIDATE,
    METRIC_QUERY_CACHE_MISS, METRIC_RECENT_LOG_EVICT, METRIC_RECENT_LOG_LEN,
};
use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install a global tracing subscriber using the provided logging settings.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(true).boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(ErrorLayer::default())
        .with(fmt_layer)
        .try_init()
        .map_err(|err| {
            InfraError::telemetry(format!("failed to install tracing subscriber: {err}"))
        })
}

fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            METRIC_QUERY_CACHE_HIT,
            Unit::Count,
            "Total number of query cache hits."
        );
        describe_counter!(
            METRIC_QUERY_CACHE_MISS,
            Unit::Count,
            "Total number of query cache misses."
        );
        describe_counter!(
            METRIC_QUERY_CACHE_EVICT,
            Unit::Count,
            "Total number of query cache evictions due to capacity."
        );
        describe_counter!(
            METRIC_QUERY_CACHE_INVALIDATE,
            Unit::Count,
            "Total number of whole-cache invalidations."
        );
        describe_gauge!(
            METRIC_RECENT_LOG_LEN,
            Unit::Count,
            "Current number of events held by the recent log."
        );
        describe_counter!(
            METRIC_RECENT_LOG_EVICT,
            Unit::Count,
            "Total number of events evicted from the recent log."
        );
        describe_counter!(
            METRIC_INGEST,
            Unit::Count,
            "Total number of ingest attempts, labelled by outcome."
        );
    });
}
