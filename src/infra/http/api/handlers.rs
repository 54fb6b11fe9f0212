use axum::Json;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::application::events::{EventError, EventInput, EventQuery};
use crate::application::repos::RepoError;
use crate::domain::error::DomainError;

use super::error::{ApiError, codes};
use super::models::*;
use super::state::ApiState;

pub async fn create_event(
    State(state): State<ApiState>,
    Json(payload): Json<EventCreateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let record = state
        .events
        .ingest(EventInput::from(payload))
        .await
        .map_err(event_to_api)?;

    Ok((StatusCode::CREATED, Json(EventView::from(record))))
}

pub async fn create_events_batch(
    State(state): State<ApiState>,
    Json(payload): Json<Vec<EventCreateRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    if payload.is_empty() {
        return Err(ApiError::bad_request(
            "batch must contain at least one event",
            None,
        ));
    }

    let inputs = payload.into_iter().map(EventInput::from).collect();
    let outcomes = state.events.ingest_batch(inputs).await;

    let mut results = Vec::with_capacity(outcomes.len());
    for (index, outcome) in outcomes.into_iter().enumerate() {
        results.push(match outcome {
            Ok(record) => BatchItemResult {
                index,
                status: BatchItemStatus::Created,
                event: Some(EventView::from(record)),
                error: None,
            },
            Err(err) => BatchItemResult {
                index,
                status: BatchItemStatus::Failed,
                event: None,
                error: Some(event_to_api(err).message()),
            },
        });
    }

    let failed = results
        .iter()
        .filter(|item| matches!(item.status, BatchItemStatus::Failed))
        .count();
    let status = if failed == 0 {
        StatusCode::CREATED
    } else {
        StatusCode::MULTI_STATUS
    };

    Ok((
        status,
        Json(BatchResponse {
            created: results.len() - failed,
            failed,
            results,
        }),
    ))
}

pub async fn list_events(
    State(state): State<ApiState>,
    Query(query): Query<EventListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let from = parse_time_bound("from", query.from.as_deref())?;
    let to = parse_time_bound("to", query.to.as_deref())?;

    let events = state
        .events
        .query_events(EventQuery {
            subject_id: query.subject_id,
            kind: query.kind,
            category: query.category,
            related_item_id: query.related_item_id,
            from,
            to,
        })
        .await
        .map_err(event_to_api)?;

    Ok(Json(
        events.into_iter().map(EventView::from).collect::<Vec<_>>(),
    ))
}

pub async fn recent_events(State(state): State<ApiState>) -> impl IntoResponse {
    let events = state.events.recent_events();
    Json(events.into_iter().map(EventView::from).collect::<Vec<_>>())
}

pub async fn event_summary(
    State(state): State<ApiState>,
    Query(query): Query<SummaryQuery>,
) -> impl IntoResponse {
    let category = query
        .category
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty());
    let counts = state.events.event_summary(category.as_deref());
    let total = counts.values().sum();

    Json(SummaryResponse {
        category,
        total,
        counts,
    })
}

pub async fn cache_stats(State(state): State<ApiState>) -> impl IntoResponse {
    Json(CacheStatsResponse::from(state.events.cache_stats()))
}

pub async fn clear_cache(State(state): State<ApiState>) -> impl IntoResponse {
    state.events.clear_cache();
    StatusCode::NO_CONTENT
}

fn parse_time_bound(
    name: &'static str,
    raw: Option<&str>,
) -> Result<Option<OffsetDateTime>, ApiError> {
    let Some(raw) = raw.map(str::trim).filter(|value| !value.is_empty()) else {
        return Ok(None);
    };

    OffsetDateTime::parse(raw, &Rfc3339).map(Some).map_err(|err| {
        ApiError::bad_request(
            "invalid time bound",
            Some(format!("`{name}` must be an RFC 3339 timestamp: {err}")),
        )
    })
}

fn event_to_api(err: EventError) -> ApiError {
    match err {
        EventError::Validation(DomainError::Validation { message }) => {
            ApiError::invalid_input(message)
        }
        EventError::Repo(err) => repo_to_api(err),
    }
}

fn repo_to_api(err: RepoError) -> ApiError {
    match err {
        RepoError::InvalidInput { message } => ApiError::new(
            StatusCode::BAD_REQUEST,
            codes::INVALID_INPUT,
            "Invalid input",
            Some(message),
        ),
        RepoError::Integrity { message } => ApiError::new(
            StatusCode::CONFLICT,
            codes::INTEGRITY,
            "Integrity constraint violated",
            Some(message),
        ),
        RepoError::Timeout => ApiError::new(
            StatusCode::SERVICE_UNAVAILABLE,
            codes::DB_TIMEOUT,
            "Database timeout",
            None,
        ),
        RepoError::Persistence(msg) => ApiError::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            codes::REPO,
            "Persistence error",
            Some(msg),
        ),
    }
}
