pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod state;

pub use state::ApiState;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post},
};

pub fn build_api_router(state: ApiState) -> Router {
    let auth_state = state.clone();

    Router::new()
        .route(
            "/api/v1/events",
            get(handlers::list_events).post(handlers::create_event),
        )
        .route("/api/v1/events/batch", post(handlers::create_events_batch))
        .route("/api/v1/events/recent", get(handlers::recent_events))
        .route("/api/v1/events/summary", get(handlers::event_summary))
        .route("/api/v1/events/cache/stats", get(handlers::cache_stats))
        .route(
            "/api/v1/events/cache",
            axum::routing::delete(handlers::clear_cache),
        )
        .with_state(state)
        .layer(axum_middleware::from_fn_with_state(
            auth_state,
            middleware::api_auth,
        ))
}
