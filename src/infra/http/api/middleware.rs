use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderValue, Request, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::application::auth::{ApiAuthError, strip_bearer};

use super::error::ApiError;
use super::state::ApiState;

pub async fn api_auth(State(state): State<ApiState>, request: Request<Body>, next: Next) -> Response {
    let Some(validator) = state.tokens.as_ref() else {
        return next.run(request).await;
    };

    let token = extract_token(request.headers().get(header::AUTHORIZATION)).or_else(|| {
        request
            .headers()
            .get("x-api-key")
            .and_then(|v| v.to_str().ok().map(|s| s.trim().to_string()))
    });

    let Some(token) = token else {
        return ApiError::unauthorized(Some(ApiAuthError::Missing.to_string())).into_response();
    };

    match validator.validate(&token) {
        Ok(()) => next.run(request).await,
        Err(err) => ApiError::unauthorized(Some(err.to_string())).into_response(),
    }
}

fn extract_token(header: Option<&HeaderValue>) -> Option<String> {
    let raw = header?.to_str().ok()?;
    let token = strip_bearer(raw);
    (!token.is_empty()).then(|| token.to_string())
}
