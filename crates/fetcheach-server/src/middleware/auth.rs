//! Bearer credential check

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::Response,
};

use crate::api::AppState;
use crate::error::AppError;

/// Reject requests whose bearer token does not match the configured secret
pub async fn require_bearer(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let authorized = matches!(
        bearer_token(request.headers()),
        Some(token) if token == state.config.auth.secret
    );

    if !authorized {
        tracing::debug!(uri = %request.uri(), "Rejected request without a valid credential");
        return Err(AppError::Unauthorized("Unauthorized".to_string()));
    }

    Ok(next.run(request).await)
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let token = headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")?
        .trim();

    if token.is_empty() {
        None
    } else {
        Some(token)
    }
}
