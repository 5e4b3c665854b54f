//! Bearer-token check for mutating routes

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};
use subtle::ConstantTimeEq;
use tracing::info;

use crate::state::AppState;

/// Reject the request unless it carries the configured operator token.
/// Without a configured token every request passes.
pub async fn auth_middleware(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let Some(expected) = app_state.operator_token.as_deref() else {
        return Ok(next.run(request).await);
    };

    let token = extract_bearer_token(&headers)?;
    if !tokens_match(token, expected) {
        info!(
            "{} {} - rejected operator token",
            request.method(),
            request.uri().path()
        );
        return Err(StatusCode::UNAUTHORIZED);
    }

    Ok(next.run(request).await)
}

/// Extract Bearer token from Authorization header
pub fn extract_bearer_token(headers: &HeaderMap) -> Result<&str, StatusCode> {
    let auth_header = headers
        .get(AUTHORIZATION)
        .ok_or(StatusCode::UNAUTHORIZED)?
        .to_str()
        .map_err(|_| StatusCode::BAD_REQUEST)?;

    auth_header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .ok_or(StatusCode::BAD_REQUEST)
}

fn tokens_match(given: &str, expected: &str) -> bool {
    given.as_bytes().ct_eq(expected.as_bytes()).into()
}
