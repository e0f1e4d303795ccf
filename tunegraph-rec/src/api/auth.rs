//! Service-to-service authentication for internal routes
//!
//! Internal callers present the shared key in `X-Service-API-Key`. When no key
//! is configured the check is disabled. Config validation refuses a blank key.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use tracing::warn;

use crate::error::ApiError;
use crate::AppState;

pub const SERVICE_API_KEY_HEADER: &str = "x-service-api-key";

/// Authentication middleware for `/api/internal/*`
///
/// Returns 401 when the header is missing, empty, or does not match. An empty
/// key never authenticates, even against a blank configured key.
pub async fn service_key_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(expected) = state.service_api_key.as_deref() else {
        return Ok(next.run(request).await);
    };

    let provided = request
        .headers()
        .get(SERVICE_API_KEY_HEADER)
        .and_then(|value| value.to_str().ok());

    match provided {
        None => {
            warn!(path = %request.uri().path(), "Internal request without service key");
            Err(ApiError::Unauthorized("Missing service API key".to_string()))
        }
        Some(key)
            if key.is_empty() || !constant_time_eq(key.as_bytes(), expected.as_bytes()) =>
        {
            warn!(path = %request.uri().path(), "Internal request with invalid service key");
            Err(ApiError::Unauthorized("Invalid service API key".to_string()))
        }
        Some(_) => Ok(next.run(request).await),
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
