//! Recommendation endpoint
//!
//! The user identity is established upstream; this service trusts the
//! gateway-supplied `X-User-Id` header.

use axum::{extract::State, http::HeaderMap, Json};
use tracing::error;

use crate::error::{ApiError, ApiResult};
use crate::recommend::RecommendationResponse;
use crate::AppState;

pub const USER_ID_HEADER: &str = "x-user-id";

fn user_id_from_headers(headers: &HeaderMap) -> ApiResult<String> {
    let value = headers
        .get(USER_ID_HEADER)
        .ok_or_else(|| ApiError::Unauthorized("User not authenticated".to_string()))?;

    let user_id = value
        .to_str()
        .map(str::trim)
        .map_err(|_| ApiError::BadRequest("Invalid user ID".to_string()))?;

    if user_id.is_empty() {
        return Err(ApiError::BadRequest("Invalid user ID".to_string()));
    }

    Ok(user_id.to_string())
}

/// GET /api/recommendations
pub async fn get_recommendations(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<RecommendationResponse>> {
    let user_id = user_id_from_headers(&headers)?;

    let response = state
        .recommendations
        .get_recommendations(&user_id)
        .await
        .map_err(|e| {
            error!(user_id = %user_id, error = %e, "Failed to get recommendations");
            ApiError::Internal("Failed to get recommendations".to_string())
        })?;

    Ok(Json(response))
}
