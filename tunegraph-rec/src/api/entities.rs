//! Entity-existence checks for other services
//!
//! Answered from the source store, not the graph, so a freshly created entity
//! is visible before the next sync.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::error;
use tunegraph_common::{Error, Result};

use crate::AppState;

pub const MAX_ENTITY_ID_LEN: usize = 64;

/// Trim and check an external id: non-empty, bounded, `[A-Za-z0-9_-]`
pub fn validate_entity_id(raw: &str, what: &str) -> Result<String> {
    let id = raw.trim();
    if id.is_empty() {
        return Err(Error::InvalidInput(format!("{} is required", what)));
    }
    if id.len() > MAX_ENTITY_ID_LEN {
        return Err(Error::InvalidInput(format!(
            "{} must be at most {} characters",
            what, MAX_ENTITY_ID_LEN
        )));
    }
    if !id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(Error::InvalidInput(format!("{} has invalid format", what)));
    }
    Ok(id.to_string())
}

fn invalid_id(e: Error) -> Response {
    let message = match e {
        Error::InvalidInput(msg) => msg,
        other => other.to_string(),
    };
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "error": message, "exists": false })),
    )
        .into_response()
}

fn exists_result(entity: &str, result: Result<bool>) -> Response {
    match result {
        Ok(exists) => (StatusCode::OK, Json(json!({ "exists": exists }))).into_response(),
        Err(e) => {
            error!(entity, error = %e, "Existence check failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": format!("Failed to check {}", entity), "exists": false })),
            )
                .into_response()
        }
    }
}

/// GET /api/internal/songs/:id/exists
pub async fn song_exists(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let id = match validate_entity_id(&id, "song ID") {
        Ok(id) => id,
        Err(e) => return invalid_id(e),
    };
    exists_result("song", state.source.song_exists(&id).await)
}

/// GET /api/internal/artists/:id/exists
pub async fn artist_exists(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let id = match validate_entity_id(&id, "artist ID") {
        Ok(id) => id,
        Err(e) => return invalid_id(e),
    };
    exists_result("artist", state.source.artist_exists(&id).await)
}
