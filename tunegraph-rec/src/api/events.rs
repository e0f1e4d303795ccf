//! Change-event intake
//!
//! Any accepted event triggers a full resync. The payload is validated at the
//! envelope level only; `data` is never interpreted.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use tracing::{info, warn};
use tunegraph_common::events::ChangeEvent;

use crate::error::{ApiError, ApiResult};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct EventAccepted {
    pub message: String,
}

/// POST /api/internal/events
///
/// 202 once the refresh is requested, regardless of sync outcome.
pub async fn receive_event(
    State(state): State<AppState>,
    payload: Result<Json<ChangeEvent>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<EventAccepted>)> {
    let event = match payload {
        Ok(Json(event)) => event,
        Err(rejection) => {
            warn!(reason = %rejection.body_text(), "Rejected event payload");
            return Err(ApiError::BadRequest("Invalid event payload".to_string()));
        }
    };

    if let Err(e) = event.validate() {
        warn!(error = %e, "Rejected event envelope");
        return Err(ApiError::BadRequest("Invalid event payload".to_string()));
    }

    let outcome = state.coordinator.trigger();
    info!(
        event_type = %event.event_type,
        source = %event.source,
        outcome = ?outcome,
        "Accepted change event"
    );

    Ok((
        StatusCode::ACCEPTED,
        Json(EventAccepted {
            message: "Event accepted".to_string(),
        }),
    ))
}
