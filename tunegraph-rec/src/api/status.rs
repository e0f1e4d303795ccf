//! Sync status endpoint

use axum::{extract::State, Json};
use serde::Serialize;
use tracing::warn;

use crate::graph::GraphStats;
use crate::sync::CoordinatorStatus;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct SyncStatusResponse {
    pub coordinator: CoordinatorStatus,
    /// `None` when the graph store could not be read
    pub graph: Option<GraphStats>,
}

/// GET /api/internal/sync/status
pub async fn sync_status(State(state): State<AppState>) -> Json<SyncStatusResponse> {
    let coordinator = state.coordinator.status().await;
    let graph = match state.graph.stats().await {
        Ok(stats) => Some(stats),
        Err(e) => {
            warn!(error = %e, "Graph stats unavailable");
            None
        }
    };

    Json(SyncStatusResponse { coordinator, graph })
}
