//! tunegraph-rec library - graph-derived recommendation service
//!
//! Mirrors the catalog store into a property graph, keeps it eventually
//! consistent under change events, and serves recommendations from it.

use axum::Router;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod error;
pub mod graph;
pub mod recommend;
pub mod source;
pub mod sync;

use graph::GraphStore;
use recommend::RecommendationEngine;
use source::SourceRepository;
use sync::RefreshCoordinator;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Source-of-truth store (read-only)
    pub source: Arc<dyn SourceRepository>,
    /// Derived graph
    pub graph: Arc<dyn GraphStore>,
    pub coordinator: Arc<RefreshCoordinator>,
    pub recommendations: RecommendationEngine,
    /// Required `X-Service-API-Key` for internal routes; `None` disables the check
    pub service_api_key: Option<String>,
}

impl AppState {
    pub fn new(
        source: Arc<dyn SourceRepository>,
        graph: Arc<dyn GraphStore>,
        coordinator: Arc<RefreshCoordinator>,
        recommendations: RecommendationEngine,
        service_api_key: Option<String>,
    ) -> Self {
        Self {
            source,
            graph,
            coordinator,
            recommendations,
            service_api_key,
        }
    }
}

/// Build application router
///
/// `/health` and `/api/recommendations` are public (the latter relies on the
/// gateway for identity). Everything under `/api/internal` requires the
/// service key.
pub fn build_router(state: AppState) -> Router {
    use axum::middleware;
    use axum::routing::{get, post};

    let internal = Router::new()
        .route("/api/internal/events", post(api::receive_event))
        .route("/api/internal/songs/:id/exists", get(api::song_exists))
        .route("/api/internal/artists/:id/exists", get(api::artist_exists))
        .route("/api/internal/sync/status", get(api::sync_status))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            api::service_key_middleware,
        ));

    let public = Router::new()
        .route("/api/recommendations", get(api::get_recommendations))
        .route("/health", get(api::liveness));

    Router::new()
        .merge(internal)
        .merge(public)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
