//! Shared fixtures for tunegraph-rec integration tests
//!
//! Each fixture owns a temp directory holding a seeded catalog database (the
//! source store) and a graph database, wired the same way `main` wires them.

#![allow(dead_code)]

use axum::body::Body;
use axum::http::Request;
use serde_json::Value;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tunegraph_common::config::RecommendationSettings;
use tunegraph_common::db::{connect_readonly, open_database};
use tunegraph_rec::graph::{GraphStore, SqliteGraphStore};
use tunegraph_rec::recommend::RecommendationEngine;
use tunegraph_rec::source::{SqliteSourceRepository, SOURCE_TABLES};
use tunegraph_rec::sync::{GraphSyncEngine, RefreshCoordinator};
use tunegraph_rec::{build_router, AppState};

pub const TEST_SERVICE_KEY: &str = "test-service-key";

/// Catalog used by most tests
///
/// - u1 subscribes to Jazz, rated s1 5 and s2 2
/// - s4 sits on a Blues+Jazz album without an artist
/// - s5 points at an album that does not exist
/// - ar3 has no albums
pub const SEED_SQL: &[&str] = &[
    "INSERT INTO artists (id, name) VALUES ('ar1', 'Nina Simone'), ('ar2', 'Miles Davis'), ('ar3', 'Ghost Artist')",
    r#"INSERT INTO albums (id, title, genres, artist_id) VALUES
        ('al1', 'Pastel Blues', '["Jazz"]', 'ar1'),
        ('al2', 'Electric', '["Rock"]', 'ar2'),
        ('al3', 'Delta', '["Blues", "Jazz"]', NULL)"#,
    r#"INSERT INTO songs (id, title, duration, track_no, album_id) VALUES
        ('s1', 'Feeling Good', '2:53', 1, 'al1'),
        ('s2', 'Sinnerman', '10:21', 2, 'al1'),
        ('s3', 'Highway', '4:10', 1, 'al2'),
        ('s4', 'Crossroads', '2:39', 1, 'al3'),
        ('s5', 'Lonely', '3:00', 1, 'al-missing')"#,
    "INSERT INTO genre_subscriptions (user_id, genre) VALUES ('u1', 'Jazz')",
    "INSERT INTO user_ratings (user_id, song_id, rating) VALUES ('u1', 's1', 5), ('u1', 's2', 2)",
];

pub struct TestFixture {
    _dir: TempDir,
    pub source_path: PathBuf,
    /// Read-write handle for mutating the catalog between syncs
    pub catalog: SqlitePool,
    pub source: Arc<SqliteSourceRepository>,
    pub graph: Arc<SqliteGraphStore>,
    pub engine: Arc<GraphSyncEngine>,
    pub coordinator: Arc<RefreshCoordinator>,
}

impl TestFixture {
    /// Seeded catalog, graph constraints in place, nothing synced yet
    pub async fn new() -> Self {
        let dir = tempfile::tempdir().expect("Should create temp dir");
        let source_path = dir.path().join("content.db");

        let options = SqliteConnectOptions::new()
            .filename(&source_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Delete)
            .busy_timeout(Duration::from_secs(5));
        let catalog = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .expect("Should create catalog database");

        for ddl in SOURCE_TABLES {
            sqlx::query(ddl).execute(&catalog).await.expect("Should create source table");
        }
        for sql in SEED_SQL {
            sqlx::query(sql).execute(&catalog).await.expect("Should seed catalog");
        }

        let source_pool = connect_readonly(&source_path)
            .await
            .expect("Should open catalog read-only");
        let graph_pool = open_database(&dir.path().join("graph.db"))
            .await
            .expect("Should open graph database");

        let source = Arc::new(SqliteSourceRepository::new(source_pool));
        let graph = Arc::new(SqliteGraphStore::new(graph_pool));
        graph.ensure_constraints().await.expect("Should create constraints");

        let engine = Arc::new(GraphSyncEngine::new(
            source.clone(),
            graph.clone(),
            Duration::from_secs(10),
        ));
        let coordinator = RefreshCoordinator::new(engine.clone());

        Self {
            _dir: dir,
            source_path,
            catalog,
            source,
            graph,
            engine,
            coordinator,
        }
    }

    /// Fixture with one completed sync
    pub async fn synced() -> Self {
        let fixture = Self::new().await;
        let report = fixture.engine.run_full_sync().await;
        assert!(report.is_clean(), "seed sync failed: {:?}", report.failed_phases());
        fixture
    }

    pub async fn exec(&self, sql: &str) {
        sqlx::query(sql)
            .execute(&self.catalog)
            .await
            .unwrap_or_else(|e| panic!("Catalog statement failed: {}: {}", sql, e));
    }

    pub fn state(&self, service_api_key: Option<&str>) -> AppState {
        AppState::new(
            self.source.clone(),
            self.graph.clone(),
            self.coordinator.clone(),
            RecommendationEngine::new(self.graph.clone(), RecommendationSettings::default()),
            service_api_key.map(str::to_string),
        )
    }

    /// Router with the service key enabled
    pub fn app(&self) -> axum::Router {
        build_router(self.state(Some(TEST_SERVICE_KEY)))
    }
}

/// Request with no credentials
pub fn test_request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

/// Internal request carrying the service key
pub fn internal_request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("X-Service-API-Key", TEST_SERVICE_KEY)
        .body(Body::empty())
        .unwrap()
}

/// Internal JSON POST carrying the service key
pub fn internal_post(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("X-Service-API-Key", TEST_SERVICE_KEY)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// Recommendation request as forwarded by the gateway
pub fn user_request(user_id: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri("/api/recommendations")
        .header("X-User-Id", user_id)
        .body(Body::empty())
        .unwrap()
}

/// Extract JSON body from response
pub async fn extract_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("Should read body");
    serde_json::from_slice(&bytes).expect("Should parse JSON")
}

/// Song ids of one recommendation list, in response order
pub fn song_ids(body: &Value, list: &str) -> Vec<String> {
    body[list]
        .as_array()
        .unwrap_or_else(|| panic!("{} is not an array: {}", list, body))
        .iter()
        .map(|song| song["id"].as_str().unwrap().to_string())
        .collect()
}
