//! Integration tests for tunegraph-rec HTTP endpoints
//!
//! Tests cover:
//! - Health endpoint (no auth)
//! - Service-key guard on /api/internal
//! - Change-event intake
//! - Entity-existence checks
//! - Recommendations
//! - Sync status

mod helpers;

use axum::http::StatusCode;
use helpers::*;
use std::sync::Arc;
use tower::util::ServiceExt; // for `oneshot` method
use tunegraph_common::config::RecommendationSettings;
use tunegraph_common::db::open_in_memory;
use tunegraph_rec::graph::SqliteGraphStore;
use tunegraph_rec::recommend::RecommendationEngine;
use tunegraph_rec::{build_router, AppState};

// =============================================================================
// Health
// =============================================================================

#[tokio::test]
async fn test_health_endpoint_no_auth_required() {
    let fixture = TestFixture::new().await;

    let response = fixture.app().oneshot(test_request("GET", "/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "tunegraph-rec");
    assert!(body["version"].is_string());
}

// =============================================================================
// Service-key guard
// =============================================================================

#[tokio::test]
async fn test_internal_route_requires_key() {
    let fixture = TestFixture::new().await;

    let response = fixture
        .app()
        .oneshot(test_request("GET", "/api/internal/sync/status"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn test_internal_route_rejects_wrong_key() {
    let fixture = TestFixture::new().await;

    let request = axum::http::Request::builder()
        .uri("/api/internal/songs/s1/exists")
        .header("X-Service-API-Key", "not-the-key")
        .body(axum::body::Body::empty())
        .unwrap();
    let response = fixture.app().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_no_configured_key_disables_guard() {
    let fixture = TestFixture::new().await;
    let app = build_router(fixture.state(None));

    let response = app
        .oneshot(test_request("GET", "/api/internal/songs/s1/exists"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_blank_configured_key_does_not_open_guard() {
    let fixture = TestFixture::new().await;
    let app = build_router(fixture.state(Some("")));

    for header in [None, Some("")] {
        let mut request = axum::http::Request::builder().uri("/api/internal/artists/ar1/exists");
        if let Some(value) = header {
            request = request.header("X-Service-API-Key", value);
        }
        let response = app
            .clone()
            .oneshot(request.body(axum::body::Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "header {:?}", header);
    }
}

#[tokio::test]
async fn test_recommendations_not_behind_service_key() {
    let fixture = TestFixture::synced().await;

    let response = fixture.app().oneshot(user_request("u1")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

// =============================================================================
// Events
// =============================================================================

#[tokio::test]
async fn test_event_accepted_and_triggers_sync() {
    let fixture = TestFixture::new().await;

    let response = fixture
        .app()
        .oneshot(internal_post(
            "/api/internal/events",
            r#"{"type": "song.created", "source": "songs-service", "data": {"songId": "s9"}}"#,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["message"], "Event accepted");

    fixture.coordinator.wait_until_idle().await;
    assert_eq!(fixture.coordinator.runs_completed(), 1);
    assert!(fixture.coordinator.last_report().await.unwrap().is_clean());
}

#[tokio::test]
async fn test_event_data_is_not_interpreted() {
    let fixture = TestFixture::new().await;

    for payload in [
        r#"{"type": "rating.updated"}"#,
        r#"{"type": "rating.updated", "data": [1, 2, 3]}"#,
        r#"{"type": "anything-at-all", "source": "", "data": "free text"}"#,
    ] {
        let response = fixture
            .app()
            .oneshot(internal_post("/api/internal/events", payload))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED, "payload {}", payload);
    }

    fixture.coordinator.wait_until_idle().await;
    assert!(fixture.coordinator.runs_completed() >= 1);
}

#[tokio::test]
async fn test_invalid_event_envelope_rejected() {
    let fixture = TestFixture::new().await;
    let long_source = format!(r#"{{"type": "song.created", "source": "{}"}}"#, "x".repeat(101));

    for payload in [
        "not json",
        r#"{"source": "songs-service"}"#,
        r#"{"type": "ab"}"#,
        r#"{"type": 42}"#,
        long_source.as_str(),
    ] {
        let response = fixture
            .app()
            .oneshot(internal_post("/api/internal/events", payload))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "payload {}", payload);

        let body = extract_json(response.into_body()).await;
        assert_eq!(body["error"]["message"], "Invalid event payload");
    }

    assert_eq!(fixture.coordinator.runs_started(), 0);
}

// =============================================================================
// Entity existence
// =============================================================================

#[tokio::test]
async fn test_song_exists() {
    let fixture = TestFixture::new().await;

    let response = fixture
        .app()
        .oneshot(internal_request("GET", "/api/internal/songs/s1/exists"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(extract_json(response.into_body()).await["exists"], true);

    let response = fixture
        .app()
        .oneshot(internal_request("GET", "/api/internal/songs/nope/exists"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(extract_json(response.into_body()).await["exists"], false);
}

#[tokio::test]
async fn test_artist_exists_reads_source_not_graph() {
    // Nothing synced yet; answer comes from the catalog
    let fixture = TestFixture::new().await;

    let response = fixture
        .app()
        .oneshot(internal_request("GET", "/api/internal/artists/ar3/exists"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(extract_json(response.into_body()).await["exists"], true);
}

#[tokio::test]
async fn test_exists_rejects_malformed_id() {
    let fixture = TestFixture::new().await;
    let too_long = format!("/api/internal/songs/{}/exists", "a".repeat(65));

    for uri in ["/api/internal/songs/bad%24id/exists", too_long.as_str()] {
        let response = fixture.app().oneshot(internal_request("GET", uri)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "uri {}", uri);

        let body = extract_json(response.into_body()).await;
        assert_eq!(body["exists"], false);
        assert!(body["error"].is_string());
    }
}

// =============================================================================
// Recommendations
// =============================================================================

#[tokio::test]
async fn test_recommendations_require_user() {
    let fixture = TestFixture::synced().await;

    let response = fixture
        .app()
        .oneshot(test_request("GET", "/api/recommendations"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = fixture.app().oneshot(user_request("  ")).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_recommendations_for_subscriber() {
    let fixture = TestFixture::synced().await;

    let response = fixture.app().oneshot(user_request("u1")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;

    // s2 rated 2 by u1 is excluded; ordered by title
    assert_eq!(song_ids(&body, "subscribedGenreSongs"), vec!["s4", "s1"]);
    // Crossroads also carries Blues, which u1 does not follow
    assert_eq!(song_ids(&body, "discoverNewSongs"), vec!["s4", "s3"]);

    let first = &body["subscribedGenreSongs"][0];
    assert_eq!(first["title"], "Crossroads");
    assert_eq!(first["duration"], "2:39");
    assert_eq!(first["trackNo"], 1);
    assert_eq!(first["albumId"], "al3");
    assert_eq!(first["genre"], "Jazz");
    assert_eq!(body["discoverNewSongs"][0]["genre"], "Blues");
}

#[tokio::test]
async fn test_recommendations_for_new_user() {
    let fixture = TestFixture::synced().await;

    let response = fixture.app().oneshot(user_request("newcomer")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;

    assert_eq!(body["subscribedGenreSongs"], serde_json::json!([]));
    // s5 has no album, so no genre, so it is in neither list
    assert_eq!(
        song_ids(&body, "discoverNewSongs"),
        vec!["s4", "s1", "s3", "s2"]
    );
}

#[tokio::test]
async fn test_recommendations_before_first_sync_are_empty() {
    let fixture = TestFixture::new().await;

    let response = fixture.app().oneshot(user_request("u1")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["subscribedGenreSongs"], serde_json::json!([]));
    assert_eq!(body["discoverNewSongs"], serde_json::json!([]));
}

#[tokio::test]
async fn test_recommendation_failure_returns_500() {
    let fixture = TestFixture::new().await;

    // Graph without tables: every query fails
    let broken = Arc::new(SqliteGraphStore::new(open_in_memory().await.unwrap()));
    let state = AppState::new(
        fixture.source.clone(),
        broken.clone(),
        fixture.coordinator.clone(),
        RecommendationEngine::new(broken, RecommendationSettings::default()),
        None,
    );

    let response = build_router(state).oneshot(user_request("u1")).await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["error"]["message"], "Failed to get recommendations");
    assert!(body.get("subscribedGenreSongs").is_none());
}

// =============================================================================
// Sync status
// =============================================================================

#[tokio::test]
async fn test_sync_status_after_event() {
    let fixture = TestFixture::new().await;

    fixture
        .app()
        .oneshot(internal_post("/api/internal/events", r#"{"type": "album.updated"}"#))
        .await
        .unwrap();
    fixture.coordinator.wait_until_idle().await;

    let response = fixture
        .app()
        .oneshot(internal_request("GET", "/api/internal/sync/status"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;

    assert_eq!(body["coordinator"]["state"], "idle");
    assert_eq!(body["coordinator"]["runs_completed"], 1);
    assert_eq!(body["coordinator"]["runs_failed"], 0);
    assert_eq!(body["coordinator"]["last_report"]["phases"].as_array().unwrap().len(), 7);
    assert_eq!(body["graph"]["songs"], 5);
    assert_eq!(body["graph"]["artists"], 3);
    assert_eq!(body["graph"]["users"], 1);
}
