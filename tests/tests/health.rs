//! Tests for health check and stats endpoints.

use axum::http::StatusCode;
use axum_test::TestServer;
use integration_tests::{
    mocks::RecordingTransport,
    setup::{wait_until, TestContext},
};
use std::time::Duration;
use telemetry::health;

/// Test /health endpoint returns proper structure
#[tokio::test]
async fn test_health_endpoint_structure() {
    let ctx = TestContext::new().await;
    let server = TestServer::new(ctx.router.clone()).expect("Failed to create test server");

    let response = server.get("/health").await;
    response.assert_status_ok();

    let body: serde_json::Value = response.json();
    for field in ["status", "bus_connected", "store_connected", "buffer_depth", "observers"] {
        assert!(body.get(field).is_some(), "Response should have '{}' field", field);
    }

    let status = body["status"].as_str().unwrap_or("");
    assert!(
        status == "healthy" || status == "degraded" || status == "unhealthy",
        "Unexpected status '{}'",
        status
    );
    assert_eq!(body["components"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_ready_when_components_healthy() {
    let ctx = TestContext::new().await;
    let server = TestServer::new(ctx.router.clone()).expect("Failed to create test server");

    health().bus.set_healthy();
    health().store.set_healthy();

    server.get("/health/ready").await.assert_status_ok();
    let body: serde_json::Value = server.get("/health").await.json();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["bus_connected"], true);
}

#[tokio::test]
async fn test_live_endpoint() {
    let ctx = TestContext::new().await;
    let server = TestServer::new(ctx.router.clone()).expect("Failed to create test server");

    let response = server.get("/health/live").await;
    response.assert_status(StatusCode::OK);
}

#[tokio::test]
async fn test_stats_reports_ingest_and_observers() {
    let ctx = TestContext::new().await;
    let server = TestServer::new(ctx.router.clone()).expect("Failed to create test server");

    ctx.hub.connect(RecordingTransport::new()).await.unwrap();
    ctx.publish_raw(bytes::Bytes::from_static(b"garbage")).await;
    assert!(wait_until(Duration::from_secs(3), || ctx.worker.stats().parse_errors == 1).await);

    let response = server.get("/stats").await;
    response.assert_status_ok();

    let body: serde_json::Value = response.json();
    assert_eq!(body["observers"], 1);
    assert_eq!(body["ingest"]["parse_errors"], 1);
    assert_eq!(body["ingest"]["buffered"], 0);
    assert!(body["metrics"].is_object());
}
