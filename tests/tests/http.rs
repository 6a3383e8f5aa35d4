//! HTTP publish and aggregate endpoints.

use axum::http::StatusCode;
use axum_test::TestServer;
use integration_tests::{
    fixtures,
    setup::{wait_until, TestContext},
};
use pulse_core::{AggregateQuery, AggregateRow};
use std::time::Duration;

async fn server() -> (TestContext, TestServer) {
    let ctx = TestContext::new().await;
    let server = TestServer::new(ctx.router.clone()).expect("Failed to create test server");
    (ctx, server)
}

#[tokio::test]
async fn test_publish_single_object() {
    let (_ctx, server) = server().await;

    let response = server
        .post("/publish")
        .json(&fixtures::measurement_json("A"))
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["success"], true);
    assert_eq!(body["received"], 1);
    assert!(body.get("errors").is_none());
    assert!(body["timestamp"].as_i64().unwrap() > 0);
}

#[tokio::test]
async fn test_publish_array_and_wrapped_formats() {
    let (_ctx, server) = server().await;

    let array = serde_json::json!([
        fixtures::measurement_json("A"),
        fixtures::measurement_json("B"),
        fixtures::measurement_json("C"),
    ]);
    let response = server.post("/publish").json(&array).await;
    response.assert_status_ok();
    assert_eq!(response.json::<serde_json::Value>()["received"], 3);

    let wrapped = serde_json::json!({
        "metrics": [fixtures::measurement_json("A"), fixtures::measurement_json("B")]
    });
    let response = server.post("/publish").json(&wrapped).await;
    response.assert_status_ok();
    assert_eq!(response.json::<serde_json::Value>()["received"], 2);
}

#[tokio::test]
async fn test_publish_legacy_market_id_alias() {
    let (_ctx, server) = server().await;

    let mut legacy = fixtures::measurement_json("A");
    legacy.as_object_mut().unwrap().remove("location_id");
    legacy["market_id"] = serde_json::json!("M1");

    let response = server.post("/publish").json(&legacy).await;
    response.assert_status_ok();
    assert_eq!(response.json::<serde_json::Value>()["received"], 1);
}

#[tokio::test]
async fn test_publish_malformed_json_rejected() {
    let (_ctx, server) = server().await;

    let response = server.post("/publish").text("{not json").await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let body: serde_json::Value = response.json();
    assert_eq!(body["code"], "PARSE_001");
}

#[tokio::test]
async fn test_publish_too_many_items_rejected() {
    let (_ctx, server) = server().await;

    let items: Vec<_> = (0..1001).map(|_| fixtures::measurement_json("A")).collect();
    let response = server.post("/publish").json(&items).await;

    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(response.json::<serde_json::Value>()["code"], "PARSE_001");
}

/// Invalid items are reported; valid ones in the same request still go out.
#[tokio::test]
async fn test_publish_partial_success() {
    let (ctx, server) = server().await;

    let items = serde_json::json!([
        fixtures::measurement_json("A"),
        fixtures::out_of_range_json(),
        {"location_id": "C"}
    ]);
    let response = server.post("/publish").json(&items).await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["received"], 1);
    let errors = body["errors"].as_array().unwrap();
    assert_eq!(errors.len(), 2);
    assert!(errors[0].as_str().unwrap().starts_with("item 1"));
    assert!(errors[1].as_str().unwrap().starts_with("item 2"));

    assert!(wait_until(Duration::from_secs(3), || ctx.worker.buffered() == 1).await);
    let outcome = ctx.shutdown(Duration::from_secs(2)).await;
    assert_eq!(outcome, worker::FlushOutcome::Written(1));
}

#[tokio::test]
async fn test_publish_all_invalid_still_ok() {
    let (_ctx, server) = server().await;

    let response = server
        .post("/publish")
        .json(&fixtures::out_of_range_json())
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["received"], 0);
    assert_eq!(body["errors"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_publish_bus_failure_is_503() {
    let (ctx, server) = server().await;
    ctx.bus.close();

    let response = server
        .post("/publish")
        .json(&fixtures::measurement_json("A"))
        .await;

    response.assert_status(StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(response.json::<serde_json::Value>()["code"], "BUS_001");
}

#[tokio::test]
async fn test_aggregate_defaults() {
    let (ctx, server) = server().await;
    ctx.store.set_aggregate_rows(vec![AggregateRow {
        bucket: 1_718_000_040_000,
        location_id: "A".into(),
        network_load_avg: 40.0,
        latency_avg: 55.0,
        packet_loss_avg: 0.2,
        active_sessions_avg: 1200.0,
        sample_count: 3,
    }]);

    let response = server.get("/aggregate").await;
    response.assert_status_ok();

    let rows: Vec<AggregateRow> = response.json();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].location_id, "A");
    assert_eq!(rows[0].sample_count, 3);
    assert_eq!(
        ctx.store.queries().last().copied(),
        Some(AggregateQuery::ON_DEMAND_DEFAULT)
    );
}

#[tokio::test]
async fn test_aggregate_query_params() {
    let (ctx, server) = server().await;

    let response = server
        .get("/aggregate")
        .add_query_param("window_secs", 120)
        .add_query_param("limit", 5)
        .await;
    response.assert_status_ok();

    let query = ctx.store.queries().last().copied().unwrap();
    assert_eq!(query.window_secs(), 120);
    assert_eq!(query.limit, 5);
}

#[tokio::test]
async fn test_aggregate_rejects_out_of_bounds_params() {
    let (ctx, server) = server().await;

    let response = server.get("/aggregate").add_query_param("limit", 0).await;
    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(response.json::<serde_json::Value>()["code"], "PARSE_002");
    assert!(ctx.store.queries().is_empty());
}

#[tokio::test]
async fn test_aggregate_store_failure_is_500() {
    let (ctx, server) = server().await;
    ctx.store.set_query_failure(true);

    let response = server.get("/aggregate").await;
    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.json::<serde_json::Value>()["code"], "STORE_002");
}
