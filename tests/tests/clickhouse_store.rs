//! ClickHouse store against a real server.
//!
//! Requires Docker (or NETPULSE_TEST_CLICKHOUSE_URL). Run with
//! `cargo test -p integration-tests --test clickhouse_store -- --ignored`.

use chrono::{Duration as ChronoDuration, Utc};
use clickhouse_client::{
    count_measurements, schema::init_schema, truncate_measurements, ClickHouseClient,
    ClickHouseConfig, MetricStore,
};
use integration_tests::{containers::TestContainers, fixtures};
use pulse_core::AggregateQuery;

async fn client(containers: &TestContainers) -> ClickHouseClient {
    let config = ClickHouseConfig {
        url: containers.clickhouse_url.clone(),
        database: containers.clickhouse_database.clone(),
        username: containers.clickhouse_username.clone(),
        password: containers.clickhouse_password.clone(),
        timeout_secs: 30,
    };
    let client = ClickHouseClient::new(config).expect("Failed to create ClickHouse client");
    init_schema(&client).await.expect("Failed to initialize schema");
    truncate_measurements(&client).await.ok();
    client
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_insert_and_rolling_aggregate() {
    let containers = TestContainers::start().await;
    let store = client(&containers).await;

    let mut events = fixtures::measurements("A", 3);
    events.extend(fixtures::measurements("B", 2));
    let written = store.insert_batch(events).await.expect("Insert failed");
    assert_eq!(written, 5);

    assert_eq!(count_measurements(&store, "A").await.unwrap(), 3);
    assert_eq!(count_measurements(&store, "B").await.unwrap(), 2);

    let rows = store
        .rolling_aggregate(&AggregateQuery::PUSH_DEFAULT)
        .await
        .expect("Aggregate failed");
    let samples: u64 = rows.iter().map(|r| r.sample_count).sum();
    assert_eq!(samples, 5);
    assert!(rows.iter().all(|r| (r.network_load_avg - 40.0).abs() < 1e-9));
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_rolling_aggregate_excludes_old_rows() {
    let containers = TestContainers::start().await;
    let store = client(&containers).await;

    let old = fixtures::measurement_at("OLD", Utc::now() - ChronoDuration::hours(1));
    let fresh = fixtures::measurement("NEW");
    store.insert_batch(vec![old, fresh]).await.unwrap();

    let rows = store
        .rolling_aggregate(&AggregateQuery::PUSH_DEFAULT)
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].location_id, "NEW");
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_empty_batch_is_noop() {
    let containers = TestContainers::start().await;
    let store = client(&containers).await;

    assert_eq!(store.insert_batch(vec![]).await.unwrap(), 0);
}
