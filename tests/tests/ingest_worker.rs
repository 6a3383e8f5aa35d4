//! Ingest worker behaviour over the in-memory bus.
//!
//! Measurements go through a real bus subscription into the worker; the
//! MockStore records every bulk insert.

use std::time::Duration;

use broadcast::BroadcastConfig;
use integration_tests::{
    fixtures,
    setup::{wait_until, TestContext},
};
use worker::{FlushOutcome, IngestConfig};

const WAIT: Duration = Duration::from_secs(3);

fn config(flush_size: usize, flush_interval_ms: u64) -> IngestConfig {
    IngestConfig {
        flush_size,
        flush_interval_ms,
        ..Default::default()
    }
}

/// Exactly FLUSH_SIZE events with no timer fire land in one insert.
#[tokio::test]
async fn test_size_trigger_writes_single_batch() {
    let ctx = TestContext::with_config(config(50, 60_000), BroadcastConfig::default()).await;

    for event in fixtures::measurements("A", 50) {
        ctx.publish(&event).await;
    }

    assert!(wait_until(WAIT, || ctx.store.insert_calls() == 1).await);
    let batches = ctx.store.batches();
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].len(), 50);
    assert_eq!(ctx.worker.buffered(), 0);
}

/// The buffer never holds more than FLUSH_SIZE events at rest.
#[tokio::test]
async fn test_buffer_stays_within_flush_size() {
    let ctx = TestContext::with_config(config(10, 60_000), BroadcastConfig::default()).await;

    for event in fixtures::measurements("A", 35) {
        ctx.publish(&event).await;
        assert!(ctx.worker.buffered() <= 10);
    }

    assert!(wait_until(WAIT, || ctx.store.row_count() == 30).await);
    assert!(wait_until(WAIT, || ctx.worker.buffered() == 5).await);
    assert!(ctx.store.batches().iter().all(|b| b.len() == 10));
}

/// One event followed by silence is flushed by the timer alone.
#[tokio::test]
async fn test_time_trigger_flushes_single_event() {
    let ctx = TestContext::with_config(config(200, 100), BroadcastConfig::default()).await;

    let event = fixtures::measurement("A");
    ctx.publish(&event).await;

    assert!(wait_until(WAIT, || ctx.store.insert_calls() == 1).await);
    let batches = ctx.store.batches();
    assert_eq!(batches[0], vec![event]);
}

/// Malformed and out-of-range payloads are dropped; the worker keeps going.
#[tokio::test]
async fn test_malformed_payloads_skipped() {
    let ctx = TestContext::with_config(config(200, 100), BroadcastConfig::default()).await;

    ctx.publish_raw(fixtures::garbage_payload()).await;
    ctx.publish_raw(fixtures::incomplete_payload()).await;
    ctx.publish_raw(fixtures::out_of_range_json().to_string().into())
        .await;
    ctx.publish(&fixtures::measurement("B")).await;

    assert!(wait_until(WAIT, || ctx.store.row_count() == 1).await);
    assert_eq!(ctx.worker.stats().parse_errors, 3);
    assert_eq!(ctx.store.batches()[0][0].location_id, "B");
}

/// A failed write drops that batch only; later flushes still happen.
#[tokio::test]
async fn test_store_failure_does_not_stop_later_flushes() {
    let ctx = TestContext::with_config(config(200, 100), BroadcastConfig::default()).await;
    ctx.store.fail_next_inserts(1);

    ctx.publish(&fixtures::measurement("A")).await;
    assert!(wait_until(WAIT, || ctx.worker.stats().events_dropped == 1).await);

    ctx.publish(&fixtures::measurement("B")).await;
    assert!(wait_until(WAIT, || ctx.store.row_count() == 1).await);

    let batches = ctx.store.batches();
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0][0].location_id, "B");
    assert_eq!(ctx.worker.stats().events_dropped, 1);
}

/// With retries configured, a transient failure does not lose the batch.
#[tokio::test]
async fn test_retry_policy_recovers_batch() {
    let ingest = IngestConfig {
        flush_interval_ms: 100,
        max_retries: 2,
        retry_backoff_ms: 10,
        ..Default::default()
    };
    let ctx = TestContext::with_config(ingest, BroadcastConfig::default()).await;
    ctx.store.fail_next_inserts(2);

    ctx.publish(&fixtures::measurement("A")).await;

    assert!(wait_until(WAIT, || ctx.store.row_count() == 1).await);
    assert_eq!(ctx.worker.stats().events_dropped, 0);
}

/// Shutdown writes whatever is still buffered.
#[tokio::test]
async fn test_shutdown_flushes_remaining_events() {
    let ctx = TestContext::with_config(config(200, 60_000), BroadcastConfig::default()).await;

    for event in fixtures::measurements("A", 3) {
        ctx.publish(&event).await;
    }
    assert!(wait_until(WAIT, || ctx.worker.buffered() == 3).await);

    let outcome = ctx.shutdown(Duration::from_secs(2)).await;
    assert_eq!(outcome, FlushOutcome::Written(3));
    assert_eq!(ctx.store.row_count(), 3);
}
