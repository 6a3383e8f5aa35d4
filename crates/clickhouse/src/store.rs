//! The durable store seam used by the worker, the broadcast server and the API.

use std::future::Future;

use async_trait::async_trait;
use pulse_core::{AggregateQuery, AggregateRow, Error, MeasurementEvent, Result};

use crate::client::ClickHouseClient;
use crate::{insert, query};

/// Durable measurement storage.
#[async_trait]
pub trait MetricStore: Send + Sync {
    /// Persists a batch in one statement. Returns the number of rows written.
    async fn insert_batch(&self, events: Vec<MeasurementEvent>) -> Result<usize>;

    /// Computes the rolling aggregate over a trailing window.
    async fn rolling_aggregate(&self, query: &AggregateQuery) -> Result<Vec<AggregateRow>>;
}

impl ClickHouseClient {
    async fn bounded<T>(
        &self,
        what: &str,
        fut: impl Future<Output = Result<T>>,
        on_timeout: fn(String) -> Error,
    ) -> Result<T> {
        tokio::time::timeout(self.timeout(), fut)
            .await
            .unwrap_or_else(|_| {
                Err(on_timeout(format!(
                    "{} timed out after {}s",
                    what,
                    self.timeout().as_secs()
                )))
            })
    }
}

#[async_trait]
impl MetricStore for ClickHouseClient {
    async fn insert_batch(&self, events: Vec<MeasurementEvent>) -> Result<usize> {
        self.bounded(
            "insert",
            insert::insert_measurements(self, events),
            Error::StoreWrite,
        )
        .await
    }

    async fn rolling_aggregate(&self, q: &AggregateQuery) -> Result<Vec<AggregateRow>> {
        self.bounded(
            "aggregate query",
            query::rolling_aggregate(self, q),
            Error::StoreQuery,
        )
        .await
    }
}
