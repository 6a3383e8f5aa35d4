//! ClickHouse health checks.

use tracing::{debug, error};

use crate::client::ClickHouseClient;

/// Check ClickHouse connection health.
pub async fn check_connection(client: &ClickHouseClient) -> bool {
    let probe = client.inner().query("SELECT 1").fetch_one::<u8>();
    match tokio::time::timeout(client.timeout(), probe).await {
        Ok(Ok(_)) => {
            debug!("ClickHouse connection healthy");
            true
        }
        Ok(Err(e)) => {
            error!("ClickHouse health check failed: {}", e);
            false
        }
        Err(_) => {
            error!("ClickHouse health check timed out");
            false
        }
    }
}
