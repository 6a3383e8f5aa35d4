//! Redpanda health checks.

use tracing::{debug, error};

use crate::config::RedpandaConfig;
use crate::connection;

/// Check Redpanda connection health.
pub async fn check_connection(config: &RedpandaConfig) -> bool {
    match connection::connect(config).await {
        Ok(client) => match client.list_topics().await {
            Ok(topics) => {
                debug!(topics = topics.len(), "Redpanda connection healthy");
                true
            }
            Err(e) => {
                error!("Failed to list Redpanda topics: {}", e);
                false
            }
        },
        Err(e) => {
            error!("{}", e);
            false
        }
    }
}

/// Returns the required topics that do not exist.
pub async fn verify_topics(config: &RedpandaConfig, topics: &[&str]) -> Vec<String> {
    let all_missing = || -> Vec<String> { topics.iter().map(|t| t.to_string()).collect() };

    let Ok(client) = connection::connect(config).await else {
        return all_missing();
    };
    match client.list_topics().await {
        Ok(existing_topics) => {
            let existing: std::collections::HashSet<_> =
                existing_topics.iter().map(|t| t.name.as_str()).collect();

            topics
                .iter()
                .filter(|t| !existing.contains(*t))
                .map(|t| t.to_string())
                .collect()
        }
        Err(_) => all_missing(),
    }
}
