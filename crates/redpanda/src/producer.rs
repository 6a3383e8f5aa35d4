//! Redpanda producer and the Redpanda-backed [`EventBus`].

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use pulse_core::{Error, Result};
use rskafka::client::partition::PartitionClient;
use rskafka::record::Record;
use telemetry::metrics;
use tokio::sync::RwLock;
use tracing::{debug, error};

use crate::config::RedpandaConfig;
use crate::connection;
use crate::consumer::RedpandaSubscription;
use crate::{EventBus, Subscription};

/// Producer with cached partition clients per topic.
pub struct Producer {
    config: RedpandaConfig,
    clients: RwLock<BTreeMap<String, Arc<PartitionClient>>>,
}

impl Producer {
    pub fn new(config: RedpandaConfig) -> Self {
        Self {
            config,
            clients: RwLock::new(BTreeMap::new()),
        }
    }

    /// Gets or creates the partition client for a topic.
    async fn get_client(&self, topic: &str) -> Result<Arc<PartitionClient>> {
        {
            let clients = self.clients.read().await;
            if let Some(client) = clients.get(topic) {
                return Ok(client.clone());
            }
        }

        let client = connection::partition_client(&self.config, topic).await?;
        self.clients
            .write()
            .await
            .insert(topic.to_string(), client.clone());
        Ok(client)
    }

    /// Sends payloads to `topic` in one produce request.
    pub async fn send(&self, topic: &str, payloads: Vec<Bytes>) -> Result<usize> {
        if payloads.is_empty() {
            return Ok(0);
        }

        let count = payloads.len();
        let start = Instant::now();
        let client = self.get_client(topic).await?;

        let records = payloads
            .into_iter()
            .map(|payload| Record {
                key: None,
                value: Some(payload.to_vec()),
                headers: BTreeMap::new(),
                timestamp: Utc::now(),
            })
            .collect::<Vec<_>>();

        match client
            .produce(records, connection::compression(&self.config.compression))
            .await
        {
            Ok(_offsets) => {
                metrics().events_published.inc_by(count as u64);
                debug!(
                    topic = %topic,
                    count = count,
                    latency_ms = %start.elapsed().as_millis(),
                    "Produced records"
                );
                Ok(count)
            }
            Err(e) => {
                error!(topic = %topic, count = count, error = %e, "Failed to produce");
                metrics().publish_errors.inc_by(count as u64);
                // Force a fresh connection next time.
                self.clients.write().await.remove(topic);
                Err(Error::bus(format!("failed to produce: {}", e)))
            }
        }
    }
}

/// [`EventBus`] over a Redpanda cluster.
pub struct RedpandaBus {
    config: RedpandaConfig,
    producer: Producer,
}

impl RedpandaBus {
    pub fn new(config: RedpandaConfig) -> Self {
        Self {
            producer: Producer::new(config.clone()),
            config,
        }
    }

    pub fn config(&self) -> &RedpandaConfig {
        &self.config
    }
}

#[async_trait]
impl EventBus for RedpandaBus {
    async fn publish(&self, topic: &str, payload: Bytes) -> Result<()> {
        self.producer.send(topic, vec![payload]).await.map(|_| ())
    }

    async fn publish_many(&self, topic: &str, payloads: Vec<Bytes>) -> Result<usize> {
        self.producer.send(topic, payloads).await
    }

    async fn subscribe(&self, topic: &str) -> Result<Box<dyn Subscription>> {
        let subscription = RedpandaSubscription::new(self.config.clone(), topic)
            .connect()
            .await?;
        Ok(Box::new(subscription))
    }

    fn backend(&self) -> &'static str {
        "redpanda"
    }
}
