//! ClickHouse client wrapper.

use std::time::Duration;

use clickhouse::Client;
use pulse_core::Result;
use tracing::info;

use crate::config::ClickHouseConfig;

/// ClickHouse client bound to the configured database.
#[derive(Clone)]
pub struct ClickHouseClient {
    inner: Client,
    config: ClickHouseConfig,
}

impl ClickHouseClient {
    /// Creates a new ClickHouse client. No connection is made until the
    /// first statement runs.
    pub fn new(config: ClickHouseConfig) -> Result<Self> {
        let client = Self::base_client(&config).with_database(&config.database);

        info!(
            url = %config.url,
            database = %config.database,
            "Created ClickHouse client"
        );

        Ok(Self {
            inner: client,
            config,
        })
    }

    fn base_client(config: &ClickHouseConfig) -> Client {
        let mut client = Client::default().with_url(&config.url);

        if let Some(ref user) = config.username {
            client = client.with_user(user);
        }

        if let Some(ref pass) = config.password {
            client = client.with_password(pass);
        }

        client
    }

    /// Client without a default database, for `CREATE DATABASE`.
    pub(crate) fn server(&self) -> Client {
        Self::base_client(&self.config)
    }

    /// Returns the inner clickhouse client.
    pub fn inner(&self) -> &Client {
        &self.inner
    }

    /// Returns the configuration.
    pub fn config(&self) -> &ClickHouseConfig {
        &self.config
    }

    /// Per-statement timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.config.timeout_secs.max(1))
    }
}
