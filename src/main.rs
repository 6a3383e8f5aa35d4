//! netpulse: network-quality measurement pipeline.
//!
//! One process runs both consumers of the measurement topic:
//! - the batching ingest worker, writing to ClickHouse
//! - the broadcast server, fanning out to WebSocket observers
//!
//! plus the HTTP surface for publishing, aggregates and health.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use api::{router, AppState};
use broadcast::{BroadcastConfig, BroadcastServer};
use clickhouse_client::{ClickHouseClient, ClickHouseConfig, MetricStore};
use redpanda::{BusBackend, BusConfig, EventBus, MemoryBus, RedpandaBus};
use telemetry::{health, init_tracing_from_env};
use worker::{IngestConfig, IngestWorker, WorkerScheduler};

/// Application configuration.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct Config {
    #[serde(default = "default_host")]
    host: String,
    #[serde(default = "default_port")]
    port: u16,

    /// Upper bound on the whole shutdown sequence
    #[serde(default = "default_shutdown_timeout_ms")]
    shutdown_timeout_ms: u64,

    #[serde(default)]
    bus: BusConfig,

    #[serde(default)]
    clickhouse: ClickHouseConfig,

    #[serde(default)]
    ingest: IngestConfig,

    #[serde(default)]
    broadcast: BroadcastConfig,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    4000
}

fn default_shutdown_timeout_ms() -> u64 {
    10_000
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            shutdown_timeout_ms: default_shutdown_timeout_ms(),
            bus: BusConfig::default(),
            clickhouse: ClickHouseConfig::default(),
            ingest: IngestConfig::default(),
            broadcast: BroadcastConfig::default(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Install rustls crypto provider BEFORE any TLS operations
    // rustls 0.23+ requires explicit crypto provider selection
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    // Load .env file if present
    dotenvy::dotenv().ok();

    init_tracing_from_env();

    info!("Starting netpulse v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config()?;
    config.ingest.validate().context("Invalid ingest configuration")?;
    config
        .broadcast
        .validate()
        .context("Invalid broadcast configuration")?;

    info!(
        backend = ?config.bus.backend,
        topic = %config.bus.topic,
        brokers = ?config.bus.redpanda.brokers,
        sasl_username = config.bus.redpanda.sasl_username.as_deref().unwrap_or("none"),
        "Loaded bus config"
    );

    let bus = build_bus(&config.bus).await;

    let clickhouse = Arc::new(
        ClickHouseClient::new(config.clickhouse.clone())
            .context("Failed to create ClickHouse client")?,
    );

    if let Err(e) = clickhouse_client::schema::init_schema(&clickhouse).await {
        error!("Failed to initialize ClickHouse schema: {}", e);
        // Continue anyway - schema might already exist
    }

    if clickhouse_client::health::check_connection(&clickhouse).await {
        health().store.set_healthy();
        info!("ClickHouse connection: healthy");
    } else {
        health().store.set_unhealthy("Connection failed");
        error!("ClickHouse connection: unhealthy");
    }

    let store: Arc<dyn MetricStore> = clickhouse;
    let cancel = CancellationToken::new();

    // Ingest worker
    let ingest = IngestWorker::new(config.ingest.clone(), store.clone());
    let scheduler = WorkerScheduler::new(ingest.clone());
    scheduler
        .start(bus.as_ref(), &config.bus.topic)
        .await
        .context("Failed to start ingest worker")?;

    // Broadcast server
    let hub = Arc::new(BroadcastServer::new(config.broadcast.clone()));
    let hub_handles = hub
        .start(bus.as_ref(), &config.bus.topic, store.clone(), cancel.clone())
        .await
        .context("Failed to start broadcast server")?;

    let state = AppState::new(bus.clone(), config.bus.topic.clone(), store, hub.clone())
        .with_ingest(ingest);
    let app = router(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .context("Invalid server address")?;

    info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Shutting down...");
    let timeout = Duration::from_millis(config.shutdown_timeout_ms);
    let deadline = tokio::time::Instant::now() + timeout;

    cancel.cancel();
    let outcome = scheduler.shutdown(timeout).await;
    info!(outcome = ?outcome, "Ingest worker stopped");

    hub.close_all();
    for handle in hub_handles {
        if tokio::time::timeout_at(deadline, handle).await.is_err() {
            warn!("Broadcast task did not stop before the shutdown deadline");
        }
    }

    info!("Shutdown complete");
    Ok(())
}

/// Load configuration from files and environment.
///
/// Environment variables use the `PULSE` prefix and `__` between levels,
/// e.g. `PULSE__BUS__REDPANDA__BROKERS=a:9092,b:9092`.
fn load_config() -> Result<Config> {
    let config = config::Config::builder()
        // Start with defaults
        .add_source(config::Config::try_from(&Config::default())?)
        // Load from config file if exists
        .add_source(
            config::File::with_name("config/default")
                .required(false)
                .format(config::FileFormat::Toml),
        )
        // Override with environment variables
        .add_source(
            config::Environment::with_prefix("PULSE")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("bus.redpanda.brokers"),
        )
        .build()
        .context("Failed to build configuration")?;

    config
        .try_deserialize()
        .context("Failed to deserialize configuration")
}

/// Builds the configured bus and records its health.
async fn build_bus(config: &BusConfig) -> Arc<dyn EventBus> {
    match config.backend {
        BusBackend::Memory => {
            health().bus.set_healthy();
            info!(capacity = config.memory_capacity, "Using in-memory bus");
            Arc::new(MemoryBus::new(config.memory_capacity))
        }
        BusBackend::Redpanda => {
            if redpanda::health::check_connection(&config.redpanda).await {
                health().bus.set_healthy();
                info!("Redpanda connection: healthy");

                let missing = redpanda::health::verify_topics(&config.redpanda, &[config.topic.as_str()]).await;
                if !missing.is_empty() {
                    warn!(missing = ?missing, "Topics not found on the cluster");
                }
            } else {
                health().bus.set_unhealthy("Connection failed");
                error!("Redpanda connection: unhealthy");
            }
            Arc::new(RedpandaBus::new(config.redpanda.clone()))
        }
    }
}

/// Graceful shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            info!("Received terminate signal");
        }
    }
}
