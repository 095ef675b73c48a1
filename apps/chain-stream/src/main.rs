//! Chain Stream Binary
//!
//! Replays per-block event batches into the publisher and serves the
//! filtered feed over gRPC.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin chain-stream < blocks.jsonl
//! CHAIN_STREAM_SOURCE=blocks.jsonl cargo run --bin chain-stream
//! ```
//!
//! # Environment Variables
//!
//! - `CHAIN_STREAM_NETWORK`: mainnet | testnet | devnet (default: mainnet)
//! - `CHAIN_STREAM_BIND_ADDRESS`: Listen address (default: 0.0.0.0)
//! - `CHAIN_STREAM_GRPC_PORT`: gRPC server port (default: 9999)
//! - `CHAIN_STREAM_HEALTH_PORT`: Health check HTTP port (default: 8082)
//! - `CHAIN_STREAM_BUFFER_CAPACITY`: Publisher FIFO capacity (default: 100)
//! - `CHAIN_STREAM_SUBSCRIBER_BUFFER`: Per-subscription queue (default: 1024)
//! - `CHAIN_STREAM_CLIENT_BUFFER`: Per-client gRPC buffer (default: 64)
//! - `CHAIN_STREAM_SOURCE`: JSON-lines batch file, `-` for stdin (default: -)
//! - `CHAIN_STREAM_REPLAY_INTERVAL_MS`: Pause between batches (default: 0)
//! - `CHAIN_STREAM_SHUTDOWN_TIMEOUT_SECS`: Graceful shutdown bound (default: 30)
//! - `OTEL_ENABLED`: Enable OpenTelemetry (default: true)
//! - `OTEL_EXPORTER_OTLP_ENDPOINT`: OTLP endpoint (default: <http://localhost:4318>)
//! - `OTEL_SERVICE_NAME`: Service name (default: chain-stream)
//! - `RUST_LOG`: Log level (default: info)

use std::sync::Arc;

use anyhow::Context;
use chain_stream::application::ports::{BatchSource, FeedBus};
use chain_stream::infrastructure::telemetry;
use chain_stream::{
    BusConfig, ChainStreamServer, ChainStreamServerConfig, EventPublisher, HealthServer,
    HealthServerState, JsonLinesSource, StreamConfig, SubscriptionBus, init_metrics, pump,
};
use tokio::signal;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("failed to install rustls crypto provider"))?;

    load_dotenv();

    // Initialize telemetry (OpenTelemetry + tracing)
    let _telemetry_guard = telemetry::init();

    tracing::info!("Starting Chain Stream");

    // Initialize Prometheus metrics
    let _metrics_handle = init_metrics();

    let config = StreamConfig::from_env().context("invalid configuration")?;
    log_config(&config);

    let bus = Arc::new(SubscriptionBus::new(BusConfig {
        subscriber_capacity: config.publisher.subscriber_buffer,
    }));

    let publisher = Arc::new(
        EventPublisher::new(Arc::clone(&bus) as Arc<dyn FeedBus>)
            .with_buffer_capacity(config.publisher.buffer_capacity),
    );

    let grpc_server = Arc::new(ChainStreamServer::new(
        ChainStreamServerConfig {
            client_buffer: config.server.client_buffer,
        },
        Arc::clone(&bus),
    ));
    grpc_server
        .serve(config.server.grpc_addr())
        .await
        .context("gRPC server failed to start")?;

    // Health server outlives the gRPC server so probes see the drain
    let health_cancel = CancellationToken::new();
    let health_state = Arc::new(HealthServerState::new(
        env!("CARGO_PKG_VERSION").to_string(),
        config.network,
        Arc::clone(&publisher),
        Arc::clone(&bus),
        Arc::clone(&grpc_server),
    ));
    let health_server = HealthServer::new(
        config.server.health_addr(),
        health_state,
        health_cancel.clone(),
    );
    let health_task = tokio::spawn(async move {
        if let Err(e) = health_server.run().await {
            tracing::error!(error = %e, "Health server error");
        }
    });

    publisher.run().context("publisher failed to start")?;

    let source = open_source(&config).await?;
    let ingest_cancel = CancellationToken::new();
    let ingest_task = spawn_ingest(&publisher, &ingest_cancel, source);

    tracing::info!("Chain stream ready");

    await_shutdown().await;

    tracing::info!(
        timeout_secs = config.server.shutdown_timeout.as_secs(),
        "Graceful shutdown started"
    );

    let drain = async {
        ingest_cancel.cancel();
        if let Err(e) = ingest_task.await {
            tracing::error!(error = %e, "Ingest task failed");
        }
        publisher.stop().await;
        grpc_server.stop().await;
    };
    if tokio::time::timeout(config.server.shutdown_timeout, drain)
        .await
        .is_err()
    {
        tracing::warn!("Graceful shutdown timed out");
    }

    health_cancel.cancel();
    if let Err(e) = health_task.await {
        tracing::error!(error = %e, "Health server task failed");
    }

    tracing::info!(
        latest_height = publisher.latest_height(),
        "Chain stream stopped"
    );
    Ok(())
}

/// Open the configured batch source.
async fn open_source(config: &StreamConfig) -> anyhow::Result<Box<dyn BatchSource>> {
    let interval = config.source.interval;
    let source: Box<dyn BatchSource> = if config.source.is_stdin() {
        Box::new(JsonLinesSource::stdin().with_interval(interval))
    } else {
        let path = &config.source.path;
        Box::new(
            JsonLinesSource::open(path)
                .await
                .with_context(|| format!("failed to open batch source {}", path.display()))?
                .with_interval(interval),
        )
    };
    Ok(source)
}

/// Pump the source into the publisher in the background.
///
/// A failed ingest leaves the servers up: the feed has already been halted
/// and subscribers told why, and the health endpoint reports the stopped
/// publisher.
fn spawn_ingest(
    publisher: &EventPublisher,
    cancel: &CancellationToken,
    mut source: Box<dyn BatchSource>,
) -> JoinHandle<()> {
    let submitter = publisher.submitter();
    let cancel = cancel.clone();
    tokio::spawn(async move {
        match pump(source.as_mut(), &submitter, &cancel).await {
            Ok(submitted) => tracing::info!(submitted, "Ingest finished"),
            Err(e) => tracing::error!(error = %e, "Ingest failed"),
        }
    })
}

/// Load .env file from current directory or any ancestor directory.
fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    if let Ok(cwd) = std::env::current_dir() {
        let mut dir = cwd.as_path();
        while let Some(parent) = dir.parent() {
            let env_path = parent.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
            dir = parent;
        }
    }
}

/// Log the parsed configuration.
fn log_config(config: &StreamConfig) {
    tracing::info!(
        network = config.network.as_str(),
        grpc_addr = %config.server.grpc_addr(),
        health_addr = %config.server.health_addr(),
        buffer_capacity = config.publisher.buffer_capacity,
        subscriber_buffer = config.publisher.subscriber_buffer,
        "Configuration loaded"
    );
    tracing::debug!(
        source = %config.source.path.display(),
        interval_ms = config.source.interval.as_millis(),
        "Batch source"
    );
}

/// Wait for shutdown signal (SIGTERM or SIGINT).
#[allow(clippy::expect_used)]
async fn await_shutdown() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("signal handler installation is critical for graceful shutdown");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("SIGTERM handler installation is critical for graceful shutdown")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
    }
}
