//! Health Check and Metrics Endpoint
//!
//! HTTP endpoint for health checks, publisher status reporting, and
//! Prometheus metrics. Used by container orchestrators, load balancers, and
//! monitoring systems.
//!
//! # Endpoints
//!
//! - `GET /health` - Returns JSON health status
//! - `GET /healthz` - Kubernetes liveness probe (simple OK)
//! - `GET /readyz` - Kubernetes readiness probe (publisher running)
//! - `GET /metrics` - Prometheus metrics in text format

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::{Json, Router, extract::State, http::StatusCode, response::IntoResponse, routing::get};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::application::services::{EventPublisher, PublisherState};
use crate::infrastructure::broadcast::SharedSubscriptionBus;
use crate::infrastructure::config::Network;
use crate::infrastructure::grpc::ChainStreamServer;
use crate::infrastructure::metrics::get_metrics_handle;

// =============================================================================
// Health Response Types
// =============================================================================

/// Health check response.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Overall status: "healthy", "degraded", or "unhealthy".
    pub status: HealthStatus,
    /// Service version.
    pub version: String,
    /// Chain network.
    pub network: &'static str,
    /// Server uptime in seconds.
    pub uptime_secs: u64,
    /// Current time.
    pub current_time: DateTime<Utc>,
    /// Publisher status.
    pub publisher: PublisherStatus,
    /// Subscription statistics.
    pub subscriptions: SubscriptionStatus,
}

/// Overall health status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Publisher running.
    Healthy,
    /// Publisher starting or draining.
    Degraded,
    /// Publisher stopped.
    Unhealthy,
}

/// Publisher status.
#[derive(Debug, Clone, Serialize)]
pub struct PublisherStatus {
    /// Lifecycle state.
    pub state: &'static str,
    /// Height of the last published block.
    pub latest_height: u64,
    /// Batches waiting in the inbound FIFO.
    pub queue_depth: usize,
    /// Inbound FIFO capacity.
    pub buffer_capacity: usize,
    /// Error that halted the feed, if any.
    pub last_error: Option<String>,
}

/// Subscription statistics.
#[derive(Debug, Clone, Serialize)]
pub struct SubscriptionStatus {
    /// Subscriptions registered on the bus.
    pub active: usize,
    /// Open gRPC streams.
    pub grpc_streams: usize,
    /// Whether the bus refuses new subscriptions.
    pub closed: bool,
}

// =============================================================================
// Health Server State
// =============================================================================

/// Shared state for the health server.
pub struct HealthServerState {
    version: String,
    network: Network,
    started_at: Instant,
    publisher: Arc<EventPublisher>,
    bus: SharedSubscriptionBus,
    grpc_server: Arc<ChainStreamServer>,
}

impl HealthServerState {
    /// Create new health server state.
    #[must_use]
    pub fn new(
        version: String,
        network: Network,
        publisher: Arc<EventPublisher>,
        bus: SharedSubscriptionBus,
        grpc_server: Arc<ChainStreamServer>,
    ) -> Self {
        Self {
            version,
            network,
            started_at: Instant::now(),
            publisher,
            bus,
            grpc_server,
        }
    }
}

// =============================================================================
// Health Server
// =============================================================================

/// Health check HTTP server.
pub struct HealthServer {
    addr: SocketAddr,
    state: Arc<HealthServerState>,
    cancel: CancellationToken,
}

impl HealthServer {
    /// Create a new health server.
    #[must_use]
    pub const fn new(
        addr: SocketAddr,
        state: Arc<HealthServerState>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            addr,
            state,
            cancel,
        }
    }

    /// Run the health server until cancelled.
    ///
    /// # Errors
    ///
    /// Returns `HealthServerError` if binding fails or the HTTP server
    /// encounters a fatal error while running.
    pub async fn run(self) -> Result<(), HealthServerError> {
        let app = router(self.state);

        let listener = TcpListener::bind(self.addr)
            .await
            .map_err(|e| HealthServerError::BindFailed(self.addr, e.to_string()))?;

        tracing::info!(addr = %self.addr, "Health server listening");

        axum::serve(listener, app)
            .with_graceful_shutdown(self.cancel.cancelled_owned())
            .await
            .map_err(|e| HealthServerError::ServerFailed(e.to_string()))?;

        tracing::info!("Health server stopped");
        Ok(())
    }
}

/// Health routes over `state`.
pub fn router(state: Arc<HealthServerState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/healthz", get(liveness_handler))
        .route("/readyz", get(readiness_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}

// =============================================================================
// HTTP Handlers
// =============================================================================

async fn health_handler(State(state): State<Arc<HealthServerState>>) -> impl IntoResponse {
    let response = build_health_response(&state);
    let status_code = match response.status {
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };
    (status_code, Json(response))
}

async fn liveness_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

async fn readiness_handler(State(state): State<Arc<HealthServerState>>) -> impl IntoResponse {
    if state.publisher.state() == PublisherState::Running {
        (StatusCode::OK, "READY")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "NOT READY")
    }
}

async fn metrics_handler() -> impl IntoResponse {
    get_metrics_handle().map_or_else(
        || {
            (
                StatusCode::SERVICE_UNAVAILABLE,
                [("content-type", "text/plain")],
                "Metrics not initialized".to_string(),
            )
        },
        |handle| {
            let body = handle.render();
            (
                StatusCode::OK,
                [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
                body,
            )
        },
    )
}

fn build_health_response(state: &HealthServerState) -> HealthResponse {
    let publisher_state = state.publisher.state();
    let bus_stats = state.bus.stats();

    HealthResponse {
        status: determine_health_status(publisher_state),
        version: state.version.clone(),
        network: state.network.as_str(),
        uptime_secs: state.started_at.elapsed().as_secs(),
        current_time: Utc::now(),
        publisher: PublisherStatus {
            state: publisher_state.as_str(),
            latest_height: state.publisher.latest_height(),
            queue_depth: state.publisher.queue_depth(),
            buffer_capacity: state.publisher.buffer_capacity(),
            last_error: state.publisher.last_error().map(|e| e.to_string()),
        },
        subscriptions: SubscriptionStatus {
            active: bus_stats.subscribers,
            grpc_streams: state.grpc_server.active_streams(),
            closed: bus_stats.closed,
        },
    }
}

const fn determine_health_status(state: PublisherState) -> HealthStatus {
    match state {
        PublisherState::Running => HealthStatus::Healthy,
        PublisherState::Idle | PublisherState::Stopping => HealthStatus::Degraded,
        PublisherState::Stopped => HealthStatus::Unhealthy,
    }
}

// =============================================================================
// Errors
// =============================================================================

/// Health server errors.
#[derive(Debug, thiserror::Error)]
pub enum HealthServerError {
    /// Failed to bind to address.
    #[error("failed to bind to {0}: {1}")]
    BindFailed(SocketAddr, String),

    /// Server error.
    #[error("server error: {0}")]
    ServerFailed(String),
}

// =============================================================================
// Tests
// =============================================================================
