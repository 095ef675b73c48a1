//! Prometheus Metrics Module
//!
//! Exposes application metrics via Prometheus format for monitoring.
//!
//! # Metrics Categories
//!
//! - **Publisher**: Blocks published, events decoded, decode errors, overflows
//! - **Queues**: Publisher inbound queue depth
//! - **Subscriptions**: Active subscriptions and drops by reason
//! - **Delivery**: Responses sent to gRPC clients
//! - **Latency**: Per-block decode and aggregation time
//!
//! # Integration
//!
//! Metrics are exposed at `/metrics` on the health server port.

use std::sync::OnceLock;
use std::time::Duration;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

// =============================================================================
// Global Metrics Handle
// =============================================================================

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Initialize the Prometheus metrics recorder.
///
/// # Panics
///
/// Panics if the recorder cannot be installed.
pub fn init_metrics() -> PrometheusHandle {
    PROMETHEUS_HANDLE
        .get_or_init(|| {
            #[allow(clippy::expect_used)]
            let handle = PrometheusBuilder::new()
                .install_recorder()
                .expect("failed to install Prometheus recorder");

            register_metrics();
            handle
        })
        .clone()
}

/// Get the Prometheus handle for rendering metrics.
///
/// Returns `None` if metrics have not been initialized.
#[must_use]
pub fn get_metrics_handle() -> Option<PrometheusHandle> {
    PROMETHEUS_HANDLE.get().cloned()
}

// =============================================================================
// Metric Registration
// =============================================================================

fn register_metrics() {
    // Publisher counters
    describe_counter!(
        "chain_stream_blocks_published_total",
        "Total block responses published to the bus"
    );
    describe_counter!(
        "chain_stream_events_decoded_total",
        "Total raw events decoded by topic"
    );
    describe_counter!(
        "chain_stream_decode_errors_total",
        "Total raw events that failed to decode"
    );
    describe_counter!(
        "chain_stream_buffer_overflows_total",
        "Total publisher inbound queue overflows"
    );

    // Delivery
    describe_counter!(
        "chain_stream_messages_sent_total",
        "Total stream responses sent to gRPC clients"
    );
    describe_counter!(
        "chain_stream_subscriptions_dropped_total",
        "Total subscriptions ended by reason"
    );

    // Gauges
    describe_gauge!(
        "chain_stream_subscriptions_active",
        "Number of subscriptions registered on the bus"
    );
    describe_gauge!(
        "chain_stream_grpc_streams",
        "Number of open gRPC streams"
    );
    describe_gauge!(
        "chain_stream_latest_height",
        "Height of the most recently published block"
    );
    describe_gauge!(
        "chain_stream_queue_depth",
        "Batches waiting in the publisher inbound queue"
    );

    // Latency histograms
    describe_histogram!(
        "chain_stream_block_processing_seconds",
        "Time to decode and aggregate one block"
    );
}

// =============================================================================
// Metric Recording Functions
// =============================================================================

/// Why a subscription ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// The subscription queue was full.
    SlowConsumer,
    /// The client went away.
    ClientGone,
    /// The server shut down.
    Shutdown,
    /// The feed halted with an error.
    Terminal,
}

impl DropReason {
    const fn as_str(self) -> &'static str {
        match self {
            Self::SlowConsumer => "slow_consumer",
            Self::ClientGone => "client_gone",
            Self::Shutdown => "shutdown",
            Self::Terminal => "terminal",
        }
    }
}

/// Record a published block.
#[allow(clippy::cast_precision_loss)]
pub fn record_block_published(height: u64) {
    counter!("chain_stream_blocks_published_total").increment(1);
    gauge!("chain_stream_latest_height").set(height as f64);
}

/// Record a decoded event.
pub fn record_event_decoded(topic: &'static str) {
    counter!("chain_stream_events_decoded_total", "topic" => topic).increment(1);
}

/// Record an event that failed to decode.
pub fn record_decode_error(topic: &'static str) {
    counter!("chain_stream_decode_errors_total", "topic" => topic).increment(1);
}

/// Record a publisher queue overflow.
pub fn record_buffer_overflow() {
    counter!("chain_stream_buffer_overflows_total").increment(1);
}

/// Update the publisher queue depth.
#[allow(clippy::cast_precision_loss)]
pub fn set_queue_depth(depth: usize) {
    gauge!("chain_stream_queue_depth").set(depth as f64);
}

/// Record block processing duration.
pub fn record_processing_duration(duration: Duration) {
    histogram!("chain_stream_block_processing_seconds").record(duration.as_secs_f64());
}

/// Record responses sent to gRPC clients.
pub fn record_messages_sent(count: u64) {
    counter!("chain_stream_messages_sent_total").increment(count);
}

/// Record a subscription ending.
pub fn record_subscription_dropped(reason: DropReason) {
    counter!(
        "chain_stream_subscriptions_dropped_total",
        "reason" => reason.as_str()
    )
    .increment(1);
}

/// Update the active subscription count.
#[allow(clippy::cast_precision_loss)]
pub fn set_active_subscriptions(count: usize) {
    gauge!("chain_stream_subscriptions_active").set(count as f64);
}

/// Update the open gRPC stream count.
#[allow(clippy::cast_precision_loss)]
pub fn set_grpc_streams(count: usize) {
    gauge!("chain_stream_grpc_streams").set(count as f64);
}

// =============================================================================
// Tests
// =============================================================================
