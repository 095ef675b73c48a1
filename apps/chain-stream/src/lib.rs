#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::needless_pass_by_value,
        clippy::needless_collect,
        clippy::default_trait_access,
        clippy::items_after_statements
    )
)]

//! Chain Stream - Per-Block Exchange Event Feed
//!
//! Turns the raw events a chain node emits for each committed block into a
//! typed, per-block response and streams filtered views of it to many gRPC
//! subscribers, in strict height order.
//!
//! # Layers (inside → outside)
//!
//! - **Domain**: Pure types and functions
//!   - `events`: Raw block events and topics
//!   - `records` / `decoder`: Typed records and event decoding
//!   - `block`: Per-block aggregation
//!   - `filter` / `subscription`: Market and subaccount filtering
//!
//! - **Application**: Use cases and port definitions
//!   - `ports`: Feed bus and batch source interfaces
//!   - `services`: Event publisher and ingest loop
//!
//! - **Infrastructure**: Adapters and external integrations
//!   - `broadcast`: Subscription fan-out
//!   - `grpc`: gRPC streaming server
//!   - `source`: JSON-lines replay source
//!   - `config` / `health` / `metrics` / `telemetry`
//!
//! # Data Flow
//!
//! ```text
//!                ┌───────────┐     ┌──────────────┐     ┌──────────┐
//! batch source ─►│ Publisher │────►│ Subscription │────►│   gRPC   │──► Client 1
//!  (per block)   │ (bounded) │     │     Bus      │     │  Server  │──► Client 2
//!                └───────────┘     └──────────────┘     └──────────┘──► Client N
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Core chain event types with no I/O.
pub mod domain;

/// Application layer - Use cases and port definitions.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::block::{BlockResponse, BlockSelection};
pub use domain::events::{EventAttribute, EventTopic, RawEvent, RawEventBatch};
pub use domain::filter::{FilterError, WILDCARD, filter_multi};
pub use domain::records::{ChainDecimal, DecimalError, DecodedRecord, SubaccountId};
pub use domain::subscription::{StreamFilter, SubscriptionError, SubscriptionId};

// Application
pub use application::ports::{BatchSource, FeedBus, FeedMessage, SourceError, StreamError};
pub use application::services::{
    BatchSubmitter, EventPublisher, IngestError, PublisherError, PublisherState, pump,
};

// Infrastructure config
pub use infrastructure::config::{
    ConfigError, Network, PublisherSettings, ServerSettings, SourceSettings, StreamConfig,
};

// Health server
pub use infrastructure::health::{HealthServer, HealthServerError, HealthServerState};

// Subscription bus (for integration tests)
pub use infrastructure::broadcast::{
    BusConfig, BusError, BusStats, CloseReason, SharedSubscriptionBus, Subscription,
    SubscriptionBus,
};

// gRPC server (for integration tests)
pub use infrastructure::grpc::{
    ChainStreamServer, ChainStreamServerConfig, ServerError, StreamService,
    proto::chainstream::v1 as proto,
};

// Replay source
pub use infrastructure::source::JsonLinesSource;

// Metrics
pub use infrastructure::metrics::init_metrics;

// Telemetry
pub use infrastructure::telemetry::{TelemetryConfig, TelemetryGuard, init as init_telemetry};
