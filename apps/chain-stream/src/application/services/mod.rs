//! Application Services
//!
//! - [`EventPublisher`]: decodes, aggregates and publishes one block at a time
//! - [`pump`]: feeds a [`BatchSource`](crate::application::ports::BatchSource)
//!   into the publisher

/// Block publisher and its lifecycle.
pub mod publisher;

/// Source-to-publisher ingest loop.
pub mod ingest;

pub use ingest::{IngestError, pump};
pub use publisher::{
    BatchSubmitter, DEFAULT_BUFFER_CAPACITY, EventPublisher, PublisherError, PublisherState,
};
