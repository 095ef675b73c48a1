//! Port Interfaces
//!
//! Defines the interfaces (ports) between the publisher and the systems
//! around it, following the Hexagonal Architecture pattern.
//!
//! ## Driven Ports (Outbound)
//!
//! - [`FeedBus`]: fan-out of published blocks and the terminal error
//!
//! ## Driver Ports (Inbound)
//!
//! - [`BatchSource`]: the per-block raw event feed from the execution layer

use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::block::BlockResponse;
use crate::domain::decoder::DecodeError;
use crate::domain::events::RawEventBatch;

// =============================================================================
// Feed Messages
// =============================================================================

/// Errors that end the feed for every subscriber.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StreamError {
    /// The publisher's inbound queue was full when a batch arrived.
    #[error("chain stream event buffer overflow")]
    BufferOverflow,

    /// A block could not be decoded.
    #[error("block {height}: {source}")]
    Decode {
        /// Height of the failed block.
        height: u64,
        /// Decoder error.
        #[source]
        source: DecodeError,
    },
}

/// One message on the internal bus.
#[derive(Debug, Clone)]
pub enum FeedMessage {
    /// A fully aggregated block.
    Block(Arc<BlockResponse>),
    /// The feed has halted. Nothing follows.
    Terminal(StreamError),
}

// =============================================================================
// Feed Bus Port
// =============================================================================

/// Fan-out of the publisher's output to every current subscriber.
///
/// Calls are made from the single publisher task, in height order. Both
/// methods return the number of subscribers the message was queued for.
#[cfg_attr(test, mockall::automock)]
pub trait FeedBus: Send + Sync {
    /// Deliver one block.
    fn publish(&self, block: Arc<BlockResponse>) -> usize;

    /// Deliver the terminal error and stop accepting blocks.
    fn fail(&self, error: StreamError) -> usize;
}

// =============================================================================
// Batch Source Port
// =============================================================================

/// Errors reading raw batches.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// Reading the underlying stream failed.
    #[error("failed to read event batch: {0}")]
    Io(#[from] std::io::Error),

    /// A batch could not be parsed.
    #[error("invalid event batch on line {line}: {source}")]
    Parse {
        /// 1-based line number.
        line: usize,
        /// Parse error.
        #[source]
        source: serde_json::Error,
    },
}

/// Supplier of raw per-block event batches, in height order.
#[async_trait]
pub trait BatchSource: Send {
    /// Next batch, or `None` when the source is exhausted.
    async fn next_batch(&mut self) -> Result<Option<RawEventBatch>, SourceError>;
}
