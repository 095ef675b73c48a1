//! gRPC Streaming Server
//!
//! Implements the ChainStream gRPC service that exposes the per-block feed
//! to downstream clients.
//!
//! # Architecture
//!
//! Each streaming RPC:
//!
//! 1. Validates the client's market and subaccount filters
//! 2. Registers a subscription on the [`SubscriptionBus`]
//! 3. Projects every published block through the client's filter
//! 4. Streams one response per block, in height order
//! 5. Ends with a status when the feed halts, the client falls behind, or
//!    the server shuts down
//!
//! [`SubscriptionBus`]: crate::infrastructure::broadcast::SubscriptionBus

pub mod server;

// Allow clippy warnings and missing docs in generated code
#[allow(
    missing_docs,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    clippy::unwrap_used,
    clippy::expect_used
)]
pub mod proto {
    pub mod chainstream {
        pub mod v1 {
            include!(concat!(
                env!("CARGO_MANIFEST_DIR"),
                "/../../packages/schema-gen/rust/chainstream/v1/chainstream.v1.rs"
            ));
        }
    }
}

pub use server::{ChainStreamServer, ChainStreamServerConfig, ServerError, StreamService};
