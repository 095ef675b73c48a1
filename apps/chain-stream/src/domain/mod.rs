//! Domain Layer - Core streaming types and business logic.
//!
//! Pure types and functions: raw block events, decoded records, the event
//! decoder, per-block aggregation and the subscription filter. Nothing here
//! performs I/O or spawns tasks.

/// Per-block aggregation of decoded records.
pub mod block;

/// Raw event decoding into typed records.
pub mod decoder;

/// Raw block events and the topic vocabulary.
pub mod events;

/// Two-dimensional subscription filtering.
pub mod filter;

/// Typed domain records.
pub mod records;

/// Subscription identity and filter validation.
pub mod subscription;
