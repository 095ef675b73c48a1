//! Application Layer - Use cases and port definitions.
//!
//! The publisher service and the ports it drives: the feed bus on the way
//! out and the batch source on the way in.

/// Port interfaces for the feed bus and batch sources.
pub mod ports;

/// Application services for publishing and ingest.
pub mod services;
