//! Infrastructure Layer - Adapters and external integrations.
//!
//! This layer contains the concrete implementations of the port interfaces
//! defined in the application layer.

/// gRPC streaming server implementation.
pub mod grpc;

/// Subscription fan-out for published blocks.
pub mod broadcast;

/// Environment configuration.
pub mod config;

/// Health check HTTP endpoint.
pub mod health;

/// Prometheus metrics instrumentation.
pub mod metrics;

/// JSON-lines replay source.
pub mod source;

/// Tracing and OpenTelemetry integration.
pub mod telemetry;
