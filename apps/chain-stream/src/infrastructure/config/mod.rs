//! Configuration Module
//!
//! Configuration loading for the chain stream service.

mod settings;

pub use settings::{
    ConfigError, Network, PublisherSettings, ServerSettings, SourceSettings, StreamConfig,
};
