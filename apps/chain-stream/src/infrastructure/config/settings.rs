//! Chain Stream Configuration Settings
//!
//! Configuration types for the chain stream service, loaded from environment
//! variables. Unparseable numeric values fall back to their defaults.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use crate::application::services::DEFAULT_BUFFER_CAPACITY;
use crate::infrastructure::broadcast::DEFAULT_SUBSCRIBER_CAPACITY;
use crate::infrastructure::source::STDIN_PATH;

/// Chain network the feed belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Network {
    /// Production network.
    #[default]
    Mainnet,
    /// Public test network.
    Testnet,
    /// Local development network.
    Devnet,
}

impl Network {
    /// Parse network from string.
    #[must_use]
    pub fn from_str_case_insensitive(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "testnet" => Self::Testnet,
            "devnet" => Self::Devnet,
            _ => Self::Mainnet,
        }
    }

    /// Get the network name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Mainnet => "mainnet",
            Self::Testnet => "testnet",
            Self::Devnet => "devnet",
        }
    }
}

/// Server port settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerSettings {
    /// Listen address for both servers.
    pub bind_address: IpAddr,
    /// gRPC server port.
    pub grpc_port: u16,
    /// Health check HTTP port.
    pub health_port: u16,
    /// Outbound responses buffered per gRPC client.
    pub client_buffer: usize,
    /// Upper bound on graceful shutdown.
    pub shutdown_timeout: Duration,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind_address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            grpc_port: 9999,
            health_port: 8082,
            client_buffer: 64,
            shutdown_timeout: Duration::from_secs(30),
        }
    }
}

impl ServerSettings {
    /// gRPC listen address.
    #[must_use]
    pub const fn grpc_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_address, self.grpc_port)
    }

    /// Health server listen address.
    #[must_use]
    pub const fn health_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_address, self.health_port)
    }
}

/// Publisher and bus capacities.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublisherSettings {
    /// Inbound FIFO capacity.
    pub buffer_capacity: usize,
    /// Per-subscription queue capacity.
    pub subscriber_buffer: usize,
}

impl Default for PublisherSettings {
    fn default() -> Self {
        Self {
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
            subscriber_buffer: DEFAULT_SUBSCRIBER_CAPACITY,
        }
    }
}

/// Replay source settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceSettings {
    /// JSON-lines file, or `-` for stdin.
    pub path: PathBuf,
    /// Pause between batches.
    pub interval: Duration,
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            path: PathBuf::from(STDIN_PATH),
            interval: Duration::ZERO,
        }
    }
}

impl SourceSettings {
    /// Whether the source is stdin.
    #[must_use]
    pub fn is_stdin(&self) -> bool {
        self.path.as_os_str() == STDIN_PATH
    }
}

/// Complete service configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamConfig {
    /// Chain network.
    pub network: Network,
    /// Server settings.
    pub server: ServerSettings,
    /// Publisher settings.
    pub publisher: PublisherSettings,
    /// Replay source settings.
    pub source: SourceSettings,
}

impl StreamConfig {
    /// Create configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a non-numeric setting is malformed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create configuration from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Returns an error if a non-numeric setting is malformed.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env(lookup);
        let server_defaults = ServerSettings::default();
        let publisher_defaults = PublisherSettings::default();

        let network = env
            .get("CHAIN_STREAM_NETWORK")
            .map(|s| Network::from_str_case_insensitive(&s))
            .unwrap_or_default();

        let bind_address = match env.get("CHAIN_STREAM_BIND_ADDRESS") {
            Some(value) => value
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue {
                    key: "CHAIN_STREAM_BIND_ADDRESS".to_string(),
                    value,
                })?,
            None => server_defaults.bind_address,
        };

        let server = ServerSettings {
            bind_address,
            grpc_port: env.parse("CHAIN_STREAM_GRPC_PORT", server_defaults.grpc_port),
            health_port: env.parse("CHAIN_STREAM_HEALTH_PORT", server_defaults.health_port),
            client_buffer: env.parse("CHAIN_STREAM_CLIENT_BUFFER", server_defaults.client_buffer),
            shutdown_timeout: env.duration_secs(
                "CHAIN_STREAM_SHUTDOWN_TIMEOUT_SECS",
                server_defaults.shutdown_timeout,
            ),
        };

        let publisher = PublisherSettings {
            buffer_capacity: env.parse(
                "CHAIN_STREAM_BUFFER_CAPACITY",
                publisher_defaults.buffer_capacity,
            ),
            subscriber_buffer: env.parse(
                "CHAIN_STREAM_SUBSCRIBER_BUFFER",
                publisher_defaults.subscriber_buffer,
            ),
        };

        let path = match env.get("CHAIN_STREAM_SOURCE") {
            Some(value) if value.trim().is_empty() => {
                return Err(ConfigError::EmptyValue("CHAIN_STREAM_SOURCE".to_string()));
            }
            Some(value) => PathBuf::from(value.trim()),
            None => SourceSettings::default().path,
        };
        let source = SourceSettings {
            path,
            interval: env.duration_millis("CHAIN_STREAM_REPLAY_INTERVAL_MS", Duration::ZERO),
        };

        Ok(Self {
            network,
            server,
            publisher,
            source,
        })
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Environment variable could not be parsed.
    #[error("invalid value for {key}: {value:?}")]
    InvalidValue {
        /// Variable name.
        key: String,
        /// Rejected value.
        value: String,
    },
    /// Environment variable has empty value.
    #[error("environment variable {0} cannot be empty")]
    EmptyValue(String),
}

struct Env<F>(F);

impl<F: Fn(&str) -> Option<String>> Env<F> {
    fn get(&self, key: &str) -> Option<String> {
        (self.0)(key)
    }

    fn parse<T: std::str::FromStr>(&self, key: &str, default: T) -> T {
        self.get(key)
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(default)
    }

    fn duration_secs(&self, key: &str, default: Duration) -> Duration {
        self.get(key)
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map_or(default, Duration::from_secs)
    }

    fn duration_millis(&self, key: &str, default: Duration) -> Duration {
        self.get(key)
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map_or(default, Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(vars: &[(&str, &str)]) -> Result<StreamConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        StreamConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn network_parsing() {
        assert_eq!(Network::from_str_case_insensitive("TESTNET"), Network::Testnet);
        assert_eq!(Network::from_str_case_insensitive("devnet"), Network::Devnet);
        assert_eq!(Network::from_str_case_insensitive("unknown"), Network::Mainnet);
        assert_eq!(Network::Testnet.as_str(), "testnet");
    }

    #[test]
    fn defaults_without_environment() {
        let config = config(&[]).unwrap();
        assert_eq!(config, StreamConfig::default());
        assert_eq!(config.server.grpc_addr().to_string(), "0.0.0.0:9999");
        assert_eq!(config.server.health_port, 8082);
        assert_eq!(config.publisher.buffer_capacity, 100);
        assert_eq!(config.publisher.subscriber_buffer, 1024);
        assert_eq!(config.server.client_buffer, 64);
        assert_eq!(config.server.shutdown_timeout, Duration::from_secs(30));
        assert!(config.source.is_stdin());
        assert_eq!(config.source.interval, Duration::ZERO);
    }

    #[test]
    fn overrides_are_applied() {
        let config = config(&[
            ("CHAIN_STREAM_NETWORK", "testnet"),
            ("CHAIN_STREAM_BIND_ADDRESS", "127.0.0.1"),
            ("CHAIN_STREAM_GRPC_PORT", "1999"),
            ("CHAIN_STREAM_BUFFER_CAPACITY", "5"),
            ("CHAIN_STREAM_SUBSCRIBER_BUFFER", "7"),
            ("CHAIN_STREAM_SOURCE", "/var/lib/chain/blocks.jsonl"),
            ("CHAIN_STREAM_REPLAY_INTERVAL_MS", "250"),
            ("CHAIN_STREAM_SHUTDOWN_TIMEOUT_SECS", "3"),
        ])
        .unwrap();

        assert_eq!(config.network, Network::Testnet);
        assert_eq!(config.server.grpc_addr().to_string(), "127.0.0.1:1999");
        assert_eq!(config.publisher.buffer_capacity, 5);
        assert_eq!(config.publisher.subscriber_buffer, 7);
        assert!(!config.source.is_stdin());
        assert_eq!(config.source.interval, Duration::from_millis(250));
        assert_eq!(config.server.shutdown_timeout, Duration::from_secs(3));
    }

    #[test]
    fn unparseable_numbers_fall_back() {
        let config = config(&[
            ("CHAIN_STREAM_GRPC_PORT", "not-a-port"),
            ("CHAIN_STREAM_BUFFER_CAPACITY", "-1"),
        ])
        .unwrap();
        assert_eq!(config.server.grpc_port, 9999);
        assert_eq!(config.publisher.buffer_capacity, 100);
    }

    #[test]
    fn malformed_bind_address_is_rejected() {
        let err = config(&[("CHAIN_STREAM_BIND_ADDRESS", "localhost:1")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "CHAIN_STREAM_BIND_ADDRESS"));
    }

    #[test]
    fn empty_source_is_rejected() {
        let err = config(&[("CHAIN_STREAM_SOURCE", "  ")]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "environment variable CHAIN_STREAM_SOURCE cannot be empty"
        );
    }
}
