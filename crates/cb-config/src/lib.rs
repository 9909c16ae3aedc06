//! CloudBridge configuration.
//!
//! TOML-based configuration with environment variable override support.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

mod loader;

pub use loader::ConfigLoader;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Read(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Validation(String),
}

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub http: HttpConfig,
    pub mongodb: MongoConfig,
    pub cloud: CloudConfig,
    pub registry: RegistryConfig,
    pub connector: ConnectorConfig,
}

impl AppConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&raw)?)
    }

    /// Reject configurations the connector cannot start with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cloud.events_url.is_empty() {
            return Err(ConfigError::Validation(
                "cloud.events_url is required (public callback URL for webhook deliveries)"
                    .to_string(),
            ));
        }
        if self.registry.url.is_empty() {
            return Err(ConfigError::Validation(
                "registry.url is required".to_string(),
            ));
        }
        if self.connector.pool_size == 0 {
            return Err(ConfigError::Validation(
                "connector.pool_size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Webhook intake HTTP server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub host: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

/// MongoDB connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MongoConfig {
    pub uri: String,
    pub database: String,
}

impl Default for MongoConfig {
    fn default() -> Self {
        Self {
            uri: "mongodb://localhost:27017".to_string(),
            database: "cloudbridge".to_string(),
        }
    }
}

/// External cloud interaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CloudConfig {
    /// Public callback URL the external cloud delivers webhook events to.
    /// Sent in every subscribe request body.
    pub events_url: String,
    /// Deadline for outbound subscribe/cancel calls.
    pub timeout_secs: u64,
}

impl Default for CloudConfig {
    fn default() -> Self {
        Self {
            events_url: String::new(),
            timeout_secs: 10,
        }
    }
}

/// Resource registry command API.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    pub url: String,
    pub timeout_secs: u64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:9083".to_string(),
            timeout_secs: 10,
        }
    }
}

/// Connector internals.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectorConfig {
    /// Width of the background task pool draining event-log callbacks.
    pub pool_size: usize,
    /// TTL for pending correlation entries.
    pub correlation_ttl_secs: u64,
    /// Interval between correlation cache cleanup sweeps.
    pub correlation_sweep_secs: u64,
}

impl Default for ConnectorConfig {
    fn default() -> Self {
        Self {
            pool_size: 16,
            correlation_ttl_secs: 300,
            correlation_sweep_secs: 600,
        }
    }
}
