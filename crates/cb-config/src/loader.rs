//! Configuration loader with file and environment variable support.

use crate::{AppConfig, ConfigError};
use std::env;
use std::path::PathBuf;
use tracing::info;

/// Standard config file search paths.
const CONFIG_PATHS: &[&str] = &[
    "config.toml",
    "cloudbridge.toml",
    "./config/config.toml",
    "./config/cloudbridge.toml",
    "/etc/cloudbridge/config.toml",
];

/// Loads `AppConfig` from an optional TOML file plus `CLOUDBRIDGE_*`
/// environment overrides.
pub struct ConfigLoader {
    config_path: Option<PathBuf>,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self { config_path: None }
    }

    pub fn with_path<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            config_path: Some(path.into()),
        }
    }

    /// Load configuration from file (if found) with env overrides applied.
    pub fn load(&self) -> Result<AppConfig, ConfigError> {
        let mut config = AppConfig::default();

        if let Some(path) = self.find_config_file() {
            info!(?path, "Loading configuration from file");
            config = AppConfig::from_file(&path)?;
        }

        self.apply_env_overrides(&mut config);
        config.validate()?;

        Ok(config)
    }

    fn find_config_file(&self) -> Option<PathBuf> {
        if let Some(path) = &self.config_path {
            if path.exists() {
                return Some(path.clone());
            }
        }

        if let Ok(path) = env::var("CLOUDBRIDGE_CONFIG") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        for path in CONFIG_PATHS {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        None
    }

    fn apply_env_overrides(&self, config: &mut AppConfig) {
        // HTTP
        if let Ok(val) = env::var("CLOUDBRIDGE_HTTP_HOST") {
            config.http.host = val;
        }
        if let Ok(val) = env::var("CLOUDBRIDGE_HTTP_PORT") {
            if let Ok(port) = val.parse() {
                config.http.port = port;
            }
        }

        // MongoDB
        if let Ok(val) = env::var("CLOUDBRIDGE_MONGODB_URI") {
            config.mongodb.uri = val;
        }
        if let Ok(val) = env::var("CLOUDBRIDGE_MONGODB_DATABASE") {
            config.mongodb.database = val;
        }

        // External cloud
        if let Ok(val) = env::var("CLOUDBRIDGE_EVENTS_URL") {
            config.cloud.events_url = val;
        }
        if let Ok(val) = env::var("CLOUDBRIDGE_CLOUD_TIMEOUT_SECS") {
            if let Ok(secs) = val.parse() {
                config.cloud.timeout_secs = secs;
            }
        }

        // Registry
        if let Ok(val) = env::var("CLOUDBRIDGE_REGISTRY_URL") {
            config.registry.url = val;
        }
        if let Ok(val) = env::var("CLOUDBRIDGE_REGISTRY_TIMEOUT_SECS") {
            if let Ok(secs) = val.parse() {
                config.registry.timeout_secs = secs;
            }
        }

        // Connector
        if let Ok(val) = env::var("CLOUDBRIDGE_POOL_SIZE") {
            if let Ok(size) = val.parse() {
                config.connector.pool_size = size;
            }
        }
        if let Ok(val) = env::var("CLOUDBRIDGE_CORRELATION_TTL_SECS") {
            if let Ok(secs) = val.parse() {
                config.connector.correlation_ttl_secs = secs;
            }
        }
        if let Ok(val) = env::var("CLOUDBRIDGE_CORRELATION_SWEEP_SECS") {
            if let Ok(secs) = val.parse() {
                config.connector.correlation_sweep_secs = secs;
            }
        }
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}
