//! Configuration module for lineprov-server.
//!
//! Handles loading configuration from TOML files, CLI arguments,
//! and environment variables.

pub mod file;

use crate::config::file::{FileConfig, StorageBackend};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Environment variable overriding `[broker] url`.
pub const BROKER_URL_ENV: &str = "BROKER_URL";

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("validation error: {0}")]
    ValidationError(String),

    #[error("DATABASE_URL environment variable not set")]
    MissingDatabaseUrl,
}

/// How the broker is reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrokerKind {
    Amqp,
    Memory,
}

/// Validated broker settings.
#[derive(Debug, Clone)]
pub struct BrokerSettings {
    pub url: Url,
    pub kind: BrokerKind,
    pub queue: String,
    pub connect_timeout: Duration,
}

/// Validated configuration ready for startup.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub listen: SocketAddr,
    pub broker: BrokerSettings,
    pub storage: StorageBackend,
}

/// Configuration loader that handles the complete loading process.
pub struct ConfigLoader {
    config_path: PathBuf,
    listen_override: Option<SocketAddr>,
    broker_url_override: Option<String>,
}

impl ConfigLoader {
    /// Create a new config loader.
    pub fn new(config_path: impl AsRef<Path>, listen_override: Option<SocketAddr>) -> Self {
        Self {
            config_path: config_path.as_ref().to_path_buf(),
            listen_override,
            broker_url_override: std::env::var(BROKER_URL_ENV).ok(),
        }
    }

    /// Load and process the configuration.
    ///
    /// This will:
    /// 1. Read the TOML file
    /// 2. Apply CLI and environment overrides
    /// 3. Validate the configuration
    pub fn load(&self) -> Result<LoadedConfig, ConfigError> {
        let config_content = std::fs::read_to_string(&self.config_path)?;
        self.load_str(&config_content)
    }

    fn load_str(&self, content: &str) -> Result<LoadedConfig, ConfigError> {
        let mut file_config: FileConfig = toml::from_str(content)?;

        if let Some(listen) = self.listen_override {
            file_config.server.listen = listen;
        }
        if let Some(url) = &self.broker_url_override {
            file_config.broker.url = url.clone();
        }

        self.validate(file_config)
    }

    fn validate(&self, config: FileConfig) -> Result<LoadedConfig, ConfigError> {
        if config.broker.queue.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "broker queue name must not be empty".into(),
            ));
        }
        if config.broker.connect_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "broker connect_timeout_secs must be positive".into(),
            ));
        }

        let url = Url::parse(&config.broker.url)
            .map_err(|e| ConfigError::ValidationError(format!("invalid broker url: {e}")))?;
        let kind = match url.scheme() {
            "amqp" | "amqps" => BrokerKind::Amqp,
            "memory" => BrokerKind::Memory,
            other => {
                return Err(ConfigError::ValidationError(format!(
                    "unsupported broker url scheme: {other}"
                )));
            }
        };

        Ok(LoadedConfig {
            listen: config.server.listen,
            broker: BrokerSettings {
                url,
                kind,
                queue: config.broker.queue,
                connect_timeout: Duration::from_secs(config.broker.connect_timeout_secs),
            },
            storage: config.storage.backend,
        })
    }
}

/// Get the database URL from the environment.
pub fn get_database_url() -> Result<String, ConfigError> {
    std::env::var("DATABASE_URL").map_err(|_| ConfigError::MissingDatabaseUrl)
}
