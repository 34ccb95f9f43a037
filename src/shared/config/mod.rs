//! Client configuration module
//!
//! Provides configuration for realtime clients: where to connect and how long
//! to wait for a join acknowledgement before presence is considered unknown.

use std::time::Duration;
use thiserror::Error;

/// Default wait for a `trip:join` acknowledgement
pub const DEFAULT_JOIN_ACK_TIMEOUT: Duration = Duration::from_secs(5);

/// Client configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Realtime endpoint, e.g. `wss://example.com/ws`
    pub server_url: String,
    /// How long a join may stay unacknowledged
    pub join_ack_timeout: Duration,
}

impl AppConfig {
    /// Create a new AppConfigBuilder
    pub fn builder() -> AppConfigBuilder {
        AppConfigBuilder::default()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.server_url.starts_with("ws://") || self.server_url.starts_with("wss://")) {
            return Err(ConfigError::InvalidUrl(self.server_url.clone()));
        }
        if self.join_ack_timeout.is_zero() {
            return Err(ConfigError::InvalidTimeout);
        }
        Ok(())
    }
}

/// Builder for AppConfig
#[derive(Debug, Default)]
pub struct AppConfigBuilder {
    server_url: Option<String>,
    join_ack_timeout: Option<Duration>,
}

impl AppConfigBuilder {
    /// Set the server URL
    pub fn server_url(mut self, url: impl Into<String>) -> Self {
        self.server_url = Some(url.into());
        self
    }

    /// Set the join acknowledgement timeout
    pub fn join_ack_timeout(mut self, timeout: Duration) -> Self {
        self.join_ack_timeout = Some(timeout);
        self
    }

    /// Build and validate the configuration
    pub fn build(self) -> Result<AppConfig, ConfigError> {
        let config = AppConfig {
            server_url: self.server_url.ok_or(ConfigError::MissingValue("server_url"))?,
            join_ack_timeout: self.join_ack_timeout.unwrap_or(DEFAULT_JOIN_ACK_TIMEOUT),
        };
        config.validate()?;
        Ok(config)
    }
}

/// Configuration errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
    #[error("missing value: {0}")]
    MissingValue(&'static str),
    #[error("join acknowledgement timeout must be greater than zero")]
    InvalidTimeout,
}
