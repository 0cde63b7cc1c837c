//! Client configuration.

use derive_getters::Getters;
use derive_more::{Display, Error};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, instrument};

/// Environment variable that overrides [`SyncConfig::gateway_url`].
pub const GATEWAY_URL_ENV: &str = "STRICTLY_GATEWAY_URL";

/// Settings for talking to the ledger gateway and pacing the play loop.
#[derive(Debug, Clone, PartialEq, Eq, Getters, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Base URL of the ledger gateway.
    #[serde(default = "default_gateway_url")]
    gateway_url: String,

    /// Address of the game contract; also the house's identity.
    #[serde(default = "default_contract_address")]
    contract_address: String,

    /// Address the player signs with.
    #[serde(default = "default_player_identity")]
    player_identity: String,

    /// Delay between state polls while waiting for the house.
    #[serde(default = "default_poll_interval_ms")]
    poll_interval_ms: u64,

    /// Polls before giving up on a house reply.
    #[serde(default = "default_max_refresh_polls")]
    max_refresh_polls: u32,

    /// Timeout for a single gateway request.
    #[serde(default = "default_request_timeout_secs")]
    request_timeout_secs: u64,

    /// `tracing` filter used when `RUST_LOG` is unset.
    #[serde(default = "default_log_filter")]
    log_filter: String,
}

fn default_gateway_url() -> String {
    "http://127.0.0.1:5050".to_string()
}

fn default_contract_address() -> String {
    "0x0".to_string()
}

fn default_player_identity() -> String {
    "0x0".to_string()
}

fn default_poll_interval_ms() -> u64 {
    500
}

fn default_max_refresh_polls() -> u32 {
    20
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_log_filter() -> String {
    "info".to_string()
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            gateway_url: default_gateway_url(),
            contract_address: default_contract_address(),
            player_identity: default_player_identity(),
            poll_interval_ms: default_poll_interval_ms(),
            max_refresh_polls: default_max_refresh_polls(),
            request_timeout_secs: default_request_timeout_secs(),
            log_filter: default_log_filter(),
        }
    }
}

impl SyncConfig {
    /// Loads configuration from a TOML file. Missing keys take defaults.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        debug!("Loading config from file");
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::new(format!("Failed to read config file: {}", e)))?;

        let config = Self::from_toml(&content)?;
        info!(gateway = %config.gateway_url, "Config loaded successfully");
        Ok(config)
    }

    /// Parses configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)
            .map_err(|e| ConfigError::new(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Loads `path` if given, otherwise defaults, then applies the
    /// environment override.
    #[instrument]
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        Ok(config.with_env_override(std::env::var(GATEWAY_URL_ENV).ok()))
    }

    /// Replaces the gateway URL when `url` is set and non-empty.
    pub fn with_env_override(mut self, url: Option<String>) -> Self {
        if let Some(url) = url.filter(|u| !u.trim().is_empty()) {
            debug!(%url, "Gateway URL overridden from environment");
            self.gateway_url = url;
        }
        self
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::new("poll_interval_ms must be positive".to_string()));
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::new(
                "request_timeout_secs must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Poll interval as a duration.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Request timeout as a duration.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Configuration error.
#[derive(Debug, Clone, Display, Error)]
#[display("Config error: {} at {}:{}", message, file, line)]
pub struct ConfigError {
    /// Error message.
    pub message: String,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl ConfigError {
    /// Creates a new configuration error.
    #[track_caller]
    #[instrument(skip(message))]
    pub fn new(message: String) -> Self {
        let loc = std::panic::Location::caller();
        Self {
            message,
            line: loc.line(),
            file: loc.file(),
        }
    }
}
