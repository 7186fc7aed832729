//! Configuration management for eslmon

mod address;
pub mod serde_utils;

pub use address::{with_default_port, DEFAULT_PORT};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ConfigError;
use serde_utils::duration_secs;

/// Default time allowed for connecting to the peer
pub const DEFAULT_DIAL_TIMEOUT: Duration = Duration::from_secs(5);

/// Default time allowed for each command exchange
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(5);

/// Settings for one monitor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Event socket address, `host` or `host:port`
    pub address: String,

    /// Event socket password
    pub password: String,

    /// Connection timeout
    #[serde(with = "duration_secs")]
    pub dial_timeout: Duration,

    /// Timeout for the authentication and subscription exchanges.
    /// Zero disables the timer.
    #[serde(with = "duration_secs")]
    pub command_timeout: Duration,

    /// Event names to subscribe to; empty means every event
    pub events: Vec<String>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            address: format!("localhost:{DEFAULT_PORT}"),
            password: "ClueCon".to_string(),
            dial_timeout: DEFAULT_DIAL_TIMEOUT,
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
            events: vec![],
        }
    }
}

/// Get the default configuration directory
pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("eslmon")
}

/// Get the default configuration file path
pub fn default_config_path() -> PathBuf {
    default_config_dir().join("config.toml")
}

/// Load configuration from a file
pub fn load_config<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound(path.to_path_buf()));
    }

    let content = std::fs::read_to_string(path)?;
    let config: T = toml::from_str(&content)?;
    Ok(config)
}
