//! Configuration for the disqueue client

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{QueueError, Result};

/// Configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Base HTTP URL of the queue server
    #[serde(default = "default_url")]
    pub url: String,

    /// Basic-auth username
    #[serde(default)]
    pub username: Option<String>,

    /// Basic-auth password
    #[serde(default)]
    pub password: Option<String>,

    /// Path of the take websocket on the server
    #[serde(default = "default_websocket_path")]
    pub websocket_path: String,

    /// Timeout for request/response calls in seconds (0 = none)
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_websocket_path() -> String {
    "/take/ws".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

impl Default for Config {
    fn default() -> Self {
        Self {
            url: default_url(),
            username: None,
            password: None,
            websocket_path: default_websocket_path(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl Config {
    /// Load config from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| QueueError::Config(e.to_string()))
    }

    /// Save config to a TOML file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content =
            toml::to_string_pretty(self).map_err(|e| QueueError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
