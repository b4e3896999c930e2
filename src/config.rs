//! Configuration types for Httptrap

use serde::{Deserialize, Serialize};

use crate::{HttptrapError, Result};

/// Default per-element wait when consuming the capture sequence
pub const DEFAULT_TIMEOUT_MS: u64 = 500;

/// Default maximum concurrent connections
pub const DEFAULT_MAX_CONNECTIONS: usize = 256;

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// Per-element wait (ms) used by the capture sequence
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Port to listen on (0 picks an ephemeral port)
    #[serde(default)]
    pub port: u16,
    /// Maximum concurrent connections
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
}

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

fn default_max_connections() -> usize {
    DEFAULT_MAX_CONNECTIONS
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_TIMEOUT_MS,
            server: ServerConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 0,
            max_connections: DEFAULT_MAX_CONNECTIONS,
        }
    }
}

impl CaptureConfig {
    /// Load configuration from TOML file
    ///
    /// # Errors
    ///
    /// Returns error if file cannot be read or parsed
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| HttptrapError::ConfigError(format!("Failed to read config file: {e}")))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| HttptrapError::ConfigError(format!("Failed to parse config: {e}")))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    ///
    /// # Errors
    ///
    /// Returns error if configuration is invalid
    pub fn validate(&self) -> Result<()> {
        if self.timeout_ms == 0 {
            return Err(HttptrapError::ConfigError(
                "timeout_ms must be > 0".to_string(),
            ));
        }

        if self.server.max_connections == 0 {
            return Err(HttptrapError::ConfigError(
                "max_connections must be > 0".to_string(),
            ));
        }

        Ok(())
    }
}
