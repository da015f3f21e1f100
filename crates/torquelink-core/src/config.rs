//! Link configuration
//!
//! Timing and sizing parameters for the session, the ASCII protocol and the
//! serial transport. Loadable from JSON; every field has a default.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{ProtocolError, Result};

/// Default time to wait for each reply in milliseconds
pub const DEFAULT_READ_TIMEOUT_MS: u64 = 1000;

/// Default number of additional receive attempts after the first
pub const DEFAULT_MAX_RETRIES: u32 = 2;

/// Default wait slice of the background reader in milliseconds
pub const DEFAULT_ASYNC_POLL_INTERVAL_MS: u64 = 10;

/// Default maximum size of one received message
pub const DEFAULT_RX_BUFFER_SIZE: usize = 4096;

/// Default serial baud rate
pub const DEFAULT_BAUD_RATE: u32 = 115200;

/// Serial transport settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    /// Line speed
    pub baud_rate: u32,
    /// Timeout used while opening and configuring the port
    pub open_timeout_ms: u64,
    /// Gap after which a partially received message is considered complete
    pub inter_char_timeout_ms: u64,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            baud_rate: DEFAULT_BAUD_RATE,
            open_timeout_ms: 100,
            inter_char_timeout_ms: 20,
        }
    }
}

/// Complete link configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    /// Time to wait for each reply attempt
    pub read_timeout_ms: u64,
    /// Receive attempts after the first before an exchange times out
    pub max_retries: u32,
    /// Wait slice of the background reader; bounds stop latency
    pub async_poll_interval_ms: u64,
    /// Maximum size of one received message
    pub rx_buffer_size: usize,
    /// Serial transport settings
    pub serial: SerialConfig,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            read_timeout_ms: DEFAULT_READ_TIMEOUT_MS,
            max_retries: DEFAULT_MAX_RETRIES,
            async_poll_interval_ms: DEFAULT_ASYNC_POLL_INTERVAL_MS,
            rx_buffer_size: DEFAULT_RX_BUFFER_SIZE,
            serial: SerialConfig::default(),
        }
    }
}

impl LinkConfig {
    /// Parse a JSON document. Missing fields keep their defaults.
    pub fn from_json(text: &str) -> Result<Self> {
        let config: LinkConfig =
            serde_json::from_str(text).map_err(|e| ProtocolError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Reject values the session cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.async_poll_interval_ms == 0 {
            return Err(ProtocolError::Config(
                "async_poll_interval_ms must be greater than zero".to_string(),
            ));
        }
        if self.rx_buffer_size == 0 {
            return Err(ProtocolError::Config(
                "rx_buffer_size must be greater than zero".to_string(),
            ));
        }
        if self.serial.baud_rate == 0 {
            return Err(ProtocolError::Config(
                "serial.baud_rate must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// `read_timeout_ms` as a [`Duration`]
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    /// `async_poll_interval_ms` as a [`Duration`]
    pub fn async_poll_interval(&self) -> Duration {
        Duration::from_millis(self.async_poll_interval_ms)
    }
}
