//! Tunables for the command link and the firmware updater.
//!
//! Every field has a default matching the MCU firmware's expectations, so
//! `Default::default()` is the right choice unless a test needs to shorten
//! timeouts. Both structs can also be loaded from JSON; missing fields keep
//! their defaults and durations are given in milliseconds.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use mcu_link::config::LinkConfig;
//!
//! let config = LinkConfig::default().with_response_timeout(Duration::from_millis(200));
//! assert_eq!(config.response_timeout, Duration::from_millis(200));
//! assert_eq!(config.max_command_retries, 10);
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// I2C address of the application-mode control interface.
pub const APPLICATION_I2C_ADDRESS: u8 = 0x2D;

/// I2C address of the bootloader-mode control interface.
pub const BOOTLOADER_I2C_ADDRESS: u8 = 0x2B;

/// Default time a command may stay busy or pending.
pub const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Default attempts for reading a valid response header.
pub const DEFAULT_HEADER_READ_RETRIES: u32 = 5;

/// Default attempts for reading a valid response payload.
pub const DEFAULT_PAYLOAD_READ_RETRIES: u32 = 5;

/// Default resends after the MCU reports a command integrity error.
pub const DEFAULT_MAX_COMMAND_RETRIES: u32 = 10;

/// Default window for detecting the MCU operation mode.
pub const DEFAULT_MODE_DETECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default pause between operation mode detection rounds.
pub const DEFAULT_MODE_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Default firmware chunk size (one full frame payload).
pub const DEFAULT_CHUNK_SIZE: usize = 255;

/// Configuration for a single command link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    /// Time a command may remain busy or pending before it times out.
    #[serde(rename = "response_timeout_ms", with = "duration_ms")]
    pub response_timeout: Duration,
    /// Attempts for reading a valid response header.
    pub header_read_retries: u32,
    /// Attempts for reading a valid response payload.
    pub payload_read_retries: u32,
    /// Resends after the MCU reports a command integrity error.
    pub max_command_retries: u32,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            response_timeout: DEFAULT_RESPONSE_TIMEOUT,
            header_read_retries: DEFAULT_HEADER_READ_RETRIES,
            payload_read_retries: DEFAULT_PAYLOAD_READ_RETRIES,
            max_command_retries: DEFAULT_MAX_COMMAND_RETRIES,
        }
    }
}

impl LinkConfig {
    /// Set the busy/pending timeout.
    pub fn with_response_timeout(mut self, timeout: Duration) -> Self {
        self.response_timeout = timeout;
        self
    }

    /// Set the header read attempts.
    pub fn with_header_read_retries(mut self, retries: u32) -> Self {
        self.header_read_retries = retries;
        self
    }

    /// Set the payload read attempts.
    pub fn with_payload_read_retries(mut self, retries: u32) -> Self {
        self.payload_read_retries = retries;
        self
    }

    /// Set the integrity error resend limit.
    pub fn with_max_command_retries(mut self, retries: u32) -> Self {
        self.max_command_retries = retries;
        self
    }

    /// Load from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }
}

/// Configuration for the firmware updater.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdaterConfig {
    /// How long to poll both interfaces for the operation mode.
    #[serde(rename = "mode_detect_timeout_ms", with = "duration_ms")]
    pub mode_detect_timeout: Duration,
    /// Pause between probing rounds.
    #[serde(rename = "mode_poll_interval_ms", with = "duration_ms")]
    pub mode_poll_interval: Duration,
    /// Firmware bytes per `send_firmware` command.
    pub chunk_size: usize,
}

impl Default for UpdaterConfig {
    fn default() -> Self {
        Self {
            mode_detect_timeout: DEFAULT_MODE_DETECT_TIMEOUT,
            mode_poll_interval: DEFAULT_MODE_POLL_INTERVAL,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl UpdaterConfig {
    /// Set the operation mode detection window.
    pub fn with_mode_detect_timeout(mut self, timeout: Duration) -> Self {
        self.mode_detect_timeout = timeout;
        self
    }

    /// Set the pause between detection rounds.
    pub fn with_mode_poll_interval(mut self, interval: Duration) -> Self {
        self.mode_poll_interval = interval;
        self
    }

    /// Set the firmware chunk size, clamped to `1..=255`.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.clamp(1, DEFAULT_CHUNK_SIZE);
        self
    }

    /// Load from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }
}

mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}
