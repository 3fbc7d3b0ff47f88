//! Host configuration file.
//!
//! ```toml
//! sample_rate = 48000
//! block_size = 256
//! tick_ms = 10
//! output_channels = 2
//! event_capacity = 1024
//! default_interval_ms = 1000
//! device = "USB Audio"
//! ```
//!
//! Every key is optional; missing keys take the [`Default`] values.

use std::path::{Path, PathBuf};

use conduit_core::{DEFAULT_EVENT_CAPACITY, EVENT_HEADER_SIZE};
use conduit_sched::DEFAULT_INTERVAL_MS;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from loading or validating a [`HostConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the config file.
    #[error("failed to read file '{path}': {source}")]
    ReadFile {
        /// Path of the file that could not be read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse TOML.
    #[error("failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// Failed to serialize TOML.
    #[error("failed to serialize TOML: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    /// A field holds an unusable value.
    #[error("invalid value for '{field}': {reason}")]
    Invalid {
        /// Offending key.
        field: &'static str,
        /// What is wrong with it.
        reason: String,
    },
}

/// Audio and scheduling settings for a [`Host`](crate::Host).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Largest number of frames rendered per graph pass.
    pub block_size: usize,
    /// Tick loop period in milliseconds.
    pub tick_ms: u64,
    /// Sink channel count.
    pub output_channels: usize,
    /// Byte capacity of each event port buffer.
    pub event_capacity: usize,
    /// Interval given to new scheduling nodes.
    pub default_interval_ms: u64,
    /// Output device name; the system default when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            block_size: 512,
            tick_ms: 10,
            output_channels: 2,
            event_capacity: DEFAULT_EVENT_CAPACITY,
            default_interval_ms: DEFAULT_INTERVAL_MS,
            device: None,
        }
    }
}

impl HostConfig {
    /// Parses and validates a config from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads and validates a config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFile {
            path: path.to_owned(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Serializes the config to TOML.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Checks every field is usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let nonzero = |field: &'static str, value: u64| {
            if value == 0 {
                Err(ConfigError::Invalid {
                    field,
                    reason: "must be greater than zero".to_owned(),
                })
            } else {
                Ok(())
            }
        };
        nonzero("sample_rate", u64::from(self.sample_rate))?;
        nonzero("block_size", self.block_size as u64)?;
        nonzero("tick_ms", self.tick_ms)?;
        nonzero("output_channels", self.output_channels as u64)?;
        nonzero("default_interval_ms", self.default_interval_ms)?;
        if self.output_channels > usize::from(u16::MAX) {
            return Err(ConfigError::Invalid {
                field: "output_channels",
                reason: format!("at most {} channels", u16::MAX),
            });
        }
        if self.event_capacity < EVENT_HEADER_SIZE {
            return Err(ConfigError::Invalid {
                field: "event_capacity",
                reason: format!("must hold at least one {EVENT_HEADER_SIZE}-byte event header"),
            });
        }
        Ok(())
    }
}
