//! Watcher-wide configuration
//!
//! Loaded from TOML; every key is optional:
//!
//! ```toml
//! debounce_window_ms = 1000
//! storm_threshold = 10
//! rename_window_ms = 1000
//! channel_capacity = 64
//! extra_ignore_folders = [".cache"]
//! enrich = false
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    #[error("storm_threshold must be at least 2, got {0}")]
    StormThreshold(u32),
}

/// Tuning shared by every root a watcher manages
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatcherConfig {
    /// Quiet period after the last notification before an event is emitted
    pub debounce_window_ms: u64,

    /// Notifications for one path (first one included) that abort its event
    pub storm_threshold: u32,

    /// How long an old-name notification waits for its new name
    pub rename_window_ms: u64,

    /// Capacity of the event and error channels; producers wait when full
    pub channel_capacity: usize,

    /// Folder names ignored under every root, on top of the platform set
    pub extra_ignore_folders: Vec<String>,

    /// Attach content type and checksum to emitted events
    pub enrich: bool,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            debounce_window_ms: 1000,
            storm_threshold: 10,
            rename_window_ms: 1000,
            channel_capacity: 64,
            extra_ignore_folders: Vec::new(),
            enrich: false,
        }
    }
}

impl WatcherConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.debounce_window_ms == 0 {
            return Err(ConfigError::Zero {
                field: "debounce_window_ms",
            });
        }
        if self.rename_window_ms == 0 {
            return Err(ConfigError::Zero {
                field: "rename_window_ms",
            });
        }
        if self.channel_capacity == 0 {
            return Err(ConfigError::Zero {
                field: "channel_capacity",
            });
        }
        if self.storm_threshold < 2 {
            return Err(ConfigError::StormThreshold(self.storm_threshold));
        }
        Ok(())
    }

    pub fn debounce_window(&self) -> Duration {
        Duration::from_millis(self.debounce_window_ms)
    }

    pub fn rename_window(&self) -> Duration {
        Duration::from_millis(self.rename_window_ms)
    }
}
