/*!
 * Configuration types for Beacon
 */

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::alert::ChannelKind;
use crate::error::{BeaconError, Result};

/// Main configuration for the alert and recording subsystems
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreConfig {
    /// Upper bound on location acquisition in seconds
    #[serde(default = "default_location_timeout")]
    pub location_timeout_secs: u64,

    /// Per-channel delivery attempt timeout in seconds
    #[serde(default = "default_channel_timeout")]
    pub channel_timeout_secs: u64,

    /// Overall alert fan-out deadline in seconds
    #[serde(default = "default_fanout_deadline")]
    pub fanout_deadline_secs: u64,

    /// Channel preference order for contact delivery
    #[serde(default = "default_channel_order")]
    pub channel_order: Vec<ChannelKind>,

    /// Log level for diagnostic output
    #[serde(default)]
    pub log_level: LogLevel,

    /// Log file path (None = stdout)
    #[serde(default)]
    pub log_file: Option<PathBuf>,

    /// Enable verbose logging (shorthand for log_level = debug)
    #[serde(default)]
    pub verbose: bool,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            location_timeout_secs: default_location_timeout(),
            channel_timeout_secs: default_channel_timeout(),
            fanout_deadline_secs: default_fanout_deadline(),
            channel_order: default_channel_order(),
            log_level: LogLevel::Info,
            log_file: None,
            verbose: false,
        }
    }
}

impl CoreConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| BeaconError::Config(format!("Failed to read config file: {}", e)))?;
        let config: CoreConfig = toml::from_str(&contents)
            .map_err(|e| BeaconError::Config(format!("Failed to parse config file: {}", e)))?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn to_file(&self, path: &Path) -> Result<()> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| BeaconError::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Location acquisition bound as a `Duration`
    pub fn location_timeout(&self) -> Duration {
        Duration::from_secs(self.location_timeout_secs)
    }

    /// Per-channel attempt timeout as a `Duration`
    pub fn channel_timeout(&self) -> Duration {
        Duration::from_secs(self.channel_timeout_secs)
    }

    /// Fan-out deadline as a `Duration`
    pub fn fanout_deadline(&self) -> Duration {
        Duration::from_secs(self.fanout_deadline_secs)
    }
}

/// Log level for diagnostic output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Only errors
    Error,

    /// Warnings and errors
    Warn,

    /// Info, warnings, and errors
    #[default]
    Info,

    /// Debug and above
    Debug,

    /// All messages including traces
    Trace,
}

impl LogLevel {
    /// Convert to tracing::Level
    pub fn to_tracing_level(&self) -> tracing::Level {
        match self {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}

fn default_location_timeout() -> u64 {
    10
}

fn default_channel_timeout() -> u64 {
    5
}

fn default_fanout_deadline() -> u64 {
    20
}

fn default_channel_order() -> Vec<ChannelKind> {
    vec![ChannelKind::Sms, ChannelKind::Email, ChannelKind::Push]
}
