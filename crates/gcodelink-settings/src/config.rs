//! Configuration and settings management for GCodeLink
//!
//! Provides configuration file handling and validation.
//! Supports JSON and TOML file formats stored in platform-specific directories.
//!
//! Configuration is organized into logical sections:
//! - Connection settings (port, baud rate, read/poll/pacing timings)
//! - Event settings (bus capacity and history)
//!
//! Every field has a default, so a file only needs the values it changes.

use crate::error::{ConfigError, SettingsError, SettingsResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Directory under the platform config dir
const CONFIG_DIR_NAME: &str = "gcodelink";

/// File name used by [`Config::default_path`]
const CONFIG_FILE_NAME: &str = "config.toml";

/// Connection settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionSettings {
    /// Last used port, used when a command names none
    pub port: Option<String>,
    /// Baud rate for serial connections
    pub baud_rate: u32,
    /// Longest a single port read may block, in milliseconds
    pub read_timeout_ms: u64,
    /// How long the receive loop waits for a line per poll, in milliseconds
    pub poll_interval_ms: u64,
    /// Delay after each streamed line, in milliseconds
    pub pacing_interval_ms: u64,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            port: None,
            baud_rate: 115200,
            read_timeout_ms: 50,
            poll_interval_ms: 500,
            pacing_interval_ms: 500,
        }
    }
}

impl ConnectionSettings {
    /// Port read timeout as a [`Duration`]
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    /// Receive loop poll interval as a [`Duration`]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Delay between streamed lines as a [`Duration`]
    pub fn pacing_interval(&self) -> Duration {
        Duration::from_millis(self.pacing_interval_ms)
    }
}

/// Event bus settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventSettings {
    /// Broadcast channel capacity
    pub channel_capacity: usize,
    /// Keep a history of published events
    pub history: bool,
    /// Maximum events kept in history
    pub history_size: usize,
}

impl Default for EventSettings {
    fn default() -> Self {
        Self {
            channel_capacity: 256,
            history: false,
            history_size: 500,
        }
    }
}

/// Complete application configuration
///
/// Aggregates all settings sections and provides file I/O operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Connection settings
    pub connection: ConnectionSettings,
    /// Event settings
    pub events: EventSettings,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Json,
    Toml,
}

impl Format {
    fn of(path: &Path) -> SettingsResult<Self> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Ok(Format::Json),
            Some("toml") => Ok(Format::Toml),
            other => Err(ConfigError::UnsupportedFormat(format!(
                "'{}' (config file must be .json or .toml)",
                other.unwrap_or("")
            ))
            .into()),
        }
    }
}

impl Config {
    /// Create new config with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Load config from file (JSON or TOML)
    pub fn load_from_file(path: &Path) -> SettingsResult<Self> {
        let format = Format::of(path)?;
        let content =
            std::fs::read_to_string(path).map_err(|e| SettingsError::load(path, &e))?;

        let config: Self = match format {
            Format::Json => serde_json::from_str(&content)?,
            Format::Toml => toml::from_str(&content)?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Save config to file (JSON or TOML), creating the parent directory
    pub fn save_to_file(&self, path: &Path) -> SettingsResult<()> {
        self.validate()?;

        let content = match Format::of(path)? {
            Format::Json => serde_json::to_string_pretty(self)?,
            Format::Toml => toml::to_string_pretty(self)?,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| SettingsError::save(path, &e))?;
        }
        std::fs::write(path, content).map_err(|e| SettingsError::save(path, &e))?;

        Ok(())
    }

    /// Load `path`, or the default location when `None`
    ///
    /// A missing file yields the defaults; a present but invalid one is an
    /// error.
    pub fn load_or_default(path: Option<&Path>) -> SettingsResult<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => Self::default_path()?,
        };
        if path.exists() {
            Self::load_from_file(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Platform config location, e.g. `~/.config/gcodelink/config.toml`
    pub fn default_path() -> SettingsResult<PathBuf> {
        let base = dirs::config_dir().ok_or_else(|| {
            SettingsError::ConfigDirectory(
                ConfigError::UnsupportedPlatform(std::env::consts::OS.to_string()).to_string(),
            )
        })?;
        Ok(base.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Validate configuration
    pub fn validate(&self) -> SettingsResult<()> {
        // Validate connection settings
        if self.connection.baud_rate == 0 {
            return Err(SettingsError::invalid(
                "connection.baud_rate",
                "must be > 0",
            ));
        }

        if self.connection.read_timeout_ms == 0 {
            return Err(SettingsError::invalid(
                "connection.read_timeout_ms",
                "must be > 0",
            ));
        }

        if self.connection.poll_interval_ms == 0 {
            return Err(SettingsError::invalid(
                "connection.poll_interval_ms",
                "must be > 0",
            ));
        }

        if self.connection.port.as_deref().is_some_and(|p| p.trim().is_empty()) {
            return Err(SettingsError::invalid("connection.port", "must not be blank"));
        }

        // Validate event settings
        if self.events.channel_capacity == 0 {
            return Err(SettingsError::invalid(
                "events.channel_capacity",
                "must be > 0",
            ));
        }

        if self.events.history && self.events.history_size == 0 {
            return Err(SettingsError::invalid(
                "events.history_size",
                "must be > 0 when history is enabled",
            ));
        }

        Ok(())
    }
}
