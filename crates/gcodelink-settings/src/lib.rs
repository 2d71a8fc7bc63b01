//! GCodeLink Settings Crate
//!
//! Handles application configuration: defaults, validation, and persistence
//! to JSON or TOML.

pub mod config;
pub mod error;

pub use config::{Config, ConnectionSettings, EventSettings};
pub use error::{ConfigError, SettingsError, SettingsResult};
