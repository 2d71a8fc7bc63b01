//! # GCodeLink
//!
//! A serial machine-control core for GRBL-style CNC and laser controllers:
//! - Serial (USB) connection with a background receive loop
//! - Jogging through a fixed command table
//! - Paced, cancellable file streaming
//! - Waypoint parsing and toolpath preview
//!
//! ## Architecture
//!
//! GCodeLink is organized as a workspace with multiple crates:
//!
//! 1. **gcodelink-core** - Errors, connection/stream states, event bus
//! 2. **gcodelink-communication** - Transport, receive loop, streaming, jog encoder, facade
//! 3. **gcodelink-visualizer** - G-code waypoint parser and path preview
//! 4. **gcodelink-settings** - Configuration file handling
//! 5. **gcodelink** - Logging setup and the command-line shell

pub use gcodelink_core::{
    ConnectError, ConnectionState, ControlEvent, Error, EventBus, EventBusConfig, EventCategory,
    EventFilter, FileError, ReadError, Result, StreamStatus, WriteError,
};

pub use gcodelink_communication::{
    encode, list_ports, ControllerConfig, EncodedCommand, JogDirection, MachineControl,
    MockPortOpener, PortOpener, SerialPortInfo,
};

pub use gcodelink_visualizer::{parse_file, MotionCommand, PathPreview, Waypoint};

pub use gcodelink_settings::{Config, ConnectionSettings, EventSettings, SettingsError};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build date (set at compile time)
pub const BUILD_DATE: &str = env!("BUILD_DATE");

/// Initialize logging
///
/// Sets up structured logging with:
/// - Output on stderr, so stdout stays free for command output
/// - RUST_LOG environment variable support (default `info`)
/// - Thread names, so receive and stream threads are distinguishable
/// - JSON lines instead of text when `json` is set
pub fn init_logging(json: bool) -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    if json {
        let fmt_layer = fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_thread_names(true);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()?;
    } else {
        let fmt_layer = fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_level(true)
            .with_thread_names(true);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()?;
    }

    Ok(())
}

/// Facade tunables from a loaded config
pub fn controller_config(config: &Config) -> ControllerConfig {
    let connection = &config.connection;
    ControllerConfig {
        baud_rate: connection.baud_rate,
        read_timeout: connection.read_timeout(),
        poll_interval: connection.poll_interval(),
        pacing_interval: connection.pacing_interval(),
        event_bus: EventBusConfig {
            channel_capacity: config.events.channel_capacity,
            enable_history: config.events.history,
            max_history_size: config.events.history_size,
            ..EventBusConfig::default()
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_controller_config_follows_settings() {
        let mut config = Config::default();
        config.connection.baud_rate = 250_000;
        config.connection.pacing_interval_ms = 25;
        config.events.history = true;
        config.events.history_size = 10;

        let controller = controller_config(&config);
        assert_eq!(controller.baud_rate, 250_000);
        assert_eq!(controller.pacing_interval, Duration::from_millis(25));
        assert_eq!(controller.read_timeout, Duration::from_millis(50));
        assert!(controller.event_bus.enable_history);
        assert_eq!(controller.event_bus.max_history_size, 10);
    }

    #[test]
    fn test_default_settings_match_controller_defaults() {
        let from_settings = controller_config(&Config::default());
        let defaults = ControllerConfig::default();
        assert_eq!(from_settings.baud_rate, defaults.baud_rate);
        assert_eq!(from_settings.poll_interval, defaults.poll_interval);
        assert_eq!(from_settings.pacing_interval, defaults.pacing_interval);
        assert_eq!(
            from_settings.event_bus.channel_capacity,
            defaults.event_bus.channel_capacity
        );
    }
}
