//! Machine-control facade
//!
//! [`MachineControl`] is the one entry point a shell talks to. It owns the
//! transport, the receive loop and at most one stream session, and it owns
//! the [`EventBus`] every background task publishes to.
//!
//! Writers are mutually exclusive: while a file stream is running, direct
//! sends and jogs are refused with [`Error::StreamInProgress`].

use crate::communication::receive::ReceiveLoop;
use crate::communication::serial::SerialPortOpener;
use crate::communication::stream::{StreamSession, DEFAULT_PACING_INTERVAL};
use crate::communication::transport::{TransportConnection, TransportIo, DEFAULT_BAUD_RATE};
use crate::communication::{PortOpener, SerialPortInfo};
use crate::jog::{encode, EncodedCommand, JogDirection};
use gcodelink_core::{
    ConnectError, ConnectionState, ControlEvent, Error, EventBus, EventBusConfig, EventFilter,
    Result, StreamStatus, SubscriptionId, WriteError,
};
use gcodelink_visualizer::{parse_file, PathPreview, Waypoint};
use parking_lot::Mutex;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Tunables for [`MachineControl`]
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Baud rate used by [`MachineControl::connect`]
    pub baud_rate: u32,
    /// Longest a single port read may block
    pub read_timeout: Duration,
    /// How long the receive loop waits for a line per poll
    pub poll_interval: Duration,
    /// Delay after each streamed line
    pub pacing_interval: Duration,
    /// Event bus settings
    pub event_bus: EventBusConfig,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            baud_rate: DEFAULT_BAUD_RATE,
            read_timeout: Duration::from_millis(50),
            poll_interval: Duration::from_millis(500),
            pacing_interval: DEFAULT_PACING_INTERVAL,
            event_bus: EventBusConfig::default(),
        }
    }
}

/// Everything bound to one open port
struct ActiveConnection {
    transport: TransportConnection,
    receiver: ReceiveLoop,
    /// Latest session; stays here until replaced, even while being joined
    stream: Option<Arc<StreamSession>>,
}

impl ActiveConnection {
    fn stream_running(&self) -> bool {
        self.stream.as_ref().is_some_and(|s| s.is_running())
    }
}

impl Drop for ActiveConnection {
    fn drop(&mut self) {
        self.receiver.stop();
        if let Some(stream) = self.stream.take() {
            stream.cancel();
            let status = stream.join();
            tracing::debug!("Stream on {} ended {}", self.transport.port_name(), status);
        }
        self.transport.close();
    }
}

/// Facade over one controller connection
///
/// Event handlers run on the background threads that publish. They must
/// return quickly and must not call back into the `MachineControl` that
/// owns the bus; use [`EventBus::receiver`] for that kind of consumer.
pub struct MachineControl {
    config: ControllerConfig,
    opener: Arc<dyn PortOpener>,
    events: Arc<EventBus>,
    active: Mutex<Option<ActiveConnection>>,
}

impl MachineControl {
    /// Create a facade that opens real serial ports
    pub fn new(config: ControllerConfig) -> Self {
        let opener = Arc::new(SerialPortOpener::new(config.read_timeout));
        Self::with_opener(config, opener)
    }

    /// Create a facade over a custom port source
    pub fn with_opener(config: ControllerConfig, opener: Arc<dyn PortOpener>) -> Self {
        let events = Arc::new(EventBus::with_config(config.event_bus.clone()));
        Self {
            config,
            opener,
            events,
            active: Mutex::new(None),
        }
    }

    /// Configuration in use
    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    /// Bus that receives every event
    pub fn events(&self) -> Arc<EventBus> {
        self.events.clone()
    }

    /// Shorthand for [`EventBus::subscribe`]
    pub fn subscribe<F>(&self, filter: EventFilter, handler: F) -> SubscriptionId
    where
        F: Fn(ControlEvent) + Send + Sync + 'static,
    {
        self.events.subscribe(filter, handler)
    }

    /// Ports the opener can reach; empty if enumeration fails
    pub fn enumerate_ports(&self) -> Vec<SerialPortInfo> {
        match self.opener.list_ports() {
            Ok(ports) => ports,
            Err(e) => {
                tracing::error!("Port enumeration failed: {}", e);
                Vec::new()
            }
        }
    }

    /// Connect at the configured baud rate
    pub fn connect(&self, port: &str) -> Result<()> {
        self.connect_with_baud(port, self.config.baud_rate)
    }

    /// Open `port` and start the receive loop
    ///
    /// Fails with [`ConnectError::AlreadyConnected`] while a connection is
    /// open. A faulted leftover connection is torn down first.
    pub fn connect_with_baud(&self, port: &str, baud_rate: u32) -> Result<()> {
        let stale = {
            let mut active = self.active.lock();
            if let Some(conn) = active.as_ref() {
                if conn.transport.state().is_open() {
                    return Err(ConnectError::AlreadyConnected {
                        port: conn.transport.port_name().to_string(),
                    }
                    .into());
                }
            }
            active.take()
        };
        if let Some(stale) = stale {
            tracing::info!(
                "Discarding {} connection to {}",
                stale.transport.state(),
                stale.transport.port_name()
            );
            drop(stale);
        }

        let transport = TransportConnection::open(self.opener.as_ref(), port, baud_rate)?;
        let mut receiver = ReceiveLoop::new(
            transport.io(),
            self.events.clone(),
            self.config.poll_interval,
        );
        receiver.start()?;

        let fresh = ActiveConnection {
            transport,
            receiver,
            stream: None,
        };

        let mut active = self.active.lock();
        if let Some(existing) = active.as_ref() {
            let port = existing.transport.port_name().to_string();
            drop(active);
            drop(fresh);
            return Err(ConnectError::AlreadyConnected { port }.into());
        }
        *active = Some(fresh);
        tracing::info!("Connected to {} at {} baud", port, baud_rate);
        Ok(())
    }

    /// Stop the receive loop, cancel and join any stream, close the port
    ///
    /// Returns once no background task references the port. Does nothing
    /// when not connected.
    pub fn disconnect(&self) {
        let conn = self.active.lock().take();
        if let Some(conn) = conn {
            let port = conn.transport.port_name().to_string();
            drop(conn);
            tracing::info!("Disconnected from {}", port);
        }
    }

    /// Send one caller-supplied line unmodified
    pub fn send_raw(&self, text: &str) -> Result<()> {
        self.send(&EncodedCommand::pass_through(text))
    }

    /// Send the jog for an external direction code
    pub fn send_jog(&self, code: u32) -> Result<()> {
        let direction = JogDirection::try_from(code)?;
        self.jog(direction)
    }

    /// Send the lines for `direction`
    pub fn jog(&self, direction: JogDirection) -> Result<()> {
        tracing::info!("Jog {}", direction);
        self.send(&encode(direction))
    }

    fn send(&self, command: &EncodedCommand) -> Result<()> {
        let active = self.active.lock();
        let io = writable(active.as_ref())?;
        for line in command.iter() {
            io.write(line)?;
        }
        Ok(())
    }

    /// Start streaming `path` on the current connection
    ///
    /// Returns as soon as the session is started; completion, cancellation
    /// and failure arrive as events. A missing file is reported the same
    /// way, through [`ControlEvent::StreamFailed`].
    pub fn stream_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let previous = {
            let mut active = self.active.lock();
            let io = writable(active.as_ref())?;
            let Some(conn) = active.as_mut() else {
                return Err(WriteError::NotOpen.into());
            };

            let mut session = StreamSession::new(path.as_ref(), self.config.pacing_interval);
            session.start(io, self.events.clone())?;
            conn.stream.replace(Arc::new(session))
        };

        // Already terminal; joining only reaps the thread.
        drop(previous);
        Ok(())
    }

    /// Cancel the running stream and wait for it to stop
    ///
    /// Returns the final status, or `None` if no stream was ever started on
    /// this connection. The session stays in place during the join, so
    /// writers are refused and `disconnect` waits until its thread is gone.
    pub fn cancel_stream(&self) -> Option<StreamStatus> {
        let session = {
            let active = self.active.lock();
            let session = active.as_ref()?.stream.clone()?;
            session.cancel();
            session
        };
        let status = session.join();
        tracing::info!("Stream of {} ended {}", session.path().display(), status);
        Some(status)
    }

    /// Parse an instruction file into motion waypoints
    pub fn load_waypoints(&self, path: impl AsRef<Path>) -> Result<Vec<Waypoint>> {
        Ok(parse_file(path.as_ref())?)
    }

    /// Parse an instruction file and summarise its toolpath
    pub fn preview(&self, path: impl AsRef<Path>) -> Result<PathPreview> {
        let waypoints = self.load_waypoints(path)?;
        Ok(PathPreview::from_waypoints(&waypoints))
    }

    /// State of the current connection; `Closed` when there is none
    pub fn connection_state(&self) -> ConnectionState {
        self.active
            .lock()
            .as_ref()
            .map(|conn| conn.transport.state())
            .unwrap_or_default()
    }

    /// Whether the connection is open
    pub fn is_connected(&self) -> bool {
        self.connection_state().is_open()
    }

    /// Port of the current connection, open or faulted
    pub fn port_name(&self) -> Option<String> {
        self.active
            .lock()
            .as_ref()
            .map(|conn| conn.transport.port_name().to_string())
    }

    /// Status of the latest stream on this connection
    pub fn stream_status(&self) -> Option<StreamStatus> {
        self.active
            .lock()
            .as_ref()
            .and_then(|conn| conn.stream.as_ref().map(|s| s.status()))
    }
}

impl Drop for MachineControl {
    fn drop(&mut self) {
        self.disconnect();
    }
}

/// Write side of `conn`, if nothing else owns it
fn writable(conn: Option<&ActiveConnection>) -> Result<TransportIo> {
    let conn = conn.ok_or(WriteError::NotOpen)?;
    if !conn.transport.state().is_open() {
        return Err(WriteError::NotOpen.into());
    }
    if conn.stream_running() {
        return Err(Error::StreamInProgress);
    }
    Ok(conn.transport.io())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::communication::mock::MockPortOpener;

    fn fast_config() -> ControllerConfig {
        ControllerConfig {
            poll_interval: Duration::from_millis(20),
            pacing_interval: Duration::ZERO,
            ..Default::default()
        }
    }

    #[test]
    fn test_default_config() {
        let config = ControllerConfig::default();
        assert_eq!(config.baud_rate, 115_200);
        assert_eq!(config.pacing_interval, Duration::from_millis(500));
        assert_eq!(config.poll_interval, Duration::from_millis(500));
    }

    #[test]
    fn test_not_connected() {
        let control = MachineControl::with_opener(fast_config(), Arc::new(MockPortOpener::new()));
        assert_eq!(control.connection_state(), ConnectionState::Closed);
        assert!(matches!(
            control.send_raw("$H"),
            Err(Error::Write(WriteError::NotOpen))
        ));
        assert!(matches!(
            control.stream_file("job.nc"),
            Err(Error::Write(WriteError::NotOpen))
        ));
        assert_eq!(control.cancel_stream(), None);
        control.disconnect();
    }

    #[test]
    fn test_unknown_jog_code_writes_nothing() {
        let opener = Arc::new(MockPortOpener::new());
        let port = opener.add_port("sim");
        let control = MachineControl::with_opener(fast_config(), opener);
        control.connect("sim").unwrap();

        assert!(matches!(
            control.send_jog(999),
            Err(Error::UnknownJogCode { code: 999 })
        ));
        assert!(port.writes().is_empty());
    }

    #[test]
    fn test_enumerate_uses_opener() {
        let opener = Arc::new(MockPortOpener::new());
        opener.add_port("sim1");
        opener.add_port("sim0");
        let control = MachineControl::with_opener(fast_config(), opener);
        let names: Vec<String> = control
            .enumerate_ports()
            .into_iter()
            .map(|p| p.port_name)
            .collect();
        assert_eq!(names, vec!["sim0", "sim1"]);
    }
}
