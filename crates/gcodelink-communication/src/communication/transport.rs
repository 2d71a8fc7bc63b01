//! Line-oriented serial transport
//!
//! [`TransportConnection`] owns the port handle and is the single source of
//! truth for whether the port is usable. Background tasks get a
//! [`TransportIo`], which can read and write but never close or replace the
//! handle.
//!
//! Every state transition happens under one mutex, so a `close` racing an
//! in-flight read or write either waits for it or makes it fail cleanly.

use crate::communication::{PortOpener, ReadWrite};
use gcodelink_core::{ConnectError, ConnectionState, ReadError, WriteError};
use parking_lot::Mutex;
use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Default serial bit rate
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Line terminator appended to every outgoing line
pub const LINE_TERMINATOR: &str = "\r\n";

/// Bytes pulled from the port per read call
const READ_CHUNK_SIZE: usize = 256;

/// Back-off when the port reports no data without blocking
const IDLE_BACKOFF: Duration = Duration::from_millis(1);

struct TransportInner {
    state: ConnectionState,
    handle: Option<Box<dyn ReadWrite>>,
    /// Received bytes not yet terminated by `\n`
    pending: Vec<u8>,
}

impl TransportInner {
    fn opened(handle: Box<dyn ReadWrite>) -> Self {
        let mut inner = Self {
            state: ConnectionState::Closed,
            handle: None,
            pending: Vec::new(),
        };
        inner.transition(ConnectionState::Open);
        inner.handle = Some(handle);
        inner
    }

    fn transition(&mut self, next: ConnectionState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "invalid transport transition {} -> {}",
            self.state,
            next
        );
        self.state = next;
    }

    /// Release the handle after an I/O error
    fn fault(&mut self, port: &str, err: &io::Error) {
        tracing::warn!("Transport fault on {}: {}", port, err);
        self.handle = None;
        self.pending.clear();
        self.transition(ConnectionState::Faulted);
    }

    fn take_line(&mut self) -> Option<String> {
        let pos = self.pending.iter().position(|&b| b == b'\n')?;
        let raw: Vec<u8> = self.pending.drain(..=pos).collect();
        Some(String::from_utf8_lossy(&raw).trim_end().to_string())
    }
}

struct TransportShared {
    port_name: String,
    baud_rate: u32,
    inner: Mutex<TransportInner>,
}

impl TransportShared {
    fn state(&self) -> ConnectionState {
        self.inner.lock().state
    }

    fn write(&self, line: &str) -> Result<(), WriteError> {
        let mut inner = self.inner.lock();
        if !inner.state.is_open() {
            return Err(WriteError::NotOpen);
        }
        let Some(handle) = inner.handle.as_mut() else {
            return Err(WriteError::NotOpen);
        };

        let framed = frame_line(line);
        let result = handle
            .write_all(framed.as_bytes())
            .and_then(|_| handle.flush());

        match result {
            Ok(()) => {
                tracing::debug!(">> {}", framed.trim_end());
                Ok(())
            }
            Err(e) => {
                inner.fault(&self.port_name, &e);
                Err(WriteError::TransportFault {
                    reason: e.to_string(),
                })
            }
        }
    }

    fn read_line(&self, timeout: Duration) -> Result<Option<String>, ReadError> {
        let deadline = Instant::now() + timeout;
        let mut buf = [0u8; READ_CHUNK_SIZE];

        loop {
            let idle = {
                let mut inner = self.inner.lock();
                if let Some(line) = inner.take_line() {
                    return Ok(Some(line));
                }
                if !inner.state.is_open() {
                    return Err(ReadError::TransportFault {
                        reason: format!("connection is {}", inner.state),
                    });
                }
                let Some(handle) = inner.handle.as_mut() else {
                    return Err(ReadError::TransportFault {
                        reason: "port handle released".to_string(),
                    });
                };

                match handle.read(&mut buf) {
                    Ok(0) => true,
                    Ok(n) => {
                        inner.pending.extend_from_slice(&buf[..n]);
                        if let Some(line) = inner.take_line() {
                            tracing::debug!("<< {}", line);
                            return Ok(Some(line));
                        }
                        false
                    }
                    Err(e) if is_idle_error(&e) => true,
                    Err(e) => {
                        inner.fault(&self.port_name, &e);
                        return Err(ReadError::TransportFault {
                            reason: e.to_string(),
                        });
                    }
                }
            };

            if Instant::now() >= deadline {
                return Ok(None);
            }
            if idle {
                std::thread::sleep(IDLE_BACKOFF);
            }
        }
    }

    fn close(&self) {
        let mut inner = self.inner.lock();
        if inner.handle.take().is_some() {
            tracing::info!("Closed {}", self.port_name);
        }
        inner.pending.clear();
        inner.transition(ConnectionState::Closed);
    }
}

/// Errors that only mean "nothing arrived within the port timeout"
fn is_idle_error(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
    )
}

/// Terminate `line` with exactly one CRLF
///
/// Any trailing CR/LF the caller supplied is replaced, so a line already
/// ending in `\r\n` goes out unchanged.
pub fn frame_line(line: &str) -> String {
    let body = line.trim_end_matches(['\r', '\n']);
    let mut framed = String::with_capacity(body.len() + LINE_TERMINATOR.len());
    framed.push_str(body);
    framed.push_str(LINE_TERMINATOR);
    framed
}

/// Owned serial connection
///
/// Created by [`TransportConnection::open`], released by [`close`](Self::close)
/// or by an I/O fault. Only the owner can close it.
pub struct TransportConnection {
    shared: Arc<TransportShared>,
}

impl TransportConnection {
    /// Open `port` through `opener`
    pub fn open(
        opener: &dyn PortOpener,
        port: &str,
        baud_rate: u32,
    ) -> Result<Self, ConnectError> {
        let handle = opener.open(port, baud_rate)?;
        tracing::info!("Opened {} at {} baud", port, baud_rate);
        Ok(Self::from_handle(port, baud_rate, handle))
    }

    /// Wrap an already open handle
    pub fn from_handle(port: &str, baud_rate: u32, handle: Box<dyn ReadWrite>) -> Self {
        Self {
            shared: Arc::new(TransportShared {
                port_name: port.to_string(),
                baud_rate,
                inner: Mutex::new(TransportInner::opened(handle)),
            }),
        }
    }

    /// Port this connection was opened on
    pub fn port_name(&self) -> &str {
        &self.shared.port_name
    }

    /// Baud rate this connection was opened with
    pub fn baud_rate(&self) -> u32 {
        self.shared.baud_rate
    }

    /// Current state
    pub fn state(&self) -> ConnectionState {
        self.shared.state()
    }

    /// Write one line, appending `\r\n`
    ///
    /// Fails with [`WriteError::NotOpen`] unless the state is `Open`. A failed
    /// write moves the connection to `Faulted` and is never retried.
    pub fn write(&self, line: &str) -> Result<(), WriteError> {
        self.shared.write(line)
    }

    /// Poll for one complete line
    ///
    /// Returns `Ok(None)` if no full line is buffered before `timeout`
    /// elapses, `Ok(Some(line))` with trailing whitespace stripped once one
    /// arrives. A port error, or a connection that is no longer open, yields
    /// [`ReadError::TransportFault`].
    pub fn read_line(&self, timeout: Duration) -> Result<Option<String>, ReadError> {
        self.shared.read_line(timeout)
    }

    /// Release the handle; idempotent
    pub fn close(&self) {
        self.shared.close()
    }

    /// Handle for background tasks
    pub fn io(&self) -> TransportIo {
        TransportIo {
            shared: self.shared.clone(),
        }
    }
}

impl Drop for TransportConnection {
    fn drop(&mut self) {
        self.shared.close();
    }
}

impl std::fmt::Debug for TransportConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportConnection")
            .field("port", &self.shared.port_name)
            .field("baud_rate", &self.shared.baud_rate)
            .field("state", &self.state())
            .finish()
    }
}

/// Read/write view of a [`TransportConnection`]
///
/// Held by the receive loop and the stream session. Cannot close the port.
#[derive(Clone)]
pub struct TransportIo {
    shared: Arc<TransportShared>,
}

impl TransportIo {
    /// Port the underlying connection was opened on
    pub fn port_name(&self) -> &str {
        &self.shared.port_name
    }

    /// Current state of the underlying connection
    pub fn state(&self) -> ConnectionState {
        self.shared.state()
    }

    /// See [`TransportConnection::write`]
    pub fn write(&self, line: &str) -> Result<(), WriteError> {
        self.shared.write(line)
    }

    /// See [`TransportConnection::read_line`]
    pub fn read_line(&self, timeout: Duration) -> Result<Option<String>, ReadError> {
        self.shared.read_line(timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::communication::mock::MockPort;

    fn open_mock() -> (TransportConnection, crate::communication::mock::MockPortHandle) {
        let (port, handle) = MockPort::pair("mock0");
        (
            TransportConnection::from_handle("mock0", DEFAULT_BAUD_RATE, Box::new(port)),
            handle,
        )
    }

    #[test]
    fn test_frame_line() {
        assert_eq!(frame_line("G0 X0"), "G0 X0\r\n");
        assert_eq!(frame_line("G0 X0\r\n"), "G0 X0\r\n");
        assert_eq!(frame_line("G0 X0\n"), "G0 X0\r\n");
        assert_eq!(frame_line(""), "\r\n");
    }

    #[test]
    fn test_write_appends_terminator() {
        let (conn, port) = open_mock();
        conn.write("G21G91G1X2F100").unwrap();
        conn.write("$H\r\n").unwrap();
        assert_eq!(port.writes(), vec!["G21G91G1X2F100\r\n", "$H\r\n"]);
    }

    #[test]
    fn test_read_line_assembles_partial_chunks() {
        let (conn, port) = open_mock();
        port.push_bytes(b"o");
        assert_eq!(conn.read_line(Duration::from_millis(20)).unwrap(), None);

        port.push_bytes(b"k\r\nerror:2\r\n");
        assert_eq!(
            conn.read_line(Duration::from_millis(20)).unwrap(),
            Some("ok".to_string())
        );
        assert_eq!(
            conn.read_line(Duration::ZERO).unwrap(),
            Some("error:2".to_string())
        );
    }

    #[test]
    fn test_read_line_strips_trailing_whitespace_only() {
        let (conn, port) = open_mock();
        port.push_line("  <Idle|MPos:0.000,0.000,0.000>   ");
        assert_eq!(
            conn.read_line(Duration::from_millis(20)).unwrap(),
            Some("  <Idle|MPos:0.000,0.000,0.000>".to_string())
        );
    }

    #[test]
    fn test_write_fault_moves_to_faulted() {
        let (conn, port) = open_mock();
        port.fail_writes();

        assert!(matches!(
            conn.write("G0 X1"),
            Err(WriteError::TransportFault { .. })
        ));
        assert_eq!(conn.state(), ConnectionState::Faulted);
        assert!(!port.is_claimed());

        assert_eq!(conn.write("G0 X2"), Err(WriteError::NotOpen));
        assert!(conn.read_line(Duration::ZERO).is_err());
    }

    #[test]
    fn test_read_fault_moves_to_faulted() {
        let (conn, port) = open_mock();
        port.fail_reads();

        assert!(matches!(
            conn.read_line(Duration::from_millis(20)),
            Err(ReadError::TransportFault { .. })
        ));
        assert_eq!(conn.state(), ConnectionState::Faulted);
        assert_eq!(conn.write("G0 X2"), Err(WriteError::NotOpen));
    }

    #[test]
    fn test_close_is_idempotent() {
        let (conn, port) = open_mock();
        conn.close();
        assert_eq!(conn.state(), ConnectionState::Closed);
        assert!(!port.is_claimed());

        conn.close();
        assert_eq!(conn.state(), ConnectionState::Closed);
    }

    #[test]
    fn test_close_after_fault_lands_in_closed() {
        let (conn, port) = open_mock();
        port.fail_writes();
        conn.write("G0").ok();
        conn.close();
        assert_eq!(conn.state(), ConnectionState::Closed);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "invalid transport transition Faulted -> Open")]
    fn test_faulted_transport_cannot_reopen() {
        let (port, _handle) = MockPort::pair("mock0");
        let mut inner = TransportInner::opened(Box::new(port));
        inner.fault("mock0", &io::Error::from(io::ErrorKind::BrokenPipe));
        inner.transition(ConnectionState::Open);
    }

    #[test]
    fn test_io_handle_sees_close() {
        let (conn, _port) = open_mock();
        let io = conn.io();
        assert_eq!(io.port_name(), "mock0");
        conn.close();
        assert_eq!(io.state(), ConnectionState::Closed);
        assert_eq!(io.write("G0"), Err(WriteError::NotOpen));
        assert!(matches!(
            io.read_line(Duration::ZERO),
            Err(ReadError::TransportFault { .. })
        ));
    }
}
