//! In-memory serial port
//!
//! [`MockPort`] behaves like a serial handle with a short read timeout:
//! reads return scripted bytes or `TimedOut`, writes are recorded. The paired
//! [`MockPortHandle`] stays with the caller to feed input, inspect output and
//! inject faults. [`MockPortOpener`] hands these out by port name, which is
//! what `--simulate` and the facade tests use.

use crate::communication::{PortOpener, ReadWrite, SerialPortInfo};
use gcodelink_core::{ConnectError, Result};
use parking_lot::{Condvar, Mutex};
use std::collections::{BTreeMap, HashSet, VecDeque};
use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// How long an empty read blocks before reporting `TimedOut`
const MOCK_READ_TIMEOUT: Duration = Duration::from_millis(5);

#[derive(Default)]
struct MockState {
    incoming: VecDeque<u8>,
    writes: Vec<String>,
    auto_reply: Option<String>,
    fail_writes: bool,
    fail_reads: bool,
    claimed: bool,
}

#[derive(Default)]
struct MockShared {
    name: String,
    state: Mutex<MockState>,
    written: Condvar,
}

/// Port side of the mock; implements `Read + Write`
pub struct MockPort {
    shared: Arc<MockShared>,
}

impl MockPort {
    /// Create a claimed port and the handle that controls it
    pub fn pair(name: &str) -> (MockPort, MockPortHandle) {
        let handle = MockPortHandle::new(name);
        handle.shared.state.lock().claimed = true;
        let port = MockPort {
            shared: handle.shared.clone(),
        };
        (port, handle)
    }
}

impl io::Read for MockPort {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        {
            let mut state = self.shared.state.lock();
            if state.fail_reads {
                return Err(io::Error::new(
                    io::ErrorKind::BrokenPipe,
                    "device disconnected",
                ));
            }
            if !state.incoming.is_empty() {
                let n = buf.len().min(state.incoming.len());
                for (slot, byte) in buf.iter_mut().zip(state.incoming.drain(..n)) {
                    *slot = byte;
                }
                return Ok(n);
            }
        }

        std::thread::sleep(MOCK_READ_TIMEOUT);
        Err(io::Error::new(io::ErrorKind::TimedOut, "Operation timed out"))
    }
}

impl io::Write for MockPort {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut state = self.shared.state.lock();
        if state.fail_writes {
            return Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "device disconnected",
            ));
        }

        state.writes.push(String::from_utf8_lossy(buf).into_owned());
        if let Some(reply) = state.auto_reply.clone() {
            state.incoming.extend(reply.bytes());
            state.incoming.extend(b"\r\n");
        }
        self.shared.written.notify_all();
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for MockPort {
    fn drop(&mut self) {
        self.shared.state.lock().claimed = false;
    }
}

/// Test side of a [`MockPort`]
#[derive(Clone, Default)]
pub struct MockPortHandle {
    shared: Arc<MockShared>,
}

impl MockPortHandle {
    /// Create an unclaimed port
    pub fn new(name: &str) -> Self {
        Self {
            shared: Arc::new(MockShared {
                name: name.to_string(),
                ..Default::default()
            }),
        }
    }

    /// Port name
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    fn claim(&self) -> Option<MockPort> {
        let mut state = self.shared.state.lock();
        if state.claimed {
            return None;
        }
        state.claimed = true;
        Some(MockPort {
            shared: self.shared.clone(),
        })
    }

    /// Whether a [`MockPort`] for this handle is currently alive
    pub fn is_claimed(&self) -> bool {
        self.shared.state.lock().claimed
    }

    /// Queue raw bytes for the reader
    pub fn push_bytes(&self, bytes: &[u8]) {
        self.shared.state.lock().incoming.extend(bytes);
    }

    /// Queue one CRLF-terminated line for the reader
    pub fn push_line(&self, line: &str) {
        let mut state = self.shared.state.lock();
        state.incoming.extend(line.bytes());
        state.incoming.extend(b"\r\n");
    }

    /// Answer every write with `reply`, the way GRBL answers `ok`
    pub fn set_auto_reply(&self, reply: Option<&str>) {
        self.shared.state.lock().auto_reply = reply.map(str::to_string);
    }

    /// Make every following write fail
    pub fn fail_writes(&self) {
        self.shared.state.lock().fail_writes = true;
    }

    /// Make every following read fail
    pub fn fail_reads(&self) {
        self.shared.state.lock().fail_reads = true;
    }

    /// Raw chunks written so far, terminators included
    pub fn writes(&self) -> Vec<String> {
        self.shared.state.lock().writes.clone()
    }

    /// Written lines with their terminators removed
    pub fn written_lines(&self) -> Vec<String> {
        self.writes()
            .iter()
            .map(|w| w.trim_end_matches(['\r', '\n']).to_string())
            .collect()
    }

    /// Block until at least `count` writes were recorded or `timeout` passes
    ///
    /// Returns whether the count was reached.
    pub fn wait_for_writes(&self, count: usize, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.shared.state.lock();
        while state.writes.len() < count {
            if self
                .shared
                .written
                .wait_until(&mut state, deadline)
                .timed_out()
            {
                return state.writes.len() >= count;
            }
        }
        true
    }
}

#[derive(Default)]
struct OpenerState {
    ports: BTreeMap<String, MockPortHandle>,
    denied: HashSet<String>,
    open_count: usize,
}

/// [`PortOpener`] over a set of named [`MockPortHandle`]s
#[derive(Default)]
pub struct MockPortOpener {
    state: Mutex<OpenerState>,
}

impl MockPortOpener {
    /// Create an opener with no ports
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a port and return its handle
    pub fn add_port(&self, name: &str) -> MockPortHandle {
        let handle = MockPortHandle::new(name);
        self.state
            .lock()
            .ports
            .insert(name.to_string(), handle.clone());
        handle
    }

    /// Make opening `name` fail with a permission error
    pub fn deny(&self, name: &str) {
        self.state.lock().denied.insert(name.to_string());
    }

    /// Handle for a registered port
    pub fn handle(&self, name: &str) -> Option<MockPortHandle> {
        self.state.lock().ports.get(name).cloned()
    }

    /// Number of successful opens so far
    pub fn open_count(&self) -> usize {
        self.state.lock().open_count
    }
}

impl PortOpener for MockPortOpener {
    fn open(
        &self,
        port: &str,
        _baud_rate: u32,
    ) -> std::result::Result<Box<dyn ReadWrite>, ConnectError> {
        let mut state = self.state.lock();
        if state.denied.contains(port) {
            return Err(ConnectError::PermissionDenied {
                port: port.to_string(),
            });
        }

        let handle = state
            .ports
            .get(port)
            .ok_or_else(|| ConnectError::PortUnavailable {
                port: port.to_string(),
                reason: "No such device".to_string(),
            })?;

        let mock = handle.claim().ok_or_else(|| ConnectError::PortUnavailable {
            port: port.to_string(),
            reason: "Device or resource busy".to_string(),
        })?;

        state.open_count += 1;
        Ok(Box::new(mock))
    }

    fn list_ports(&self) -> Result<Vec<SerialPortInfo>> {
        Ok(self
            .state
            .lock()
            .ports
            .keys()
            .map(|name| SerialPortInfo::new(name, "Simulated controller"))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};

    #[test]
    fn mock_port_scripts_reads_and_records_writes() {
        let (mut port, handle) = MockPort::pair("sim");
        handle.push_line("ok");

        let mut buf = [0u8; 16];
        let n = port.read(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"ok\r\n");

        let err = port.read(&mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::TimedOut);

        port.write_all(b"G0 X0\r\n").unwrap();
        assert_eq!(handle.written_lines(), vec!["G0 X0"]);
    }

    #[test]
    fn auto_reply_answers_each_write() {
        let (mut port, handle) = MockPort::pair("sim");
        handle.set_auto_reply(Some("ok"));
        port.write_all(b"$X\r\n").unwrap();

        let mut buf = [0u8; 16];
        let n = port.read(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"ok\r\n");
    }

    #[test]
    fn dropping_port_releases_claim() {
        let (port, handle) = MockPort::pair("sim");
        assert!(handle.is_claimed());
        drop(port);
        assert!(!handle.is_claimed());
    }

    #[test]
    fn opener_reports_missing_busy_and_denied_ports() {
        let opener = MockPortOpener::new();
        opener.add_port("sim0");
        opener.add_port("sim1");
        opener.deny("sim1");

        assert!(matches!(
            opener.open("nope", 115_200),
            Err(ConnectError::PortUnavailable { .. })
        ));
        assert!(matches!(
            opener.open("sim1", 115_200),
            Err(ConnectError::PermissionDenied { .. })
        ));

        let first = opener.open("sim0", 115_200);
        assert!(first.is_ok());
        assert!(matches!(
            opener.open("sim0", 115_200),
            Err(ConnectError::PortUnavailable { .. })
        ));
        assert_eq!(opener.open_count(), 1);

        let names: Vec<String> = opener
            .list_ports()
            .unwrap()
            .into_iter()
            .map(|p| p.port_name)
            .collect();
        assert_eq!(names, vec!["sim0", "sim1"]);
    }

    #[test]
    fn wait_for_writes_times_out() {
        let (_port, handle) = MockPort::pair("sim");
        assert!(!handle.wait_for_writes(1, Duration::from_millis(10)));
    }
}
