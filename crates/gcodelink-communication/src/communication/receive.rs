//! Background receive loop
//!
//! Polls a [`TransportIo`] for lines and publishes each non-empty one as
//! [`ControlEvent::MessageReceived`]. The loop stops on request or on the
//! first transport fault, which it reports as [`ControlEvent::TransportLost`].
//! It never retries.

use crate::communication::transport::TransportIo;
use gcodelink_core::{ControlEvent, Error, EventBus, ReadError, Result};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

/// Lifecycle of a [`ReceiveLoop`]; `Stopped` is terminal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiveLoopState {
    /// Created, not yet started
    Idle,
    /// Thread is polling the transport
    Running,
    /// Thread has exited
    Stopped,
}

/// Reader thread bound to one connection
pub struct ReceiveLoop {
    io: TransportIo,
    events: Arc<EventBus>,
    poll_interval: Duration,
    stop: Arc<AtomicBool>,
    state: Arc<Mutex<ReceiveLoopState>>,
    handle: Option<JoinHandle<()>>,
}

impl ReceiveLoop {
    /// Create an idle loop
    ///
    /// `poll_interval` bounds how long one read waits for a line, and so how
    /// long [`stop`](Self::stop) may take.
    pub fn new(io: TransportIo, events: Arc<EventBus>, poll_interval: Duration) -> Self {
        Self {
            io,
            events,
            poll_interval,
            stop: Arc::new(AtomicBool::new(false)),
            state: Arc::new(Mutex::new(ReceiveLoopState::Idle)),
            handle: None,
        }
    }

    /// Current state
    pub fn state(&self) -> ReceiveLoopState {
        *self.state.lock()
    }

    /// Spawn the reader thread
    pub fn start(&mut self) -> Result<()> {
        {
            let mut state = self.state.lock();
            if *state != ReceiveLoopState::Idle {
                return Err(Error::other(format!(
                    "Receive loop cannot start from {:?}",
                    *state
                )));
            }
            *state = ReceiveLoopState::Running;
        }

        let io = self.io.clone();
        let events = self.events.clone();
        let stop = self.stop.clone();
        let state = self.state.clone();
        let poll_interval = self.poll_interval;

        let spawned = std::thread::Builder::new()
            .name("gcodelink-receive".to_string())
            .spawn(move || {
                run(&io, &events, &stop, poll_interval);
                *state.lock() = ReceiveLoopState::Stopped;
            });

        match spawned {
            Ok(handle) => {
                tracing::debug!("Receive loop started on {}", self.io.port_name());
                self.handle = Some(handle);
                Ok(())
            }
            Err(e) => {
                *self.state.lock() = ReceiveLoopState::Stopped;
                Err(Error::Io(e))
            }
        }
    }

    /// Signal the thread and wait for it to exit
    ///
    /// Safe to call from any thread and more than once. When it returns the
    /// loop no longer touches the transport, so the owner may close it.
    pub fn stop(&mut self) {
        self.stop.store(true, Ordering::Release);

        if let Some(handle) = self.handle.take() {
            if handle.thread().id() == std::thread::current().id() {
                // Called from a handler on the loop thread; it exits on its own.
                return;
            }
            if handle.join().is_err() {
                tracing::warn!("Receive loop thread panicked");
            }
        }

        *self.state.lock() = ReceiveLoopState::Stopped;
    }
}

impl Drop for ReceiveLoop {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run(io: &TransportIo, events: &EventBus, stop: &AtomicBool, poll_interval: Duration) {
    while !stop.load(Ordering::Acquire) {
        match io.read_line(poll_interval) {
            Ok(Some(line)) => {
                if line.is_empty() || stop.load(Ordering::Acquire) {
                    continue;
                }
                events.publish(ControlEvent::MessageReceived(line)).ok();
            }
            Ok(None) => {}
            Err(ReadError::TransportFault { reason }) => {
                if !stop.load(Ordering::Acquire) {
                    tracing::warn!("Receive loop lost {}: {}", io.port_name(), reason);
                    events
                        .publish(ControlEvent::TransportLost {
                            port: io.port_name().to_string(),
                            reason,
                        })
                        .ok();
                }
                break;
            }
        }
    }
    tracing::debug!("Receive loop on {} exited", io.port_name());
}
