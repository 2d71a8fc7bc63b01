//! Paced file streaming
//!
//! A [`StreamSession`] sends an instruction file to the controller one line at
//! a time, waiting a fixed pacing interval after every write. Lines go out
//! exactly as written in the file; only blank lines are skipped and the
//! terminator is normalised by the transport.
//!
//! Outcomes are reported on the event bus, never returned: the session ends
//! in `Completed`, `Cancelled` or `Failed` and publishes the matching event.

use crate::communication::transport::TransportIo;
use gcodelink_core::{ControlEvent, Error, EventBus, FileError, Result, StreamStatus};
use parking_lot::Mutex;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// Default delay after each written line
pub const DEFAULT_PACING_INTERVAL: Duration = Duration::from_millis(500);

/// Longest single sleep while pacing, so a cancel is seen promptly
const PACING_SLICE: Duration = Duration::from_millis(10);

/// Counters and flags shared with the streaming thread
#[derive(Default)]
struct SessionShared {
    cursor: AtomicUsize,
    lines_sent: AtomicUsize,
    cancel: AtomicBool,
    /// Set before the thread is spawned, cleared as it exits
    streaming: AtomicBool,
    status: Mutex<StreamStatus>,
}

impl SessionShared {
    /// Record a terminal status, then publish its event
    fn finish(&self, events: &EventBus, status: StreamStatus, event: ControlEvent) {
        *self.status.lock() = status;
        tracing::info!("{}", event.description());
        events.publish(event).ok();
    }
}

/// Clears `streaming` when the thread exits, panicking or not
struct ExitGuard(Arc<SessionShared>);

impl Drop for ExitGuard {
    fn drop(&mut self) {
        self.0.streaming.store(false, Ordering::Release);
    }
}

/// One file-stream request
///
/// `cancel` and `join` take `&self`, so a session may be shared. Concurrent
/// joiners all wait until the thread has exited.
pub struct StreamSession {
    path: PathBuf,
    pacing: Duration,
    shared: Arc<SessionShared>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl StreamSession {
    /// Create a session for `path`; nothing is opened until [`start`](Self::start)
    pub fn new(path: impl Into<PathBuf>, pacing: Duration) -> Self {
        Self {
            path: path.into(),
            pacing,
            shared: Arc::new(SessionShared::default()),
            handle: Mutex::new(None),
        }
    }

    /// File being streamed
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current status
    pub fn status(&self) -> StreamStatus {
        *self.shared.status.lock()
    }

    /// Whether the streaming thread is still alive
    ///
    /// Stays `true` after a terminal status is recorded, until the thread has
    /// published its last event and exited.
    pub fn is_running(&self) -> bool {
        self.shared.streaming.load(Ordering::Acquire)
    }

    /// 1-based number of the last line read from the file
    pub fn cursor(&self) -> usize {
        self.shared.cursor.load(Ordering::Acquire)
    }

    /// Lines successfully written so far
    pub fn lines_sent(&self) -> usize {
        self.shared.lines_sent.load(Ordering::Acquire)
    }

    /// Open the file and spawn the streaming thread
    ///
    /// A file that cannot be opened moves the session straight to `Failed`
    /// and publishes [`ControlEvent::StreamFailed`]; that is not an error
    /// here. Calling `start` twice is.
    pub fn start(&mut self, io: TransportIo, events: Arc<EventBus>) -> Result<()> {
        {
            let status = self.shared.status.lock();
            if *status != StreamStatus::Created {
                return Err(Error::other(format!(
                    "Stream session cannot start from {}",
                    *status
                )));
            }
        }

        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) => {
                let err = FileError::from_io(&self.path, &e);
                tracing::warn!("Cannot stream {}: {}", self.path.display(), err);
                self.shared.finish(
                    &events,
                    StreamStatus::Failed,
                    ControlEvent::StreamFailed(err.to_string()),
                );
                return Ok(());
            }
        };

        *self.shared.status.lock() = StreamStatus::Running;
        tracing::info!(
            "Streaming {} to {}",
            self.path.display(),
            io.port_name()
        );

        self.shared.streaming.store(true, Ordering::Release);
        let exit = ExitGuard(self.shared.clone());
        let pacing = self.pacing;
        let spawned = std::thread::Builder::new()
            .name("gcodelink-stream".to_string())
            .spawn(move || {
                let exit = exit;
                run(BufReader::new(file), &io, &events, &exit.0, pacing);
            });

        match spawned {
            Ok(handle) => {
                *self.handle.get_mut() = Some(handle);
                Ok(())
            }
            Err(e) => {
                *self.shared.status.lock() = StreamStatus::Failed;
                Err(Error::Io(e))
            }
        }
    }

    /// Ask the thread to stop before its next write
    pub fn cancel(&self) {
        self.shared.cancel.store(true, Ordering::Release);
    }

    /// Wait for the thread to exit and return the final status
    ///
    /// The handle lock is held for the whole join, so a second caller returns
    /// only after the first one's join has finished.
    pub fn join(&self) -> StreamStatus {
        let mut handle = self.handle.lock();
        let own_thread = handle
            .as_ref()
            .is_some_and(|h| h.thread().id() == std::thread::current().id());
        if own_thread {
            return self.status();
        }
        if let Some(handle) = handle.take() {
            if handle.join().is_err() {
                tracing::warn!("Stream thread panicked");
                *self.shared.status.lock() = StreamStatus::Failed;
            }
        }
        self.status()
    }
}

impl Drop for StreamSession {
    fn drop(&mut self) {
        self.cancel();
        self.join();
    }
}

impl std::fmt::Debug for StreamSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamSession")
            .field("path", &self.path)
            .field("status", &self.status())
            .field("lines_sent", &self.lines_sent())
            .finish()
    }
}

fn run<R: BufRead>(
    reader: R,
    io: &TransportIo,
    events: &EventBus,
    shared: &SessionShared,
    pacing: Duration,
) {
    for (index, line) in reader.lines().enumerate() {
        let line_number = index + 1;
        shared.cursor.store(line_number, Ordering::Release);

        let line = match line {
            Ok(line) => line,
            Err(e) => {
                shared.finish(
                    events,
                    StreamStatus::Failed,
                    ControlEvent::StreamFailed(format!("line {}: {}", line_number, e)),
                );
                return;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        if shared.cancel.load(Ordering::Acquire) {
            let lines_sent = shared.lines_sent.load(Ordering::Acquire);
            shared.finish(
                events,
                StreamStatus::Cancelled,
                ControlEvent::StreamCancelled { lines_sent },
            );
            return;
        }

        if let Err(e) = io.write(&line) {
            shared.finish(
                events,
                StreamStatus::Failed,
                ControlEvent::StreamFailed(format!("line {}: {}", line_number, e)),
            );
            return;
        }

        let lines_sent = shared.lines_sent.fetch_add(1, Ordering::AcqRel) + 1;
        events
            .publish(ControlEvent::StreamProgress {
                line_number,
                lines_sent,
            })
            .ok();

        pace(pacing, &shared.cancel);
    }

    let lines_sent = shared.lines_sent.load(Ordering::Acquire);
    shared.finish(
        events,
        StreamStatus::Completed,
        ControlEvent::StreamCompleted { lines_sent },
    );
}

/// Sleep for `interval`, returning early once `cancel` is set
fn pace(interval: Duration, cancel: &AtomicBool) {
    let deadline = Instant::now() + interval;
    loop {
        if cancel.load(Ordering::Acquire) {
            return;
        }
        let now = Instant::now();
        if now >= deadline {
            return;
        }
        std::thread::sleep((deadline - now).min(PACING_SLICE));
    }
}
