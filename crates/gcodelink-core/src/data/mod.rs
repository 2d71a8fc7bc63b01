//! Shared state enums
//!
//! The connection and stream lifecycles are observed by the facade, the
//! background tasks and the shell, so they live here rather than next to the
//! code that mutates them.

use serde::{Deserialize, Serialize};
use std::fmt;

/// State of the serial transport
///
/// Reads and writes are only attempted while `Open`. A failed I/O operation
/// moves the transport to `Faulted`; `close` always lands in `Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ConnectionState {
    /// No handle is held
    #[default]
    Closed,
    /// Handle is held and usable
    Open,
    /// An I/O operation failed; the handle has been released
    Faulted,
}

impl ConnectionState {
    /// Check if a transition from this state to `target` is valid.
    ///
    /// Returns `true` for valid transitions:
    /// - Closed → Open
    /// - Open → Faulted, Closed
    /// - Faulted → Closed
    pub fn can_transition_to(&self, target: ConnectionState) -> bool {
        use ConnectionState::*;
        if *self == target {
            return true;
        }
        matches!(
            (self, target),
            (Closed, Open) | (Open, Faulted | Closed) | (Faulted, Closed)
        )
    }

    /// Whether I/O may be attempted in this state
    pub fn is_open(&self) -> bool {
        matches!(self, ConnectionState::Open)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closed => write!(f, "Closed"),
            Self::Open => write!(f, "Open"),
            Self::Faulted => write!(f, "Faulted"),
        }
    }
}

/// Lifecycle of a single file stream
///
/// `Completed`, `Cancelled` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum StreamStatus {
    /// Constructed but not started
    #[default]
    Created,
    /// Lines are being sent
    Running,
    /// Every line of the file was sent
    Completed,
    /// Stopped by request before the end of the file
    Cancelled,
    /// The file could not be read or a write failed
    Failed,
}

impl StreamStatus {
    /// Whether the session has reached a final state
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            StreamStatus::Completed | StreamStatus::Cancelled | StreamStatus::Failed
        )
    }
}

impl fmt::Display for StreamStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => write!(f, "Created"),
            Self::Running => write!(f, "Running"),
            Self::Completed => write!(f, "Completed"),
            Self::Cancelled => write!(f, "Cancelled"),
            Self::Failed => write!(f, "Failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_state_transitions() {
        use ConnectionState::*;
        assert!(Closed.can_transition_to(Open));
        assert!(Open.can_transition_to(Faulted));
        assert!(Open.can_transition_to(Closed));
        assert!(Faulted.can_transition_to(Closed));
        assert!(Closed.can_transition_to(Closed));

        assert!(!Faulted.can_transition_to(Open));
        assert!(!Closed.can_transition_to(Faulted));
    }

    #[test]
    fn test_stream_status_terminal() {
        assert!(!StreamStatus::Created.is_terminal());
        assert!(!StreamStatus::Running.is_terminal());
        assert!(StreamStatus::Completed.is_terminal());
        assert!(StreamStatus::Cancelled.is_terminal());
        assert!(StreamStatus::Failed.is_terminal());
    }

    #[test]
    fn test_default_state_is_closed() {
        assert_eq!(ConnectionState::default(), ConnectionState::Closed);
        assert!(!ConnectionState::Faulted.is_open());
        assert_eq!(ConnectionState::Open.to_string(), "Open");
    }

    #[test]
    fn test_default_stream_status_is_created() {
        assert_eq!(StreamStatus::default(), StreamStatus::Created);
    }
}
