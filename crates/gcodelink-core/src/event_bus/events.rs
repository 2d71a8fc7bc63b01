//! Event type definitions for the event bus.
//!
//! Background tasks only ever publish these; they never call into the shell.
//! Events are cloneable and serializable for logging/replay.

use serde::{Deserialize, Serialize};

/// Events published by the machine-control core
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ControlEvent {
    /// A non-empty line arrived from the controller
    MessageReceived(String),
    /// The receive loop observed a transport fault and stopped
    TransportLost {
        /// Serial port that faulted.
        port: String,
        /// Error message describing the fault.
        reason: String,
    },
    /// One line of a stream was written
    StreamProgress {
        /// 1-based line number in the source file.
        line_number: usize,
        /// Lines written so far in this session.
        lines_sent: usize,
    },
    /// Every line of the file was sent
    StreamCompleted {
        /// Lines written in this session.
        lines_sent: usize,
    },
    /// The stream stopped because it was cancelled
    StreamCancelled {
        /// Lines written before the cancel was observed.
        lines_sent: usize,
    },
    /// The stream stopped because of an error
    StreamFailed(String),
}

impl ControlEvent {
    /// Get the category of this event
    pub fn category(&self) -> EventCategory {
        match self {
            ControlEvent::MessageReceived(_) => EventCategory::Console,
            ControlEvent::TransportLost { .. } => EventCategory::Connection,
            ControlEvent::StreamProgress { .. }
            | ControlEvent::StreamCompleted { .. }
            | ControlEvent::StreamCancelled { .. }
            | ControlEvent::StreamFailed(_) => EventCategory::Stream,
        }
    }

    /// Get a short description of this event for logging
    pub fn description(&self) -> String {
        match self {
            ControlEvent::MessageReceived(line) => format!("Received: {}", line),
            ControlEvent::TransportLost { port, reason } => {
                format!("Lost connection to {}: {}", port, reason)
            }
            ControlEvent::StreamProgress {
                line_number,
                lines_sent,
            } => format!("Sent line {} ({} total)", line_number, lines_sent),
            ControlEvent::StreamCompleted { lines_sent } => {
                format!("Stream completed, {} lines sent", lines_sent)
            }
            ControlEvent::StreamCancelled { lines_sent } => {
                format!("Stream cancelled after {} lines", lines_sent)
            }
            ControlEvent::StreamFailed(reason) => format!("Stream failed: {}", reason),
        }
    }

    /// Whether this event ends a stream session
    pub fn is_stream_end(&self) -> bool {
        matches!(
            self,
            ControlEvent::StreamCompleted { .. }
                | ControlEvent::StreamCancelled { .. }
                | ControlEvent::StreamFailed(_)
        )
    }
}

impl std::fmt::Display for ControlEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.description())
    }
}

/// Event category for filtering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventCategory {
    /// Lines received from the controller.
    Console,
    /// Transport lifecycle events.
    Connection,
    /// File stream events.
    Stream,
}

impl std::fmt::Display for EventCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventCategory::Console => write!(f, "Console"),
            EventCategory::Connection => write!(f, "Connection"),
            EventCategory::Stream => write!(f, "Stream"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categories() {
        assert_eq!(
            ControlEvent::MessageReceived("ok".into()).category(),
            EventCategory::Console
        );
        assert_eq!(
            ControlEvent::TransportLost {
                port: "COM3".into(),
                reason: "gone".into()
            }
            .category(),
            EventCategory::Connection
        );
        assert_eq!(
            ControlEvent::StreamFailed("x".into()).category(),
            EventCategory::Stream
        );
    }

    #[test]
    fn test_stream_end() {
        assert!(ControlEvent::StreamCompleted { lines_sent: 3 }.is_stream_end());
        assert!(ControlEvent::StreamCancelled { lines_sent: 1 }.is_stream_end());
        assert!(ControlEvent::StreamFailed("x".into()).is_stream_end());
        assert!(!ControlEvent::StreamProgress {
            line_number: 1,
            lines_sent: 1
        }
        .is_stream_end());
    }

    #[test]
    fn test_serialization() {
        let event = ControlEvent::StreamProgress {
            line_number: 4,
            lines_sent: 2,
        };
        let json = serde_json::to_string(&event).expect("serialize");
        let back: ControlEvent = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, event);
        assert_eq!(event.to_string(), "Sent line 4 (2 total)");
    }
}
