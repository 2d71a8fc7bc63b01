//! Error handling for GCodeLink
//!
//! Provides error types for each layer of the machine-control core:
//! - Connect errors (opening a serial port)
//! - Write errors (sending a line to the controller)
//! - Read errors (polling the controller for a line)
//! - File errors (opening or reading an instruction file)
//!
//! All error types use `thiserror` for ergonomic error handling. A line that
//! fails the motion grammar is never an error; the parser drops it.

use std::path::PathBuf;
use thiserror::Error;

/// Error raised while opening a connection
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectError {
    /// Port does not exist or is claimed by another process
    #[error("Port {port} unavailable: {reason}")]
    PortUnavailable {
        /// The name of the port.
        port: String,
        /// What the operating system reported.
        reason: String,
    },

    /// The current user may not open the port
    #[error("Permission denied opening {port}")]
    PermissionDenied {
        /// The name of the port.
        port: String,
    },

    /// A connection is already open
    #[error("Already connected to {port}")]
    AlreadyConnected {
        /// The port of the existing connection.
        port: String,
    },
}

/// Error raised while writing a line
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WriteError {
    /// The transport is closed or faulted
    #[error("Connection is not open")]
    NotOpen,

    /// The underlying write failed; the transport is now faulted
    #[error("Transport fault while writing: {reason}")]
    TransportFault {
        /// The reason reported by the port.
        reason: String,
    },
}

/// Error raised while reading a line
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReadError {
    /// The port errored or was closed underneath the reader
    #[error("Transport fault while reading: {reason}")]
    TransportFault {
        /// The reason reported by the port.
        reason: String,
    },
}

/// Error raised while opening or reading an instruction file
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FileError {
    /// The file does not exist
    #[error("File not found: {}", path.display())]
    NotFound {
        /// The path that was requested.
        path: PathBuf,
    },

    /// Any other I/O failure
    #[error("I/O error on {}: {reason}", path.display())]
    Io {
        /// The path that was requested.
        path: PathBuf,
        /// The underlying error message.
        reason: String,
    },
}

impl FileError {
    /// Classify an I/O error raised for `path`
    pub fn from_io(path: impl Into<PathBuf>, err: &std::io::Error) -> Self {
        let path = path.into();
        if err.kind() == std::io::ErrorKind::NotFound {
            FileError::NotFound { path }
        } else {
            FileError::Io {
                path,
                reason: err.to_string(),
            }
        }
    }
}

/// Main error type for GCodeLink
///
/// A unified error type that can represent any error from all layers.
/// This is the primary error type used by the facade.
#[derive(Error, Debug)]
pub enum Error {
    /// Connect error
    #[error(transparent)]
    Connect(#[from] ConnectError),

    /// Write error
    #[error(transparent)]
    Write(#[from] WriteError),

    /// Read error
    #[error(transparent)]
    Read(#[from] ReadError),

    /// File error
    #[error(transparent)]
    File(#[from] FileError),

    /// A jog code outside the known table
    #[error("Unknown jog direction code {code}")]
    UnknownJogCode {
        /// The code supplied by the caller.
        code: u32,
    },

    /// A file stream is running and owns the write side
    #[error("A file stream is already running")]
    StreamInProgress,

    /// Standard I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an error from a string message
    pub fn other(msg: impl Into<String>) -> Self {
        Error::Other(msg.into())
    }

    /// Check if this is a connect error
    pub fn is_connect_error(&self) -> bool {
        matches!(self, Error::Connect(_))
    }

    /// Check if this error means the transport can no longer be used
    pub fn is_transport_fault(&self) -> bool {
        matches!(
            self,
            Error::Write(WriteError::TransportFault { .. })
                | Error::Read(ReadError::TransportFault { .. })
        )
    }

    /// Check if this is a file error
    pub fn is_file_error(&self) -> bool {
        matches!(self, Error::File(_))
    }
}

/// Result type using Error
pub type Result<T> = std::result::Result<T, Error>;
