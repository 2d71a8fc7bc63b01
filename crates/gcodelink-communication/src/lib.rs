//! # GCodeLink Communication
//!
//! Serial transport and the machine-control facade for GCodeLink.
//! Owns the port, the background receive loop and the paced file stream,
//! and encodes operator jogs into G-code.

pub mod communication;
pub mod controller;
pub mod jog;

pub use communication::{
    mock::{MockPort, MockPortHandle, MockPortOpener},
    receive::{ReceiveLoop, ReceiveLoopState},
    serial::{list_ports, SerialPortInfo, SerialPortOpener},
    stream::{StreamSession, DEFAULT_PACING_INTERVAL},
    transport::{frame_line, TransportConnection, TransportIo, DEFAULT_BAUD_RATE, LINE_TERMINATOR},
    PortOpener, ReadWrite,
};
pub use controller::{ControllerConfig, MachineControl};
pub use jog::{encode, EncodedCommand, JogDirection};
