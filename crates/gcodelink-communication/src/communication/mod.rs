//! Communication layer
//!
//! Everything between the facade and the bytes on the wire:
//! - [`serial`]: port enumeration and the real `serialport` opener
//! - [`transport`]: the owned connection and its read/write handle
//! - [`receive`]: the background loop that turns bytes into console events
//! - [`stream`]: the background session that paces a file onto the wire
//! - [`mock`]: an in-memory port for simulation and tests

pub mod mock;
pub mod receive;
pub mod serial;
pub mod stream;
pub mod transport;

use gcodelink_core::{ConnectError, Result};

pub use serial::SerialPortInfo;

/// Trait for serial port I/O operations
pub trait ReadWrite: std::io::Read + std::io::Write + Send {}
impl<T: std::io::Read + std::io::Write + Send> ReadWrite for T {}

/// Source of port handles
///
/// The facade opens every connection through one of these so the same code
/// drives real hardware and the in-memory [`mock::MockPortOpener`].
pub trait PortOpener: Send + Sync {
    /// Open `port` at `baud_rate`
    fn open(
        &self,
        port: &str,
        baud_rate: u32,
    ) -> std::result::Result<Box<dyn ReadWrite>, ConnectError>;

    /// List the ports this opener can reach
    fn list_ports(&self) -> Result<Vec<SerialPortInfo>>;
}
