//! Serial port communication implementation
//!
//! Provides low-level serial port operations for direct hardware connection
//! to CNC and laser controllers via USB or RS-232.
//!
//! Supports:
//! - Port enumeration and discovery
//! - Baud rate configuration
//! - Short read timeouts so the receive loop can poll

use crate::communication::{PortOpener, ReadWrite};
use gcodelink_core::{ConnectError, Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Information about an available serial port
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerialPortInfo {
    /// Port name (e.g., "/dev/ttyUSB0", "COM3"); this is the id passed to `connect`
    pub port_name: String,

    /// Port description (e.g., "USB Serial Port")
    pub description: String,

    /// Hardware id (e.g., "USB VID:PID=1A86:7523 SER=0001"), empty when unknown
    pub hardware_id: String,

    /// Manufacturer name if available
    pub manufacturer: Option<String>,

    /// Serial number if available
    pub serial_number: Option<String>,

    /// USB vendor ID if applicable
    pub vid: Option<u16>,

    /// USB product ID if applicable
    pub pid: Option<u16>,
}

impl SerialPortInfo {
    /// Create a new port info
    pub fn new(port_name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            port_name: port_name.into(),
            description: description.into(),
            hardware_id: String::new(),
            manufacturer: None,
            serial_number: None,
            vid: None,
            pid: None,
        }
    }

    /// Set manufacturer
    pub fn with_manufacturer(mut self, manufacturer: impl Into<String>) -> Self {
        self.manufacturer = Some(manufacturer.into());
        self
    }

    /// Set serial number
    pub fn with_serial_number(mut self, serial_number: impl Into<String>) -> Self {
        self.serial_number = Some(serial_number.into());
        self
    }

    /// Set USB IDs
    pub fn with_usb_ids(mut self, vid: u16, pid: u16) -> Self {
        self.vid = Some(vid);
        self.pid = Some(pid);
        self
    }

    /// Set the hardware id string
    pub fn with_hardware_id(mut self, hardware_id: impl Into<String>) -> Self {
        self.hardware_id = hardware_id.into();
        self
    }

    /// Whether this port sits on a USB bus
    pub fn is_usb(&self) -> bool {
        self.vid.is_some()
    }
}

/// List available serial ports on the system
///
/// Read-only query of the host's serial devices. USB ports come first,
/// then everything else, each group sorted by name.
pub fn list_ports() -> Result<Vec<SerialPortInfo>> {
    match serialport::available_ports() {
        Ok(ports) => {
            let mut port_infos: Vec<SerialPortInfo> = ports.iter().map(to_port_info).collect();
            port_infos.sort_by(|a, b| {
                b.is_usb()
                    .cmp(&a.is_usb())
                    .then_with(|| a.port_name.cmp(&b.port_name))
            });
            Ok(port_infos)
        }
        Err(e) => {
            tracing::error!("Failed to enumerate serial ports: {}", e);
            Err(Error::other(format!("Failed to enumerate ports: {}", e)))
        }
    }
}

fn to_port_info(port: &serialport::SerialPortInfo) -> SerialPortInfo {
    let info = SerialPortInfo::new(&port.port_name, get_port_description(port));

    match &port.port_type {
        serialport::SerialPortType::UsbPort(usb_info) => {
            let mut hardware_id = format!("USB VID:PID={:04X}:{:04X}", usb_info.vid, usb_info.pid);
            if let Some(ref serial) = usb_info.serial_number {
                hardware_id.push_str(&format!(" SER={}", serial));
            }

            let mut info = info
                .with_usb_ids(usb_info.vid, usb_info.pid)
                .with_hardware_id(hardware_id);
            if let Some(ref mfg) = usb_info.manufacturer {
                info = info.with_manufacturer(mfg);
            }
            if let Some(ref serial) = usb_info.serial_number {
                info = info.with_serial_number(serial);
            }
            info
        }
        serialport::SerialPortType::PciPort => info.with_hardware_id("PCI"),
        _ => info,
    }
}

/// Get a user-friendly description for a port
fn get_port_description(port: &serialport::SerialPortInfo) -> String {
    match &port.port_type {
        serialport::SerialPortType::UsbPort(usb_info) => {
            format!(
                "USB {} {}",
                usb_info.manufacturer.as_deref().unwrap_or("Device"),
                usb_info.product.as_deref().unwrap_or("Serial Port")
            )
        }
        serialport::SerialPortType::BluetoothPort => "Bluetooth Serial".to_string(),
        serialport::SerialPortType::PciPort => "PCI Serial".to_string(),
        _ => "Serial Port".to_string(),
    }
}

/// Map a `serialport` open failure onto the connect taxonomy
pub(crate) fn classify_open_error(port: &str, err: &serialport::Error) -> ConnectError {
    match err.kind() {
        serialport::ErrorKind::Io(std::io::ErrorKind::PermissionDenied) => {
            ConnectError::PermissionDenied {
                port: port.to_string(),
            }
        }
        _ => ConnectError::PortUnavailable {
            port: port.to_string(),
            reason: err.description.clone(),
        },
    }
}

/// Opens real serial ports through the `serialport` crate
///
/// Ports are opened 8N1 without flow control. On Unix the handle is
/// exclusive, so a port claimed by another process reports
/// [`ConnectError::PortUnavailable`].
#[derive(Debug, Clone)]
pub struct SerialPortOpener {
    read_timeout: Duration,
}

impl SerialPortOpener {
    /// Create an opener whose ports block at most `read_timeout` per read
    pub fn new(read_timeout: Duration) -> Self {
        Self { read_timeout }
    }
}

impl Default for SerialPortOpener {
    fn default() -> Self {
        Self::new(Duration::from_millis(50))
    }
}

impl PortOpener for SerialPortOpener {
    fn open(
        &self,
        port: &str,
        baud_rate: u32,
    ) -> std::result::Result<Box<dyn ReadWrite>, ConnectError> {
        let builder = serialport::new(port, baud_rate)
            .timeout(self.read_timeout)
            .data_bits(serialport::DataBits::Eight)
            .stop_bits(serialport::StopBits::One)
            .parity(serialport::Parity::None)
            .flow_control(serialport::FlowControl::None);

        match builder.open_native() {
            Ok(native) => Ok(Box::new(native)),
            Err(e) => {
                tracing::warn!("Failed to open serial port {}: {}", port, e);
                Err(classify_open_error(port, &e))
            }
        }
    }

    fn list_ports(&self) -> Result<Vec<SerialPortInfo>> {
        list_ports()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permission_denied_classification() {
        let err = serialport::Error::new(
            serialport::ErrorKind::Io(std::io::ErrorKind::PermissionDenied),
            "Permission denied",
        );
        assert_eq!(
            classify_open_error("/dev/ttyACM0", &err),
            ConnectError::PermissionDenied {
                port: "/dev/ttyACM0".to_string()
            }
        );
    }

    #[test]
    fn test_missing_device_classification() {
        let err = serialport::Error::new(serialport::ErrorKind::NoDevice, "No such device");
        match classify_open_error("/dev/ttyUSB9", &err) {
            ConnectError::PortUnavailable { port, reason } => {
                assert_eq!(port, "/dev/ttyUSB9");
                assert_eq!(reason, "No such device");
            }
            other => panic!("unexpected classification: {:?}", other),
        }
    }

    #[test]
    fn test_port_info_builders() {
        let info = SerialPortInfo::new("/dev/ttyUSB0", "USB CH340")
            .with_usb_ids(0x1A86, 0x7523)
            .with_manufacturer("QinHeng")
            .with_hardware_id("USB VID:PID=1A86:7523");
        assert!(info.is_usb());
        assert_eq!(info.manufacturer.as_deref(), Some("QinHeng"));
        assert_eq!(info.hardware_id, "USB VID:PID=1A86:7523");
        assert!(!SerialPortInfo::new("/dev/ttyS0", "Serial Port").is_usb());
    }
}
