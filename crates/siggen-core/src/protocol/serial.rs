//! Serial port handling
//!
//! Port enumeration, per-device-family port settings, and opening a
//! configured port for instrument communication.

use serde::{Deserialize, Serialize};
use serialport::{SerialPort, SerialPortInfo, SerialPortType};
use std::collections::HashMap;
#[cfg(target_os = "linux")]
use std::fs;
use std::fmt;

use super::{ProtocolError, PORT_READ_TIMEOUT};

/// Information about an available serial port
#[derive(Debug, Clone)]
pub struct PortInfo {
    /// Port name (e.g., "/dev/ttyUSB0" or "COM3")
    pub name: String,

    /// USB vendor ID (if USB device)
    pub vid: Option<u16>,

    /// USB product ID (if USB device)
    pub pid: Option<u16>,

    /// Manufacturer name (if available)
    pub manufacturer: Option<String>,

    /// Product name (if available)
    pub product: Option<String>,

    /// Serial number (if available)
    pub serial_number: Option<String>,
}

impl From<SerialPortInfo> for PortInfo {
    fn from(info: SerialPortInfo) -> Self {
        let (vid, pid, manufacturer, product, serial_number) = match info.port_type {
            SerialPortType::UsbPort(usb_info) => (
                Some(usb_info.vid),
                Some(usb_info.pid),
                usb_info.manufacturer,
                usb_info.product,
                usb_info.serial_number,
            ),
            _ => (None, None, None, None, None),
        };

        Self {
            name: info.port_name,
            vid,
            pid,
            manufacturer,
            product,
            serial_number,
        }
    }
}

/// Helper used to sort port names so that:
///  - ttyUSB* ports come first (both instrument families ship USB-serial
///    adapters that enumerate there), sorted numerically by suffix
///  - then ttyACM* ports (sorted numerically)
///  - then other ports (sorted by name)
fn port_sort_key(name: &str) -> (u8, usize, String) {
    let basename = name.rsplit('/').next().unwrap_or(name);
    if let Some(rest) = basename.strip_prefix("ttyUSB") {
        let num = rest.parse::<usize>().unwrap_or(usize::MAX);
        return (0, num, basename.to_string());
    }
    if let Some(rest) = basename.strip_prefix("ttyACM") {
        let num = rest.parse::<usize>().unwrap_or(usize::MAX);
        return (1, num, basename.to_string());
    }
    (2, 0, basename.to_string())
}

/// List all available serial ports, with /dev fallbacks and deterministic ordering
pub fn list_ports() -> Vec<PortInfo> {
    // Collect from serialport API
    let mut map: HashMap<String, PortInfo> = HashMap::new();
    for info in serialport::available_ports()
        .unwrap_or_default()
        .into_iter()
    {
        let p = PortInfo::from(info);
        map.entry(p.name.clone()).or_insert(p);
    }

    // Linux-only: add /dev/ttyUSB* and /dev/ttyACM* entries if present but
    // not reported by the API
    #[cfg(target_os = "linux")]
    if let Ok(entries) = fs::read_dir("/dev") {
        for entry in entries.flatten() {
            if let Some(fname) = entry.file_name().to_str() {
                if fname.starts_with("ttyUSB") || fname.starts_with("ttyACM") {
                    let full = format!("/dev/{}", fname);
                    map.entry(full.clone()).or_insert_with(|| PortInfo {
                        name: full,
                        vid: None,
                        pid: None,
                        manufacturer: None,
                        product: None,
                        serial_number: None,
                    });
                }
            }
        }
    }

    let mut v: Vec<PortInfo> = map.into_values().collect();
    v.sort_by_key(|p| port_sort_key(&p.name));
    v
}

/// Parity setting, with the small-integer ids both instrument manuals use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Parity {
    /// 0 - none
    None,
    /// 1 - odd
    Odd,
    /// 2 - even
    Even,
    /// 3 - mark
    Mark,
    /// 4 - space
    Space,
}

impl Parity {
    /// Numeric id as used in configuration records
    pub fn id(self) -> u8 {
        match self {
            Parity::None => 0,
            Parity::Odd => 1,
            Parity::Even => 2,
            Parity::Mark => 3,
            Parity::Space => 4,
        }
    }

    /// One-letter code used in port descriptions ("8N1")
    pub fn short_name(self) -> char {
        match self {
            Parity::None => 'N',
            Parity::Odd => 'O',
            Parity::Even => 'E',
            Parity::Mark => 'M',
            Parity::Space => 'S',
        }
    }

    fn to_serialport(self) -> serialport::Parity {
        match self {
            Parity::None => serialport::Parity::None,
            Parity::Odd => serialport::Parity::Odd,
            Parity::Even => serialport::Parity::Even,
            // The serialport crate has no mark/space parity; neither device
            // family uses them, so fall back to none.
            Parity::Mark | Parity::Space => {
                tracing::warn!(parity = ?self, "parity not supported by backend, using none");
                serialport::Parity::None
            }
        }
    }
}

/// Flow control flag set
///
/// A bitflag record mirroring what the hardware configuration surface
/// exposes. The serialport backend only knows none/hardware/software, so
/// the set collapses to the closest supported mode when opening.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FlowControl(u8);

impl FlowControl {
    /// No flow control
    pub const DISABLED: FlowControl = FlowControl(0);
    /// Request-to-send
    pub const RTS: FlowControl = FlowControl(1);
    /// Clear-to-send
    pub const CTS: FlowControl = FlowControl(1 << 1);
    /// Data-set-ready
    pub const DSR: FlowControl = FlowControl(1 << 2);
    /// Data-terminal-ready
    pub const DTR: FlowControl = FlowControl(1 << 3);
    /// XON/XOFF on the receive side
    pub const XONXOFF_IN: FlowControl = FlowControl(1 << 4);
    /// XON/XOFF on the transmit side
    pub const XONXOFF_OUT: FlowControl = FlowControl(1 << 5);

    /// Check whether all flags in `other` are set
    pub fn contains(self, other: FlowControl) -> bool {
        self.0 & other.0 == other.0
    }

    fn to_serialport(self) -> serialport::FlowControl {
        if self.contains(FlowControl::RTS) || self.contains(FlowControl::CTS) {
            serialport::FlowControl::Hardware
        } else if self.contains(FlowControl::XONXOFF_IN) || self.contains(FlowControl::XONXOFF_OUT)
        {
            serialport::FlowControl::Software
        } else {
            serialport::FlowControl::None
        }
    }
}

impl std::ops::BitOr for FlowControl {
    type Output = FlowControl;

    fn bitor(self, rhs: FlowControl) -> FlowControl {
        FlowControl(self.0 | rhs.0)
    }
}

impl fmt::Display for FlowControl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names = Vec::new();
        for (flag, name) in [
            (FlowControl::RTS, "RTS"),
            (FlowControl::CTS, "CTS"),
            (FlowControl::DSR, "DSR"),
            (FlowControl::DTR, "DTR"),
            (FlowControl::XONXOFF_IN, "XON-XOFF-IN"),
            (FlowControl::XONXOFF_OUT, "XON-XOFF-OUT"),
        ] {
            if self.contains(flag) {
                names.push(name);
            }
        }
        write!(f, "{}", names.join(" "))
    }
}

/// Serial port settings for one device family
///
/// Created once per family at startup; never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortSettings {
    /// Default port name used before the operator picks one
    pub default_port_name: String,
    /// Baud rate
    pub baud_rate: u32,
    /// Data bit count (5-8)
    pub data_bits: u8,
    /// Parity
    pub parity: Parity,
    /// Stop bit count (1-2)
    pub stop_bits: u8,
    /// Flow control flag set
    pub flow_control: FlowControl,
}

impl PortSettings {
    fn data_bits_serialport(&self) -> serialport::DataBits {
        match self.data_bits {
            5 => serialport::DataBits::Five,
            6 => serialport::DataBits::Six,
            7 => serialport::DataBits::Seven,
            _ => serialport::DataBits::Eight,
        }
    }

    fn stop_bits_serialport(&self) -> serialport::StopBits {
        match self.stop_bits {
            2 => serialport::StopBits::Two,
            _ => serialport::StopBits::One,
        }
    }
}

impl fmt::Display for PortSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}{}{}",
            self.baud_rate,
            self.data_bits,
            self.parity.short_name(),
            self.stop_bits
        )?;
        if self.flow_control != FlowControl::DISABLED {
            write!(f, " {}", self.flow_control)?;
        }
        Ok(())
    }
}

/// Open a serial port with the given family settings
///
/// A short read timeout keeps the receive pump responsive; replies are
/// waited for at the transaction layer, not in the port itself.
pub fn open_port(
    name: &str,
    settings: &PortSettings,
) -> Result<Box<dyn SerialPort>, ProtocolError> {
    serialport::new(name, settings.baud_rate)
        .data_bits(settings.data_bits_serialport())
        .parity(settings.parity.to_serialport())
        .stop_bits(settings.stop_bits_serialport())
        .flow_control(settings.flow_control.to_serialport())
        .timeout(PORT_READ_TIMEOUT)
        .open()
        .map_err(|e| ProtocolError::ConnectionFailed(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_list_ports() {
        // This test just ensures the function doesn't panic
        let ports = list_ports();
        for port in &ports {
            println!("Found port: {} - {:?}", port.name, port.product);
        }
    }

    #[test]
    fn test_port_sorting() {
        let names = vec![
            "/dev/ttyUSB1",
            "/dev/ttyACM1",
            "/dev/ttyUSB0",
            "/dev/ttyACM0",
            "/dev/someport",
            "/dev/ttyUSB10",
        ];
        let mut ports: Vec<PortInfo> = names
            .into_iter()
            .map(|n| PortInfo {
                name: n.to_string(),
                vid: None,
                pid: None,
                manufacturer: None,
                product: None,
                serial_number: None,
            })
            .collect();

        ports.sort_by_key(|p| port_sort_key(&p.name));
        let ordered: Vec<String> = ports.into_iter().map(|p| p.name).collect();

        assert_eq!(
            ordered,
            vec![
                "/dev/ttyUSB0",
                "/dev/ttyUSB1",
                "/dev/ttyUSB10",
                "/dev/ttyACM0",
                "/dev/ttyACM1",
                "/dev/someport",
            ]
        );
    }

    #[test]
    fn test_flow_control_display() {
        let fc = FlowControl::RTS | FlowControl::CTS;
        assert_eq!(fc.to_string(), "RTS CTS");
        assert!(fc.contains(FlowControl::RTS));
        assert!(!fc.contains(FlowControl::DTR));
        assert_eq!(FlowControl::DISABLED.to_string(), "");
    }

    #[test]
    fn test_port_settings_display() {
        let settings = PortSettings {
            default_port_name: "ttyUSB0".to_string(),
            baud_rate: 57600,
            data_bits: 8,
            parity: Parity::None,
            stop_bits: 1,
            flow_control: FlowControl::RTS | FlowControl::CTS,
        };
        assert_eq!(settings.to_string(), "57600 8N1 RTS CTS");

        let plain = PortSettings {
            default_port_name: "ttyUSB0".to_string(),
            baud_rate: 115200,
            data_bits: 8,
            parity: Parity::None,
            stop_bits: 1,
            flow_control: FlowControl::DISABLED,
        };
        assert_eq!(plain.to_string(), "115200 8N1");
    }

    #[test]
    fn test_parity_ids() {
        assert_eq!(Parity::None.id(), 0);
        assert_eq!(Parity::Space.id(), 4);
        assert_eq!(Parity::Even.short_name(), 'E');
    }
}
