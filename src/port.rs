use std::time::Duration;

use serialport::{DataBits, FlowControl, Parity, SerialPortInfo, SerialPortType, StopBits};
use tracing::{debug, info};

use crate::error::{DeviceError, DeviceResult};
use crate::transport::Transport;

/// Substring looked for in the USB product/manufacturer strings.
const DEVICE_HINT: &str = "Arduino";

/// Opens `dev` at 8N1 and splits it into independent read/write handles.
///
/// `read_poll` bounds each blocking read so the reader loop can notice a
/// shutdown between bytes.
pub fn open_port(dev: &str, baud: u32, rtscts: bool, read_poll: Duration) -> DeviceResult<Transport> {
    let builder = serialport::new(dev, baud)
        .timeout(read_poll)
        .data_bits(DataBits::Eight)
        .parity(Parity::None)
        .stop_bits(StopBits::One)
        .flow_control(if rtscts {
            FlowControl::Hardware
        } else {
            FlowControl::None
        });

    let port = builder
        .open()
        .map_err(|e| DeviceError::Connection(format!("open {dev}: {e}")))?;
    let writer = port
        .try_clone()
        .map_err(|e| DeviceError::Connection(format!("clone {dev}: {e}")))?;
    info!(dev, baud, rtscts, "serial port open");
    Ok(Transport::new(port, writer))
}

pub fn list_ports() -> DeviceResult<Vec<SerialPortInfo>> {
    serialport::available_ports().map_err(|e| DeviceError::Connection(format!("list ports: {e}")))
}

/// Last port whose USB descriptor mentions the device hint.
pub fn detect_port() -> DeviceResult<String> {
    let ports = list_ports()?;
    pick_device_port(&ports)
        .ok_or_else(|| DeviceError::Connection(format!("no {DEVICE_HINT} device found")))
}

pub fn describe(info: &SerialPortInfo) -> String {
    match &info.port_type {
        SerialPortType::UsbPort(usb) => format!(
            "usb {:04x}:{:04x} {} {}",
            usb.vid,
            usb.pid,
            usb.manufacturer.as_deref().unwrap_or("-"),
            usb.product.as_deref().unwrap_or("-"),
        ),
        SerialPortType::PciPort => "pci".to_string(),
        SerialPortType::BluetoothPort => "bluetooth".to_string(),
        SerialPortType::Unknown => "unknown".to_string(),
    }
}

fn pick_device_port(ports: &[SerialPortInfo]) -> Option<String> {
    let found = ports
        .iter()
        .filter(|p| match &p.port_type {
            SerialPortType::UsbPort(usb) => [&usb.product, &usb.manufacturer]
                .into_iter()
                .flatten()
                .any(|s| s.contains(DEVICE_HINT)),
            _ => false,
        })
        .next_back()
        .map(|p| p.port_name.clone());
    debug!(?found, candidates = ports.len(), "port detection");
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use serialport::UsbPortInfo;

    fn usb(name: &str, product: Option<&str>, manufacturer: Option<&str>) -> SerialPortInfo {
        SerialPortInfo {
            port_name: name.to_string(),
            port_type: SerialPortType::UsbPort(UsbPortInfo {
                vid: 0x2341,
                pid: 0x8036,
                serial_number: None,
                manufacturer: manufacturer.map(str::to_string),
                product: product.map(str::to_string),
            }),
        }
    }

    #[test]
    fn picks_arduino_by_product_or_manufacturer() {
        let ports = vec![
            SerialPortInfo {
                port_name: "/dev/ttyS0".into(),
                port_type: SerialPortType::Unknown,
            },
            usb("/dev/ttyUSB0", Some("CP2102"), Some("Silicon Labs")),
            usb("/dev/ttyACM0", Some("Arduino Leonardo"), None),
        ];
        assert_eq!(pick_device_port(&ports).as_deref(), Some("/dev/ttyACM0"));

        let ports = vec![usb("COM4", None, Some("Arduino LLC"))];
        assert_eq!(pick_device_port(&ports).as_deref(), Some("COM4"));
    }

    #[test]
    fn no_match_is_none() {
        let ports = vec![usb("/dev/ttyUSB0", Some("FT232R"), Some("FTDI"))];
        assert_eq!(pick_device_port(&ports), None);
        assert_eq!(pick_device_port(&[]), None);
    }

    #[test]
    fn open_missing_port_is_connection_error() {
        let err = open_port("/dev/keymouse-does-not-exist", 115_200, false, Duration::from_millis(10));
        assert!(matches!(err, Err(DeviceError::Connection(_))));
    }
}
