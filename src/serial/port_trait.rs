//! Trait abstraction for serial port access to enable testing

use std::io;
use std::time::Duration;

use tokio::io::AsyncRead;
use tokio_serial::SerialPortBuilderExt;

/// Open serial connection; dropping it closes the device
pub type SerialLink = Box<dyn AsyncRead + Send + Unpin>;

/// Opens serial devices for the ingester
#[cfg_attr(test, mockall::automock)]
pub trait PortOpener: Send + Sync {
    /// Open `port` at `baud_rate` with 8N1 framing
    fn open(&self, port: &str, baud_rate: u32) -> io::Result<SerialLink>;
}

/// Opens real devices through `tokio_serial`
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSerialOpener;

impl PortOpener for TokioSerialOpener {
    fn open(&self, port: &str, baud_rate: u32) -> io::Result<SerialLink> {
        let stream = tokio_serial::new(port, baud_rate)
            .data_bits(tokio_serial::DataBits::Eight)
            .parity(tokio_serial::Parity::None)
            .stop_bits(tokio_serial::StopBits::One)
            .flow_control(tokio_serial::FlowControl::None)
            .timeout(Duration::from_millis(10))
            .open_native_async()
            .map_err(io::Error::from)?;

        Ok(Box::new(stream))
    }
}

/// Candidate device for the port picker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortEntry {
    pub port_name: String,
    /// Human-readable label, e.g. `/dev/ttyUSB0: FTDI FT232R`
    pub display: String,
}

/// List serial devices visible to the host, sorted by label
pub fn list_ports() -> io::Result<Vec<PortEntry>> {
    let ports = tokio_serial::available_ports().map_err(io::Error::from)?;

    let mut entries: Vec<PortEntry> = ports
        .into_iter()
        .map(|p| {
            let display = match &p.port_type {
                tokio_serial::SerialPortType::UsbPort(info) => {
                    let parts: Vec<&str> = [info.manufacturer.as_deref(), info.product.as_deref()]
                        .into_iter()
                        .flatten()
                        .collect();
                    if parts.is_empty() {
                        format!("{}: USB Serial", p.port_name)
                    } else {
                        format!("{}: {}", p.port_name, parts.join(" "))
                    }
                }
                tokio_serial::SerialPortType::BluetoothPort => format!("{}: Bluetooth", p.port_name),
                tokio_serial::SerialPortType::PciPort => format!("{}: PCI", p.port_name),
                tokio_serial::SerialPortType::Unknown => p.port_name.clone(),
            };
            PortEntry {
                port_name: p.port_name,
                display,
            }
        })
        .collect();

    entries.sort_by(|a, b| a.display.cmp(&b.display));
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_nonexistent_device_fails() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let _guard = runtime.enter();

        let result = TokioSerialOpener.open("/dev/nonexistent_serial_device_12345", 115_200);
        assert!(result.is_err());
    }

    #[test]
    #[ignore] // Depends on host devices; run with: cargo test -- --ignored
    fn test_list_ports_on_host() {
        let ports = list_ports().unwrap();
        for port in &ports {
            println!("{}", port.display);
        }
        let mut sorted = ports.clone();
        sorted.sort_by(|a, b| a.display.cmp(&b.display));
        assert_eq!(ports, sorted);
    }
}
