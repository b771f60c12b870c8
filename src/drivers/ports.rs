use std::io::{self, Read, Write};

use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};

use crate::config::LinkSettings;

/// An open byte stream to a device.
pub trait Port: Read + Write + Send {
    /// Cheap liveness check on the underlying device.
    fn probe(&mut self) -> io::Result<()>;
}

/// Enumerates and opens serial devices.
pub trait PortDriver: Send + Sync {
    fn available_ports(&self) -> serialport::Result<Vec<String>>;

    fn open(&self, port_name: &str, settings: &LinkSettings) -> serialport::Result<Box<dyn Port>>;
}

/// The operating system's serial ports, through the `serialport` crate.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemPorts;

impl PortDriver for SystemPorts {
    fn available_ports(&self) -> serialport::Result<Vec<String>> {
        Ok(serialport::available_ports()?
            .into_iter()
            .map(|p| p.port_name)
            .collect())
    }

    fn open(&self, port_name: &str, settings: &LinkSettings) -> serialport::Result<Box<dyn Port>> {
        let port = serialport::new(port_name, settings.baud_rate)
            .timeout(settings.read_timeout())
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .open()?;
        Ok(Box::new(SystemPort(port)))
    }
}

struct SystemPort(Box<dyn SerialPort>);

impl Read for SystemPort {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.0.read(buf)
    }
}

impl Write for SystemPort {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.0.flush()
    }
}

impl Port for SystemPort {
    fn probe(&mut self) -> io::Result<()> {
        self.0.bytes_to_read().map(|_| ()).map_err(io::Error::from)
    }
}
