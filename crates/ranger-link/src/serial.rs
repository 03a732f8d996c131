//! Serial port backend built on the `serialport` crate.

use crate::{
    LinkDeviceError, LinkDeviceErrorKind, LinkError, LinkOpener, LinkReader, LinkWriter,
    SplittableLink, validate_baud,
};
use serialport::SerialPort;
use std::io::{Read, Write};
use std::time::Duration;
use tracing::{debug, trace};

impl From<serialport::Error> for LinkError {
    fn from(e: serialport::Error) -> Self {
        let kind = match e.kind() {
            serialport::ErrorKind::NoDevice => LinkDeviceErrorKind::NoDevice,
            serialport::ErrorKind::InvalidInput => LinkDeviceErrorKind::UnsupportedConfig,
            serialport::ErrorKind::Io(std::io::ErrorKind::NotFound) => LinkDeviceErrorKind::NotFound,
            serialport::ErrorKind::Io(std::io::ErrorKind::PermissionDenied) => {
                LinkDeviceErrorKind::AccessDenied
            },
            serialport::ErrorKind::Io(std::io::ErrorKind::ResourceBusy) => LinkDeviceErrorKind::Busy,
            serialport::ErrorKind::Io(kind) => {
                return LinkError::Io(std::io::Error::new(kind, e.description));
            },
            serialport::ErrorKind::Unknown => LinkDeviceErrorKind::Unknown,
        };
        LinkError::Device(LinkDeviceError::new(kind, e.description))
    }
}

fn map_io(e: std::io::Error) -> LinkError {
    if e.kind() == std::io::ErrorKind::TimedOut {
        LinkError::Timeout
    } else {
        LinkError::Io(e)
    }
}

/// Opens serial ports.
#[derive(Debug, Clone, Copy, Default)]
pub struct SerialOpener;

impl LinkOpener for SerialOpener {
    type Link = SerialLink;

    fn open(&self, port: &str, baud: u32, read_timeout: Duration) -> Result<SerialLink, LinkError> {
        let baud = validate_baud(baud)?;
        let port_handle = serialport::new(port, baud).timeout(read_timeout).open()?;
        debug!("Opened serial port {} at {} baud", port, baud);
        Ok(SerialLink {
            port: port_handle,
            name: port.to_string(),
        })
    }

    fn available_ports(&self) -> Result<Vec<String>, LinkError> {
        Ok(serialport::available_ports()?
            .into_iter()
            .map(|p| p.port_name)
            .collect())
    }
}

/// An open serial port, not yet split.
pub struct SerialLink {
    port: Box<dyn SerialPort>,
    name: String,
}

impl SerialLink {
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl SplittableLink for SerialLink {
    type Reader = SerialReader;
    type Writer = SerialWriter;

    fn split(self) -> Result<(SerialReader, SerialWriter), LinkError> {
        let writer = self.port.try_clone()?;
        debug!("Split {} into read and write halves", self.name());
        Ok((SerialReader { port: self.port }, SerialWriter { port: writer }))
    }
}

/// Read half of a serial port.
pub struct SerialReader {
    port: Box<dyn SerialPort>,
}

impl LinkReader for SerialReader {
    fn bytes_available(&mut self) -> Result<usize, LinkError> {
        Ok(self.port.bytes_to_read()? as usize)
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), LinkError> {
        self.port.read_exact(buf).map_err(map_io)?;
        trace!("RX {:02X?}", buf);
        Ok(())
    }
}

/// Write half of a serial port.
pub struct SerialWriter {
    port: Box<dyn SerialPort>,
}

impl LinkWriter for SerialWriter {
    fn write(&mut self, bytes: &[u8]) -> Result<(), LinkError> {
        self.port.write_all(bytes).map_err(map_io)?;
        trace!("TX {:02X?}", bytes);
        Ok(())
    }

    fn flush(&mut self) -> Result<(), LinkError> {
        self.port.flush().map_err(map_io)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serialport_error_mapping() {
        let e = serialport::Error::new(serialport::ErrorKind::NoDevice, "unplugged");
        match LinkError::from(e) {
            LinkError::Device(d) => {
                assert_eq!(d.kind, LinkDeviceErrorKind::NoDevice);
                assert_eq!(d.message, "unplugged");
            },
            other => panic!("unexpected {:?}", other),
        }

        let e = serialport::Error::new(
            serialport::ErrorKind::Io(std::io::ErrorKind::PermissionDenied),
            "denied",
        );
        assert!(matches!(
            LinkError::from(e),
            LinkError::Device(LinkDeviceError {
                kind: LinkDeviceErrorKind::AccessDenied,
                ..
            })
        ));

        let e = serialport::Error::new(
            serialport::ErrorKind::Io(std::io::ErrorKind::BrokenPipe),
            "pipe",
        );
        assert!(matches!(LinkError::from(e), LinkError::Io(_)));
    }

    #[test]
    fn test_timeout_mapping() {
        let e = std::io::Error::new(std::io::ErrorKind::TimedOut, "slow");
        assert!(matches!(map_io(e), LinkError::Timeout));
    }

    #[test]
    fn test_open_rejects_zero_baud() {
        let result = SerialOpener.open("/dev/does-not-exist", 0, Duration::from_secs(1));
        assert!(matches!(result, Err(LinkError::InvalidBaud(0))));
    }

    #[test]
    fn test_open_missing_port_fails() {
        let result = SerialOpener.open(
            "/dev/ranger-missing-port",
            115_200,
            Duration::from_millis(100),
        );
        assert!(result.is_err());
    }
}
