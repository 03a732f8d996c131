//! # Ranger Link Layer
//!
//! Byte-stream transport abstraction used by the driver.
//!
//! A link is opened by a [`LinkOpener`] and then split into a read half and a
//! write half, so the acquisition thread and the command thread never share a
//! handle. The link is released once both halves are dropped.

use std::time::Duration;
use thiserror::Error;

#[cfg(feature = "serial")]
pub mod serial;

#[cfg(feature = "serial")]
pub use serial::{SerialLink, SerialOpener, SerialReader, SerialWriter};

#[cfg(feature = "mock")]
pub mod mock;

/// Link layer error.
#[derive(Error, Debug)]
pub enum LinkError {
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Device Error: {0}")]
    Device(#[from] LinkDeviceError),
    #[error("Read timeout")]
    Timeout,
    #[error("Invalid baud rate: {0}")]
    InvalidBaud(u32),
    #[error("Link closed")]
    Closed,
}

impl LinkError {
    /// Whether the link is unusable after this error.
    ///
    /// Timeouts are expected on an idle line; everything else ends the session.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, LinkError::Timeout)
    }
}

/// Structured classification of device errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkDeviceErrorKind {
    Unknown,
    NotFound,
    NoDevice,
    AccessDenied,
    Busy,
    UnsupportedConfig,
}

/// Device error with a kind and a human-readable message.
#[derive(Error, Debug, Clone)]
#[error("{kind:?}: {message}")]
pub struct LinkDeviceError {
    pub kind: LinkDeviceErrorKind,
    pub message: String,
}

impl LinkDeviceError {
    pub fn new(kind: LinkDeviceErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(
            self.kind,
            LinkDeviceErrorKind::NoDevice
                | LinkDeviceErrorKind::AccessDenied
                | LinkDeviceErrorKind::NotFound
        )
    }
}

impl From<String> for LinkDeviceError {
    fn from(message: String) -> Self {
        Self::new(LinkDeviceErrorKind::Unknown, message)
    }
}

impl From<&str> for LinkDeviceError {
    fn from(message: &str) -> Self {
        Self::new(LinkDeviceErrorKind::Unknown, message)
    }
}

/// Read half of a link.
pub trait LinkReader: Send {
    /// Bytes buffered and ready to read without blocking.
    fn bytes_available(&mut self) -> Result<usize, LinkError>;

    /// Fill `buf` completely, blocking up to the link's read timeout.
    ///
    /// Returns `LinkError::Timeout` if the buffer could not be filled in time;
    /// bytes received before the timeout are consumed.
    fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), LinkError>;
}

/// Write half of a link.
pub trait LinkWriter: Send {
    fn write(&mut self, bytes: &[u8]) -> Result<(), LinkError>;
    fn flush(&mut self) -> Result<(), LinkError>;
}

/// A link that can be split into independent read and write halves.
pub trait SplittableLink {
    type Reader: LinkReader + 'static;
    type Writer: LinkWriter + 'static;

    fn split(self) -> Result<(Self::Reader, Self::Writer), LinkError>;
}

/// Opens links and enumerates the identifiers that can be opened.
pub trait LinkOpener {
    type Link: SplittableLink;

    /// Open `port` at `baud`, applying `read_timeout` to blocking reads.
    fn open(&self, port: &str, baud: u32, read_timeout: Duration) -> Result<Self::Link, LinkError>;

    /// Identifiers of the links currently available.
    fn available_ports(&self) -> Result<Vec<String>, LinkError>;
}

/// Reject baud rates no UART can run at.
pub fn validate_baud(baud: u32) -> Result<u32, LinkError> {
    if baud == 0 {
        return Err(LinkError::InvalidBaud(baud));
    }
    Ok(baud)
}
