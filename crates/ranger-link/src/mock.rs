//! In-memory link for tests
//!
//! [`MockLink`] behaves like a serial port with a read timeout: reads block
//! until enough bytes are queued or the timeout expires. Every write is
//! recorded with the instant it happened. A [`MockHandle`] kept by the test
//! feeds inbound bytes, injects failures and inspects what was written.

use crate::{
    LinkDeviceError, LinkDeviceErrorKind, LinkError, LinkOpener, LinkReader, LinkWriter,
    SplittableLink, validate_baud,
};
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A write observed by the mock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenBytes {
    pub bytes: Vec<u8>,
    pub at: Instant,
}

#[derive(Default)]
struct MockState {
    inbound: VecDeque<u8>,
    written: Vec<WrittenBytes>,
    flushes: usize,
    read_error: Option<std::io::ErrorKind>,
    write_error: Option<std::io::ErrorKind>,
    halves_alive: usize,
    released_at: Option<Instant>,
}

struct MockShared {
    state: Mutex<MockState>,
    readable: Condvar,
}

/// Test-side control of a [`MockLink`].
#[derive(Clone)]
pub struct MockHandle {
    shared: Arc<MockShared>,
}

impl MockHandle {
    /// Queue raw inbound bytes.
    pub fn push_bytes(&self, bytes: &[u8]) {
        let mut state = self.shared.state.lock();
        state.inbound.extend(bytes.iter().copied());
        self.shared.readable.notify_all();
    }

    /// Bytes queued but not read yet.
    pub fn pending_inbound(&self) -> usize {
        self.shared.state.lock().inbound.len()
    }

    /// Make every subsequent read fail with `kind`.
    pub fn fail_reads(&self, kind: std::io::ErrorKind) {
        let mut state = self.shared.state.lock();
        state.read_error = Some(kind);
        self.shared.readable.notify_all();
    }

    /// Make every subsequent write fail with `kind`.
    pub fn fail_writes(&self, kind: std::io::ErrorKind) {
        self.shared.state.lock().write_error = Some(kind);
    }

    /// All writes so far, in order.
    pub fn written(&self) -> Vec<WrittenBytes> {
        self.shared.state.lock().written.clone()
    }

    pub fn write_count(&self) -> usize {
        self.shared.state.lock().written.len()
    }

    pub fn flush_count(&self) -> usize {
        self.shared.state.lock().flushes
    }

    /// True once the link was split and both halves were dropped.
    pub fn is_released(&self) -> bool {
        self.shared.state.lock().released_at.is_some()
    }

    /// When the last half was dropped.
    pub fn released_at(&self) -> Option<Instant> {
        self.shared.state.lock().released_at
    }
}

/// In-memory link, not yet split.
pub struct MockLink {
    shared: Arc<MockShared>,
    read_timeout: Duration,
}

impl MockLink {
    /// New link with a 1 s read timeout, plus its control handle.
    pub fn new() -> (MockLink, MockHandle) {
        let shared = Arc::new(MockShared {
            state: Mutex::new(MockState::default()),
            readable: Condvar::new(),
        });
        let handle = MockHandle {
            shared: shared.clone(),
        };
        (
            MockLink {
                shared,
                read_timeout: Duration::from_secs(1),
            },
            handle,
        )
    }

    pub fn with_read_timeout(mut self, read_timeout: Duration) -> Self {
        self.read_timeout = read_timeout;
        self
    }
}

impl SplittableLink for MockLink {
    type Reader = MockReader;
    type Writer = MockWriter;

    fn split(self) -> Result<(MockReader, MockWriter), LinkError> {
        self.shared.state.lock().halves_alive = 2;
        Ok((
            MockReader {
                shared: self.shared.clone(),
                read_timeout: self.read_timeout,
            },
            MockWriter {
                shared: self.shared,
            },
        ))
    }
}

fn release_half(shared: &MockShared) {
    let mut state = shared.state.lock();
    state.halves_alive = state.halves_alive.saturating_sub(1);
    if state.halves_alive == 0 {
        state.released_at = Some(Instant::now());
    }
}

pub struct MockReader {
    shared: Arc<MockShared>,
    read_timeout: Duration,
}

impl LinkReader for MockReader {
    fn bytes_available(&mut self) -> Result<usize, LinkError> {
        let state = self.shared.state.lock();
        if let Some(kind) = state.read_error {
            return Err(LinkError::Io(std::io::Error::new(kind, "mock read failure")));
        }
        Ok(state.inbound.len())
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), LinkError> {
        let deadline = Instant::now() + self.read_timeout;
        let mut state = self.shared.state.lock();
        loop {
            if let Some(kind) = state.read_error {
                return Err(LinkError::Io(std::io::Error::new(kind, "mock read failure")));
            }
            if state.inbound.len() >= buf.len() {
                for slot in buf.iter_mut() {
                    // length checked above
                    *slot = state.inbound.pop_front().unwrap_or_default();
                }
                return Ok(());
            }
            if self
                .shared
                .readable
                .wait_until(&mut state, deadline)
                .timed_out()
            {
                // a real port consumes what arrived before the timeout
                state.inbound.clear();
                return Err(LinkError::Timeout);
            }
        }
    }
}

impl Drop for MockReader {
    fn drop(&mut self) {
        release_half(&self.shared);
    }
}

pub struct MockWriter {
    shared: Arc<MockShared>,
}

impl LinkWriter for MockWriter {
    fn write(&mut self, bytes: &[u8]) -> Result<(), LinkError> {
        let mut state = self.shared.state.lock();
        if let Some(kind) = state.write_error {
            return Err(LinkError::Io(std::io::Error::new(kind, "mock write failure")));
        }
        state.written.push(WrittenBytes {
            bytes: bytes.to_vec(),
            at: Instant::now(),
        });
        Ok(())
    }

    fn flush(&mut self) -> Result<(), LinkError> {
        self.shared.state.lock().flushes += 1;
        Ok(())
    }
}

impl Drop for MockWriter {
    fn drop(&mut self) {
        release_half(&self.shared);
    }
}

/// Opener handing out pre-created [`MockLink`]s.
///
/// `open` fails with `NotFound` for unknown ports, `InvalidBaud` for a zero
/// baud rate and `Busy` when no link is queued.
pub struct MockOpener {
    ports: Vec<String>,
    links: Mutex<VecDeque<MockLink>>,
}

impl MockOpener {
    pub fn new(ports: &[&str]) -> Self {
        Self {
            ports: ports.iter().map(|p| p.to_string()).collect(),
            links: Mutex::new(VecDeque::new()),
        }
    }

    /// Queue a link for the next successful `open`, returning its handle.
    pub fn queue_link(&self) -> MockHandle {
        let (link, handle) = MockLink::new();
        self.links.lock().push_back(link);
        handle
    }
}

impl LinkOpener for MockOpener {
    type Link = MockLink;

    fn open(&self, port: &str, baud: u32, read_timeout: Duration) -> Result<MockLink, LinkError> {
        validate_baud(baud)?;
        if !self.ports.iter().any(|p| p == port) {
            return Err(LinkDeviceError::new(
                LinkDeviceErrorKind::NotFound,
                format!("no such port: {}", port),
            )
            .into());
        }
        let link = self.links.lock().pop_front().ok_or_else(|| {
            LinkDeviceError::new(LinkDeviceErrorKind::Busy, format!("{} is busy", port))
        })?;
        Ok(link.with_read_timeout(read_timeout))
    }

    fn available_ports(&self) -> Result<Vec<String>, LinkError> {
        Ok(self.ports.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_exact_waits_for_bytes() {
        let (link, handle) = MockLink::new();
        let (mut reader, _writer) = link.with_read_timeout(Duration::from_secs(1)).split().unwrap();

        let feeder = std::thread::spawn(move || {
            handle.push_bytes(&[1, 2, 3, 4]);
            std::thread::sleep(Duration::from_millis(20));
            handle.push_bytes(&[5, 6, 7, 8]);
        });

        let mut buf = [0u8; 8];
        reader.read_exact(&mut buf).unwrap();
        assert_eq!(buf, [1, 2, 3, 4, 5, 6, 7, 8]);
        feeder.join().unwrap();
    }

    #[test]
    fn test_read_timeout_consumes_partial() {
        let (link, handle) = MockLink::new();
        let (mut reader, _writer) = link
            .with_read_timeout(Duration::from_millis(20))
            .split()
            .unwrap();
        handle.push_bytes(&[1, 2, 3]);

        let mut buf = [0u8; 8];
        assert!(matches!(reader.read_exact(&mut buf), Err(LinkError::Timeout)));
        assert_eq!(handle.pending_inbound(), 0);
    }

    #[test]
    fn test_injected_failures() {
        let (link, handle) = MockLink::new();
        let (mut reader, mut writer) = link.split().unwrap();

        handle.fail_reads(std::io::ErrorKind::BrokenPipe);
        assert!(matches!(reader.bytes_available(), Err(LinkError::Io(_))));

        writer.write(&[0x55]).unwrap();
        handle.fail_writes(std::io::ErrorKind::BrokenPipe);
        assert!(writer.write(&[0x55]).is_err());
        assert_eq!(handle.write_count(), 1);
    }

    #[test]
    fn test_release_after_both_halves_drop() {
        let (link, handle) = MockLink::new();
        let (reader, writer) = link.split().unwrap();
        drop(reader);
        assert!(!handle.is_released());
        drop(writer);
        assert!(handle.is_released());
    }

    #[test]
    fn test_opener_errors() {
        let opener = MockOpener::new(&["/dev/ttyMOCK0"]);
        let timeout = Duration::from_millis(10);

        assert!(matches!(
            opener.open("/dev/ttyMOCK0", 0, timeout),
            Err(LinkError::InvalidBaud(0))
        ));
        assert!(matches!(
            opener.open("/dev/ttyNOPE", 115_200, timeout),
            Err(LinkError::Device(LinkDeviceError {
                kind: LinkDeviceErrorKind::NotFound,
                ..
            }))
        ));
        assert!(matches!(
            opener.open("/dev/ttyMOCK0", 115_200, timeout),
            Err(LinkError::Device(LinkDeviceError {
                kind: LinkDeviceErrorKind::Busy,
                ..
            }))
        ));

        let _handle = opener.queue_link();
        assert!(opener.open("/dev/ttyMOCK0", 115_200, timeout).is_ok());
        assert_eq!(opener.available_ports().unwrap(), vec!["/dev/ttyMOCK0"]);
    }
}
