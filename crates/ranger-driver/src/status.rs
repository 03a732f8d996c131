//! Status sink
//!
//! Human-readable lines for a display or log view. The line formats are
//! consumed by existing log readers and must not change:
//!
//! - `Status: Connected to <port> at <baud> baud`
//! - `Failed to open serial port: <error>`
//! - `Status:<status>\tDistance:<distance> mm`
//! - `Error in serial read: <error>`
//! - `Error in serial write: <error>`
//! - `Serial port closed.`
//!
//! Sinks are called from the reader thread and must not block.

use crossbeam_channel::{Receiver, Sender, TrySendError};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::info;

/// Receiver of status lines.
pub trait StatusSink: Send + Sync {
    fn push(&self, line: &str);
}

impl<F> StatusSink for F
where
    F: Fn(&str) + Send + Sync,
{
    fn push(&self, line: &str) {
        self(line)
    }
}

/// Forwards status lines to `tracing` at INFO level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingStatusSink;

impl StatusSink for TracingStatusSink {
    fn push(&self, line: &str) {
        info!(target: "ranger::status", "{}", line);
    }
}

/// Queues status lines on a bounded channel for another thread.
///
/// Lines are dropped (and counted) when the queue is full.
pub struct ChannelStatusSink {
    sender: Sender<String>,
    dropped: AtomicU64,
}

impl ChannelStatusSink {
    pub fn new(capacity: usize) -> (Self, Receiver<String>) {
        let (sender, receiver) = crossbeam_channel::bounded(capacity);
        (
            Self {
                sender,
                dropped: AtomicU64::new(0),
            },
            receiver,
        )
    }

    /// Lines lost because the queue was full or the receiver was dropped.
    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl StatusSink for ChannelStatusSink {
    fn push(&self, line: &str) {
        match self.sender.try_send(line.to_string()) {
            Ok(()) => {},
            Err(TrySendError::Full(_)) | Err(TrySendError::Disconnected(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
            },
        }
    }
}

pub(crate) fn connected_line(port: &str, baud: u32) -> String {
    format!("Status: Connected to {} at {} baud", port, baud)
}

pub(crate) fn open_failed_line(error: &dyn std::fmt::Display) -> String {
    format!("Failed to open serial port: {}", error)
}

pub(crate) fn read_error_line(error: &dyn std::fmt::Display) -> String {
    format!("Error in serial read: {}", error)
}

pub(crate) fn write_error_line(error: &dyn std::fmt::Display) -> String {
    format!("Error in serial write: {}", error)
}

pub(crate) const CLOSED_LINE: &str = "Serial port closed.";

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[test]
    fn test_closure_sink() {
        let lines = Arc::new(Mutex::new(Vec::new()));
        let lines_clone = lines.clone();
        let sink = move |line: &str| lines_clone.lock().push(line.to_string());

        sink.push("hello");
        assert_eq!(*lines.lock(), vec!["hello".to_string()]);
    }

    #[test]
    fn test_channel_sink_drops_when_full() {
        let (sink, rx) = ChannelStatusSink::new(2);
        sink.push("a");
        sink.push("b");
        sink.push("c");

        assert_eq!(rx.try_iter().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(sink.dropped_count(), 1);
    }

    #[test]
    fn test_line_formats() {
        assert_eq!(
            connected_line("/dev/ttyUSB0", 115_200),
            "Status: Connected to /dev/ttyUSB0 at 115200 baud"
        );
        assert_eq!(
            read_error_line(&"device unplugged"),
            "Error in serial read: device unplugged"
        );
        assert_eq!(
            open_failed_line(&"busy"),
            "Failed to open serial port: busy"
        );
        assert_eq!(write_error_line(&"eof"), "Error in serial write: eof");
        assert_eq!(CLOSED_LINE, "Serial port closed.");
    }
}
