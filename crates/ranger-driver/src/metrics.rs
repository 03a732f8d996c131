//! Link metrics
//!
//! Lock-free counters updated by the reader and sequencer threads and readable
//! from any thread.

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for one [`SessionController`](crate::SessionController).
///
/// Counters accumulate across sessions.
///
/// # Example
///
/// ```rust
/// use ranger_driver::LinkMetrics;
/// use std::sync::atomic::Ordering;
///
/// let metrics = LinkMetrics::new();
/// metrics.rx_windows.fetch_add(1, Ordering::Relaxed);
/// assert_eq!(metrics.snapshot().rx_windows, 1);
/// ```
#[derive(Debug, Default)]
pub struct LinkMetrics {
    /// 8-byte windows read off the link
    pub rx_windows: AtomicU64,

    /// Samples published to the channel
    pub rx_samples: AtomicU64,

    /// Windows with a key other than the measurement report
    pub rx_ignored_windows: AtomicU64,

    /// Windows failing strict validation (head, tail or CRC)
    pub rx_rejected_frames: AtomicU64,

    /// Reads that timed out with an incomplete window
    pub rx_timeouts: AtomicU64,

    /// Fatal read errors
    pub rx_errors: AtomicU64,

    /// Command frames written
    pub tx_frames: AtomicU64,

    /// Failed command writes
    pub tx_errors: AtomicU64,

    /// Times the reader waited on a full sample channel
    pub backpressure_waits: AtomicU64,

    /// Reader threads that have exited
    pub reader_exits: AtomicU64,
}

impl LinkMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            rx_windows: self.rx_windows.load(Ordering::Relaxed),
            rx_samples: self.rx_samples.load(Ordering::Relaxed),
            rx_ignored_windows: self.rx_ignored_windows.load(Ordering::Relaxed),
            rx_rejected_frames: self.rx_rejected_frames.load(Ordering::Relaxed),
            rx_timeouts: self.rx_timeouts.load(Ordering::Relaxed),
            rx_errors: self.rx_errors.load(Ordering::Relaxed),
            tx_frames: self.tx_frames.load(Ordering::Relaxed),
            tx_errors: self.tx_errors.load(Ordering::Relaxed),
            backpressure_waits: self.backpressure_waits.load(Ordering::Relaxed),
            reader_exits: self.reader_exits.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`LinkMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub rx_windows: u64,
    pub rx_samples: u64,
    pub rx_ignored_windows: u64,
    pub rx_rejected_frames: u64,
    pub rx_timeouts: u64,
    pub rx_errors: u64,
    pub tx_frames: u64,
    pub tx_errors: u64,
    pub backpressure_waits: u64,
    pub reader_exits: u64,
}

impl MetricsSnapshot {
    /// Share of read windows that became samples, 0.0 when nothing was read.
    pub fn sample_ratio(&self) -> f64 {
        if self.rx_windows == 0 {
            return 0.0;
        }
        self.rx_samples as f64 / self.rx_windows as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_reads_counters() {
        let metrics = LinkMetrics::new();
        metrics.rx_windows.fetch_add(4, Ordering::Relaxed);
        metrics.rx_samples.fetch_add(3, Ordering::Relaxed);
        metrics.tx_frames.fetch_add(7, Ordering::Relaxed);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.rx_windows, 4);
        assert_eq!(snapshot.rx_samples, 3);
        assert_eq!(snapshot.tx_frames, 7);
        assert_eq!(snapshot.reader_exits, 0);
        assert!((snapshot.sample_ratio() - 0.75).abs() < f64::EPSILON);
    }

    #[test]
    fn test_empty_ratio() {
        assert_eq!(MetricsSnapshot::default().sample_ratio(), 0.0);
    }
}
