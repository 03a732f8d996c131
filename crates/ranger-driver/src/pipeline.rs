//! Acquisition pipeline
//!
//! Reader thread: pulls 8-byte windows off the link, decodes them and
//! publishes [`Sample`]s on a bounded channel in wire order.
//!
//! - No bytes available: back off for `poll_interval` instead of spinning.
//! - Bytes available: read a full window, blocking up to the link's read timeout.
//! - Channel full: block (re-checking the stop flag every `poll_interval`).
//!   Samples are never dropped while the session runs.
//! - Read timeout: the partial window is discarded and the loop continues.
//! - Any other read error ends the loop and is recorded for the controller.

use crate::config::{FrameValidation, PipelineConfig};
use crate::metrics::LinkMetrics;
use crate::status::{StatusSink, read_error_line};
use crossbeam_channel::{SendTimeoutError, Sender};
use parking_lot::Mutex;
use ranger_link::{LinkError, LinkReader};
use ranger_protocol::{FRAME_LEN, SensorEvent, decode, decode_strict};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use tracing::{debug, error, trace, warn};

/// One distance reading, numbered in arrival order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sample {
    pub distance_mm: u32,
    /// Strictly increasing, never reused.
    pub sequence_index: u64,
}

/// Everything the reader thread shares with its owner.
#[derive(Clone)]
pub struct ReaderContext {
    pub config: PipelineConfig,
    /// Cleared by the owner to stop the loop.
    pub is_running: Arc<AtomicBool>,
    /// Next `sequence_index` to hand out.
    pub next_index: Arc<AtomicU64>,
    pub metrics: Arc<LinkMetrics>,
    pub status: Arc<dyn StatusSink>,
    /// Fatal read error, if the loop ended on one.
    pub last_error: Arc<Mutex<Option<LinkError>>>,
}

/// Reader loop.
///
/// Returns `Ok(())` when stopped through `is_running` or when the sample
/// receiver is gone, `Err` on a fatal read error.
pub fn rx_loop<R: LinkReader>(
    reader: &mut R,
    samples: &Sender<Sample>,
    ctx: &ReaderContext,
) -> Result<(), LinkError> {
    let mut window = [0u8; FRAME_LEN];

    loop {
        // Acquire: pairs with the Release store in stop()
        if !ctx.is_running.load(Ordering::Acquire) {
            trace!("RX thread: is_running flag is false, exiting");
            return Ok(());
        }

        if reader.bytes_available()? == 0 {
            spin_sleep::sleep(ctx.config.poll_interval);
            continue;
        }

        match reader.read_exact(&mut window) {
            Ok(()) => {},
            Err(e) if !e.is_fatal() => {
                ctx.metrics.rx_timeouts.fetch_add(1, Ordering::Relaxed);
                warn!("RX thread: read timed out, partial window discarded");
                continue;
            },
            Err(e) => return Err(e),
        }
        ctx.metrics.rx_windows.fetch_add(1, Ordering::Relaxed);

        let Some(event) = decode_window(window, ctx) else {
            continue;
        };

        let sample = Sample {
            distance_mm: event.distance_mm,
            sequence_index: ctx.next_index.fetch_add(1, Ordering::Relaxed),
        };
        if !publish(samples, sample, ctx) {
            return Ok(());
        }
        ctx.status.push(&event.to_string());
    }
}

fn decode_window(window: [u8; FRAME_LEN], ctx: &ReaderContext) -> Option<SensorEvent> {
    let event = match ctx.config.validation {
        FrameValidation::Lenient => decode(window),
        FrameValidation::Strict => match decode_strict(window) {
            Ok(event) => event,
            Err(e) => {
                ctx.metrics.rx_rejected_frames.fetch_add(1, Ordering::Relaxed);
                debug!("RX thread: rejected {:02X?}: {}", window, e);
                return None;
            },
        },
    };
    if event.is_none() {
        ctx.metrics.rx_ignored_windows.fetch_add(1, Ordering::Relaxed);
        trace!("RX thread: ignored window {:02X?}", window);
    }
    event
}

/// Push one sample, blocking while the channel is full.
///
/// Returns `false` if the loop should end instead.
fn publish(samples: &Sender<Sample>, sample: Sample, ctx: &ReaderContext) -> bool {
    let mut pending = sample;
    loop {
        match samples.send_timeout(pending, ctx.config.poll_interval) {
            Ok(()) => {
                ctx.metrics.rx_samples.fetch_add(1, Ordering::Relaxed);
                return true;
            },
            Err(SendTimeoutError::Timeout(s)) => {
                ctx.metrics.backpressure_waits.fetch_add(1, Ordering::Relaxed);
                if !ctx.is_running.load(Ordering::Acquire) {
                    debug!(
                        "RX thread: stopping with sample #{} still pending",
                        s.sequence_index
                    );
                    return false;
                }
                pending = s;
            },
            Err(SendTimeoutError::Disconnected(_)) => {
                debug!("RX thread: sample receiver dropped");
                return false;
            },
        }
    }
}

/// Handle to a running reader thread.
pub struct AcquisitionPipeline<R: LinkReader + 'static> {
    handle: Option<JoinHandle<R>>,
    is_running: Arc<AtomicBool>,
    stopped: Arc<AtomicBool>,
}

impl<R: LinkReader + 'static> AcquisitionPipeline<R> {
    /// Start the reader thread.
    ///
    /// `ctx.is_running` is set to `true` before the thread starts.
    pub fn spawn(
        mut reader: R,
        samples: Sender<Sample>,
        ctx: ReaderContext,
    ) -> std::io::Result<Self> {
        let is_running = ctx.is_running.clone();
        let stopped = Arc::new(AtomicBool::new(false));
        is_running.store(true, Ordering::Release);

        let stopped_clone = stopped.clone();
        let handle = thread::Builder::new()
            .name("ranger-rx".to_string())
            .spawn(move || {
                if let Err(e) = rx_loop(&mut reader, &samples, &ctx) {
                    error!("RX thread: fatal read error: {}", e);
                    ctx.metrics.rx_errors.fetch_add(1, Ordering::Relaxed);
                    ctx.status.push(&read_error_line(&e));
                    *ctx.last_error.lock() = Some(e);
                    // Release: the recorded error is visible to anyone seeing false
                    ctx.is_running.store(false, Ordering::Release);
                }
                ctx.metrics.reader_exits.fetch_add(1, Ordering::Relaxed);
                let was_stopped = stopped_clone.swap(true, Ordering::AcqRel);
                debug_assert!(!was_stopped, "reader stopped twice");
                reader
            });

        match handle {
            Ok(handle) => Ok(Self {
                handle: Some(handle),
                is_running,
                stopped,
            }),
            Err(e) => {
                is_running.store(false, Ordering::Release);
                Err(e)
            },
        }
    }

    /// Whether the reader loop is still meant to run (false after a fatal error).
    pub fn is_running(&self) -> bool {
        self.is_running.load(Ordering::Acquire)
    }

    /// Set exactly once, when the reader thread has finished.
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    /// Ask the loop to stop without waiting.
    pub fn stop(&self) {
        self.is_running.store(false, Ordering::Release);
    }

    /// Stop the loop and wait for the thread to terminate.
    ///
    /// Returns the read half once nothing can use it anymore. Takes at most
    /// one loop iteration (bounded by the poll interval or the read timeout).
    pub fn stop_and_join(mut self) -> thread::Result<R> {
        self.stop();
        match self.handle.take() {
            Some(handle) => handle.join(),
            None => Err(Box::new("reader already joined")),
        }
    }
}

impl<R: LinkReader + 'static> Drop for AcquisitionPipeline<R> {
    fn drop(&mut self) {
        self.stop();
        if let Some(handle) = self.handle.take()
            && handle.join().is_err()
        {
            error!("RX thread panicked");
        }
    }
}
