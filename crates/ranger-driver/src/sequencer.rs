//! Command sequencer
//!
//! Brings the sensor from idle into periodic measurement and keeps it there:
//!
//! | State | Command sent on entry | Next tick after |
//! |---|---|---|
//! | `StoppingDetect` | STOP_DETECT | `stop_settle` (100 ms) |
//! | `SettingMode` | SET_MODE | `mode_settle` (100 ms) |
//! | `RunningDetectLoop` | START_DETECT | `detect_period` (20 ms), repeats |
//!
//! Transitions are driven by time only. Ticks are scheduled against absolute
//! deadlines, so a late tick shortens the next wait instead of shifting every
//! later tick.

use crate::config::SequencerTiming;
use crate::metrics::LinkMetrics;
use crate::status::{StatusSink, write_error_line};
use crossbeam_channel::{RecvTimeoutError, Sender};
use parking_lot::Mutex;
use ranger_link::{LinkError, LinkWriter};
use ranger_protocol::Command;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, trace, warn};

/// Sequencer state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum SequencerState {
    #[default]
    Idle = 0,
    StoppingDetect = 1,
    SettingMode = 2,
    RunningDetectLoop = 3,
}

/// One step of the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    /// State entered.
    pub next: SequencerState,
    /// Command sent on entry.
    pub command: Command,
    /// Delay until the next step.
    pub delay: Duration,
}

impl SequencerState {
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::StoppingDetect,
            2 => Self::SettingMode,
            3 => Self::RunningDetectLoop,
            _ => Self::Idle,
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// The step taken when the timer fires in this state.
    ///
    /// From `Idle` this is the `begin()` step.
    pub fn advance(self, timing: &SequencerTiming) -> Transition {
        match self {
            Self::Idle => Transition {
                next: Self::StoppingDetect,
                command: Command::StopDetect,
                delay: timing.stop_settle,
            },
            Self::StoppingDetect => Transition {
                next: Self::SettingMode,
                command: Command::SetMode,
                delay: timing.mode_settle,
            },
            Self::SettingMode | Self::RunningDetectLoop => Transition {
                next: Self::RunningDetectLoop,
                command: Command::StartDetect,
                delay: timing.detect_period,
            },
        }
    }
}

/// Sequencer state shared between threads.
#[derive(Debug, Default)]
pub struct AtomicSequencerState {
    inner: AtomicU8,
}

impl AtomicSequencerState {
    pub fn new(state: SequencerState) -> Self {
        Self {
            inner: AtomicU8::new(state.as_u8()),
        }
    }

    pub fn get(&self, ordering: Ordering) -> SequencerState {
        SequencerState::from_u8(self.inner.load(ordering))
    }

    pub fn set(&self, state: SequencerState, ordering: Ordering) {
        self.inner.store(state.as_u8(), ordering);
    }
}

/// Writer plus the cancellation mark, guarded together so that no write can
/// start once `cancel()` has taken the lock.
struct WriterSlot<W> {
    writer: Option<W>,
    cancelled: bool,
}

/// Runs the command sequence on a background thread.
///
/// Owns the write half of the link. `begin()` starts the sequence; calling it
/// again while scheduled does nothing. `cancel()` stops the thread, waits for
/// it and resets the state to `Idle` without sending anything.
pub struct CommandSequencer<W: LinkWriter + 'static> {
    slot: Arc<Mutex<WriterSlot<W>>>,
    state: Arc<AtomicSequencerState>,
    timing: SequencerTiming,
    metrics: Arc<LinkMetrics>,
    status: Arc<dyn StatusSink>,
    link_alive: Option<Arc<AtomicBool>>,
    cancel_tx: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl<W: LinkWriter + 'static> CommandSequencer<W> {
    pub fn new(
        writer: W,
        timing: SequencerTiming,
        metrics: Arc<LinkMetrics>,
        status: Arc<dyn StatusSink>,
    ) -> Self {
        Self {
            slot: Arc::new(Mutex::new(WriterSlot {
                writer: Some(writer),
                cancelled: false,
            })),
            state: Arc::new(AtomicSequencerState::new(SequencerState::Idle)),
            timing,
            metrics,
            status,
            link_alive: None,
            cancel_tx: None,
            handle: None,
        }
    }

    /// Stop sending once `alive` reads `false`, e.g. after the reader lost the link.
    pub fn with_link_guard(mut self, alive: Arc<AtomicBool>) -> Self {
        self.link_alive = Some(alive);
        self
    }

    /// Start the sequence.
    ///
    /// Returns `false` if a sequence is already scheduled or the writer was
    /// released.
    pub fn begin(&mut self) -> bool {
        if self.handle.is_some() {
            debug!("Sequencer already scheduled, ignoring begin()");
            return false;
        }
        {
            let mut slot = self.slot.lock();
            if slot.writer.is_none() {
                warn!("Sequencer writer released, cannot begin");
                return false;
            }
            slot.cancelled = false;
        }

        let (cancel_tx, cancel_rx) = crossbeam_channel::bounded::<()>(1);
        let slot = self.slot.clone();
        let state = self.state.clone();
        let timing = self.timing;
        let metrics = self.metrics.clone();
        let status = self.status.clone();
        let link_alive = self.link_alive.clone();

        let handle = thread::Builder::new()
            .name("ranger-sequencer".to_string())
            .spawn(move || {
                let mut current = SequencerState::Idle;
                let mut deadline = Instant::now();

                loop {
                    if link_alive
                        .as_ref()
                        .is_some_and(|alive| !alive.load(Ordering::Acquire))
                    {
                        debug!("Sequencer: link is down, stopping");
                        state.set(SequencerState::Idle, Ordering::Release);
                        break;
                    }
                    let transition = current.advance(&timing);
                    {
                        let mut slot = slot.lock();
                        if slot.cancelled {
                            break;
                        }
                        let Some(writer) = slot.writer.as_mut() else {
                            break;
                        };
                        if let Err(e) = send_command(writer, transition.command) {
                            error!("Sequencer: failed to send {}: {}", transition.command, e);
                            metrics.tx_errors.fetch_add(1, Ordering::Relaxed);
                            status.push(&write_error_line(&e));
                            break;
                        }
                    }
                    metrics.tx_frames.fetch_add(1, Ordering::Relaxed);
                    current = transition.next;
                    state.set(current, Ordering::Release);

                    deadline = next_deadline(deadline, transition.delay, Instant::now());
                    match cancel_rx.recv_deadline(deadline) {
                        Err(RecvTimeoutError::Timeout) => {},
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                trace!("Sequencer thread exited");
            });

        match handle {
            Ok(handle) => {
                self.cancel_tx = Some(cancel_tx);
                self.handle = Some(handle);
                true
            },
            Err(e) => {
                error!("Failed to spawn sequencer thread: {}", e);
                false
            },
        }
    }

    /// Stop all pending ticks and return to `Idle`.
    ///
    /// No command frame is written after this call starts. Sends nothing itself.
    pub fn cancel(&mut self) {
        self.slot.lock().cancelled = true;
        if let Some(tx) = self.cancel_tx.take() {
            let _ = tx.try_send(());
        }
        if let Some(handle) = self.handle.take()
            && handle.join().is_err()
        {
            error!("Sequencer thread panicked");
        }
        self.state.set(SequencerState::Idle, Ordering::Release);
    }

    /// Whether the sequencer thread is still issuing commands.
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    pub fn state(&self) -> SequencerState {
        self.state.get(Ordering::Acquire)
    }

    /// Cancel and hand the write half back, e.g. to close the link.
    pub fn release_writer(&mut self) -> Option<W> {
        self.cancel();
        self.slot.lock().writer.take()
    }
}

impl<W: LinkWriter + 'static> Drop for CommandSequencer<W> {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Next tick on the `period` grid anchored at `deadline`.
///
/// Ticks already missed are skipped rather than sent back to back.
fn next_deadline(deadline: Instant, period: Duration, now: Instant) -> Instant {
    let next = deadline + period;
    if next > now {
        return next;
    }
    if period.is_zero() {
        return now;
    }
    let behind = now.duration_since(next);
    let missed = behind.as_nanos() / period.as_nanos() + 1;
    warn!("Sequencer tick late by {:?}, skipping {} tick(s)", behind, missed);
    next + period.saturating_mul(u32::try_from(missed).unwrap_or(u32::MAX))
}

fn send_command<W: LinkWriter>(writer: &mut W, command: Command) -> Result<(), LinkError> {
    let bytes = command.frame().to_bytes();
    debug!("Sequencer: sending {} {:02X?}", command, bytes);
    // clear anything pending before writing the next frame
    writer.flush()?;
    writer.write(&bytes)
}
