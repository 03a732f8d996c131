//! Session controller
//!
//! Owns the open/close lifecycle of one sensor link:
//!
//! ```text
//! Closed --open()--> Opening --link acquired--> Open --close()--> Closing --> Closed
//!                       \--open failed--> Closed    \--read error--> Failed --close()--^
//! ```
//!
//! A fatal read error moves the session to `Failed`: the sequencer stops
//! sending and the caller is expected to `close()` (and possibly reopen).
//!
//! On `close()` the sequencer is cancelled first (no more command frames),
//! then the reader thread is stopped and joined, and only then are the link
//! halves dropped.

use crate::config::SessionConfig;
use crate::error::DriverError;
use crate::metrics::{LinkMetrics, MetricsSnapshot};
use crate::pipeline::{AcquisitionPipeline, ReaderContext, Sample};
use crate::sequencer::{CommandSequencer, SequencerState};
use crate::status::{
    CLOSED_LINE, StatusSink, TracingStatusSink, connected_line, open_failed_line,
};
use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;
use ranger_link::{LinkError, LinkOpener, SplittableLink};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64};
use tracing::{error, info, warn};

/// Lifecycle state of the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Closed,
    Opening,
    Open,
    /// The reader hit a fatal error; only `close()` is useful now.
    Failed,
    Closing,
}

/// An open link with its two worker threads.
pub struct Session<L: SplittableLink> {
    port: String,
    baud: u32,
    sequencer: CommandSequencer<L::Writer>,
    pipeline: AcquisitionPipeline<L::Reader>,
}

impl<L: SplittableLink> Session<L> {
    pub fn port(&self) -> &str {
        &self.port
    }

    pub fn baud(&self) -> u32 {
        self.baud
    }

    pub fn sequencer_state(&self) -> SequencerState {
        self.sequencer.state()
    }

    /// False once the reader hit a fatal error.
    pub fn is_healthy(&self) -> bool {
        self.pipeline.is_running()
    }
}

/// Drives one sensor: opens the link, runs the reader and the command
/// sequence, and hands decoded samples to the caller.
///
/// `sequence_index` keeps counting across sessions, so indices are never
/// reused. Samples still queued when a session closes remain drainable.
pub struct SessionController<O: LinkOpener> {
    opener: O,
    config: SessionConfig,
    state: SessionState,
    session: Option<Session<O::Link>>,
    sample_tx: Sender<Sample>,
    sample_rx: Receiver<Sample>,
    next_index: Arc<AtomicU64>,
    metrics: Arc<LinkMetrics>,
    status: Arc<dyn StatusSink>,
    last_error: Arc<Mutex<Option<LinkError>>>,
}

impl<O: LinkOpener> SessionController<O> {
    /// New closed controller. Status lines go to `tracing` until
    /// [`with_status_sink`](Self::with_status_sink) replaces the sink.
    pub fn new(opener: O, config: SessionConfig) -> Self {
        let (sample_tx, sample_rx) =
            crossbeam_channel::bounded(config.pipeline.channel_capacity.max(1));
        Self {
            opener,
            config,
            state: SessionState::Closed,
            session: None,
            sample_tx,
            sample_rx,
            next_index: Arc::new(AtomicU64::new(0)),
            metrics: Arc::new(LinkMetrics::new()),
            status: Arc::new(TracingStatusSink),
            last_error: Arc::new(Mutex::new(None)),
        }
    }

    pub fn with_status_sink(mut self, sink: Arc<dyn StatusSink>) -> Self {
        self.status = sink;
        self
    }

    /// Open `port` at `baud` and start acquisition.
    ///
    /// # Errors
    /// - `DriverError::AlreadyOpen` if a session is active, including a `Failed` one
    /// - `DriverError::Link` if the link cannot be acquired; the controller stays `Closed`
    /// - `DriverError::SpawnFailed` if a worker thread cannot start; the link is released
    pub fn open(&mut self, port: &str, baud: u32) -> Result<(), DriverError> {
        if let Some(session) = &self.session {
            return Err(DriverError::AlreadyOpen(session.port.clone()));
        }

        self.state = SessionState::Opening;
        info!("Opening {} at {} baud", port, baud);

        let halves = self
            .opener
            .open(port, baud, self.config.pipeline.read_timeout)
            .and_then(|link| link.split());
        let (reader, writer) = match halves {
            Ok(halves) => halves,
            Err(e) => {
                match &e {
                    LinkError::Device(d) if !d.is_fatal() => {
                        warn!("Port {} unavailable, may succeed later: {}", port, e)
                    },
                    _ => error!("Failed to open {}: {}", port, e),
                }
                self.status.push(&open_failed_line(&e));
                self.state = SessionState::Closed;
                return Err(e.into());
            },
        };

        *self.last_error.lock() = None;
        self.state = SessionState::Open;

        let ctx = ReaderContext {
            config: self.config.pipeline.clone(),
            is_running: Arc::new(AtomicBool::new(true)),
            next_index: self.next_index.clone(),
            metrics: self.metrics.clone(),
            status: self.status.clone(),
            last_error: self.last_error.clone(),
        };
        let link_alive = ctx.is_running.clone();
        let pipeline = match AcquisitionPipeline::spawn(reader, self.sample_tx.clone(), ctx) {
            Ok(pipeline) => pipeline,
            Err(e) => {
                error!("Failed to spawn reader thread: {}", e);
                drop(writer);
                return Err(self.abort_open(DriverError::SpawnFailed("reader")));
            },
        };

        let mut sequencer = CommandSequencer::new(
            writer,
            self.config.timing,
            self.metrics.clone(),
            self.status.clone(),
        )
        .with_link_guard(link_alive);
        if !sequencer.begin() {
            drop(sequencer);
            if pipeline.stop_and_join().is_err() {
                error!("RX thread panicked while aborting open");
            }
            return Err(self.abort_open(DriverError::SpawnFailed("sequencer")));
        }

        self.session = Some(Session {
            port: port.to_string(),
            baud,
            sequencer,
            pipeline,
        });
        self.status.push(&connected_line(port, baud));
        info!("Session open on {}", port);
        Ok(())
    }

    /// Report a failed `open()` after its link halves were dropped.
    fn abort_open(&mut self, error: DriverError) -> DriverError {
        self.status.push(&open_failed_line(&error));
        self.state = SessionState::Closed;
        error
    }

    /// Stop acquisition and release the link. No-op when nothing is open.
    ///
    /// Returns after the reader thread has terminated; no command frame is
    /// written once this starts.
    pub fn close(&mut self) -> Result<(), DriverError> {
        let Some(mut session) = self.session.take() else {
            return Ok(());
        };
        self.state = SessionState::Closing;
        info!("Closing session on {}", session.port);

        let writer = session.sequencer.release_writer();
        let reader = session.pipeline.stop_and_join();
        drop(session.sequencer);
        drop(writer);

        self.state = SessionState::Closed;
        match reader {
            Ok(reader) => {
                drop(reader);
                self.status.push(CLOSED_LINE);
                Ok(())
            },
            Err(_) => {
                error!("RX thread panicked during close");
                self.status.push(CLOSED_LINE);
                Err(DriverError::ThreadPanicked("reader".to_string()))
            },
        }
    }

    /// All samples queued right now, oldest first. Never blocks.
    pub fn drain_samples(&self) -> Vec<Sample> {
        self.sample_rx.try_iter().collect()
    }

    /// `Failed` as soon as the reader of an open session has stopped on an error.
    pub fn state(&self) -> SessionState {
        if self.state == SessionState::Open && !self.is_healthy() {
            SessionState::Failed
        } else {
            self.state
        }
    }

    /// True only while the session is open and healthy.
    pub fn is_open(&self) -> bool {
        self.state() == SessionState::Open
    }

    pub fn session(&self) -> Option<&Session<O::Link>> {
        self.session.as_ref()
    }

    /// `Idle` when no session is open.
    pub fn sequencer_state(&self) -> SequencerState {
        self.session
            .as_ref()
            .map_or(SequencerState::Idle, |s| s.sequencer_state())
    }

    /// False when no session is open or its reader has failed.
    pub fn is_healthy(&self) -> bool {
        self.session.as_ref().is_some_and(|s| s.is_healthy())
    }

    /// Take the fatal read error of the current or last session.
    pub fn take_last_error(&self) -> Option<LinkError> {
        self.last_error.lock().take()
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn available_ports(&self) -> Result<Vec<String>, DriverError> {
        Ok(self.opener.available_ports()?)
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }
}

impl<O: LinkOpener> Drop for SessionController<O> {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            error!("Failed to close session on drop: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ranger_link::mock::MockOpener;

    #[test]
    fn test_abort_open_leaves_controller_closed() {
        let lines = Arc::new(Mutex::new(Vec::<String>::new()));
        let lines_clone = lines.clone();
        let mut controller = SessionController::new(
            MockOpener::new(&["/dev/ttyMOCK0"]),
            SessionConfig::default(),
        )
        .with_status_sink(Arc::new(move |line: &str| {
            lines_clone.lock().push(line.to_string())
        }));
        controller.state = SessionState::Open;

        let err = controller.abort_open(DriverError::SpawnFailed("sequencer"));
        assert!(matches!(err, DriverError::SpawnFailed("sequencer")));
        assert_eq!(controller.state(), SessionState::Closed);
        assert!(controller.session().is_none());
        assert_eq!(
            *lines.lock(),
            vec!["Failed to open serial port: Failed to spawn sequencer thread".to_string()]
        );
    }

    #[test]
    fn test_state_without_session() {
        let controller =
            SessionController::new(MockOpener::new(&[]), SessionConfig::default());
        assert_eq!(controller.state(), SessionState::Closed);
        assert!(!controller.is_open());
        assert!(!controller.is_healthy());
        assert_eq!(controller.sequencer_state(), SequencerState::Idle);
    }
}
