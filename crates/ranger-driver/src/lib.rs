//! # Ranger Driver
//!
//! Keeps a ranging sensor measuring and delivers its readings.
//!
//! - `sequencer`: timed bring-up (STOP → SET_MODE → START) and the periodic
//!   START_DETECT loop, on its own thread
//! - `pipeline`: reader thread turning link bytes into ordered [`Sample`]s on a
//!   bounded channel (blocks when full, never drops)
//! - `session`: [`SessionController`] owning the open/close lifecycle
//! - `status`: human-readable status lines for display
//!
//! ```rust,no_run
//! use ranger_driver::{SessionConfig, SessionController};
//! use ranger_link::SerialOpener;
//!
//! # fn main() -> Result<(), ranger_driver::DriverError> {
//! let mut controller = SessionController::new(SerialOpener, SessionConfig::default());
//! controller.open("/dev/ttyUSB0", 115_200)?;
//! for sample in controller.drain_samples() {
//!     println!("#{} {} mm", sample.sequence_index, sample.distance_mm);
//! }
//! controller.close()?;
//! # Ok(())
//! # }
//! ```

pub mod config;
mod error;
pub mod metrics;
pub mod pipeline;
pub mod sequencer;
pub mod session;
pub mod status;

pub use config::{FrameValidation, PipelineConfig, SequencerTiming, SessionConfig};
pub use error::DriverError;
pub use metrics::{LinkMetrics, MetricsSnapshot};
pub use pipeline::{AcquisitionPipeline, ReaderContext, Sample, rx_loop};
pub use sequencer::{AtomicSequencerState, CommandSequencer, SequencerState, Transition};
pub use session::{Session, SessionController, SessionState};
pub use status::{ChannelStatusSink, StatusSink, TracingStatusSink};
