//! Monitor command
//!
//! Opens the sensor, prints one status line per reading and closes the
//! port on Ctrl+C, after `--count` samples or after `--duration` seconds.

use anyhow::{Context, Result};
use clap::Args;
use ranger_driver::{FrameValidation, SessionConfig, SessionController, StatusSink};
use ranger_link::SerialOpener;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{info, warn};

use super::config::CliConfig;

#[derive(Args, Debug)]
pub struct MonitorCommand {
    /// Serial port (overrides config)
    #[arg(short, long)]
    pub port: Option<String>,

    /// Baud rate (overrides config)
    #[arg(short, long)]
    pub baud: Option<u32>,

    /// Reject report frames with a bad head, tail or CRC
    #[arg(long)]
    pub strict: bool,

    /// Stop after this many samples
    #[arg(short, long)]
    pub count: Option<u64>,

    /// Stop after this many seconds, 0 means until Ctrl+C
    #[arg(short, long, default_value_t = 0)]
    pub duration: u64,
}

impl MonitorCommand {
    pub fn execute(self, running: Arc<AtomicBool>) -> Result<()> {
        let config = CliConfig::load()?;
        let port = self.port.or(config.port.clone()).context(
            "No serial port given; pass --port or run `ranger-cli config set --port <PORT>`",
        )?;
        let baud = self.baud.unwrap_or_else(|| config.baud_or_default());

        let validation = if self.strict {
            FrameValidation::Strict
        } else {
            FrameValidation::Lenient
        };
        let session_config = SessionConfig::new().validation(validation);

        let sink: Arc<dyn StatusSink> = Arc::new(|line: &str| println!("{}", line));
        let mut controller =
            SessionController::new(SerialOpener, session_config).with_status_sink(sink);
        controller.open(&port, baud)?;

        let limit = (self.duration > 0).then(|| Duration::from_secs(self.duration));
        let start = Instant::now();
        let mut received = 0u64;
        let mut failure = None;

        while running.load(Ordering::SeqCst) {
            received += controller.drain_samples().len() as u64;

            if self.count.is_some_and(|count| received >= count) {
                break;
            }
            if limit.is_some_and(|limit| start.elapsed() >= limit) {
                break;
            }
            if !controller.is_healthy() {
                failure = controller.take_last_error();
                warn!("Reader stopped: {:?}", failure);
                break;
            }
            std::thread::sleep(Duration::from_millis(20));
        }

        controller.close()?;
        received += controller.drain_samples().len() as u64;

        let metrics = controller.metrics();
        info!(
            "{} samples, {} windows ({:.0}% usable, {} ignored, {} rejected), {} commands sent",
            received,
            metrics.rx_windows,
            metrics.sample_ratio() * 100.0,
            metrics.rx_ignored_windows,
            metrics.rx_rejected_frames,
            metrics.tx_frames
        );

        match failure {
            Some(e) => Err(anyhow::Error::new(e).context(format!("Lost connection to {}", port))),
            None => Ok(()),
        }
    }
}
