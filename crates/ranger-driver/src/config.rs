//! Session configuration
//!
//! Defaults match the sensor's protocol: 100 ms settle steps during bring-up,
//! a 20 ms START_DETECT cadence, a 10 ms idle poll and a 1 s read timeout.

use std::time::Duration;

/// Delays of the command sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequencerTiming {
    /// Wait after STOP_DETECT before SET_MODE.
    pub stop_settle: Duration,
    /// Wait after SET_MODE before the first START_DETECT.
    pub mode_settle: Duration,
    /// Period of the START_DETECT loop.
    pub detect_period: Duration,
}

impl Default for SequencerTiming {
    fn default() -> Self {
        Self {
            stop_settle: Duration::from_millis(100),
            mode_settle: Duration::from_millis(100),
            detect_period: Duration::from_millis(20),
        }
    }
}

/// How inbound windows are checked before decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FrameValidation {
    /// Key byte only; head, tail and CRC are not checked.
    #[default]
    Lenient,
    /// Head, tail and CRC must be valid; failures are counted as rejected frames.
    Strict,
}

/// Reader thread configuration.
///
/// # Example
///
/// ```
/// use ranger_driver::{FrameValidation, PipelineConfig};
/// use std::time::Duration;
///
/// let config = PipelineConfig {
///     poll_interval: Duration::from_millis(5),
///     validation: FrameValidation::Strict,
///     ..PipelineConfig::default()
/// };
/// assert_eq!(config.read_timeout, Duration::from_secs(1));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Back-off while no bytes are available.
    pub poll_interval: Duration,
    /// Upper bound of a blocking 8-byte read.
    pub read_timeout: Duration,
    /// Sample channel capacity. The reader blocks when it is full.
    pub channel_capacity: usize,
    pub validation: FrameValidation,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(10),
            read_timeout: Duration::from_secs(1),
            channel_capacity: 1024,
            validation: FrameValidation::Lenient,
        }
    }
}

/// Complete configuration of a [`SessionController`](crate::SessionController).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SessionConfig {
    pub pipeline: PipelineConfig,
    pub timing: SequencerTiming,
}

impl SessionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pipeline(mut self, pipeline: PipelineConfig) -> Self {
        self.pipeline = pipeline;
        self
    }

    pub fn timing(mut self, timing: SequencerTiming) -> Self {
        self.timing = timing;
        self
    }

    pub fn validation(mut self, validation: FrameValidation) -> Self {
        self.pipeline.validation = validation;
        self
    }

    pub fn channel_capacity(mut self, capacity: usize) -> Self {
        self.pipeline.channel_capacity = capacity;
        self
    }

    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.pipeline.read_timeout = timeout;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_defaults() {
        let config = SessionConfig::default();
        assert_eq!(config.timing.stop_settle, Duration::from_millis(100));
        assert_eq!(config.timing.mode_settle, Duration::from_millis(100));
        assert_eq!(config.timing.detect_period, Duration::from_millis(20));
        assert_eq!(config.pipeline.poll_interval, Duration::from_millis(10));
        assert_eq!(config.pipeline.read_timeout, Duration::from_secs(1));
        assert_eq!(config.pipeline.validation, FrameValidation::Lenient);
    }

    #[test]
    fn test_builder_setters() {
        let config = SessionConfig::new()
            .validation(FrameValidation::Strict)
            .channel_capacity(4)
            .read_timeout(Duration::from_millis(50));
        assert_eq!(config.pipeline.validation, FrameValidation::Strict);
        assert_eq!(config.pipeline.channel_capacity, 4);
        assert_eq!(config.pipeline.read_timeout, Duration::from_millis(50));
        assert_eq!(config.timing, SequencerTiming::default());
    }
}
