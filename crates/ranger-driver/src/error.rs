//! Driver error types

use ranger_link::LinkError;
use thiserror::Error;

/// Driver error type
#[derive(Error, Debug)]
pub enum DriverError {
    /// Link could not be opened, split or used
    #[error("Link error: {0}")]
    Link(#[from] LinkError),

    /// `open` called while a session is active
    #[error("Session already open on {0}")]
    AlreadyOpen(String),

    /// A worker thread could not be started
    #[error("Failed to spawn {0} thread")]
    SpawnFailed(&'static str),

    /// A worker thread panicked before it could be joined cleanly
    #[error("Thread panicked: {0}")]
    ThreadPanicked(String),
}

#[cfg(test)]
mod tests {
    use super::DriverError;
    use ranger_link::LinkError;

    #[test]
    fn test_driver_error_display() {
        let msg = format!("{}", DriverError::Link(LinkError::Timeout));
        assert_eq!(msg, "Link error: Read timeout");

        let msg = format!("{}", DriverError::AlreadyOpen("/dev/ttyUSB0".to_string()));
        assert_eq!(msg, "Session already open on /dev/ttyUSB0");

        let msg = format!("{}", DriverError::SpawnFailed("sequencer"));
        assert_eq!(msg, "Failed to spawn sequencer thread");

        let msg = format!("{}", DriverError::ThreadPanicked("reader".to_string()));
        assert!(msg.contains("reader"));
    }

    #[test]
    fn test_from_link_error() {
        let err: DriverError = LinkError::InvalidBaud(0).into();
        assert!(matches!(err, DriverError::Link(LinkError::InvalidBaud(0))));
    }
}
