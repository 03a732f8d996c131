//! # Ranger Protocol
//!
//! Wire format of the ranging sensor's serial link (no hardware dependencies).
//!
//! ## Modules
//!
//! - `crc`: the sensor's bit-serial CRC-8 (poly 0x31)
//! - `command`: outgoing command frames
//! - `report`: inbound measurement reports
//!
//! ## Frame layout
//!
//! Every frame is exactly 8 bytes:
//!
//! ```text
//! [0]=0x55 head | [1]=key | [2..6]=value[4] | [6]=CRC8(key,value) | [7]=0xAA tail
//! ```
//!
//! Multi-byte fields are big-endian (MSB first).

pub mod command;
pub mod crc;
pub mod report;

pub use command::*;
pub use crc::*;
pub use report::*;

use thiserror::Error;

/// Frame head byte.
pub const FRAME_HEAD: u8 = 0x55;
/// Frame tail byte.
pub const FRAME_TAIL: u8 = 0xAA;
/// Fixed frame length in bytes.
pub const FRAME_LEN: usize = 8;

/// Key of the START_DETECT command.
pub const KEY_START_DETECT: u8 = 0x05;
/// Key of the STOP_DETECT command.
pub const KEY_STOP_DETECT: u8 = 0x06;
/// Key of the measurement report sent by the sensor.
pub const KEY_MEASUREMENT_REPORT: u8 = 0x07;
/// Key of the SET_MODE command.
pub const KEY_SET_MODE: u8 = 0x0D;

/// Protocol-level errors.
///
/// Only produced by the strict decoder; the lenient path never fails.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Invalid frame length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("Bad frame head: 0x{found:02X}")]
    BadHead { found: u8 },

    #[error("Bad frame tail: 0x{found:02X}")]
    BadTail { found: u8 },

    #[error("Bad checksum: expected 0x{expected:02X}, received 0x{received:02X}")]
    BadChecksum { expected: u8, received: u8 },
}

/// Big-endian 24-bit value from three bytes.
pub fn bytes_to_u24_be(bytes: [u8; 3]) -> u32 {
    (u32::from(bytes[0]) << 16) | (u32::from(bytes[1]) << 8) | u32::from(bytes[2])
}

/// An 8-byte window taken off the wire.
///
/// Returns `ProtocolError::InvalidLength` unless `bytes` holds exactly one frame.
pub fn window_from_slice(bytes: &[u8]) -> Result<[u8; FRAME_LEN], ProtocolError> {
    bytes.try_into().map_err(|_| ProtocolError::InvalidLength {
        expected: FRAME_LEN,
        actual: bytes.len(),
    })
}
