//! Inbound measurement reports
//!
//! The sensor answers with 8-byte windows keyed `0x07`:
//!
//! ```text
//! [0]=0x55 | [1]=0x07 | [2]=status | [3..6]=distance_mm (u24, BE) | [6]=CRC | [7]=0xAA
//! ```
//!
//! [`decode`] only looks at the key byte. Head, tail and CRC are not checked,
//! so a byte-misaligned stream can still produce an event. [`decode_strict`]
//! checks all three.

use crate::crc::crc8_high_first;
use crate::{
    FRAME_HEAD, FRAME_LEN, FRAME_TAIL, KEY_MEASUREMENT_REPORT, ProtocolError, bytes_to_u24_be,
};

/// A decoded measurement report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SensorEvent {
    /// Status byte reported by the sensor.
    pub status: u8,
    /// Measured distance in millimetres (24-bit range).
    pub distance_mm: u32,
}

impl std::fmt::Display for SensorEvent {
    /// Log line format consumed by existing log readers. Keep it byte-identical.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Status:{}\tDistance:{} mm", self.status, self.distance_mm)
    }
}

/// Decode one window, filtering on the key byte only.
///
/// Returns `None` for any key other than `0x07`.
///
/// # Example
///
/// ```
/// use ranger_protocol::decode;
///
/// let event = decode([0x55, 0x07, 0x01, 0x00, 0x01, 0x2C, 0x00, 0xAA]).unwrap();
/// assert_eq!(event.status, 1);
/// assert_eq!(event.distance_mm, 300);
/// ```
pub fn decode(window: [u8; FRAME_LEN]) -> Option<SensorEvent> {
    if window[1] != KEY_MEASUREMENT_REPORT {
        return None;
    }
    Some(SensorEvent {
        status: window[2],
        distance_mm: bytes_to_u24_be([window[3], window[4], window[5]]),
    })
}

/// Decode one window after validating head, tail and checksum.
///
/// `Ok(None)` means a well-formed frame with a key other than `0x07`.
pub fn decode_strict(window: [u8; FRAME_LEN]) -> Result<Option<SensorEvent>, ProtocolError> {
    if window[0] != FRAME_HEAD {
        return Err(ProtocolError::BadHead { found: window[0] });
    }
    if window[7] != FRAME_TAIL {
        return Err(ProtocolError::BadTail { found: window[7] });
    }
    let expected = crc8_high_first(window[1], [window[2], window[3], window[4], window[5]]);
    if window[6] != expected {
        return Err(ProtocolError::BadChecksum {
            expected,
            received: window[6],
        });
    }
    Ok(decode(window))
}
