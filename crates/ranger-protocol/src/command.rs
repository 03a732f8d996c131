//! Outgoing command frames
//!
//! Builds the 8-byte frames written to the sensor. Encoding is pure and
//! cannot fail: every `(key, value)` pair maps to exactly one frame.

use crate::crc::crc8_high_first;
use crate::{
    FRAME_HEAD, FRAME_LEN, FRAME_TAIL, KEY_SET_MODE, KEY_START_DETECT, KEY_STOP_DETECT,
};

/// A command frame ready to be written to the link.
///
/// Immutable once built; `crc` always equals `CRC8(key ++ value)`.
/// Deserializing recomputes the checksum, a serialized `crc` is ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(from = "CommandFields"))]
pub struct CommandFrame {
    key: u8,
    value: [u8; 4],
    crc: u8,
}

impl CommandFrame {
    /// Frame key.
    pub fn key(&self) -> u8 {
        self.key
    }

    /// Four value bytes.
    pub fn value(&self) -> [u8; 4] {
        self.value
    }

    /// Checksum byte placed at offset 6.
    pub fn crc(&self) -> u8 {
        self.crc
    }

    /// Wire representation.
    pub fn to_bytes(&self) -> [u8; FRAME_LEN] {
        [
            FRAME_HEAD,
            self.key,
            self.value[0],
            self.value[1],
            self.value[2],
            self.value[3],
            self.crc,
            FRAME_TAIL,
        ]
    }
}

#[cfg(feature = "serde")]
#[derive(serde::Deserialize)]
struct CommandFields {
    key: u8,
    value: [u8; 4],
}

#[cfg(feature = "serde")]
impl From<CommandFields> for CommandFrame {
    fn from(fields: CommandFields) -> Self {
        encode(fields.key, fields.value)
    }
}

impl From<CommandFrame> for [u8; FRAME_LEN] {
    fn from(frame: CommandFrame) -> Self {
        frame.to_bytes()
    }
}

/// Build a command frame for `key` and `value`.
///
/// # Example
///
/// ```
/// use ranger_protocol::encode;
///
/// let frame = encode(0x05, [0, 0, 0, 0]);
/// assert_eq!(frame.to_bytes(), [0x55, 0x05, 0x00, 0x00, 0x00, 0x00, 0xCC, 0xAA]);
/// ```
pub fn encode(key: u8, value: [u8; 4]) -> CommandFrame {
    CommandFrame {
        key,
        value,
        crc: crc8_high_first(key, value),
    }
}

/// Commands understood by the sensor firmware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Command {
    /// Trigger a measurement (0x05).
    StartDetect,
    /// Stop measuring (0x06).
    StopDetect,
    /// Select the periodic measurement mode (0x0D, value `00 00 00 01`).
    SetMode,
}

impl Command {
    /// Frame key of this command.
    pub fn key(self) -> u8 {
        match self {
            Command::StartDetect => KEY_START_DETECT,
            Command::StopDetect => KEY_STOP_DETECT,
            Command::SetMode => KEY_SET_MODE,
        }
    }

    /// Value bytes of this command.
    pub fn value(self) -> [u8; 4] {
        match self {
            Command::StartDetect | Command::StopDetect => [0x00, 0x00, 0x00, 0x00],
            Command::SetMode => [0x00, 0x00, 0x00, 0x01],
        }
    }

    /// Encoded frame.
    pub fn frame(self) -> CommandFrame {
        encode(self.key(), self.value())
    }

    /// Name used in logs.
    pub fn name(self) -> &'static str {
        match self {
            Command::StartDetect => "START_DETECT",
            Command::StopDetect => "STOP_DETECT",
            Command::SetMode => "SET_MODE",
        }
    }
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_frames_on_the_wire() {
        assert_eq!(
            Command::StartDetect.frame().to_bytes(),
            [0x55, 0x05, 0x00, 0x00, 0x00, 0x00, 0xCC, 0xAA]
        );
        assert_eq!(
            Command::StopDetect.frame().to_bytes(),
            [0x55, 0x06, 0x00, 0x00, 0x00, 0x00, 0x88, 0xAA]
        );
        assert_eq!(
            Command::SetMode.frame().to_bytes(),
            [0x55, 0x0D, 0x00, 0x00, 0x00, 0x01, 0xC3, 0xAA]
        );
    }

    #[test]
    fn test_encode_is_deterministic() {
        let a = encode(0x42, [1, 2, 3, 4]);
        let b = encode(0x42, [1, 2, 3, 4]);
        assert_eq!(a, b);
        assert_eq!(a.key(), 0x42);
        assert_eq!(a.value(), [1, 2, 3, 4]);
    }

    #[test]
    fn test_frame_into_bytes() {
        let bytes: [u8; FRAME_LEN] = Command::SetMode.frame().into();
        assert_eq!(bytes[0], FRAME_HEAD);
        assert_eq!(bytes[7], FRAME_TAIL);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_deserialize_recomputes_crc() {
        let frame: CommandFrame = toml::from_str("key = 5\nvalue = [0, 0, 0, 0]\ncrc = 0\n").unwrap();
        assert_eq!(frame, Command::StartDetect.frame());
        assert_eq!(frame.crc(), 0xCC);

        let text = toml::to_string(&Command::SetMode.frame()).unwrap();
        let back: CommandFrame = toml::from_str(&text).unwrap();
        assert_eq!(back.to_bytes(), [0x55, 0x0D, 0x00, 0x00, 0x00, 0x01, 0xC3, 0xAA]);
    }

    #[test]
    fn test_command_display() {
        assert_eq!(Command::StartDetect.to_string(), "START_DETECT");
        assert_eq!(format!("{}", Command::SetMode), "SET_MODE");
    }
}
