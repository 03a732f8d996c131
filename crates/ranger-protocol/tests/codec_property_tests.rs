//! Frame codec property tests
//!
//! Uses proptest to check the CRC and decode properties over random input.

use proptest::prelude::*;
use ranger_protocol::*;

/// Reference bit-serial CRC kept independent from the crate's implementation.
fn reference_crc(key: u8, value: [u8; 4]) -> u8 {
    let mut crc: u32 = 0;
    for b in [key, value[0], value[1], value[2], value[3]] {
        crc ^= u32::from(b);
        for _ in 0..8 {
            if crc & 0x80 != 0 {
                crc = (crc << 1) ^ 0x31;
            } else {
                crc <<= 1;
            }
        }
        crc &= 0xFF;
    }
    crc as u8
}

proptest! {
    /// The byte at offset 6 equals an independent recomputation over key ++ value
    #[test]
    fn encoded_crc_matches_recomputation(key in any::<u8>(), value in any::<[u8; 4]>()) {
        let bytes = encode(key, value).to_bytes();
        prop_assert_eq!(bytes[6], reference_crc(key, value));
        prop_assert_eq!(bytes[6], crc8_high_first(key, value));
    }

    /// Head, key, value and tail land at their fixed offsets
    #[test]
    fn encoded_layout(key in any::<u8>(), value in any::<[u8; 4]>()) {
        let bytes = encode(key, value).to_bytes();
        prop_assert_eq!(bytes[0], FRAME_HEAD);
        prop_assert_eq!(bytes[1], key);
        prop_assert_eq!(&bytes[2..6], &value[..]);
        prop_assert_eq!(bytes[7], FRAME_TAIL);
    }

    /// Appending the CRC leaves a zero remainder
    #[test]
    fn crc_residue_is_zero(key in any::<u8>(), value in any::<[u8; 4]>()) {
        let bytes = encode(key, value).to_bytes();
        prop_assert_eq!(crc8(&bytes[1..7]), 0);
    }

    /// Any window whose key byte is not 0x07 decodes to nothing
    #[test]
    fn non_report_windows_are_ignored(mut window in any::<[u8; 8]>()) {
        if window[1] == KEY_MEASUREMENT_REPORT {
            window[1] = 0x00;
        }
        prop_assert_eq!(decode(window), None);
    }

    /// Report windows carry the 24-bit big-endian distance
    #[test]
    fn report_distance_roundtrip(status in any::<u8>(), distance in 0u32..=0x00FF_FFFF) {
        let [_, b0, b1, b2] = distance.to_be_bytes();
        let value = [status, b0, b1, b2];
        let window = encode(KEY_MEASUREMENT_REPORT, value).to_bytes();

        let event = decode(window).unwrap();
        prop_assert_eq!(event.status, status);
        prop_assert_eq!(event.distance_mm, distance);
        prop_assert_eq!(decode_strict(window), Ok(Some(event)));
    }

    /// Flipping any bit of the checksum makes the strict decoder reject the frame
    #[test]
    fn strict_decode_detects_crc_corruption(value in any::<[u8; 4]>(), bit in 0u8..8) {
        let mut window = encode(KEY_MEASUREMENT_REPORT, value).to_bytes();
        window[6] ^= 1 << bit;
        let rejected = matches!(decode_strict(window), Err(ProtocolError::BadChecksum { .. }));
        prop_assert!(rejected);
    }
}
