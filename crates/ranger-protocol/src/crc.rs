//! CRC-8 used by the sensor's frames.
//!
//! Generator polynomial 0x31 (x^8 + x^5 + x^4 + 1), initial value 0, MSB first,
//! no reflection and no final XOR. Computed bit by bit without a lookup table.

/// Generator polynomial.
pub const CRC8_POLY: u8 = 0x31;

/// CRC-8 over an arbitrary byte slice.
pub fn crc8(bytes: &[u8]) -> u8 {
    let mut crc: u8 = 0x00;
    for &b in bytes {
        crc ^= b;
        for _ in 0..8 {
            crc = if crc & 0x80 != 0 {
                (crc << 1) ^ CRC8_POLY
            } else {
                crc << 1
            };
        }
    }
    crc
}

/// CRC-8 over `key ++ value`, the byte placed at offset 6 of every frame.
pub fn crc8_high_first(key: u8, value: [u8; 4]) -> u8 {
    crc8(&[key, value[0], value[1], value[2], value[3]])
}
