/*!
 * Write-side primitive codec: fixed-width big-endian encoders used by the
 * atom payload writers. Each function returns exactly the bytes it encodes;
 * padding regions are emitted through [`crate::writer::GuardedSink::write_zeros`].
 */

use crate::atom::util::parser::{FIXED_POINT_16X16_SCALE, FIXED_POINT_8X8_SCALE};

pub fn be_u16(value: u16) -> [u8; 2] {
    value.to_be_bytes()
}

pub fn be_u24(value: u32) -> [u8; 3] {
    let bytes = value.to_be_bytes();
    [bytes[1], bytes[2], bytes[3]]
}

pub fn be_u32(value: u32) -> [u8; 4] {
    value.to_be_bytes()
}

pub fn be_i16(value: i16) -> [u8; 2] {
    value.to_be_bytes()
}

pub fn be_i32(value: i32) -> [u8; 4] {
    value.to_be_bytes()
}

/// 16.16 fixed point: value scaled by 2^16, truncated.
pub fn fixed_point_16x16(val: f64) -> [u8; 4] {
    let fixed = (val * FIXED_POINT_16X16_SCALE) as u32;
    fixed.to_be_bytes()
}

/// 8.8 fixed point: value scaled by 2^8, truncated.
pub fn fixed_point_8x8(val: f64) -> [u8; 2] {
    let fixed = (val * FIXED_POINT_8X8_SCALE) as u16;
    fixed.to_be_bytes()
}

/// Seconds since the QuickTime epoch (1904-01-01T00:00:00Z).
pub fn qt_date(seconds: u32) -> [u8; 4] {
    be_u32(seconds)
}
