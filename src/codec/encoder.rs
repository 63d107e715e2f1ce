//! # Control Frame Encoder
//!
//! Encodes FTMS control point writes and Sterzo handshake writes.

use bytes::BufMut;

use super::protocol::*;

/// Encode an FTMS "set target incline" control point write.
///
/// The grade is clamped to [-25, 40] percent, scaled to tenths of a percent and
/// rounded to the nearest integer, with halves rounding up.
///
/// # Arguments
///
/// * `grade_percent` - Road grade in percent
///
/// # Returns
///
/// * `Vec<u8>` - 3-byte frame: opcode `0x11` followed by an `i16` little-endian
///
/// # Examples
///
/// ```
/// use trainer_bridge::codec::encoder::encode_set_incline;
///
/// assert_eq!(encode_set_incline(5.0), vec![0x11, 0x32, 0x00]);
/// ```
pub fn encode_set_incline(grade_percent: f64) -> Vec<u8> {
    let value = incline_to_wire(grade_percent);

    let mut frame = Vec::with_capacity(FTMS_SET_INCLINE_FRAME_LEN);
    frame.put_u8(FTMS_OP_SET_TARGET_INCLINE);
    frame.put_i16_le(value);
    frame
}

/// Convert a grade in percent to the wire value in tenths of a percent.
///
/// Non-finite input is treated as flat road.
pub fn incline_to_wire(grade_percent: f64) -> i16 {
    if !grade_percent.is_finite() {
        return 0;
    }

    let clamped = grade_percent.clamp(INCLINE_MIN_PERCENT, INCLINE_MAX_PERCENT);
    // Halves round toward +inf: -12.5 tenths is -12
    (clamped * INCLINE_UNITS_PER_PERCENT + 0.5).floor() as i16
}

/// Encode the FTMS "request control" write (a single zero byte).
pub fn encode_request_control() -> Vec<u8> {
    vec![FTMS_OP_REQUEST_CONTROL]
}

/// Encode the Sterzo trigger write that asks the plate for a challenge.
pub fn encode_sterzo_trigger() -> Vec<u8> {
    STERZO_TRIGGER.to_vec()
}

/// Encode the 4-byte Sterzo challenge response write.
///
/// # Arguments
///
/// * `response` - Output of [`response_code`](super::auth::response_code)
pub fn encode_sterzo_response(response: u16) -> Vec<u8> {
    let mut frame = Vec::with_capacity(4);
    frame.put_slice(&STERZO_RESPONSE_PREFIX);
    frame.put_u16_le(response);
    frame
}
