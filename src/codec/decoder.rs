//! # Notification Decoder
//!
//! Decodes trainer measurements, Sterzo handshake frames and steering angles.
//!
//! Decoding is lenient: an undersized buffer never produces an error, the
//! affected field is simply reported absent. The only fallible decoder is
//! [`decode_control_command`], which reads back what was written to a trainer's
//! control point.

use bytes::Buf;

use super::protocol::*;
use crate::error::{BridgeError, Result};

/// Fields preceding resistance level, as (flag, width in bytes).
const SKIPPED_FTMS_FIELDS: [(u16, usize); 5] = [
    (ftms_flags::INST_SPEED, 2),
    (ftms_flags::AVG_SPEED, 2),
    (ftms_flags::INST_CADENCE, 2),
    (ftms_flags::AVG_CADENCE, 2),
    (ftms_flags::TOTAL_DISTANCE, 3),
];

/// Decode an FTMS Indoor Bike Data notification (0x2AD2).
///
/// Walks the flag bits in ascending order, advancing a running offset only for
/// fields that are present, and extracts resistance level (bit 5) and
/// instantaneous power (bit 6).
///
/// # Arguments
///
/// * `data` - Raw notification bytes, starting with the 2-byte flags field
///
/// # Returns
///
/// * `FtmsMeasurement` - Present fields; anything truncated is `None`
///
/// # Examples
///
/// ```
/// use trainer_bridge::codec::decoder::decode_ftms_measurement;
///
/// // Flags: power only. Power: 250 W.
/// let measurement = decode_ftms_measurement(&[0x40, 0x00, 0xFA, 0x00]);
/// assert_eq!(measurement.power_watts, Some(250));
/// assert_eq!(measurement.resistance_level, None);
/// ```
pub fn decode_ftms_measurement(data: &[u8]) -> FtmsMeasurement {
    let mut measurement = FtmsMeasurement::default();
    let mut buf = data;

    if buf.remaining() < 2 {
        return measurement;
    }
    let flags = buf.get_u16_le();

    for (flag, width) in SKIPPED_FTMS_FIELDS {
        if flags & flag != 0 {
            if buf.remaining() < width {
                return measurement;
            }
            buf.advance(width);
        }
    }

    if flags & ftms_flags::RESISTANCE_LEVEL != 0 {
        if buf.remaining() < 2 {
            return measurement;
        }
        measurement.resistance_level = Some(buf.get_i16_le());
    }

    if flags & ftms_flags::INST_POWER != 0 && buf.remaining() >= 2 {
        measurement.power_watts = Some(buf.get_i16_le());
    }

    measurement
}

/// Decode instantaneous power from a CPS measurement notification (0x2A63).
///
/// Power is a signed 16-bit little-endian value at byte offset 2.
pub fn decode_cps_power(data: &[u8]) -> Option<i16> {
    if data.len() < CPS_POWER_OFFSET + 2 {
        return None;
    }

    let mut buf = &data[CPS_POWER_OFFSET..];
    Some(buf.get_i16_le())
}

/// Decode a notification from the Sterzo challenge characteristic.
///
/// Returns `None` for frames that are undersized or carry an opcode the
/// handshake does not act on.
pub fn decode_sterzo_frame(data: &[u8]) -> Option<SterzoFrame> {
    let frame = Frame::sterzo(data).ok()?;

    match frame.opcode {
        STERZO_OP_CHALLENGE if frame.payload.len() >= 2 => {
            let mut payload = frame.payload.as_slice();
            Some(SterzoFrame::Challenge(payload.get_u16_le()))
        }
        STERZO_OP_FINISHED => frame
            .payload
            .first()
            .map(|&status| SterzoFrame::Finished(HandshakeStatus::from(status))),
        _ => None,
    }
}

/// Decode a Sterzo steering notification: little-endian `f32` degrees at offset 0.
pub fn decode_steering_angle(data: &[u8]) -> Option<f32> {
    if data.len() < 4 {
        return None;
    }

    let mut buf = data;
    Some(buf.get_f32_le())
}

/// Decode a write destined for the FTMS control point.
///
/// # Errors
///
/// Returns error if the frame is empty, truncated, or uses an unknown opcode
pub fn decode_control_command(data: &[u8]) -> Result<ControlCommand> {
    let frame = Frame::control_point(data)?;

    match frame.opcode as u8 {
        FTMS_OP_REQUEST_CONTROL => Ok(ControlCommand::RequestControl),
        FTMS_OP_SET_TARGET_INCLINE => {
            let mut payload = frame.payload.as_slice();
            if payload.remaining() < 2 {
                return Err(BridgeError::Protocol(format!(
                    "Set incline payload too short: {} bytes",
                    payload.len()
                )));
            }
            Ok(ControlCommand::SetTargetIncline(payload.get_i16_le()))
        }
        other => Err(BridgeError::Protocol(format!(
            "Unknown control point opcode: 0x{:02X}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::encoder::{encode_request_control, encode_set_incline};

    #[test]
    fn test_ftms_resistance_and_power() {
        // Flags 0b1100000: resistance -12, power 250
        let data = [0x60, 0x00, 0xF4, 0xFF, 0xFA, 0x00];
        let measurement = decode_ftms_measurement(&data);

        assert_eq!(measurement.resistance_level, Some(-12));
        assert_eq!(measurement.power_watts, Some(250));
    }

    #[test]
    fn test_ftms_skips_present_fields() {
        // Speed, cadence and distance present ahead of power
        let flags = ftms_flags::INST_SPEED
            | ftms_flags::INST_CADENCE
            | ftms_flags::TOTAL_DISTANCE
            | ftms_flags::INST_POWER;
        let mut data = flags.to_le_bytes().to_vec();
        data.extend_from_slice(&[0x10, 0x27]); // speed
        data.extend_from_slice(&[0xB4, 0x00]); // cadence
        data.extend_from_slice(&[0x01, 0x02, 0x03]); // distance
        data.extend_from_slice(&300i16.to_le_bytes()); // power

        let measurement = decode_ftms_measurement(&data);
        assert_eq!(measurement.power_watts, Some(300));
        assert_eq!(measurement.resistance_level, None);
    }

    #[test]
    fn test_ftms_all_skipped_fields() {
        let flags = 0b0111_1111u16;
        let mut data = flags.to_le_bytes().to_vec();
        data.extend_from_slice(&[0u8; 11]);
        data.extend_from_slice(&45i16.to_le_bytes());
        data.extend_from_slice(&(-5i16).to_le_bytes());

        let measurement = decode_ftms_measurement(&data);
        assert_eq!(measurement.resistance_level, Some(45));
        assert_eq!(measurement.power_watts, Some(-5));
    }

    #[test]
    fn test_ftms_truncated_power() {
        // Power flagged but only one byte follows
        let data = [0x40, 0x00, 0xFA];
        let measurement = decode_ftms_measurement(&data);
        assert_eq!(measurement.power_watts, None);
    }

    #[test]
    fn test_ftms_truncated_skipped_field() {
        // Distance flagged but missing; power cannot be located
        let data = [0x50, 0x00, 0x01];
        let measurement = decode_ftms_measurement(&data);
        assert_eq!(measurement, FtmsMeasurement::default());
    }

    #[test]
    fn test_ftms_resistance_present_power_truncated() {
        let data = [0x60, 0x00, 0x0A, 0x00, 0x01];
        let measurement = decode_ftms_measurement(&data);
        assert_eq!(measurement.resistance_level, Some(10));
        assert_eq!(measurement.power_watts, None);
    }

    #[test]
    fn test_ftms_short_flags() {
        assert_eq!(decode_ftms_measurement(&[]), FtmsMeasurement::default());
        assert_eq!(decode_ftms_measurement(&[0x40]), FtmsMeasurement::default());
    }

    #[test]
    fn test_cps_power() {
        let data = [0x00, 0x00, 0x2C, 0x01, 0xFF, 0xFF];
        assert_eq!(decode_cps_power(&data), Some(300));
        assert_eq!(decode_cps_power(&[0x00, 0x00, 0x2C]), None);
    }

    #[test]
    fn test_sterzo_challenge() {
        let data = [0x03, 0x10, 0x39, 0x30];
        assert_eq!(decode_sterzo_frame(&data), Some(SterzoFrame::Challenge(12345)));
    }

    #[test]
    fn test_sterzo_challenge_too_short() {
        assert_eq!(decode_sterzo_frame(&[0x03, 0x10, 0x39]), None);
    }

    #[test]
    fn test_sterzo_finished() {
        assert_eq!(
            decode_sterzo_frame(&[0x03, 0x11, 0xFF]),
            Some(SterzoFrame::Finished(HandshakeStatus::Accepted))
        );
        assert_eq!(
            decode_sterzo_frame(&[0x03, 0x11, 0xFE]),
            Some(SterzoFrame::Finished(HandshakeStatus::Rejected))
        );
        assert_eq!(
            decode_sterzo_frame(&[0x03, 0x11, 0x00]),
            Some(SterzoFrame::Finished(HandshakeStatus::Pending(0x00)))
        );
    }

    #[test]
    fn test_sterzo_finished_too_short() {
        assert_eq!(decode_sterzo_frame(&[0x03, 0x11]), None);
    }

    #[test]
    fn test_sterzo_unknown_opcode() {
        assert_eq!(decode_sterzo_frame(&[0x01, 0x02, 0x03, 0x04]), None);
    }

    #[test]
    fn test_steering_angle() {
        let data = (-12.5f32).to_le_bytes();
        assert_eq!(decode_steering_angle(&data), Some(-12.5));
        assert_eq!(decode_steering_angle(&data[..3]), None);
    }

    #[test]
    fn test_control_command_incline_across_clamp_bounds() {
        for (grade, expected) in [(-25.0, -250), (0.0, 0), (40.0, 400), (999.0, 400), (-80.0, -250)] {
            let frame = encode_set_incline(grade);
            assert_eq!(
                decode_control_command(&frame).unwrap(),
                ControlCommand::SetTargetIncline(expected),
                "grade {}",
                grade
            );
        }
    }

    #[test]
    fn test_control_command_request_control() {
        let frame = encode_request_control();
        assert_eq!(decode_control_command(&frame).unwrap(), ControlCommand::RequestControl);
    }

    #[test]
    fn test_control_command_errors() {
        assert!(decode_control_command(&[]).is_err());
        assert!(decode_control_command(&[0x11, 0x01]).is_err());
        assert!(decode_control_command(&[0x42]).is_err());
    }
}
