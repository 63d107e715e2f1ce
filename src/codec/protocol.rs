//! # Wire Protocol Constants and Types
//!
//! Opcodes, flag bits and frame types shared by the FTMS/CPS trainer link and
//! the Sterzo steering plate.

use crate::error::{BridgeError, Result};

/// FTMS control point: request control of the fitness machine
pub const FTMS_OP_REQUEST_CONTROL: u8 = 0x00;

/// FTMS control point: set indoor bike simulation / target incline
pub const FTMS_OP_SET_TARGET_INCLINE: u8 = 0x11;

/// Set-incline frame length (opcode + i16)
pub const FTMS_SET_INCLINE_FRAME_LEN: usize = 3;

/// Lowest grade a trainer is commanded to (percent)
pub const INCLINE_MIN_PERCENT: f64 = -25.0;

/// Highest grade a trainer is commanded to (percent)
pub const INCLINE_MAX_PERCENT: f64 = 40.0;

/// Incline resolution on the wire (tenths of a percent)
pub const INCLINE_UNITS_PER_PERCENT: f64 = 10.0;

/// FTMS Indoor Bike Data flag bits, in field order.
pub mod ftms_flags {
    /// Instantaneous speed (u16)
    pub const INST_SPEED: u16 = 1 << 0;
    /// Average speed (u16)
    pub const AVG_SPEED: u16 = 1 << 1;
    /// Instantaneous cadence (u16)
    pub const INST_CADENCE: u16 = 1 << 2;
    /// Average cadence (u16)
    pub const AVG_CADENCE: u16 = 1 << 3;
    /// Total distance (u24)
    pub const TOTAL_DISTANCE: u16 = 1 << 4;
    /// Resistance level (i16)
    pub const RESISTANCE_LEVEL: u16 = 1 << 5;
    /// Instantaneous power (i16)
    pub const INST_POWER: u16 = 1 << 6;
}

/// Byte offset of instantaneous power in a CPS measurement
pub const CPS_POWER_OFFSET: usize = 2;

/// Sterzo challenge notification opcode
pub const STERZO_OP_CHALLENGE: u16 = 0x1003;

/// Sterzo handshake finished notification opcode
pub const STERZO_OP_FINISHED: u16 = 0x1103;

/// Bytes written to the Sterzo control point to request a challenge
pub const STERZO_TRIGGER: [u8; 2] = [0x03, 0x10];

/// First two bytes of the Sterzo challenge response write
pub const STERZO_RESPONSE_PREFIX: [u8; 2] = [0x03, 0x11];

/// Finished status: response accepted
pub const STERZO_STATUS_ACCEPTED: u8 = 0xFF;

/// Finished status: response rejected
pub const STERZO_STATUS_REJECTED: u8 = 0xFE;

/// Raw opcode-tagged frame as it crosses a characteristic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Opcode (one byte for FTMS control point, two for Sterzo)
    pub opcode: u16,

    /// Bytes following the opcode
    pub payload: Vec<u8>,
}

impl Frame {
    /// Split an FTMS control point write into its one-byte opcode and payload.
    ///
    /// # Errors
    ///
    /// Returns error if the buffer is empty
    pub fn control_point(data: &[u8]) -> Result<Self> {
        match data.split_first() {
            Some((&opcode, payload)) => Ok(Self {
                opcode: u16::from(opcode),
                payload: payload.to_vec(),
            }),
            None => Err(BridgeError::Protocol("Empty control point frame".to_string())),
        }
    }

    /// Split a Sterzo notification into its little-endian two-byte opcode and payload.
    ///
    /// # Errors
    ///
    /// Returns error if the buffer is shorter than the opcode
    pub fn sterzo(data: &[u8]) -> Result<Self> {
        if data.len() < 2 {
            return Err(BridgeError::Protocol(format!(
                "Sterzo frame too short: {} bytes",
                data.len()
            )));
        }

        Ok(Self {
            opcode: u16::from_le_bytes([data[0], data[1]]),
            payload: data[2..].to_vec(),
        })
    }
}

/// Fields of interest from one FTMS Indoor Bike Data notification.
///
/// A `None` field was either flagged absent or truncated off the end of the buffer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FtmsMeasurement {
    /// Resistance level as reported by the trainer
    pub resistance_level: Option<i16>,

    /// Instantaneous power in watts
    pub power_watts: Option<i16>,
}

/// A decoded FTMS control point command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlCommand {
    /// Request control (single zero byte)
    RequestControl,

    /// Target incline in tenths of a percent
    SetTargetIncline(i16),
}

/// Final status carried by a Sterzo finished frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeStatus {
    /// 0xFF
    Accepted,
    /// 0xFE
    Rejected,
    /// Any other status byte; the device has not decided yet
    Pending(u8),
}

impl From<u8> for HandshakeStatus {
    fn from(status: u8) -> Self {
        match status {
            STERZO_STATUS_ACCEPTED => Self::Accepted,
            STERZO_STATUS_REJECTED => Self::Rejected,
            other => Self::Pending(other),
        }
    }
}

/// A decoded Sterzo challenge-characteristic notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SterzoFrame {
    /// Challenge value to answer
    Challenge(u16),

    /// Handshake result
    Finished(HandshakeStatus),
}
