//! Sterzo challenge-response handshake as a pure state machine.
//!
//! The machine never performs I/O. The session feeds it challenge-characteristic
//! notifications and carries out the [`HandshakeAction`] it returns.

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::codec::auth::response_code;
use crate::codec::decoder::decode_sterzo_frame;
use crate::codec::encoder::{encode_sterzo_response, encode_sterzo_trigger};
use crate::codec::protocol::{HandshakeStatus, SterzoFrame};

/// Handshake progress
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HandshakeState {
    Idle,
    AwaitingChallenge,
    ResponseSent,
    Accepted,
    Rejected,
}

/// What the session must do after a notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandshakeAction {
    /// Frame ignored; keep waiting
    None,
    /// Write this response frame to the control point
    SendResponse(Vec<u8>),
    /// Device accepted the response
    Accepted,
    /// Device rejected the response
    Rejected,
}

#[derive(Debug)]
pub struct Handshake {
    state: HandshakeState,
}

impl Default for Handshake {
    fn default() -> Self {
        Self::new()
    }
}

impl Handshake {
    pub fn new() -> Self {
        Self {
            state: HandshakeState::Idle,
        }
    }

    pub fn state(&self) -> HandshakeState {
        self.state
    }

    /// Begin a handshake and return the trigger frame to write.
    ///
    /// Restarts from any state.
    pub fn start(&mut self) -> Vec<u8> {
        self.state = HandshakeState::AwaitingChallenge;
        encode_sterzo_trigger()
    }

    /// Advance on a challenge-characteristic notification.
    pub fn on_notification(&mut self, data: &[u8]) -> HandshakeAction {
        let Some(frame) = decode_sterzo_frame(data) else {
            debug!("Ignoring Sterzo frame: {:02X?}", data);
            return HandshakeAction::None;
        };

        match (self.state, frame) {
            (HandshakeState::AwaitingChallenge, SterzoFrame::Challenge(challenge)) => {
                let response = response_code(challenge);
                info!("Sterzo challenge {} answered with {}", challenge, response);
                self.state = HandshakeState::ResponseSent;
                HandshakeAction::SendResponse(encode_sterzo_response(response))
            }
            (HandshakeState::ResponseSent, SterzoFrame::Finished(status)) => match status {
                HandshakeStatus::Accepted => {
                    info!("Sterzo handshake accepted");
                    self.state = HandshakeState::Accepted;
                    HandshakeAction::Accepted
                }
                HandshakeStatus::Rejected => {
                    warn!("Sterzo handshake rejected");
                    self.state = HandshakeState::Rejected;
                    HandshakeAction::Rejected
                }
                HandshakeStatus::Pending(code) => {
                    debug!("Sterzo handshake pending (status 0x{:02X})", code);
                    HandshakeAction::None
                }
            },
            (state, frame) => {
                debug!("Ignoring {:?} in state {:?}", frame, state);
                HandshakeAction::None
            }
        }
    }

    /// Return to `Idle`, e.g. after a disconnect
    pub fn reset(&mut self) {
        self.state = HandshakeState::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn challenge_frame(value: u16) -> Vec<u8> {
        let [lo, hi] = value.to_le_bytes();
        vec![0x03, 0x10, lo, hi]
    }

    fn finished_frame(status: u8) -> Vec<u8> {
        vec![0x03, 0x11, status]
    }

    #[test]
    fn test_start_emits_trigger() {
        let mut handshake = Handshake::new();
        assert_eq!(handshake.state(), HandshakeState::Idle);
        assert_eq!(handshake.start(), vec![0x03, 0x10]);
        assert_eq!(handshake.state(), HandshakeState::AwaitingChallenge);
    }

    #[test]
    fn test_accepted_flow() {
        let mut handshake = Handshake::new();
        handshake.start();

        let action = handshake.on_notification(&challenge_frame(12345));
        let expected = response_code(12345).to_le_bytes();
        assert_eq!(
            action,
            HandshakeAction::SendResponse(vec![0x03, 0x11, expected[0], expected[1]])
        );
        assert_eq!(handshake.state(), HandshakeState::ResponseSent);

        assert_eq!(handshake.on_notification(&finished_frame(0xFF)), HandshakeAction::Accepted);
        assert_eq!(handshake.state(), HandshakeState::Accepted);
    }

    #[test]
    fn test_rejected_flow() {
        let mut handshake = Handshake::new();
        handshake.start();
        handshake.on_notification(&challenge_frame(360));

        assert_eq!(handshake.on_notification(&finished_frame(0xFE)), HandshakeAction::Rejected);
        assert_eq!(handshake.state(), HandshakeState::Rejected);
    }

    #[test]
    fn test_pending_status_keeps_waiting() {
        let mut handshake = Handshake::new();
        handshake.start();
        handshake.on_notification(&challenge_frame(7));

        assert_eq!(handshake.on_notification(&finished_frame(0x01)), HandshakeAction::None);
        assert_eq!(handshake.state(), HandshakeState::ResponseSent);
        assert_eq!(handshake.on_notification(&finished_frame(0xFF)), HandshakeAction::Accepted);
    }

    #[test]
    fn test_response_code_360_on_wire() {
        let mut handshake = Handshake::new();
        handshake.start();
        // 360 -> 199 after the 65336 reduction
        assert_eq!(
            handshake.on_notification(&challenge_frame(360)),
            HandshakeAction::SendResponse(vec![0x03, 0x11, 199, 0])
        );
    }

    #[test]
    fn test_out_of_order_frames_ignored() {
        let mut handshake = Handshake::new();

        // Not started
        assert_eq!(handshake.on_notification(&challenge_frame(1)), HandshakeAction::None);
        assert_eq!(handshake.state(), HandshakeState::Idle);

        handshake.start();
        // Finished before any challenge
        assert_eq!(handshake.on_notification(&finished_frame(0xFF)), HandshakeAction::None);
        assert_eq!(handshake.state(), HandshakeState::AwaitingChallenge);

        handshake.on_notification(&challenge_frame(1));
        // A second challenge is not answered twice
        assert_eq!(handshake.on_notification(&challenge_frame(2)), HandshakeAction::None);
        assert_eq!(handshake.state(), HandshakeState::ResponseSent);
    }

    #[test]
    fn test_undersized_frames_ignored() {
        let mut handshake = Handshake::new();
        handshake.start();

        assert_eq!(handshake.on_notification(&[0x03]), HandshakeAction::None);
        assert_eq!(handshake.on_notification(&[0x03, 0x10, 0x01]), HandshakeAction::None);
        assert_eq!(handshake.state(), HandshakeState::AwaitingChallenge);

        handshake.on_notification(&challenge_frame(9));
        assert_eq!(handshake.on_notification(&[0x03, 0x11]), HandshakeAction::None);
        assert_eq!(handshake.state(), HandshakeState::ResponseSent);
    }

    #[test]
    fn test_reset_returns_to_idle() {
        let mut handshake = Handshake::new();
        handshake.start();
        handshake.on_notification(&challenge_frame(5));
        handshake.reset();
        assert_eq!(handshake.state(), HandshakeState::Idle);
    }
}
