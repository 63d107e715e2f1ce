//! # Steering Module
//!
//! Sterzo steering plate support.
//!
//! This module handles:
//! - The challenge-response handshake state machine
//! - Driving the handshake over GATT characteristics
//! - Streaming the plate angle into telemetry once authenticated

pub mod handshake;
pub mod session;

pub use handshake::{Handshake, HandshakeAction, HandshakeState};
pub use session::SteeringProtocol;
