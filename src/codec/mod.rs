//! # Frame Codec Module
//!
//! Binary framing for the two BLE peripheral classes.
//!
//! This module handles:
//! - FTMS Indoor Bike Data decoding (flag-gated variable layout)
//! - FTMS control point encoding (request control, set target incline)
//! - CPS power measurement decoding (fallback trainer path)
//! - Sterzo challenge/finished/angle frames and the challenge response code

pub mod protocol;
pub mod encoder;
pub mod decoder;
pub mod auth;
