//! # Trainer Bridge Library
//!
//! Ride a driving simulator with a smart trainer and a steering plate.
//!
//! This library provides the core functionality for bridging rider power and
//! handlebar angle over BLE into a virtual gamepad, and for mirroring the
//! simulated road grade back to the trainer as a target incline.

pub mod ble;
pub mod bridge;
pub mod codec;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod gamepad;
pub mod physics;
pub mod steering;
pub mod telemetry;
pub mod trainer;
