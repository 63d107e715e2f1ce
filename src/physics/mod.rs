//! # Physics Mapping Module
//!
//! Stateless transforms between physical quantities and simulator inputs.
//!
//! This module handles:
//! - Watts to throttle signal, normalized against the simulator's engine damping
//! - Drag constant from CdA and mass
//! - Steering angle to steer axis with deadband
//! - Vehicle pitch to road grade, and grade to estimated resistance
//!
//! Every function is total over finite inputs: out-of-range values are clamped,
//! never rejected.

pub mod drivetrain;
pub mod steering;
pub mod incline;

pub use drivetrain::{drag_coefficient, watts_to_throttle};
pub use incline::{estimated_resistance, grade_from_pitch};
pub use steering::{angle_to_steer_axis, SteerMapping};
