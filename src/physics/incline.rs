//! # Grade and Resistance
//!
//! Road grade from vehicle pitch, and the resistance estimate shown when the
//! trainer does not report its own.

/// Upper bound of the resistance scale
pub const RESISTANCE_MAX: f64 = 200.0;

/// Resistance at 0% grade when estimating
pub const DEFAULT_BASE_RESISTANCE: f64 = 30.0;

/// Resistance units per percent of grade when estimating
pub const DEFAULT_GRADE_FACTOR: f64 = 10.0;

/// Road grade in percent from a pitch angle in radians.
pub fn grade_from_pitch(pitch_radians: f64) -> f64 {
    pitch_radians.tan() * 100.0
}

/// Estimate trainer resistance from grade, saturating at 0 and [`RESISTANCE_MAX`].
///
/// # Arguments
///
/// * `grade_percent` - Road grade
/// * `base` - Resistance on flat road
/// * `grade_factor` - Resistance added per percent of grade
pub fn estimated_resistance(grade_percent: f64, base: f64, grade_factor: f64) -> f64 {
    let estimate = base + grade_percent * grade_factor;
    if estimate.is_nan() {
        return base.clamp(0.0, RESISTANCE_MAX);
    }

    estimate.clamp(0.0, RESISTANCE_MAX)
}
