//! # Steering Mapping
//!
//! Maps a steering plate angle in degrees to a normalized steer axis in [-1, 1].

/// Default full-lock angle (degrees)
pub const DEFAULT_MAX_STEER_ANGLE: f64 = 20.0;

/// Map a steering angle to a steer axis value.
///
/// Angles inside the deadband produce 0. Outside it, the remaining travel up to
/// `max_angle` is scaled linearly to [0, 1] and signed by the angle. The sign is
/// not inverted here; see [`SteerMapping`] for the configurable convention.
///
/// # Arguments
///
/// * `angle_deg` - Raw plate angle, positive and negative either side of center
/// * `deadband` - Dead zone around center (degrees)
/// * `max_angle` - Angle mapped to full deflection (degrees)
pub fn angle_to_steer_axis(angle_deg: f64, deadband: f64, max_angle: f64) -> f64 {
    if !angle_deg.is_finite() {
        return 0.0;
    }

    let magnitude = angle_deg.abs();
    if magnitude <= deadband {
        return 0.0;
    }

    let ratio = (magnitude - deadband) / (max_angle - deadband);
    if ratio.is_nan() {
        return 0.0;
    }

    ratio.clamp(0.0, 1.0) * angle_deg.signum()
}

/// Steering mapping parameters with the axis sign policy applied.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SteerMapping {
    /// Dead zone around center (degrees)
    pub deadband: f64,
    /// Full-lock angle (degrees)
    pub max_angle: f64,
    /// Negate the axis relative to the raw angle
    pub invert: bool,
}

impl Default for SteerMapping {
    fn default() -> Self {
        Self {
            deadband: 0.0,
            max_angle: DEFAULT_MAX_STEER_ANGLE,
            invert: false,
        }
    }
}

impl SteerMapping {
    /// Map an angle to the axis value sent to the simulator.
    pub fn axis(&self, angle_deg: f64) -> f64 {
        let axis = angle_to_steer_axis(angle_deg, self.deadband, self.max_angle);
        if self.invert {
            -axis
        } else {
            axis
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_center_is_zero() {
        assert_eq!(angle_to_steer_axis(0.0, 0.0, 20.0), 0.0);
    }

    #[test]
    fn test_half_lock() {
        assert!((angle_to_steer_axis(10.0, 0.0, 20.0) - 0.5).abs() < 1e-12);
        assert!((angle_to_steer_axis(-10.0, 0.0, 20.0) + 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_full_lock_clamps() {
        assert_eq!(angle_to_steer_axis(20.0, 0.0, 20.0), 1.0);
        assert_eq!(angle_to_steer_axis(45.0, 0.0, 20.0), 1.0);
        assert_eq!(angle_to_steer_axis(-90.0, 0.0, 20.0), -1.0);
    }

    #[test]
    fn test_deadband_suppresses_small_angles() {
        assert_eq!(angle_to_steer_axis(1.9, 2.0, 20.0), 0.0);
        assert_eq!(angle_to_steer_axis(-2.0, 2.0, 20.0), 0.0);
    }

    #[test]
    fn test_deadband_rescales_travel() {
        // 11 degrees with a 2 degree deadband: (11 - 2) / (20 - 2) = 0.5
        assert!((angle_to_steer_axis(11.0, 2.0, 20.0) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_degenerate_range() {
        assert_eq!(angle_to_steer_axis(5.0, 3.0, 3.0), 1.0);
        assert_eq!(angle_to_steer_axis(5.0, 4.0, 2.0), 0.0);
    }

    #[test]
    fn test_non_finite_angle() {
        assert_eq!(angle_to_steer_axis(f64::NAN, 0.0, 20.0), 0.0);
    }

    #[test]
    fn test_mapping_default_keeps_sign() {
        let mapping = SteerMapping::default();
        assert!(mapping.axis(5.0) > 0.0);
        assert!(mapping.axis(-5.0) < 0.0);
    }

    #[test]
    fn test_mapping_invert() {
        let mapping = SteerMapping {
            invert: true,
            ..SteerMapping::default()
        };
        assert!((mapping.axis(10.0) + 0.5).abs() < 1e-12);
    }
}
