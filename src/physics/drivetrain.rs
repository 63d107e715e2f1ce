//! # Drivetrain Mapping
//!
//! Converts rider power into the simulator's throttle signal and derives the
//! vehicle drag constant from real aerodynamic parameters.
//!
//! ## Throttle Model
//!
//! The simulated engine accelerates at up to [`SIM_MAX_ACCEL`] and damps its
//! response at low speed by an ease factor that rises linearly to 1.0 at
//! [`SIM_EASE_SPEED`]. The throttle therefore divides the acceleration a rider's
//! power would produce by the acceleration the engine would deliver at full
//! throttle for the current speed:
//!
//! ```text
//! force      = watts * scaling / max(0.5, speed)
//! accel      = force / mass
//! efficiency = 0.75 + clamp(speed / 66.67, 0, 1) * 0.25
//! throttle   = clamp(accel / (10 * efficiency), 0, 1)
//! ```

/// Sea-level air density (kg/m³)
pub const DEFAULT_AIR_DENSITY: f64 = 1.225;

/// Simulator full-throttle acceleration (m/s²)
pub const SIM_MAX_ACCEL: f64 = 10.0;

/// Speed at which the simulator stops damping throttle (m/s)
pub const SIM_EASE_SPEED: f64 = 66.67;

/// Simulator throttle efficiency at standstill
pub const SIM_EASE_FACTOR: f64 = 0.75;

/// Floor applied to speed before dividing power by it (m/s).
///
/// Below this the model behaves as constant torque.
pub const MIN_EFFECTIVE_SPEED: f64 = 0.5;

/// Drag constant for the simulated vehicle: `0.5 * rho * CdA / mass`.
///
/// # Arguments
///
/// * `cda` - Drag coefficient times frontal area (m²)
/// * `mass_kg` - Rider plus bike mass (kg)
/// * `air_density` - Air density (kg/m³), usually [`DEFAULT_AIR_DENSITY`]
pub fn drag_coefficient(cda: f64, mass_kg: f64, air_density: f64) -> f64 {
    let drag = 0.5 * air_density * cda / mass_kg;
    if drag.is_finite() {
        drag
    } else {
        0.0
    }
}

/// Map rider power to a normalized throttle signal in [0, 1].
///
/// # Arguments
///
/// * `watts` - Rider power (smoothed)
/// * `speed_mps` - Current vehicle speed in m/s
/// * `rider_mass_kg` - Rider plus bike mass
/// * `scaling_factor` - 1.0 is realistic; 2.0 feels like an e-bike
///
/// # Examples
///
/// ```
/// use trainer_bridge::physics::drivetrain::watts_to_throttle;
///
/// assert_eq!(watts_to_throttle(0.0, 8.0, 85.0, 1.0), 0.0);
/// assert!(watts_to_throttle(300.0, 2.0, 85.0, 1.0) > 0.0);
/// ```
pub fn watts_to_throttle(watts: f64, speed_mps: f64, rider_mass_kg: f64, scaling_factor: f64) -> f64 {
    let effective_speed = speed_mps.max(MIN_EFFECTIVE_SPEED);
    let driving_force = watts * scaling_factor / effective_speed;
    let required_accel = driving_force / rider_mass_kg;

    let speed_ratio = (speed_mps / SIM_EASE_SPEED).clamp(0.0, 1.0);
    let efficiency = SIM_EASE_FACTOR + speed_ratio * (1.0 - SIM_EASE_FACTOR);

    let signal = required_accel / (SIM_MAX_ACCEL * efficiency);
    if signal.is_nan() {
        return 0.0;
    }

    signal.clamp(0.0, 1.0)
}
