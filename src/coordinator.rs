//! # Control Loop Coordinator
//!
//! One tick per simulator input poll. Each tick reads the vehicle pose, updates
//! the resistance estimate, turns power into throttle and angle into steer, and
//! sends the road grade to the trainer no more often than the configured
//! interval.

use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, trace};

use crate::config::{Config, PhysicsConfig};
use crate::gamepad::GamepadState;
use crate::physics::{
    drag_coefficient, estimated_resistance, grade_from_pitch, watts_to_throttle, SteerMapping,
};
use crate::telemetry::{lock_telemetry, GameLinkStatus, SharedTelemetry};
use crate::trainer::TrainerProtocol;

/// Vehicle kinds the bridge will drive
pub const KNOWN_VEHICLES: [&str; 5] = ["coupe", "bike", "coach", "bus", "truck"];

pub fn is_known_vehicle(kind: &str) -> bool {
    KNOWN_VEHICLES.contains(&kind)
}

/// Tuning pushed onto the simulated vehicle so it rides like a bicycle
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VehicleTuning {
    pub roll_resistance: f64,
    pub drag: f64,
    /// Engine reverse force; always 0
    pub reverse: f64,
    pub tyre_friction: f64,
    pub wheel_mass: f64,
}

impl VehicleTuning {
    pub fn from_config(physics: &PhysicsConfig) -> Self {
        Self {
            roll_resistance: physics.roll_resistance,
            drag: drag_coefficient(physics.cda, physics.system_mass_kg, physics.air_density),
            reverse: 0.0,
            tyre_friction: physics.tyre_friction,
            wheel_mass: physics.wheel_mass_kg,
        }
    }
}

/// The simulator's handle on the player vehicle.
#[cfg_attr(test, mockall::automock)]
pub trait Vehicle: Send {
    /// Vehicle type name, e.g. "bike"
    fn kind(&self) -> String;

    /// Pitch in radians, nose-up positive
    fn pitch(&self) -> f64;

    /// Forward speed in m/s
    fn speed(&self) -> f64;

    fn apply_tuning(&mut self, tuning: &VehicleTuning);
}

pub struct ControlLoopCoordinator {
    telemetry: SharedTelemetry,
    trainer: TrainerProtocol,
    physics: PhysicsConfig,
    mapping: SteerMapping,
    tuning: VehicleTuning,
    throttle_activation: f64,
    resistance_update_interval: Duration,
    last_incline_write: Option<Instant>,
    started: Instant,
}

impl ControlLoopCoordinator {
    pub fn new(config: &Config, telemetry: SharedTelemetry, trainer: TrainerProtocol) -> Self {
        Self {
            telemetry,
            trainer,
            physics: config.physics.clone(),
            mapping: config.steering.mapping(),
            tuning: VehicleTuning::from_config(&config.physics),
            throttle_activation: config.control.throttle_activation,
            resistance_update_interval: config.control.resistance_update_interval(),
            last_incline_write: None,
            started: Instant::now(),
        }
    }

    /// When the last incline write was issued
    pub fn last_incline_write(&self) -> Option<Instant> {
        self.last_incline_write
    }

    fn incline_due(&self, now: Instant) -> bool {
        match self.last_incline_write {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= self.resistance_update_interval,
        }
    }

    /// Run one control step and return the pad state the simulator should see.
    ///
    /// Without a vehicle of a known kind, only power and steering are mapped;
    /// grade, resistance estimate and incline writes wait for a vehicle.
    pub fn tick(&mut self, now: Instant, vehicle: Option<&mut dyn Vehicle>) -> GamepadState {
        let vehicle = vehicle.and_then(|vehicle| {
            let kind = vehicle.kind();
            is_known_vehicle(&kind).then_some((vehicle, kind))
        });
        let linked = vehicle.is_some();

        let mut telemetry = lock_telemetry(&self.telemetry);

        match vehicle {
            Some((vehicle, kind)) => {
                vehicle.apply_tuning(&self.tuning);
                telemetry.set_game_link_status(GameLinkStatus::Linked { vehicle: kind });

                let grade = grade_from_pitch(vehicle.pitch());
                telemetry.set_real_grade(grade);
                telemetry.set_real_speed(vehicle.speed());

                let estimate = estimated_resistance(grade, self.physics.base_resistance, self.physics.grade_factor);
                telemetry.set_estimated_resistance(estimate);
            }
            None => telemetry.set_game_link_status(GameLinkStatus::Searching),
        }

        let smoothed_watts = telemetry.advance_power_smoothing();
        let signal = watts_to_throttle(
            smoothed_watts,
            telemetry.real_speed(),
            self.physics.system_mass_kg,
            self.physics.scaling_factor,
        );
        let throttle = if signal > self.throttle_activation { signal } else { 0.0 };

        let steer = self.mapping.axis(telemetry.angle());

        let controllable = telemetry.is_controllable();
        let grade = telemetry.real_grade();
        drop(telemetry);

        if linked && controllable && self.incline_due(now) && self.trainer.send_incline(grade).is_some() {
            debug!("Incline update queued: {:.1}%", grade);
            self.last_incline_write = Some(now);
        }

        let timestamp_ms = now.saturating_duration_since(self.started).as_millis() as u64;
        trace!("tick: steer={:.3} throttle={:.3}", steer, throttle);
        GamepadState::new(steer, throttle, timestamp_ms)
    }
}
