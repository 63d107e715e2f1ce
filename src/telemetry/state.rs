//! # Telemetry State
//!
//! The single record of current readings and connection statuses, shared by the
//! protocols and the control loop.
//!
//! ## Invariants
//!
//! - `smoothed_watts` and `smoothed_speed` start at 0 and only ever move by
//!   `smoothed += (raw - smoothed) * alpha`.
//! - Once the trainer reports a resistance level, local estimates are ignored for
//!   the rest of the process lifetime.
//! - `is_controllable` is derived from the trainer status and is never set
//!   independently.
//!
//! Every mutation publishes a [`TelemetrySnapshot`] on a `watch` channel so a
//! presentation layer can follow the state without being called inline.

use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;

use crate::config::PhysicsConfig;
use crate::steering::HandshakeState;

/// Telemetry shared between tasks
pub type SharedTelemetry = Arc<Mutex<TelemetryState>>;

/// Lock shared telemetry, recovering the data if a holder panicked.
pub fn lock_telemetry(telemetry: &SharedTelemetry) -> MutexGuard<'_, TelemetryState> {
    telemetry.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Which trainer service supplies data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrainerLink {
    /// Fitness Machine Service (power, resistance, incline control)
    Ftms,
    /// Cycling Power Service (power only)
    CyclingPower,
}

/// Whether incline commands are accepted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlMode {
    /// Control point write acknowledged
    Controllable,
    /// Measurements only
    MonitorOnly,
}

/// Trainer connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum TrainerStatus {
    Disconnected,
    Connecting,
    /// Request-control write in flight
    ControlRequested,
    Connected { link: TrainerLink, mode: ControlMode },
}

impl TrainerStatus {
    /// True in any connected sub-state
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected { .. })
    }

    /// True only when incline commands are accepted
    pub fn is_controllable(&self) -> bool {
        matches!(
            self,
            Self::Connected {
                mode: ControlMode::Controllable,
                ..
            }
        )
    }
}

/// Steering plate connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SteeringStatus {
    Disconnected,
    Connecting,
    Handshake { stage: HandshakeState },
    /// Handshake accepted; angle stream trusted
    Connected,
}

/// Simulator vehicle link state
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum GameLinkStatus {
    Searching,
    Linked { vehicle: String },
}

/// Point-in-time copy of the telemetry record
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TelemetrySnapshot {
    pub watts: f64,
    pub smoothed_watts: f64,
    pub angle: f64,
    pub real_grade: f64,
    pub real_speed: f64,
    pub smoothed_speed: f64,
    pub resistance_level: f64,
    pub trainer_reports_resistance: bool,
    pub trainer_status: TrainerStatus,
    pub steering_status: SteeringStatus,
    pub game_link_status: GameLinkStatus,
    pub is_controllable: bool,
}

/// Current and smoothed readings plus connection statuses.
#[derive(Debug)]
pub struct TelemetryState {
    watts: f64,
    smoothed_watts: f64,
    angle: f64,
    real_grade: f64,
    real_speed: f64,
    smoothed_speed: f64,
    resistance_level: f64,
    trainer_reports_resistance: bool,
    trainer_status: TrainerStatus,
    steering_status: SteeringStatus,
    game_link_status: GameLinkStatus,
    power_smoothing: f64,
    speed_smoothing: f64,
    changes: watch::Sender<TelemetrySnapshot>,
}

impl TelemetryState {
    /// Create a zeroed, fully disconnected record.
    ///
    /// # Arguments
    ///
    /// * `power_smoothing` - Exponential smoothing factor for watts
    /// * `speed_smoothing` - Exponential smoothing factor for speed
    pub fn new(power_smoothing: f64, speed_smoothing: f64) -> Self {
        let initial = TelemetrySnapshot {
            watts: 0.0,
            smoothed_watts: 0.0,
            angle: 0.0,
            real_grade: 0.0,
            real_speed: 0.0,
            smoothed_speed: 0.0,
            resistance_level: 0.0,
            trainer_reports_resistance: false,
            trainer_status: TrainerStatus::Disconnected,
            steering_status: SteeringStatus::Disconnected,
            game_link_status: GameLinkStatus::Searching,
            is_controllable: false,
        };
        let (changes, _) = watch::channel(initial);

        Self {
            watts: 0.0,
            smoothed_watts: 0.0,
            angle: 0.0,
            real_grade: 0.0,
            real_speed: 0.0,
            smoothed_speed: 0.0,
            resistance_level: 0.0,
            trainer_reports_resistance: false,
            trainer_status: TrainerStatus::Disconnected,
            steering_status: SteeringStatus::Disconnected,
            game_link_status: GameLinkStatus::Searching,
            power_smoothing,
            speed_smoothing,
            changes,
        }
    }

    /// Create a record with the smoothing factors from configuration.
    pub fn from_config(physics: &PhysicsConfig) -> Self {
        Self::new(physics.power_smoothing, physics.speed_smoothing)
    }

    /// Wrap in the shared handle used by protocols and the control loop.
    pub fn into_shared(self) -> SharedTelemetry {
        Arc::new(Mutex::new(self))
    }

    /// Follow state changes
    pub fn subscribe(&self) -> watch::Receiver<TelemetrySnapshot> {
        self.changes.subscribe()
    }

    pub fn snapshot(&self) -> TelemetrySnapshot {
        TelemetrySnapshot {
            watts: self.watts,
            smoothed_watts: self.smoothed_watts,
            angle: self.angle,
            real_grade: self.real_grade,
            real_speed: self.real_speed,
            smoothed_speed: self.smoothed_speed,
            resistance_level: self.resistance_level,
            trainer_reports_resistance: self.trainer_reports_resistance,
            trainer_status: self.trainer_status,
            steering_status: self.steering_status,
            game_link_status: self.game_link_status.clone(),
            is_controllable: self.is_controllable(),
        }
    }

    fn publish(&self) {
        self.changes.send_replace(self.snapshot());
    }

    pub fn watts(&self) -> f64 {
        self.watts
    }

    pub fn smoothed_watts(&self) -> f64 {
        self.smoothed_watts
    }

    pub fn angle(&self) -> f64 {
        self.angle
    }

    pub fn real_grade(&self) -> f64 {
        self.real_grade
    }

    pub fn real_speed(&self) -> f64 {
        self.real_speed
    }

    pub fn smoothed_speed(&self) -> f64 {
        self.smoothed_speed
    }

    pub fn resistance_level(&self) -> f64 {
        self.resistance_level
    }

    pub fn trainer_reports_resistance(&self) -> bool {
        self.trainer_reports_resistance
    }

    pub fn trainer_status(&self) -> TrainerStatus {
        self.trainer_status
    }

    pub fn steering_status(&self) -> SteeringStatus {
        self.steering_status
    }

    pub fn game_link_status(&self) -> &GameLinkStatus {
        &self.game_link_status
    }

    pub fn is_controllable(&self) -> bool {
        self.trainer_status.is_controllable()
    }

    /// Raw power from a trainer notification
    pub fn set_watts(&mut self, watts: f64) {
        self.watts = watts;
        self.publish();
    }

    /// Nudge power by hand while no trainer is connected.
    ///
    /// Decrements stop at zero. Returns `false` (and changes nothing) while a
    /// trainer is connected.
    pub fn adjust_manual_watts(&mut self, delta: f64) -> bool {
        if self.trainer_status.is_connected() {
            return false;
        }

        self.watts = if delta < 0.0 {
            (self.watts + delta).max(0.0)
        } else {
            self.watts + delta
        };
        self.publish();
        true
    }

    /// Move smoothed power one step toward raw power
    pub fn advance_power_smoothing(&mut self) -> f64 {
        self.smoothed_watts += (self.watts - self.smoothed_watts) * self.power_smoothing;
        self.publish();
        self.smoothed_watts
    }

    /// Raw plate angle in degrees
    pub fn set_angle(&mut self, angle: f64) {
        self.angle = angle;
        self.publish();
    }

    pub fn set_real_grade(&mut self, grade: f64) {
        self.real_grade = grade;
        self.publish();
    }

    /// Vehicle speed in m/s; also advances the smoothed speed
    pub fn set_real_speed(&mut self, speed: f64) {
        self.real_speed = speed;
        self.smoothed_speed += (speed - self.smoothed_speed) * self.speed_smoothing;
        self.publish();
    }

    /// Resistance level read from the trainer; authoritative from now on
    pub fn report_resistance(&mut self, level: f64) {
        self.resistance_level = level;
        self.trainer_reports_resistance = true;
        self.publish();
    }

    /// Locally estimated resistance, ignored once the trainer reports its own.
    ///
    /// Returns whether the estimate was applied.
    pub fn set_estimated_resistance(&mut self, level: f64) -> bool {
        if self.trainer_reports_resistance {
            return false;
        }

        self.resistance_level = level;
        self.publish();
        true
    }

    pub fn set_trainer_status(&mut self, status: TrainerStatus) {
        self.trainer_status = status;
        self.publish();
    }

    /// Return trainer fields to their disconnected defaults.
    ///
    /// Raw power drops to zero; smoothed power decays toward it on the
    /// following ticks. A reported resistance stays authoritative.
    pub fn reset_trainer(&mut self) {
        self.watts = 0.0;
        self.set_trainer_status(TrainerStatus::Disconnected);
    }

    /// Return steering fields to their disconnected defaults
    pub fn reset_steering(&mut self) {
        self.angle = 0.0;
        self.set_steering_status(SteeringStatus::Disconnected);
    }

    pub fn set_steering_status(&mut self, status: SteeringStatus) {
        self.steering_status = status;
        self.publish();
    }

    pub fn set_game_link_status(&mut self, status: GameLinkStatus) {
        if self.game_link_status != status {
            self.game_link_status = status;
            self.publish();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> TelemetryState {
        TelemetryState::new(0.15, 0.1)
    }

    fn connected(mode: ControlMode) -> TrainerStatus {
        TrainerStatus::Connected {
            link: TrainerLink::Ftms,
            mode,
        }
    }

    #[test]
    fn test_initial_state() {
        let state = state();
        assert_eq!(state.watts(), 0.0);
        assert_eq!(state.smoothed_watts(), 0.0);
        assert_eq!(state.trainer_status(), TrainerStatus::Disconnected);
        assert_eq!(state.steering_status(), SteeringStatus::Disconnected);
        assert_eq!(state.game_link_status(), &GameLinkStatus::Searching);
        assert!(!state.is_controllable());
    }

    #[test]
    fn test_power_smoothing_step() {
        let mut state = state();
        state.set_watts(200.0);
        assert!((state.advance_power_smoothing() - 30.0).abs() < 1e-12);
        // 30 + (200 - 30) * 0.15 = 55.5
        assert!((state.advance_power_smoothing() - 55.5).abs() < 1e-12);
        assert_eq!(state.watts(), 200.0);
    }

    #[test]
    fn test_power_smoothing_converges() {
        let mut state = state();
        state.set_watts(250.0);
        for _ in 0..200 {
            state.advance_power_smoothing();
        }
        assert!((state.smoothed_watts() - 250.0).abs() < 1e-6);
    }

    #[test]
    fn test_speed_smoothing_on_set() {
        let mut state = state();
        state.set_real_speed(10.0);
        assert_eq!(state.real_speed(), 10.0);
        assert!((state.smoothed_speed() - 1.0).abs() < 1e-12);
        state.set_real_speed(10.0);
        assert!((state.smoothed_speed() - 1.9).abs() < 1e-12);
    }

    #[test]
    fn test_estimated_resistance_until_reported() {
        let mut state = state();
        assert!(state.set_estimated_resistance(80.0));
        assert_eq!(state.resistance_level(), 80.0);

        state.report_resistance(42.0);
        assert!(state.trainer_reports_resistance());
        assert!(!state.set_estimated_resistance(120.0));
        assert_eq!(state.resistance_level(), 42.0);
    }

    #[test]
    fn test_reported_resistance_survives_disconnect() {
        let mut state = state();
        state.report_resistance(42.0);
        state.reset_trainer();
        assert!(state.trainer_reports_resistance());
        assert!(!state.set_estimated_resistance(10.0));
    }

    #[test]
    fn test_trainer_reset_drops_power() {
        let mut state = state();
        state.set_trainer_status(connected(ControlMode::Controllable));
        state.set_watts(250.0);
        state.advance_power_smoothing();

        state.reset_trainer();
        assert_eq!(state.watts(), 0.0);

        let before = state.smoothed_watts();
        assert!(before > 0.0);
        assert!(state.advance_power_smoothing() < before);
    }

    #[test]
    fn test_steering_reset_centres_angle() {
        let mut state = state();
        state.set_steering_status(SteeringStatus::Connected);
        state.set_angle(15.0);

        state.reset_steering();
        assert_eq!(state.angle(), 0.0);
        assert_eq!(state.steering_status(), SteeringStatus::Disconnected);
    }

    #[test]
    fn test_controllable_follows_status() {
        let mut state = state();
        state.set_trainer_status(TrainerStatus::ControlRequested);
        assert!(!state.is_controllable());

        state.set_trainer_status(connected(ControlMode::Controllable));
        assert!(state.is_controllable());

        state.set_trainer_status(connected(ControlMode::MonitorOnly));
        assert!(!state.is_controllable());

        state.set_trainer_status(connected(ControlMode::Controllable));
        state.reset_trainer();
        assert!(!state.is_controllable());
        assert_eq!(state.trainer_status(), TrainerStatus::Disconnected);
    }

    #[test]
    fn test_manual_watts_when_disconnected() {
        let mut state = state();
        assert!(state.adjust_manual_watts(20.0));
        assert!(state.adjust_manual_watts(20.0));
        assert_eq!(state.watts(), 40.0);

        assert!(state.adjust_manual_watts(-60.0));
        assert_eq!(state.watts(), 0.0);
    }

    #[test]
    fn test_manual_watts_ignored_when_connected() {
        let mut state = state();
        state.set_trainer_status(connected(ControlMode::MonitorOnly));
        assert!(!state.adjust_manual_watts(20.0));
        assert_eq!(state.watts(), 0.0);
    }

    #[test]
    fn test_changes_are_published() {
        let mut state = state();
        let mut changes = state.subscribe();
        assert!(!changes.has_changed().unwrap());

        state.set_angle(-7.5);
        assert!(changes.has_changed().unwrap());
        assert_eq!(changes.borrow_and_update().angle, -7.5);
    }

    #[test]
    fn test_game_link_publishes_only_on_change() {
        let mut state = state();
        let mut changes = state.subscribe();

        state.set_game_link_status(GameLinkStatus::Searching);
        assert!(!changes.has_changed().unwrap());

        state.set_game_link_status(GameLinkStatus::Linked {
            vehicle: "bike".to_string(),
        });
        assert!(changes.has_changed().unwrap());
        changes.mark_unchanged();
    }

    #[test]
    fn test_snapshot_serializes_status_tags() {
        let mut state = state();
        state.set_trainer_status(connected(ControlMode::Controllable));
        let json = serde_json::to_value(state.snapshot()).unwrap();

        assert_eq!(json["trainer_status"]["state"], "connected");
        assert_eq!(json["trainer_status"]["mode"], "controllable");
        assert_eq!(json["is_controllable"], true);
        assert_eq!(json["game_link_status"]["state"], "searching");
    }

    #[test]
    fn test_shared_lock() {
        let shared = state().into_shared();
        lock_telemetry(&shared).set_watts(123.0);
        assert_eq!(lock_telemetry(&shared).watts(), 123.0);
    }
}
