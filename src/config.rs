//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.
//!
//! Every field has a default, so an empty file (or no file at all) yields the
//! tuning the bridge ships with.

use serde::de::Error;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::error::{BridgeError, Result};
use crate::physics::SteerMapping;

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub steering: SteeringConfig,
    #[serde(default)]
    pub physics: PhysicsConfig,
    #[serde(default)]
    pub control: ControlConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Steering plate configuration
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct SteeringConfig {
    #[serde(default = "default_max_angle_deg")]
    pub max_angle_deg: f64,

    #[serde(default = "default_deadband_deg")]
    pub deadband_deg: f64,

    /// Negate the steer axis relative to the plate angle
    #[serde(default)]
    pub invert: bool,

    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,

    #[serde(default = "default_handshake_timeout_ms")]
    pub handshake_timeout_ms: u64,
}

/// Rider and vehicle physics configuration
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct PhysicsConfig {
    #[serde(default = "default_power_smoothing")]
    pub power_smoothing: f64,

    #[serde(default = "default_speed_smoothing")]
    pub speed_smoothing: f64,

    #[serde(default = "default_grade_factor")]
    pub grade_factor: f64,

    #[serde(default = "default_base_resistance")]
    pub base_resistance: f64,

    #[serde(default = "default_cda")]
    pub cda: f64,

    /// Rider plus bike
    #[serde(default = "default_system_mass_kg")]
    pub system_mass_kg: f64,

    /// 1.0 is realistic, 2.0 feels like an e-bike
    #[serde(default = "default_scaling_factor")]
    pub scaling_factor: f64,

    #[serde(default = "default_air_density")]
    pub air_density: f64,

    #[serde(default = "default_roll_resistance")]
    pub roll_resistance: f64,

    #[serde(default = "default_tyre_friction")]
    pub tyre_friction: f64,

    #[serde(default = "default_wheel_mass_kg")]
    pub wheel_mass_kg: f64,
}

/// Control loop configuration
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct ControlConfig {
    /// Minimum interval between incline writes
    #[serde(default = "default_resistance_update_ms")]
    pub resistance_update_ms: u64,

    #[serde(default = "default_tick_rate_hz")]
    pub tick_rate_hz: u32,

    /// Throttle values at or below this are sent as 0
    #[serde(default = "default_throttle_activation")]
    pub throttle_activation: f64,

    /// Watts added or removed per manual adjustment
    #[serde(default = "default_manual_watts_step")]
    pub manual_watts_step: f64,
}

/// Telemetry recording configuration
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct TelemetryConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_log_dir")]
    pub log_dir: String,

    #[serde(default = "default_max_records_per_file")]
    pub max_records_per_file: usize,

    #[serde(default = "default_max_files_to_keep")]
    pub max_files_to_keep: usize,

    #[serde(default = "default_log_interval_ms")]
    pub log_interval_ms: u64,
}

/// Diagnostic log output configuration
#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
pub struct LoggingConfig {
    /// Directory for a daily-rolling log file in addition to stdout
    #[serde(default)]
    pub file_dir: Option<String>,
}

// Default value functions
fn default_max_angle_deg() -> f64 { 20.0 }
fn default_deadband_deg() -> f64 { 0.0 }
fn default_settle_delay_ms() -> u64 { 500 }
fn default_handshake_timeout_ms() -> u64 { 10_000 }

fn default_power_smoothing() -> f64 { 0.15 }
fn default_speed_smoothing() -> f64 { 0.1 }
fn default_grade_factor() -> f64 { 10.0 }
fn default_base_resistance() -> f64 { 30.0 }
fn default_cda() -> f64 { 0.3 }
fn default_system_mass_kg() -> f64 { 85.0 }
fn default_scaling_factor() -> f64 { 1.0 }
fn default_air_density() -> f64 { 1.225 }
fn default_roll_resistance() -> f64 { 0.02 }
fn default_tyre_friction() -> f64 { 10.0 }
fn default_wheel_mass_kg() -> f64 { 1.5 }

fn default_resistance_update_ms() -> u64 { 500 }
fn default_tick_rate_hz() -> u32 { 60 }
fn default_throttle_activation() -> f64 { 0.05 }
fn default_manual_watts_step() -> f64 { 20.0 }

fn default_log_dir() -> String { "./logs".to_string() }
fn default_max_records_per_file() -> usize { 10000 }
fn default_max_files_to_keep() -> usize { 10 }
fn default_log_interval_ms() -> u64 { 100 }

impl Default for SteeringConfig {
    fn default() -> Self {
        Self {
            max_angle_deg: default_max_angle_deg(),
            deadband_deg: default_deadband_deg(),
            invert: false,
            settle_delay_ms: default_settle_delay_ms(),
            handshake_timeout_ms: default_handshake_timeout_ms(),
        }
    }
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            power_smoothing: default_power_smoothing(),
            speed_smoothing: default_speed_smoothing(),
            grade_factor: default_grade_factor(),
            base_resistance: default_base_resistance(),
            cda: default_cda(),
            system_mass_kg: default_system_mass_kg(),
            scaling_factor: default_scaling_factor(),
            air_density: default_air_density(),
            roll_resistance: default_roll_resistance(),
            tyre_friction: default_tyre_friction(),
            wheel_mass_kg: default_wheel_mass_kg(),
        }
    }
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            resistance_update_ms: default_resistance_update_ms(),
            tick_rate_hz: default_tick_rate_hz(),
            throttle_activation: default_throttle_activation(),
            manual_watts_step: default_manual_watts_step(),
        }
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            log_dir: default_log_dir(),
            max_records_per_file: default_max_records_per_file(),
            max_files_to_keep: default_max_files_to_keep(),
            log_interval_ms: default_log_interval_ms(),
        }
    }
}

impl SteeringConfig {
    /// Steering mapping with this configuration's sign policy
    pub fn mapping(&self) -> SteerMapping {
        SteerMapping {
            deadband: self.deadband_deg,
            max_angle: self.max_angle_deg,
            invert: self.invert,
        }
    }

    /// Delay between handshake steps
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    /// Upper bound on a full handshake
    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.handshake_timeout_ms)
    }
}

impl ControlConfig {
    /// Minimum interval between incline writes
    pub fn resistance_update_interval(&self) -> Duration {
        Duration::from_millis(self.resistance_update_ms)
    }

    /// Control loop period
    pub fn tick_period(&self) -> Duration {
        Duration::from_micros(1_000_000 / u64::from(self.tick_rate_hz.max(1)))
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Returns
    ///
    /// * `Result<Config>` - Loaded and validated configuration
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use trainer_bridge::config::Config;
    ///
    /// let config = Config::load("config/default.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Parse and validate configuration from a TOML string
    ///
    /// # Errors
    ///
    /// Returns error if parsing or validation fails
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// Only rejects values that would make a mapping meaningless; everything
    /// else is clamped where it is used.
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("power_smoothing", self.physics.power_smoothing),
            ("speed_smoothing", self.physics.speed_smoothing),
        ] {
            if !(value > 0.0 && value <= 1.0) {
                return Err(invalid(format!("{} must be in (0.0, 1.0]", name)));
            }
        }

        if !(self.physics.system_mass_kg > 0.0) {
            return Err(invalid("system_mass_kg must be greater than 0"));
        }

        if self.steering.deadband_deg < 0.0 {
            return Err(invalid("deadband_deg cannot be negative"));
        }

        if self.steering.max_angle_deg <= self.steering.deadband_deg {
            return Err(invalid("max_angle_deg must be greater than deadband_deg"));
        }

        if self.steering.handshake_timeout_ms == 0 {
            return Err(invalid("handshake_timeout_ms must be greater than 0"));
        }

        if self.control.resistance_update_ms == 0 {
            return Err(invalid("resistance_update_ms must be greater than 0"));
        }

        if self.control.tick_rate_hz == 0 || self.control.tick_rate_hz > 1000 {
            return Err(invalid("tick_rate_hz must be between 1 and 1000"));
        }

        if self.telemetry.enabled && self.telemetry.log_dir.is_empty() {
            return Err(invalid("telemetry log_dir cannot be empty when enabled"));
        }

        if self.telemetry.log_interval_ms == 0 {
            return Err(invalid("log_interval_ms must be greater than 0"));
        }

        if self.telemetry.max_records_per_file == 0 {
            return Err(invalid("max_records_per_file must be greater than 0"));
        }

        if self.telemetry.max_files_to_keep == 0 {
            return Err(invalid("max_files_to_keep must be greater than 0"));
        }

        Ok(())
    }
}

fn invalid(message: impl std::fmt::Display) -> BridgeError {
    BridgeError::Config(toml::de::Error::custom(message))
}
