//! # Telemetry Module
//!
//! Shared state for readings and connection statuses, plus an optional JSONL
//! recorder.
//!
//! This module handles:
//! - The `TelemetryState` record the protocols and control loop mutate
//! - Change notification through `watch` snapshots
//! - Writing snapshots to rotating log files
//! - Retaining only the last N files

pub mod recorder;
pub mod state;

pub use recorder::TelemetryRecorder;
pub use state::{
    lock_telemetry, ControlMode, GameLinkStatus, SharedTelemetry, SteeringStatus, TelemetrySnapshot,
    TelemetryState, TrainerLink, TrainerStatus,
};
