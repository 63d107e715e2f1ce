//! # Virtual Gamepad
//!
//! The controller state the simulator polls in place of a physical pad. It
//! follows the standard gamepad layout.
//!
//! ## Outputs
//!
//! | Slot | Index | Range | Source |
//! |------|-------|-------|--------|
//! | Left stick X | axis 0 | -1.0 to 1.0 | Steering plate angle |
//! | Right trigger | button 7 | 0.0 to 1.0 | Rider power as throttle |
//!
//! All other axes and buttons stay at rest.

use serde::Serialize;

/// Axes in the standard layout
pub const AXIS_COUNT: usize = 4;

/// Buttons in the standard layout
pub const BUTTON_COUNT: usize = 17;

/// Axis carrying the steering value
pub const STEER_AXIS: usize = 0;

/// Button carrying the throttle value (right trigger)
pub const THROTTLE_BUTTON: usize = 7;

pub const STANDARD_MAPPING: &str = "standard";

/// One analog-capable button
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct ButtonState {
    pub pressed: bool,
    pub value: f64,
}

/// A full gamepad poll result
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GamepadState {
    pub index: usize,
    pub connected: bool,
    pub mapping: &'static str,
    /// Milliseconds since the bridge started
    pub timestamp_ms: u64,
    pub axes: [f64; AXIS_COUNT],
    pub buttons: [ButtonState; BUTTON_COUNT],
}

impl Default for GamepadState {
    fn default() -> Self {
        Self {
            index: 0,
            connected: true,
            mapping: STANDARD_MAPPING,
            timestamp_ms: 0,
            axes: [0.0; AXIS_COUNT],
            buttons: [ButtonState::default(); BUTTON_COUNT],
        }
    }
}

impl GamepadState {
    /// Build a pad with steering and throttle applied.
    ///
    /// # Arguments
    ///
    /// * `steer` - Axis value in [-1, 1]
    /// * `throttle` - Throttle in [0, 1], already gated by the activation threshold
    /// * `timestamp_ms` - Poll time
    pub fn new(steer: f64, throttle: f64, timestamp_ms: u64) -> Self {
        let mut state = Self {
            timestamp_ms,
            ..Self::default()
        };
        state.axes[STEER_AXIS] = steer;
        state.buttons[THROTTLE_BUTTON] = ButtonState {
            pressed: throttle > 0.0,
            value: throttle,
        };
        state
    }

    pub fn steer(&self) -> f64 {
        self.axes[STEER_AXIS]
    }

    pub fn throttle(&self) -> ButtonState {
        self.buttons[THROTTLE_BUTTON]
    }
}
