//! # Steering Profile
//!
//! Fixed lookup from a [`Direction`] onto normalized axis values.
//!
//! | intent | axis | value |
//! |--------|------|-------|
//! | Y > 0 | uplift | +0.37 |
//! | Y < 0 | uplift | -0.3 |
//! | X = ±1 | roll | ±0.2 |
//! | Z = ±1 | pitch | ±0.2 |
//!
//! Yaw is never commanded by the steering tick.

use super::direction::Direction;
use crate::command::encoder::AxisValues;

/// Default climb magnitude
pub const DEFAULT_UPLIFT_UP: f32 = 0.37;
/// Default descent magnitude
pub const DEFAULT_UPLIFT_DOWN: f32 = 0.3;
/// Default sideways magnitude
pub const DEFAULT_LATERAL: f32 = 0.2;
/// Default forward/backward magnitude
pub const DEFAULT_FORWARD: f32 = 0.2;

/// Magnitudes applied for each non-zero intent
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SteeringProfile {
    /// Uplift when Y > 0
    pub uplift_up: f32,
    /// Uplift magnitude when Y < 0 (applied negated)
    pub uplift_down: f32,
    /// Roll magnitude for X
    pub lateral: f32,
    /// Pitch magnitude for Z
    pub forward: f32,
}

impl Default for SteeringProfile {
    fn default() -> Self {
        Self {
            uplift_up: DEFAULT_UPLIFT_UP,
            uplift_down: DEFAULT_UPLIFT_DOWN,
            lateral: DEFAULT_LATERAL,
            forward: DEFAULT_FORWARD,
        }
    }
}

impl SteeringProfile {
    /// Map a direction onto axis values
    ///
    /// # Examples
    ///
    /// ```
    /// use jjrc_link::steering::{Direction, SteeringProfile};
    ///
    /// let axes = SteeringProfile::default().axes(Direction::new(1, 0, -1));
    /// assert_eq!(axes.roll, 0.2);
    /// assert_eq!(axes.pitch, -0.2);
    /// assert_eq!(axes.uplift, 0.0);
    /// ```
    #[must_use]
    pub fn axes(&self, direction: Direction) -> AxisValues {
        let uplift = match direction.y.signum() {
            1 => self.uplift_up,
            -1 => -self.uplift_down,
            _ => 0.0,
        };

        AxisValues {
            uplift,
            yaw: 0.0,
            pitch: signed(direction.z, self.forward),
            roll: signed(direction.x, self.lateral),
        }
    }
}

fn signed(intent: i8, magnitude: f32) -> f32 {
    match intent.signum() {
        1 => magnitude,
        -1 => -magnitude,
        _ => 0.0,
    }
}
