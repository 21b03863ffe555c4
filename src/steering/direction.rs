//! # Direction State
//!
//! Latest steering intent, shared between the analysis loop (writer) and the
//! command session tick (reader).
//!
//! Only the most recent value is kept. Readers get a copy, never a reference,
//! so the three axes are always observed together.
//!
//! ```
//! use jjrc_link::steering::{Direction, DirectionState};
//!
//! let state = DirectionState::default();
//! let writer = state.clone();
//!
//! writer.set_x(1);
//! writer.set_z(-1);
//!
//! assert_eq!(state.get(), Direction { x: 1, y: 0, z: -1 });
//! ```

use std::sync::{Arc, Mutex, MutexGuard};

use crate::command::protocol::CommandPayload;

/// Directional intent on three axes, each -1, 0 or 1
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Direction {
    /// Lateral: -1 left, 1 right
    pub x: i8,
    /// Vertical: -1 down, 1 up
    pub y: i8,
    /// Longitudinal: -1 back, 1 forward
    pub z: i8,
}

impl Direction {
    /// Build a direction, reducing every axis to its sign
    pub fn new(x: i32, y: i32, z: i32) -> Self {
        Self {
            x: x.signum() as i8,
            y: y.signum() as i8,
            z: z.signum() as i8,
        }
    }

    /// No movement on any axis
    pub const fn neutral() -> Self {
        Self { x: 0, y: 0, z: 0 }
    }
}

/// Lock a mutex, recovering the value if a writer panicked while holding it
fn lock_or_recover<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Shared handle to the current [`Direction`]
#[derive(Debug, Clone, Default)]
pub struct DirectionState {
    inner: Arc<Mutex<Direction>>,
}

impl DirectionState {
    /// Create a state holding `initial`
    pub fn new(initial: Direction) -> Self {
        Self {
            inner: Arc::new(Mutex::new(initial)),
        }
    }

    /// Copy out the current direction
    pub fn get(&self) -> Direction {
        *lock_or_recover(&self.inner)
    }

    /// Replace all three axes at once
    pub fn set(&self, direction: Direction) {
        *lock_or_recover(&self.inner) = direction;
    }

    /// Set lateral intent (sign of `value`)
    pub fn set_x(&self, value: i32) {
        lock_or_recover(&self.inner).x = value.signum() as i8;
    }

    /// Set vertical intent (sign of `value`)
    pub fn set_y(&self, value: i32) {
        lock_or_recover(&self.inner).y = value.signum() as i8;
    }

    /// Set longitudinal intent (sign of `value`)
    pub fn set_z(&self, value: i32) {
        lock_or_recover(&self.inner).z = value.signum() as i8;
    }

    /// Reset to neutral
    pub fn hold(&self) {
        self.set(Direction::neutral());
    }
}

/// Shared handle to the steer payload for drift trimming
///
/// The command session owns the same payload and recomputes the checksum
/// from it on every tick, so trims take effect on the next steer frame.
#[derive(Debug, Clone)]
pub struct SteerTrim {
    payload: Arc<Mutex<CommandPayload>>,
}

impl SteerTrim {
    pub(crate) fn new(payload: Arc<Mutex<CommandPayload>>) -> Self {
        Self { payload }
    }

    /// Write the yaw, pitch and roll trim bytes
    pub fn adjust_steering(&self, yaw: u8, pitch: u8, roll: u8) {
        lock_or_recover(&self.payload).adjust_steering(yaw, pitch, roll);
    }

    /// Write the pitch trim byte
    pub fn adjust_pitch(&self, value: u8) {
        lock_or_recover(&self.payload).adjust_pitch(value);
    }

    /// Write the roll trim byte
    pub fn adjust_roll(&self, value: u8) {
        lock_or_recover(&self.payload).adjust_roll(value);
    }

    /// Copy of the current steer payload
    pub fn snapshot(&self) -> CommandPayload {
        *lock_or_recover(&self.payload)
    }
}

pub(crate) fn lock_payload(payload: &Mutex<CommandPayload>) -> MutexGuard<'_, CommandPayload> {
    lock_or_recover(payload)
}
