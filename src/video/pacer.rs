//! # Frame Pacer
//!
//! Keeps frame consumption aligned with wall-clock playback.
//!
//! After each frame the consumer reports how long processing took. If it was
//! faster than the frame interval, the consumer sleeps for the difference.
//! If it was slower, whole frames are dropped to catch up and the fractional
//! part of the lag is carried into the next decision.
//!
//! ```text
//! skew = (elapsed - interval) / interval + carry
//! skew < 0  -> sleep(-skew * interval), carry = 0
//! skew >= 0 -> skip(trunc(skew)),       carry = fract(skew)
//! ```
//!
//! Because the sleep branch absorbs the carried fraction, the accounted frames
//! track `total_wall_time / interval` to within one frame over any run.

use std::time::Duration;

/// Target interval at 25 fps
pub const DEFAULT_FRAME_INTERVAL: Duration = Duration::from_millis(40);

/// What the consumer should do before taking the next frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PaceAction {
    /// Ahead of real time: wait this long
    Sleep(Duration),
    /// Behind real time: discard this many buffered frames unprocessed
    Skip(usize),
}

/// Pure pacing decision
///
/// # Arguments
///
/// * `elapsed` - Time spent since the current frame was taken
/// * `target` - Frame interval
/// * `carry` - Fractional frames owed from the previous decision
///
/// # Returns
///
/// * `(PaceAction, f64)` - Action and the new carry
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use jjrc_link::video::pacer::{decide, PaceAction};
///
/// let target = Duration::from_millis(40);
///
/// let (action, carry) = decide(Duration::from_millis(30), target, 0.0);
/// assert_eq!(action, PaceAction::Sleep(Duration::from_millis(10)));
/// assert_eq!(carry, 0.0);
///
/// let (action, carry) = decide(Duration::from_millis(140), target, 0.0);
/// assert_eq!(action, PaceAction::Skip(2));
/// assert!((carry - 0.5).abs() < 1e-6);
/// ```
pub fn decide(elapsed: Duration, target: Duration, carry: f64) -> (PaceAction, f64) {
    let target_secs = target.as_secs_f64();
    if target_secs <= 0.0 {
        return (PaceAction::Skip(0), 0.0);
    }

    let skew = (elapsed.as_secs_f64() - target_secs) / target_secs + carry;

    if skew < 0.0 {
        // -skew * target, kept in integer nanoseconds where possible
        let owed = target.mul_f64(carry.max(0.0));
        let sleep = target.saturating_sub(elapsed).saturating_sub(owed);
        (PaceAction::Sleep(sleep), 0.0)
    } else {
        (PaceAction::Skip(skew.trunc() as usize), skew.fract())
    }
}

/// Stateful pacer owning its carry
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FramePacer {
    target: Duration,
    carry: f64,
}

impl Default for FramePacer {
    fn default() -> Self {
        Self::new(DEFAULT_FRAME_INTERVAL)
    }
}

impl FramePacer {
    /// Create a pacer for `target` frame interval
    #[must_use]
    pub fn new(target: Duration) -> Self {
        Self { target, carry: 0.0 }
    }

    /// Decide for the frame that took `elapsed` and update the carry
    pub fn pace(&mut self, elapsed: Duration) -> PaceAction {
        let (action, carry) = decide(elapsed, self.target, self.carry);
        self.carry = carry;
        action
    }

    /// Fractional frames currently owed
    #[must_use]
    pub fn carry(&self) -> f64 {
        self.carry
    }

    /// Target frame interval
    #[must_use]
    pub fn target(&self) -> Duration {
        self.target
    }

    /// Forget the carry (stream restart)
    pub fn reset(&mut self) {
        self.carry = 0.0;
    }
}
