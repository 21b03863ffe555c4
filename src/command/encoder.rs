//! # Command Encoder
//!
//! Quantizes normalized stick values and encodes complete command frames.
//!
//! The uplift axis uses the full byte range while yaw, pitch and roll only
//! use the lower half (0-127). The asymmetry is part of the vendor format.

use super::protocol::{CommandFrame, CommandKind, CommandPayload};

/// Scale from the normalized [-1, 1] range onto 0-255
const AXIS_SCALE: f32 = 127.5;

/// Normalized axis values in the range -1.0 to 1.0
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AxisValues {
    /// Up/down
    pub uplift: f32,
    /// Turn
    pub yaw: f32,
    /// Forward/backward
    pub pitch: f32,
    /// Sideways
    pub roll: f32,
}

/// Clamp a normalized axis value to [-1, 1]
///
/// NaN maps to center.
pub fn clamp_axis(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(-1.0, 1.0)
    }
}

/// Quantize the uplift axis onto the full 0-255 range
///
/// Truncates toward zero, so `0.0` maps to 127.
///
/// # Examples
///
/// ```
/// use jjrc_link::command::encoder::quantize_uplift;
///
/// assert_eq!(quantize_uplift(-1.0), 0);
/// assert_eq!(quantize_uplift(0.0), 127);
/// assert_eq!(quantize_uplift(1.0), 255);
/// ```
pub fn quantize_uplift(value: f32) -> u8 {
    ((clamp_axis(value) + 1.0) * AXIS_SCALE) as u8
}

/// Quantize yaw, pitch or roll onto the lower half range 0-127
///
/// # Examples
///
/// ```
/// use jjrc_link::command::encoder::quantize_half;
///
/// // (1.2 * 127.5) / 2 = 76.5, truncated
/// assert_eq!(quantize_half(0.2), 76);
/// ```
pub fn quantize_half(value: f32) -> u8 {
    (((clamp_axis(value) + 1.0) * AXIS_SCALE) / 2.0) as u8
}

impl CommandPayload {
    /// Quantize and write all four primary axes (offsets 2-5)
    pub fn set_axes(&mut self, axes: AxisValues) {
        self.set_axis_bytes(
            quantize_uplift(axes.uplift),
            quantize_half(axes.yaw),
            quantize_half(axes.pitch),
            quantize_half(axes.roll),
        );
    }
}

/// Encode a complete command frame
///
/// Starts from the base payload of `kind`, writes the quantized axes and
/// appends the checksum.
///
/// # Arguments
///
/// * `kind` - Command kind selecting the trailer bytes
/// * `axes` - Normalized axis values; out-of-range values are clamped
///
/// # Returns
///
/// * `CommandFrame` - 11-byte frame
///
/// # Examples
///
/// ```
/// use jjrc_link::command::encoder::{encode, AxisValues};
/// use jjrc_link::command::protocol::CommandKind;
///
/// let frame = encode(CommandKind::Steer, AxisValues::default());
/// assert_eq!(frame.as_bytes().len(), 11);
/// assert_eq!(frame.as_bytes()[2], 127);
/// ```
pub fn encode(kind: CommandKind, axes: AxisValues) -> CommandFrame {
    let mut payload = CommandPayload::for_kind(kind);
    payload.set_axes(axes);
    payload.to_frame()
}
