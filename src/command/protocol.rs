//! # Command Protocol Constants and Types
//!
//! Core definitions for the JJRC command channel.
//!
//! Every command is a 10-byte payload followed by a checksum byte:
//!
//! ```text
//! [0] header 0xFF
//! [1] mode 0x08
//! [2] uplift   [3] yaw   [4] pitch   [5] roll
//! [6..=9] trailer (varies by command kind)
//! [10] checksum
//! ```

use super::checksum::checksum;

/// Payload size without checksum
pub const COMMAND_PAYLOAD_SIZE: usize = 10;

/// Complete frame size (payload + checksum)
pub const COMMAND_FRAME_SIZE: usize = COMMAND_PAYLOAD_SIZE + 1;

/// Header byte shared by all commands
pub const COMMAND_HEADER: u8 = 0xFF;

/// Mode byte shared by all commands
pub const COMMAND_MODE: u8 = 0x08;

/// Offset of the uplift axis
pub const OFFSET_UPLIFT: usize = 2;
/// Offset of the yaw axis
pub const OFFSET_YAW: usize = 3;
/// Offset of the pitch axis
pub const OFFSET_PITCH: usize = 4;
/// Offset of the roll axis
pub const OFFSET_ROLL: usize = 5;

/// Offset of the yaw trim byte used by drift adjustment
pub const OFFSET_TRIM_YAW: usize = 6;
/// Offset of the pitch trim byte used by drift adjustment
pub const OFFSET_TRIM_PITCH: usize = 7;
/// Offset of the roll trim byte used by drift adjustment
pub const OFFSET_TRIM_ROLL: usize = 8;

const STEER_PAYLOAD: [u8; COMMAND_PAYLOAD_SIZE] =
    [0xff, 0x08, 0x00, 0x00, 0x00, 0x00, 0x90, 0x10, 0x10, 0x00];
const STOP_PAYLOAD: [u8; COMMAND_PAYLOAD_SIZE] =
    [0xff, 0x08, 0x7e, 0x3f, 0x40, 0x3f, 0x90, 0x10, 0x10, 0xa0];
const LAND_PAYLOAD: [u8; COMMAND_PAYLOAD_SIZE] =
    [0xff, 0x08, 0x7e, 0x3f, 0x40, 0x3f, 0x90, 0x10, 0x10, 0x80];
const CONTROLS_ON_PAYLOAD: [u8; COMMAND_PAYLOAD_SIZE] =
    [0xff, 0x08, 0x00, 0x3f, 0x40, 0x3f, 0x10, 0x10, 0x10, 0x00];
const HOVER_ON_PAYLOAD: [u8; COMMAND_PAYLOAD_SIZE] =
    [0xff, 0x08, 0x7e, 0x3f, 0x40, 0x3f, 0x90, 0x10, 0x10, 0x00];
const ROTOR_ON_PAYLOAD: [u8; COMMAND_PAYLOAD_SIZE] =
    [0xff, 0x08, 0x7e, 0x3f, 0x40, 0x3f, 0x90, 0x10, 0x10, 0x40];
const CALIBRATE_GYRO_PAYLOAD: [u8; COMMAND_PAYLOAD_SIZE] =
    [0xff, 0x08, 0x00, 0x3f, 0x40, 0x3f, 0x50, 0x10, 0x10, 0x00];
// Observed on the wire; meaning unknown.
const COMPASS_ACTIVE_PAYLOAD: [u8; COMMAND_PAYLOAD_SIZE] =
    [0xff, 0x08, 0x7e, 0x3f, 0x40, 0x3f, 0x90, 0x10, 0x10, 0x10];

/// Command kinds understood by the aircraft
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    /// Calibrate the gyroscope (first handshake step)
    CalibrateGyro,
    /// Enable remote controls
    ControlsOn,
    /// Enable altitude hold
    HoverOn,
    /// Spin up the rotors
    RotorOn,
    /// Steady-state steering
    Steer,
    /// Cut the motors
    Stop,
    /// Controlled descent
    Land,
    /// Undocumented trailer; kept for completeness
    CompassActive,
}

impl CommandKind {
    /// Base payload for this command kind, without checksum
    pub const fn base_payload(self) -> [u8; COMMAND_PAYLOAD_SIZE] {
        match self {
            CommandKind::CalibrateGyro => CALIBRATE_GYRO_PAYLOAD,
            CommandKind::ControlsOn => CONTROLS_ON_PAYLOAD,
            CommandKind::HoverOn => HOVER_ON_PAYLOAD,
            CommandKind::RotorOn => ROTOR_ON_PAYLOAD,
            CommandKind::Steer => STEER_PAYLOAD,
            CommandKind::Stop => STOP_PAYLOAD,
            CommandKind::Land => LAND_PAYLOAD,
            CommandKind::CompassActive => COMPASS_ACTIVE_PAYLOAD,
        }
    }

    /// Short name used in log output
    pub const fn name(self) -> &'static str {
        match self {
            CommandKind::CalibrateGyro => "calibrate-gyro",
            CommandKind::ControlsOn => "controls-on",
            CommandKind::HoverOn => "hover-on",
            CommandKind::RotorOn => "rotor-on",
            CommandKind::Steer => "steer",
            CommandKind::Stop => "stop",
            CommandKind::Land => "land",
            CommandKind::CompassActive => "compass-active",
        }
    }
}

/// Mutable 10-byte command payload
///
/// The checksum is never stored; [`CommandPayload::to_frame`] computes it
/// from the current bytes every time a frame is produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandPayload {
    bytes: [u8; COMMAND_PAYLOAD_SIZE],
}

impl CommandPayload {
    /// Payload for a command kind, initialized from its base bytes
    pub const fn for_kind(kind: CommandKind) -> Self {
        Self {
            bytes: kind.base_payload(),
        }
    }

    /// Payload from raw bytes
    pub const fn from_bytes(bytes: [u8; COMMAND_PAYLOAD_SIZE]) -> Self {
        Self { bytes }
    }

    /// Raw payload bytes
    pub fn as_bytes(&self) -> &[u8; COMMAND_PAYLOAD_SIZE] {
        &self.bytes
    }

    /// Write the four primary axis bytes (offsets 2-5)
    pub fn set_axis_bytes(&mut self, uplift: u8, yaw: u8, pitch: u8, roll: u8) {
        self.bytes[OFFSET_UPLIFT] = uplift;
        self.bytes[OFFSET_YAW] = yaw;
        self.bytes[OFFSET_PITCH] = pitch;
        self.bytes[OFFSET_ROLL] = roll;
    }

    /// Write the drift trim bytes (offsets 6-8)
    ///
    /// This targets different bytes than [`CommandPayload::set_axis_bytes`]
    /// even though both speak of yaw, pitch and roll. Observed mid values are
    /// yaw 144 (128-160), pitch 16 (0-32) and roll 16 (0-32).
    pub fn adjust_steering(&mut self, yaw: u8, pitch: u8, roll: u8) {
        self.bytes[OFFSET_TRIM_YAW] = yaw;
        self.bytes[OFFSET_TRIM_PITCH] = pitch;
        self.bytes[OFFSET_TRIM_ROLL] = roll;
    }

    /// Write only the pitch trim byte (offset 7)
    pub fn adjust_pitch(&mut self, value: u8) {
        self.bytes[OFFSET_TRIM_PITCH] = value;
    }

    /// Write only the roll trim byte (offset 8)
    pub fn adjust_roll(&mut self, value: u8) {
        self.bytes[OFFSET_TRIM_ROLL] = value;
    }

    /// Build the wire frame, appending a freshly computed checksum
    pub fn to_frame(&self) -> CommandFrame {
        let mut frame = [0u8; COMMAND_FRAME_SIZE];
        frame[..COMMAND_PAYLOAD_SIZE].copy_from_slice(&self.bytes);
        frame[COMMAND_PAYLOAD_SIZE] = checksum(&self.bytes);
        CommandFrame(frame)
    }
}

/// Complete 11-byte frame ready to be sent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandFrame([u8; COMMAND_FRAME_SIZE]);

impl CommandFrame {
    /// Frame bytes as sent on the wire
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// The trailing checksum byte
    pub fn checksum(&self) -> u8 {
        self.0[COMMAND_PAYLOAD_SIZE]
    }

    /// Trailer byte 9, which identifies most fixed commands
    pub fn command_byte(&self) -> u8 {
        self.0[COMMAND_PAYLOAD_SIZE - 1]
    }
}

impl AsRef<[u8]> for CommandFrame {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}
