//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.
//!
//! Every field has a default, so an empty file (or no file at all) yields the
//! stock JJRC setup.

use serde::de::Error;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::command::protocol::CommandKind;
use crate::error::{LinkError, Result};
use crate::link::{DEFAULT_COMMAND_PORT, DEFAULT_DRONE_HOST};
use crate::session::{SessionTiming, DEFAULT_HANDSHAKE_HOLD, DEFAULT_LANDING_HOLD, DEFAULT_TICK};
use crate::steering::profile::{
    DEFAULT_FORWARD, DEFAULT_LATERAL, DEFAULT_UPLIFT_DOWN, DEFAULT_UPLIFT_UP,
};
use crate::steering::{Direction, SteeringProfile};
use crate::video::pacer::DEFAULT_FRAME_INTERVAL;
use crate::video::stream::{DEFAULT_BEACON_INTERVAL, DEFAULT_READ_BUFFER_SIZE, DEFAULT_VIDEO_PORT};

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub link: LinkConfig,
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub steering: SteeringConfig,
    #[serde(default)]
    pub video: VideoConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Network endpoints of the aircraft
#[derive(Debug, Deserialize, Clone)]
pub struct LinkConfig {
    #[serde(default = "default_drone_host")]
    pub drone_host: String,

    #[serde(default = "default_command_port")]
    pub command_port: u16,

    #[serde(default = "default_video_port")]
    pub video_port: u16,

    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

/// Command and video cadences
#[derive(Debug, Deserialize, Clone)]
pub struct TimingConfig {
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,

    #[serde(default = "default_handshake_hold_ms")]
    pub handshake_hold_ms: u64,

    #[serde(default = "default_landing_hold_ms")]
    pub landing_hold_ms: u64,

    #[serde(default = "default_beacon_interval_ms")]
    pub beacon_interval_ms: u64,

    #[serde(default = "default_frame_interval_ms")]
    pub frame_interval_ms: u64,
}

/// Steering magnitudes and start-up behaviour
#[derive(Debug, Deserialize, Clone)]
pub struct SteeringConfig {
    #[serde(default = "default_uplift_up")]
    pub uplift_up: f32,

    #[serde(default = "default_uplift_down")]
    pub uplift_down: f32,

    #[serde(default = "default_lateral")]
    pub lateral: f32,

    #[serde(default = "default_forward")]
    pub forward: f32,

    #[serde(default)]
    pub initial_x: i32,

    #[serde(default)]
    pub initial_y: i32,

    #[serde(default)]
    pub initial_z: i32,

    #[serde(default = "default_shutdown_command")]
    pub shutdown_command: String,
}

/// Video ingestion
#[derive(Debug, Deserialize, Clone)]
pub struct VideoConfig {
    #[serde(default = "default_read_buffer_size")]
    pub read_buffer_size: usize,

    #[serde(default = "default_queue_depth")]
    pub queue_depth: usize,

    /// Raw copy of the inbound byte stream
    #[serde(default)]
    pub record_path: Option<PathBuf>,
}

/// Log output
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Daily rolling log files are written here when set
    #[serde(default)]
    pub directory: Option<PathBuf>,
}

// Default value functions
fn default_drone_host() -> String { DEFAULT_DRONE_HOST.to_string() }
fn default_command_port() -> u16 { DEFAULT_COMMAND_PORT }
fn default_video_port() -> u16 { DEFAULT_VIDEO_PORT }
fn default_connect_timeout_ms() -> u64 { 3000 }

fn default_tick_ms() -> u64 { DEFAULT_TICK.as_millis() as u64 }
fn default_handshake_hold_ms() -> u64 { DEFAULT_HANDSHAKE_HOLD.as_millis() as u64 }
fn default_landing_hold_ms() -> u64 { DEFAULT_LANDING_HOLD.as_millis() as u64 }
fn default_beacon_interval_ms() -> u64 { DEFAULT_BEACON_INTERVAL.as_millis() as u64 }
fn default_frame_interval_ms() -> u64 { DEFAULT_FRAME_INTERVAL.as_millis() as u64 }

fn default_uplift_up() -> f32 { DEFAULT_UPLIFT_UP }
fn default_uplift_down() -> f32 { DEFAULT_UPLIFT_DOWN }
fn default_lateral() -> f32 { DEFAULT_LATERAL }
fn default_forward() -> f32 { DEFAULT_FORWARD }
fn default_shutdown_command() -> String { "land".to_string() }

fn default_read_buffer_size() -> usize { DEFAULT_READ_BUFFER_SIZE }
fn default_queue_depth() -> usize { 64 }

fn default_log_level() -> String { "info".to_string() }

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            drone_host: default_drone_host(),
            command_port: default_command_port(),
            video_port: default_video_port(),
            connect_timeout_ms: default_connect_timeout_ms(),
        }
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            tick_ms: default_tick_ms(),
            handshake_hold_ms: default_handshake_hold_ms(),
            landing_hold_ms: default_landing_hold_ms(),
            beacon_interval_ms: default_beacon_interval_ms(),
            frame_interval_ms: default_frame_interval_ms(),
        }
    }
}

impl Default for SteeringConfig {
    fn default() -> Self {
        Self {
            uplift_up: default_uplift_up(),
            uplift_down: default_uplift_down(),
            lateral: default_lateral(),
            forward: default_forward(),
            initial_x: 0,
            initial_y: 0,
            initial_z: 0,
            shutdown_command: default_shutdown_command(),
        }
    }
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            read_buffer_size: default_read_buffer_size(),
            queue_depth: default_queue_depth(),
            record_path: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            directory: None,
        }
    }
}

fn invalid(msg: impl std::fmt::Display) -> LinkError {
    LinkError::Config(toml::de::Error::custom(msg))
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
    /// use jjrc_link::config::Config;
    ///
    /// let config = Config::load("config/default.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    pub fn validate(&self) -> Result<()> {
        if self.link.drone_host.is_empty() {
            return Err(invalid("drone_host cannot be empty"));
        }

        if self.link.command_port == 0 || self.link.video_port == 0 {
            return Err(invalid("command_port and video_port must be non-zero"));
        }

        // Validate timing fields
        for (name, value, max) in [
            ("connect_timeout_ms", self.link.connect_timeout_ms, 60_000),
            ("tick_ms", self.timing.tick_ms, 1_000),
            ("handshake_hold_ms", self.timing.handshake_hold_ms, 60_000),
            ("landing_hold_ms", self.timing.landing_hold_ms, 60_000),
            ("beacon_interval_ms", self.timing.beacon_interval_ms, 60_000),
            ("frame_interval_ms", self.timing.frame_interval_ms, 1_000),
        ] {
            if value == 0 || value > max {
                return Err(invalid(format!("{} must be between 1 and {}", name, max)));
            }
        }

        // At least one land frame must go out
        if self.timing.landing_hold_ms < self.timing.tick_ms {
            return Err(invalid("landing_hold_ms must be at least tick_ms"));
        }

        // Validate steering magnitudes
        for (name, value) in [
            ("uplift_up", self.steering.uplift_up),
            ("uplift_down", self.steering.uplift_down),
            ("lateral", self.steering.lateral),
            ("forward", self.steering.forward),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(invalid(format!("{} must be between 0.0 and 1.0", name)));
            }
        }

        for (name, value) in [
            ("initial_x", self.steering.initial_x),
            ("initial_y", self.steering.initial_y),
            ("initial_z", self.steering.initial_z),
        ] {
            if !(-1..=1).contains(&value) {
                return Err(invalid(format!("{} must be -1, 0 or 1", name)));
            }
        }

        self.shutdown_command_kind()?;

        if self.video.read_buffer_size == 0 {
            return Err(invalid("read_buffer_size must be greater than 0"));
        }

        if self.video.queue_depth == 0 {
            return Err(invalid("queue_depth must be greater than 0"));
        }

        if !["trace", "debug", "info", "warn", "error"].contains(&self.logging.level.as_str()) {
            return Err(invalid(
                "log level must be one of: trace, debug, info, warn, error",
            ));
        }

        Ok(())
    }

    /// Command session timing
    pub fn session_timing(&self) -> SessionTiming {
        SessionTiming {
            tick: Duration::from_millis(self.timing.tick_ms),
            handshake_hold: Duration::from_millis(self.timing.handshake_hold_ms),
            landing_hold: Duration::from_millis(self.timing.landing_hold_ms),
        }
    }

    /// Target interval between two displayed frames
    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.timing.frame_interval_ms)
    }

    pub fn beacon_interval(&self) -> Duration {
        Duration::from_millis(self.timing.beacon_interval_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.link.connect_timeout_ms)
    }

    pub fn profile(&self) -> SteeringProfile {
        SteeringProfile {
            uplift_up: self.steering.uplift_up,
            uplift_down: self.steering.uplift_down,
            lateral: self.steering.lateral,
            forward: self.steering.forward,
        }
    }

    /// Direction held until the analyzer writes its first intent
    pub fn initial_direction(&self) -> Direction {
        Direction::new(
            self.steering.initial_x,
            self.steering.initial_y,
            self.steering.initial_z,
        )
    }

    /// Command held during the landing sequence
    ///
    /// # Errors
    ///
    /// Returns a configuration error for anything but `land` or `stop`.
    pub fn shutdown_command_kind(&self) -> Result<CommandKind> {
        match self.steering.shutdown_command.as_str() {
            "land" => Ok(CommandKind::Land),
            "stop" => Ok(CommandKind::Stop),
            other => Err(invalid(format!(
                "shutdown_command must be 'land' or 'stop', got '{}'",
                other
            ))),
        }
    }
}
