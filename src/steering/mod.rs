//! # Steering Module
//!
//! Shared steering intent and its mapping onto command axes.
//!
//! This module handles:
//! - The 3-axis directional intent written by the analysis side
//! - The fixed lookup from intents to normalized axis magnitudes
//! - The drift trim handle onto the session's steer payload

pub mod direction;
pub mod profile;

pub use direction::{Direction, DirectionState, SteerTrim};
pub use profile::SteeringProfile;
