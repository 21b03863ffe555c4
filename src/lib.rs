//! # JJRC Link Library
//!
//! Ground-link controller for JJRC Wi-Fi quadcopters.
//!
//! This library provides:
//! - The UDP command protocol (11-byte frames, subtractive checksum)
//! - The command session: handshake, 40 Hz steering, landing
//! - H.264 byte-stream demuxing and real-time frame pacing
//! - A supervisor that lands the aircraft on any shutdown path

pub mod analysis;
pub mod command;
pub mod config;
pub mod error;
pub mod link;
pub mod session;
pub mod steering;
pub mod supervisor;
pub mod video;
