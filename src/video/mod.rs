//! # Video Module
//!
//! Inbound H.264 transport from the aircraft.
//!
//! This module handles:
//! - Splitting the raw TCP byte stream into frame units at start markers
//! - Holding back everything before the first keyframe
//! - Keeping the video transmitter alive with a periodic start beacon
//! - Pacing frame consumption to the 25 fps playback rate

pub mod demuxer;
pub mod pacer;
pub mod stream;

pub use demuxer::{FrameUnit, VideoStreamDemuxer};
pub use pacer::{FramePacer, PaceAction};
