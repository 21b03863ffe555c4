//! # Command Protocol Module
//!
//! Wire format of the JJRC WiFi command channel.
//!
//! This module handles:
//! - Fixed 10-byte payloads for every command kind
//! - Axis quantization into the vendor's byte ranges
//! - The subtractive checksum appended before every send

pub mod protocol;
pub mod encoder;
pub mod checksum;
