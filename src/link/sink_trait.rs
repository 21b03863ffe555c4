//! Trait abstraction for the outbound command channel to enable testing

use async_trait::async_trait;
use std::io;

/// Trait for sending command frames to the aircraft
#[async_trait]
pub trait CommandSink: Send {
    /// Send one complete frame as a single datagram
    async fn send_frame(&mut self, frame: &[u8]) -> io::Result<()>;
}
