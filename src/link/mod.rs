//! # Command Link Module
//!
//! UDP command channel to the aircraft.
//!
//! This module handles:
//! - Resolving the aircraft command address
//! - Opening a connected UDP socket
//! - Fire-and-forget datagram sends of command frames

pub mod sink_trait;

use async_trait::async_trait;
use std::io;
use std::net::SocketAddr;
use tokio::net::UdpSocket;
use tracing::{debug, info};

use crate::error::{LinkError, Result};

pub use sink_trait::CommandSink;

/// Default aircraft address when connected to its access point
pub const DEFAULT_DRONE_HOST: &str = "172.16.10.1";

/// Default UDP port of the command channel
pub const DEFAULT_COMMAND_PORT: u16 = 8080;

/// UDP command channel handler
pub struct UdpCommandSink {
    socket: UdpSocket,
    peer: SocketAddr,
}

impl std::fmt::Debug for UdpCommandSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UdpCommandSink")
            .field("peer", &self.peer)
            .finish_non_exhaustive()
    }
}

impl UdpCommandSink {
    /// Open the command channel
    ///
    /// Binds an ephemeral local port and connects it to `peer`, so every
    /// send goes to the aircraft without re-addressing.
    ///
    /// # Errors
    ///
    /// Returns [`LinkError::Setup`] if the socket cannot be bound or connected
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use jjrc_link::link::UdpCommandSink;
    ///
    /// #[tokio::main]
    /// async fn main() -> anyhow::Result<()> {
    ///     let sink = UdpCommandSink::connect("172.16.10.1:8080".parse()?).await?;
    ///     println!("Command link to {}", sink.peer());
    ///     Ok(())
    /// }
    /// ```
    pub async fn connect(peer: SocketAddr) -> Result<Self> {
        let local: SocketAddr = if peer.is_ipv4() {
            SocketAddr::from(([0, 0, 0, 0], 0))
        } else {
            SocketAddr::from(([0u16; 8], 0))
        };

        let socket = UdpSocket::bind(local)
            .await
            .map_err(|e| LinkError::Setup(format!("Failed to bind command socket: {}", e)))?;

        socket
            .connect(peer)
            .await
            .map_err(|e| LinkError::Setup(format!("Failed to connect command socket to {}: {}", peer, e)))?;

        info!("Command link open to {}", peer);
        Ok(Self { socket, peer })
    }

    /// Address of the aircraft command endpoint
    pub fn peer(&self) -> SocketAddr {
        self.peer
    }
}

#[async_trait]
impl CommandSink for UdpCommandSink {
    async fn send_frame(&mut self, frame: &[u8]) -> io::Result<()> {
        let sent = self.socket.send(frame).await?;
        if sent != frame.len() {
            return Err(io::Error::new(
                io::ErrorKind::WriteZero,
                format!("short datagram: {} of {} bytes", sent, frame.len()),
            ));
        }
        debug!("Sent command frame ({} bytes)", frame.len());
        Ok(())
    }
}
