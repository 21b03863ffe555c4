//! # Video Stream Tasks
//!
//! Long-running tasks bound to the video TCP connection:
//! - ingestion: read bytes, demux, hold back units until the first keyframe,
//!   forward units to the analysis queue and optionally record the raw stream
//! - beacon: resend the video start request every second so the aircraft
//!   keeps transmitting

use std::io;
use std::net::SocketAddr;
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{interval, timeout, Duration, MissedTickBehavior};
use tracing::{debug, error, info, trace, warn};

use super::demuxer::{FrameUnit, VideoStreamDemuxer};
use crate::error::{LinkError, Result};

/// Default TCP port of the video channel
pub const DEFAULT_VIDEO_PORT: u16 = 8888;

/// Request that starts (and keeps alive) the video transmitter
pub const VIDEO_START_BEACON: [u8; 12] = [
    0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x28, 0x28,
];

/// Interval between two beacons
pub const DEFAULT_BEACON_INTERVAL: Duration = Duration::from_secs(1);

/// Default size of a single transport read
pub const DEFAULT_READ_BUFFER_SIZE: usize = 4096;

/// Counters reported when ingestion ends
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestStats {
    pub bytes_read: u64,
    /// Units forwarded to the consumer
    pub units_forwarded: u64,
    /// Units dropped while waiting for the first keyframe
    pub units_before_keyframe: u64,
}

/// Connect the video channel
///
/// # Errors
///
/// Returns [`LinkError::Setup`] on refusal or when `connect_timeout` expires
pub async fn connect_video(addr: SocketAddr, connect_timeout: Duration) -> Result<TcpStream> {
    let stream = timeout(connect_timeout, TcpStream::connect(addr))
        .await
        .map_err(|_| LinkError::Setup(format!("Timed out connecting video channel to {}", addr)))?
        .map_err(|e| LinkError::Setup(format!("Failed to connect video channel to {}: {}", addr, e)))?;

    stream.set_nodelay(true)?;
    info!("Video channel connected to {}", addr);
    Ok(stream)
}

/// Read the video transport until it closes
///
/// Units before the first keyframe are dropped; `ready` fires when the first
/// keyframe unit has been forwarded. Ingestion also stops once the unit
/// receiver is gone.
///
/// # Errors
///
/// Returns [`LinkError::Io`] when a transport read fails
pub async fn ingest_video<R>(
    mut reader: R,
    units: mpsc::Sender<FrameUnit>,
    ready: oneshot::Sender<()>,
    mut recorder: Option<File>,
    read_size: usize,
) -> Result<IngestStats>
where
    R: AsyncRead + Unpin,
{
    let mut demuxer = VideoStreamDemuxer::new();
    let mut ready = Some(ready);
    let mut buf = vec![0u8; read_size.max(1)];
    let mut stats = IngestStats::default();

    loop {
        let n = match reader.read(&mut buf).await {
            Ok(n) => n,
            Err(e) => {
                error!("Video transport read failed after {} bytes: {}", stats.bytes_read, e);
                return Err(e.into());
            }
        };
        if n == 0 {
            info!("Video stream closed after {} bytes", stats.bytes_read);
            break;
        }
        stats.bytes_read += n as u64;

        let record_failure = match recorder.as_mut() {
            Some(file) => file.write_all(&buf[..n]).await.err(),
            None => None,
        };
        if let Some(e) = record_failure {
            warn!("Video recording stopped: {}", e);
            recorder = None;
        }

        for unit in demuxer.ingest(&buf[..n]) {
            if ready.is_some() {
                if !unit.is_keyframe() {
                    stats.units_before_keyframe += 1;
                    trace!("Dropping {}-byte unit before first keyframe", unit.len());
                    continue;
                }
                info!(
                    "First keyframe received ({} units skipped)",
                    stats.units_before_keyframe
                );
            }

            trace!("Forwarding {}-byte unit", unit.len());
            if units.send(unit).await.is_err() {
                debug!("Frame consumer gone, stopping ingestion");
                return Ok(stats);
            }
            stats.units_forwarded += 1;

            if let Some(tx) = ready.take() {
                let _ = tx.send(());
            }
        }
    }

    if let Some(file) = recorder.as_mut() {
        if let Err(e) = file.flush().await {
            warn!("Failed to flush video recording: {}", e);
        }
    }

    Ok(stats)
}

/// Send the video start beacon every `period`, forever
///
/// Write failures are logged; the next period retries.
pub async fn beacon_loop<W>(mut writer: W, period: Duration)
where
    W: AsyncWrite + Unpin,
{
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        match send_beacon(&mut writer).await {
            Ok(()) => trace!("Video start beacon sent"),
            Err(e) => warn!("{}", LinkError::TransportWrite(e.to_string())),
        }
    }
}

async fn send_beacon<W: AsyncWrite + Unpin>(writer: &mut W) -> io::Result<()> {
    writer.write_all(&VIDEO_START_BEACON).await?;
    writer.flush().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::video::demuxer::START_MARKER;
    use tokio::net::TcpListener;

    fn unit(header: u8, len: usize) -> Vec<u8> {
        let mut v = START_MARKER.to_vec();
        v.push(header);
        v.extend(std::iter::repeat(0x5a).take(len));
        v
    }

    #[test]
    fn test_constants() {
        assert_eq!(VIDEO_START_BEACON.len(), 12);
        assert_eq!(DEFAULT_VIDEO_PORT, 8888);
        assert_eq!(DEFAULT_BEACON_INTERVAL, Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_ingest_gates_until_keyframe() {
        let steer_unit = unit(0x68, 4);

        let mut first = vec![0xEE, 0xEE];
        first.extend(unit(0x41, 10)); // delta before any keyframe
        first.extend(unit(0x67, 8)); // keyframe
        first.extend(&steer_unit[..2]); // marker split across reads

        let reader = tokio_test::io::Builder::new()
            .read(&first)
            .read(&steer_unit[2..])
            .read(&unit(0x65, 20))
            .build();

        let (tx, mut rx) = mpsc::channel(16);
        let (ready_tx, ready_rx) = oneshot::channel();

        let stats = ingest_video(reader, tx, ready_tx, None, 64).await.unwrap();

        assert!(ready_rx.await.is_ok());
        assert_eq!(stats.units_before_keyframe, 1);

        let mut received = Vec::new();
        while let Ok(u) = rx.try_recv() {
            received.push(u);
        }
        // keyframe and the 0x68 unit; the 0x65 unit stays as carry-over
        assert_eq!(received.len(), 2);
        assert!(received[0].is_keyframe());
        assert_eq!(received[1].as_bytes(), steer_unit.as_slice());
        assert_eq!(stats.units_forwarded, 2);
    }

    #[tokio::test]
    async fn test_ingest_without_keyframe_never_ready() {
        let reader = tokio_test::io::Builder::new()
            .read(&unit(0x41, 5))
            .read(&unit(0x41, 5))
            .read(&unit(0x41, 5))
            .build();

        let (tx, mut rx) = mpsc::channel(16);
        let (ready_tx, ready_rx) = oneshot::channel();

        let stats = ingest_video(reader, tx, ready_tx, None, 64).await.unwrap();

        assert!(ready_rx.await.is_err());
        assert_eq!(stats.units_forwarded, 0);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_ingest_stops_when_consumer_gone() {
        let mut data = unit(0x67, 4);
        data.extend(unit(0x41, 4));
        data.extend(unit(0x41, 4));
        let reader = tokio_test::io::Builder::new().read(&data).build();

        let (tx, rx) = mpsc::channel(16);
        drop(rx);
        let (ready_tx, _ready_rx) = oneshot::channel();

        let stats = ingest_video(reader, tx, ready_tx, None, 64).await.unwrap();
        assert_eq!(stats.units_forwarded, 0);
    }

    #[tokio::test]
    async fn test_ingest_read_error_is_reported() {
        let reader = tokio_test::io::Builder::new()
            .read(&unit(0x67, 4))
            .read_error(io::Error::new(io::ErrorKind::ConnectionReset, "reset"))
            .build();

        let (tx, _rx) = mpsc::channel(16);
        let (ready_tx, _ready_rx) = oneshot::channel();

        let result = ingest_video(reader, tx, ready_tx, None, 64).await;
        assert!(matches!(result, Err(LinkError::Io(_))));
    }

    #[tokio::test]
    async fn test_ingest_records_raw_stream() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("capture.h264");

        let mut data = vec![0x01, 0x02];
        data.extend(unit(0x67, 6));
        data.extend(unit(0x41, 6));
        let reader = tokio_test::io::Builder::new().read(&data).build();

        let (tx, _rx) = mpsc::channel(16);
        let (ready_tx, _ready_rx) = oneshot::channel();
        let file = File::create(&path).await.unwrap();

        ingest_video(reader, tx, ready_tx, Some(file), 8).await.unwrap();

        // Everything is recorded, preamble included
        assert_eq!(std::fs::read(&path).unwrap(), data);
    }

    #[tokio::test(start_paused = true)]
    async fn test_beacon_loop_repeats() {
        let (client, mut server) = tokio::io::duplex(256);
        let task = tokio::spawn(beacon_loop(client, DEFAULT_BEACON_INTERVAL));

        let mut buf = [0u8; 36];
        server.read_exact(&mut buf).await.unwrap();
        for chunk in buf.chunks(12) {
            assert_eq!(chunk, VIDEO_START_BEACON);
        }

        task.abort();
    }

    #[tokio::test]
    async fn test_connect_video_refused_is_setup_error() {
        // Bind then drop to get a port nobody listens on
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let result = connect_video(addr, Duration::from_secs(1)).await;
        assert!(matches!(result, Err(LinkError::Setup(_))));
    }

    #[tokio::test]
    async fn test_connect_video_succeeds() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (stream, accepted) = tokio::join!(connect_video(addr, Duration::from_secs(1)), listener.accept());
        assert!(stream.is_ok());
        assert!(accepted.is_ok());
    }
}
