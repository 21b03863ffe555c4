//! # Supervisor
//!
//! Owns the lifecycle of one flight:
//!
//! 1. Connect the video channel, start ingestion and the start beacon
//! 2. Wait for the first keyframe
//! 3. Open the command channel and start the command session
//! 4. Run analysis on a blocking worker
//! 5. On a termination signal, an analysis fault or panic, or the end of the
//!    video stream: land, stop the background tasks and report why
//!
//! Termination before the first keyframe exits without landing, since no
//! command link exists yet.

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::{AbortHandle, JoinError};
use tracing::{error, info, warn};

use crate::analysis::{run_analysis, AnalysisContext, FrameAnalyzer};
use crate::config::Config;
use crate::error::{LinkError, Result};
use crate::link::{CommandSink, UdpCommandSink};
use crate::session::{CommandSession, SessionReport};
use crate::steering::DirectionState;
use crate::video::stream::{beacon_loop, connect_video, ingest_video, IngestStats};
use crate::video::FramePacer;

/// Why the supervisor stopped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShutdownReason {
    /// Ctrl+C or SIGTERM
    Signal,
    /// The analyzer returned a non-recoverable error
    AnalysisFault(String),
    /// The analysis worker panicked
    AnalysisPanic(String),
    /// The video stream closed after it became ready
    StreamEnded,
    /// The video transport failed after it became ready
    StreamFailed(String),
}

impl ShutdownReason {
    /// Process exit code for this reason
    pub fn exit_code(&self) -> i32 {
        match self {
            ShutdownReason::Signal => 0,
            _ => 1,
        }
    }
}

impl fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShutdownReason::Signal => write!(f, "termination signal"),
            ShutdownReason::AnalysisFault(msg) => write!(f, "analysis fault: {}", msg),
            ShutdownReason::AnalysisPanic(msg) => write!(f, "analysis panic: {}", msg),
            ShutdownReason::StreamEnded => write!(f, "video stream ended"),
            ShutdownReason::StreamFailed(msg) => write!(f, "video stream failed: {}", msg),
        }
    }
}

/// Result of a supervised run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupervisorOutcome {
    pub reason: ShutdownReason,
    /// `None` when the run ended before the command session started
    pub session: Option<SessionReport>,
}

/// Aborts the spawned transport tasks when dropped
#[derive(Debug, Default)]
struct BackgroundTasks(Vec<AbortHandle>);

impl BackgroundTasks {
    fn track(&mut self, handle: AbortHandle) {
        self.0.push(handle);
    }
}

impl Drop for BackgroundTasks {
    fn drop(&mut self) {
        for handle in &self.0 {
            handle.abort();
        }
    }
}

/// Flight lifecycle owner
#[derive(Debug, Clone)]
pub struct Supervisor {
    config: Config,
}

impl Supervisor {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Connect to the aircraft and fly until `termination` resolves or a
    /// fail-safe condition occurs
    ///
    /// # Errors
    ///
    /// Returns [`LinkError::Setup`] if either channel cannot be opened or the
    /// video stream ends before its first keyframe.
    pub async fn run<A, T>(&self, analyzer: A, termination: T) -> Result<SupervisorOutcome>
    where
        A: FrameAnalyzer + 'static,
        T: Future<Output = ()>,
    {
        let link = &self.config.link;
        let video_addr = resolve(&link.drone_host, link.video_port).await?;
        let command_addr = resolve(&link.drone_host, link.command_port).await?;

        let stream = connect_video(video_addr, self.config.connect_timeout()).await?;
        let (reader, writer) = stream.into_split();

        self.run_with(
            reader,
            writer,
            UdpCommandSink::connect(command_addr),
            analyzer,
            termination,
        )
        .await
    }

    /// Run the lifecycle over already-opened transports
    ///
    /// `connect_commands` is only awaited once the video stream is ready.
    pub async fn run_with<R, W, S, C, A, T>(
        &self,
        reader: R,
        writer: W,
        connect_commands: C,
        analyzer: A,
        termination: T,
    ) -> Result<SupervisorOutcome>
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
        S: CommandSink + 'static,
        C: Future<Output = Result<S>>,
        A: FrameAnalyzer + 'static,
        T: Future<Output = ()>,
    {
        let config = &self.config;
        let shutdown_command = config.shutdown_command_kind()?;

        let recorder = match &config.video.record_path {
            Some(path) => {
                let file = File::create(path).await.map_err(|e| {
                    LinkError::Setup(format!("Failed to create recording {}: {}", path.display(), e))
                })?;
                info!("Recording video to {}", path.display());
                Some(file)
            }
            None => None,
        };

        let (unit_tx, unit_rx) = mpsc::channel(config.video.queue_depth);
        let (ready_tx, ready_rx) = oneshot::channel();
        let mut background = BackgroundTasks::default();

        let mut ingest = tokio::spawn(ingest_video(
            reader,
            unit_tx,
            ready_tx,
            recorder,
            config.video.read_buffer_size,
        ));
        background.track(ingest.abort_handle());
        let beacon = tokio::spawn(beacon_loop(writer, config.beacon_interval()));
        background.track(beacon.abort_handle());

        tokio::pin!(termination);

        info!("Waiting for first keyframe");
        tokio::select! {
            biased;
            _ = &mut termination => {
                info!("Terminated before video was ready, exiting without landing");
                return Ok(SupervisorOutcome {
                    reason: ShutdownReason::Signal,
                    session: None,
                });
            }
            ready = ready_rx => {
                if ready.is_err() {
                    return Err(LinkError::Setup(not_ready_reason((&mut ingest).await)));
                }
            }
        }

        let sink = connect_commands.await?;

        let direction = DirectionState::new(config.initial_direction());
        let session = CommandSession::new(
            sink,
            config.session_timing(),
            config.profile(),
            direction.clone(),
        )
        .with_shutdown_command(shutdown_command);
        let ctx = AnalysisContext {
            direction,
            trim: session.trim_handle(),
        };

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let session_task = tokio::spawn(session.run(shutdown_rx));

        let cancel = Arc::new(AtomicBool::new(false));
        let pacer = FramePacer::new(config.frame_interval());
        let mut analysis = tokio::task::spawn_blocking({
            let cancel = cancel.clone();
            move || run_analysis(analyzer, unit_rx, ctx, pacer, cancel)
        });

        let reason = tokio::select! {
            _ = &mut termination => {
                info!("Termination signal received");
                ShutdownReason::Signal
            }
            joined = &mut analysis => match joined {
                Ok(Ok(stats)) => {
                    info!("Frame queue closed ({} units analyzed)", stats.processed);
                    stream_end_reason((&mut ingest).await)
                }
                Ok(Err(e)) => {
                    error!("{}", e);
                    ShutdownReason::AnalysisFault(e.to_string())
                }
                Err(e) => {
                    let reason = analysis_join_reason(e);
                    error!("Analysis worker stopped: {}", reason);
                    reason
                }
            },
        };

        info!("Shutting down ({}), landing", reason);
        cancel.store(true, Ordering::Relaxed);
        let _ = shutdown_tx.send(true);

        let session = match session_task.await {
            Ok(report) => {
                info!(
                    "Command session closed ({} frames sent, {} send failures)",
                    report.frames_sent, report.send_failures
                );
                Some(report)
            }
            Err(e) => {
                error!("Command session task failed: {}", e);
                None
            }
        };

        drop(background);
        Ok(SupervisorOutcome { reason, session })
    }
}

async fn resolve(host: &str, port: u16) -> Result<SocketAddr> {
    tokio::net::lookup_host((host, port))
        .await
        .map_err(|e| LinkError::Setup(format!("Failed to resolve {}:{}: {}", host, port, e)))?
        .next()
        .ok_or_else(|| LinkError::Setup(format!("No address found for {}:{}", host, port)))
}

fn not_ready_reason(ingest: std::result::Result<Result<IngestStats>, JoinError>) -> String {
    match ingest {
        Ok(Ok(stats)) => format!(
            "Video stream ended after {} bytes without a keyframe",
            stats.bytes_read
        ),
        Ok(Err(e)) => format!("Video stream failed before first keyframe: {}", e),
        Err(e) => format!("Video ingestion task failed: {}", e),
    }
}

fn stream_end_reason(ingest: std::result::Result<Result<IngestStats>, JoinError>) -> ShutdownReason {
    match ingest {
        Ok(Ok(stats)) => {
            info!("Video stream ended after {} bytes", stats.bytes_read);
            ShutdownReason::StreamEnded
        }
        Ok(Err(e)) => ShutdownReason::StreamFailed(e.to_string()),
        Err(e) => ShutdownReason::StreamFailed(format!("ingestion task failed: {}", e)),
    }
}

fn analysis_join_reason(err: JoinError) -> ShutdownReason {
    if err.is_panic() {
        ShutdownReason::AnalysisPanic(panic_message(err.into_panic()))
    } else {
        warn!("Analysis worker cancelled");
        ShutdownReason::AnalysisFault(err.to_string())
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
