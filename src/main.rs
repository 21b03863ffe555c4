//! # JJRC Link
//!
//! Ground-side controller for JJRC quadcopters over their Wi-Fi link.
//!
//! Connects to the aircraft's video stream, arms it with the handshake
//! sequence, steers it from the analysis side and lands it on Ctrl+C,
//! SIGTERM, or any analysis failure.

use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use jjrc_link::analysis::StreamMonitor;
use jjrc_link::config::{Config, LoggingConfig};
use jjrc_link::supervisor::Supervisor;

/// File name prefix of the rolling log files
const LOG_FILE_PREFIX: &str = "jjrc-link.log";

/// Main entry point for JJRC Link
///
/// # Control Flow
///
/// 1. **Initialization**
///    - Load configuration from the path given as first argument, or use defaults
///    - Set up logging (stdout, plus daily rolling files when configured)
///
/// 2. **Flight**
///    - Connect video, wait for the first keyframe
///    - Handshake, then steer every 25 ms from the shared direction
///
/// 3. **Shutdown**
///    - Ctrl+C / SIGTERM, analysis failure or stream end all land the aircraft
///    - Exit code 0 after a signal, 1 otherwise
///
/// # Examples
///
/// ```bash
/// cargo run --release -- config/default.toml
/// ```
#[tokio::main]
async fn main() -> Result<()> {
    let config = match std::env::args_os().nth(1).map(PathBuf::from) {
        Some(path) => Config::load(&path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => Config::default(),
    };

    let log_guard = init_logging(&config.logging);

    info!("JJRC Link v{} starting...", env!("CARGO_PKG_VERSION"));
    info!(
        "Aircraft at {} (commands :{}, video :{})",
        config.link.drone_host, config.link.command_port, config.link.video_port
    );

    let supervisor = Supervisor::new(config);
    let code = match supervisor.run(StreamMonitor::new(), shutdown_signal()).await {
        Ok(outcome) => {
            info!("Stopped: {}", outcome.reason);
            outcome.reason.exit_code()
        }
        Err(e) => {
            error!("{}", e);
            1
        }
    };

    // Flush file logs; exiting directly does not wait on a still-busy analysis worker
    drop(log_guard);
    std::process::exit(code);
}

/// Install the tracing subscriber
///
/// `RUST_LOG` takes precedence over the configured level. The returned guard
/// must live until exit for buffered file output to be written.
fn init_logging(logging: &LoggingConfig) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));

    let (file_layer, guard) = match &logging.directory {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (Some(fmt::layer().with_writer(writer).with_ansi(false)), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(file_layer)
        .init();

    guard
}

/// Resolves on Ctrl+C or, on Unix, SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, landing..."),
        _ = terminate => info!("Received SIGTERM, landing..."),
    }
}
