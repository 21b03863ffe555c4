//! # Analysis Boundary
//!
//! The image analysis / tracking collaborator plugs in here through
//! [`FrameAnalyzer`]. It receives every frame unit that survives pacing and
//! writes its steering intent into the shared [`DirectionState`].
//!
//! [`run_analysis`] is the consumption loop. It runs on a blocking worker:
//! - a [`LinkError::Decode`] (or any recoverable error) drops the unit and continues
//! - any other error ends the loop and is reported as an analysis fault
//! - after each processed unit the [`FramePacer`] decides to sleep or to skip
//!   queued units so playback stays on wall-clock time

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::{LinkError, Result};
use crate::steering::{DirectionState, SteerTrim};
use crate::video::{FramePacer, FrameUnit, PaceAction};

/// Handles available to the analyzer
#[derive(Debug, Clone)]
pub struct AnalysisContext {
    /// Steering intent read by the command session every tick
    pub direction: DirectionState,
    /// Drift trim onto the steer payload
    pub trim: SteerTrim,
}

/// External image analysis / tracking collaborator
#[cfg_attr(test, mockall::automock)]
pub trait FrameAnalyzer: Send {
    /// Decode and analyze one frame unit
    ///
    /// Return [`LinkError::Decode`] for a unit that cannot be decoded; any
    /// non-recoverable error triggers a landing.
    fn analyze(&mut self, unit: &FrameUnit, ctx: &AnalysisContext) -> Result<()>;
}

/// Counters reported when the queue closes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AnalysisStats {
    pub processed: u64,
    pub dropped: u64,
    pub skipped: u64,
}

/// Consume frame units until the queue closes or `cancel` is set
///
/// # Errors
///
/// Returns [`LinkError::AnalysisFault`] for the first non-recoverable
/// analyzer error.
pub fn run_analysis<A: FrameAnalyzer>(
    mut analyzer: A,
    mut units: mpsc::Receiver<FrameUnit>,
    ctx: AnalysisContext,
    mut pacer: FramePacer,
    cancel: Arc<AtomicBool>,
) -> Result<AnalysisStats> {
    let mut stats = AnalysisStats::default();

    while let Some(unit) = units.blocking_recv() {
        if cancel.load(Ordering::Relaxed) {
            debug!("Analysis cancelled");
            break;
        }

        let started = Instant::now();
        match analyzer.analyze(&unit, &ctx) {
            Ok(()) => stats.processed += 1,
            Err(e) if e.is_recoverable() => {
                stats.dropped += 1;
                warn!("Dropping {}-byte frame unit: {}", unit.len(), e);
                continue;
            }
            Err(LinkError::AnalysisFault(msg)) => return Err(LinkError::AnalysisFault(msg)),
            Err(e) => return Err(LinkError::AnalysisFault(e.to_string())),
        }

        match pacer.pace(started.elapsed()) {
            PaceAction::Sleep(d) => std::thread::sleep(d),
            PaceAction::Skip(0) => {}
            PaceAction::Skip(n) => {
                let mut skipped = 0;
                while skipped < n && units.try_recv().is_ok() {
                    skipped += 1;
                }
                stats.skipped += skipped as u64;
                debug!("Behind real time, skipped {} of {} frame units", skipped, n);
            }
        }
    }

    info!(
        "Frame queue closed ({} processed, {} dropped, {} skipped)",
        stats.processed, stats.dropped, stats.skipped
    );
    Ok(stats)
}

/// Analyzer that only watches the stream and never steers
///
/// The aircraft holds its initial direction. Used when no tracker is plugged in.
#[derive(Debug, Default)]
pub struct StreamMonitor {
    units: u64,
    keyframes: u64,
    bytes: u64,
}

/// Units between two monitor log lines (10 s at 25 fps)
const MONITOR_LOG_INTERVAL: u64 = 250;

impl StreamMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Units seen so far
    pub fn units(&self) -> u64 {
        self.units
    }

    /// Keyframe units seen so far
    pub fn keyframes(&self) -> u64 {
        self.keyframes
    }
}

impl FrameAnalyzer for StreamMonitor {
    fn analyze(&mut self, unit: &FrameUnit, _ctx: &AnalysisContext) -> Result<()> {
        self.units += 1;
        self.bytes += unit.len() as u64;
        if unit.is_keyframe() {
            self.keyframes += 1;
        }
        if self.units % MONITOR_LOG_INTERVAL == 0 {
            info!(
                "Video: {} units, {} keyframes, {} bytes",
                self.units, self.keyframes, self.bytes
            );
        }
        Ok(())
    }
}
