//! # Command Session
//!
//! Drives the command channel through its whole life:
//!
//! ```text
//! Handshake(calibrate-gyro → controls-on → hover-on → rotor-on) → Steering → Landing → Closed
//! ```
//!
//! Every command is resent once per tick. The aircraft never acknowledges
//! anything, so each handshake step is simply held for a fixed duration.
//! Sends are fire-and-forget: a failed write is logged and counted, and the
//! next tick retries by construction.
//!
//! A shutdown request is observed at any point before `Closed`. During the
//! handshake it aborts the remaining steps; in both cases the session goes
//! straight to `Landing`.

use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tokio::time::{interval, Duration, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::command::protocol::{CommandFrame, CommandKind, CommandPayload};
use crate::error::{LinkError, Result};
use crate::link::CommandSink;
use crate::steering::direction::lock_payload;
use crate::steering::{DirectionState, SteerTrim, SteeringProfile};

/// Interval between two sends (40 Hz)
pub const DEFAULT_TICK: Duration = Duration::from_millis(25);

/// How long each handshake command is held
pub const DEFAULT_HANDSHAKE_HOLD: Duration = Duration::from_secs(2);

/// How long the landing command is held
pub const DEFAULT_LANDING_HOLD: Duration = Duration::from_millis(500);

/// Ordered handshake steps
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeStep {
    CalibrateGyro,
    ControlsOn,
    HoverOn,
    RotorOn,
}

impl HandshakeStep {
    /// All steps in the order they are sent
    pub const SEQUENCE: [HandshakeStep; 4] = [
        HandshakeStep::CalibrateGyro,
        HandshakeStep::ControlsOn,
        HandshakeStep::HoverOn,
        HandshakeStep::RotorOn,
    ];

    /// Command sent during this step
    pub const fn command(self) -> CommandKind {
        match self {
            HandshakeStep::CalibrateGyro => CommandKind::CalibrateGyro,
            HandshakeStep::ControlsOn => CommandKind::ControlsOn,
            HandshakeStep::HoverOn => CommandKind::HoverOn,
            HandshakeStep::RotorOn => CommandKind::RotorOn,
        }
    }
}

/// Session state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Handshake(HandshakeStep),
    Steering,
    Landing,
    Closed,
}

/// Timing of the command channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionTiming {
    pub tick: Duration,
    pub handshake_hold: Duration,
    pub landing_hold: Duration,
}

impl Default for SessionTiming {
    fn default() -> Self {
        Self {
            tick: DEFAULT_TICK,
            handshake_hold: DEFAULT_HANDSHAKE_HOLD,
            landing_hold: DEFAULT_LANDING_HOLD,
        }
    }
}

/// Summary returned once the session is closed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionReport {
    pub frames_sent: u64,
    pub send_failures: u64,
    /// Whether all four handshake steps ran to completion
    pub handshake_completed: bool,
    pub final_state: SessionState,
}

/// Command session over a [`CommandSink`]
pub struct CommandSession<S> {
    sink: S,
    state: SessionState,
    timing: SessionTiming,
    profile: SteeringProfile,
    direction: DirectionState,
    steer: Arc<Mutex<CommandPayload>>,
    shutdown_command: CommandKind,
    frames_sent: u64,
    send_failures: u64,
}

impl<S> std::fmt::Debug for CommandSession<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandSession")
            .field("state", &self.state)
            .field("frames_sent", &self.frames_sent)
            .field("send_failures", &self.send_failures)
            .finish_non_exhaustive()
    }
}

impl<S: CommandSink> CommandSession<S> {
    /// Create a session in the first handshake step
    pub fn new(sink: S, timing: SessionTiming, profile: SteeringProfile, direction: DirectionState) -> Self {
        Self {
            sink,
            state: SessionState::Handshake(HandshakeStep::CalibrateGyro),
            timing,
            profile,
            direction,
            steer: Arc::new(Mutex::new(CommandPayload::for_kind(CommandKind::Steer))),
            shutdown_command: CommandKind::Land,
            frames_sent: 0,
            send_failures: 0,
        }
    }

    /// Use `command` instead of land for the shutdown sequence
    ///
    /// Only [`CommandKind::Land`] and [`CommandKind::Stop`] make sense here.
    pub fn with_shutdown_command(mut self, command: CommandKind) -> Self {
        self.shutdown_command = command;
        self
    }

    /// Current state
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Handle for drift trimming of the steer payload
    pub fn trim_handle(&self) -> SteerTrim {
        SteerTrim::new(self.steer.clone())
    }

    /// Run the full lifecycle until shutdown is requested and landing completes
    ///
    /// A dropped `shutdown` sender counts as a shutdown request.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> SessionReport {
        let handshake_completed = self.handshake(&mut shutdown).await;

        if handshake_completed {
            self.steer_until(&mut shutdown).await;
        }

        self.land().await;

        SessionReport {
            frames_sent: self.frames_sent,
            send_failures: self.send_failures,
            handshake_completed,
            final_state: self.state,
        }
    }

    /// Send the handshake sequence
    ///
    /// Returns `false` if shutdown was requested before the last step ended.
    pub async fn handshake(&mut self, shutdown: &mut watch::Receiver<bool>) -> bool {
        info!("Sending handshake sequence");

        for step in HandshakeStep::SEQUENCE {
            self.state = SessionState::Handshake(step);
            let payload = CommandPayload::for_kind(step.command());
            info!("Handshake step: {}", step.command().name());

            let hold = self.timing.handshake_hold;
            tokio::select! {
                biased;
                _ = shutdown_requested(shutdown) => {
                    warn!("Shutdown requested during handshake ({})", step.command().name());
                    return false;
                }
                _ = self.send_for(payload, hold) => {}
            }
        }

        self.state = SessionState::Steering;
        info!("Handshake complete, steering");
        true
    }

    /// Send one steer frame per tick until shutdown is requested
    pub async fn steer_until(&mut self, shutdown: &mut watch::Receiver<bool>) {
        self.state = SessionState::Steering;

        let mut ticker = interval(self.timing.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = shutdown_requested(shutdown) => {
                    info!("Shutdown requested, leaving steering");
                    break;
                }
                _ = ticker.tick() => {
                    self.steer_tick().await;
                }
            }
        }
    }

    /// Build and send one steer frame from the current direction
    pub async fn steer_tick(&mut self) {
        let direction = self.direction.get();
        let axes = self.profile.axes(direction);

        let frame = {
            let mut payload = lock_payload(&self.steer);
            payload.set_axes(axes);
            payload.to_frame()
        };

        debug!(
            "Steer x={} y={} z={} -> uplift={} roll={} pitch={}",
            direction.x, direction.y, direction.z, axes.uplift, axes.roll, axes.pitch
        );

        if let Err(e) = self.transmit(&frame).await {
            debug!("Steer frame not sent: {}", e);
        }
    }

    /// Send the shutdown command for the landing hold, then close
    pub async fn land(&mut self) {
        if self.state == SessionState::Closed {
            return;
        }

        self.state = SessionState::Landing;
        info!("Sending {} sequence", self.shutdown_command.name());

        let payload = CommandPayload::for_kind(self.shutdown_command);
        self.send_for(payload, self.timing.landing_hold).await;

        self.state = SessionState::Closed;
        info!(
            "Command session closed ({} frames sent, {} failed)",
            self.frames_sent, self.send_failures
        );
    }

    /// Resend `payload` once per tick for `hold`
    ///
    /// The checksum is recomputed for every send.
    async fn send_for(&mut self, payload: CommandPayload, hold: Duration) {
        let deadline = Instant::now() + hold;
        let mut ticker = interval(self.timing.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            if Instant::now() >= deadline {
                break;
            }
            if self.transmit(&payload.to_frame()).await.is_err() {
                break;
            }
        }
    }

    /// Send one frame
    ///
    /// # Errors
    ///
    /// Returns [`LinkError::SessionClosed`] once the session is closed.
    /// Transport failures are logged and absorbed.
    pub async fn transmit(&mut self, frame: &CommandFrame) -> Result<()> {
        if self.state == SessionState::Closed {
            return Err(LinkError::SessionClosed);
        }

        match self.sink.send_frame(frame.as_bytes()).await {
            Ok(()) => self.frames_sent += 1,
            Err(e) => {
                self.send_failures += 1;
                let err = LinkError::TransportWrite(e.to_string());
                warn!("{}", err);
            }
        }
        Ok(())
    }
}

/// Resolve once shutdown is requested or the sender is gone
async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stop| *stop).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::sink_trait::mocks::MockCommandSink;
    use crate::steering::Direction;
    use std::io;

    fn land_frame() -> Vec<u8> {
        CommandPayload::for_kind(CommandKind::Land).to_frame().as_bytes().to_vec()
    }

    fn frame_of(kind: CommandKind) -> Vec<u8> {
        CommandPayload::for_kind(kind).to_frame().as_bytes().to_vec()
    }

    // Steer and hover-on share a trailer; hover-on has fixed axis bytes
    fn is_steer(frame: &[u8]) -> bool {
        frame[6..10] == [0x90, 0x10, 0x10, 0x00] && frame[2..6] != [0x7e, 0x3f, 0x40, 0x3f]
    }

    fn fast_timing() -> SessionTiming {
        SessionTiming {
            tick: Duration::from_millis(25),
            handshake_hold: Duration::from_millis(100),
            landing_hold: Duration::from_millis(100),
        }
    }

    #[test]
    fn test_default_timing() {
        let timing = SessionTiming::default();
        assert_eq!(timing.tick, Duration::from_millis(25));
        assert_eq!(timing.handshake_hold, Duration::from_secs(2));
        assert_eq!(timing.landing_hold, Duration::from_millis(500));
    }

    #[test]
    fn test_handshake_sequence_order() {
        let commands: Vec<_> = HandshakeStep::SEQUENCE.iter().map(|s| s.command()).collect();
        assert_eq!(
            commands,
            vec![
                CommandKind::CalibrateGyro,
                CommandKind::ControlsOn,
                CommandKind::HoverOn,
                CommandKind::RotorOn,
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_handshake_sends_steps_in_order() {
        let sink = MockCommandSink::new();
        let mut session = CommandSession::new(
            sink.clone(),
            fast_timing(),
            SteeringProfile::default(),
            DirectionState::default(),
        );
        let (_tx, mut rx) = watch::channel(false);

        assert!(session.handshake(&mut rx).await);
        assert_eq!(session.state(), SessionState::Steering);

        let frames = sink.get_written_data();
        assert!(!frames.is_empty());

        // Collapse consecutive duplicates into the step sequence
        let mut steps: Vec<Vec<u8>> = Vec::new();
        for frame in frames {
            if steps.last() != Some(&frame) {
                steps.push(frame);
            }
        }
        assert_eq!(
            steps,
            vec![
                frame_of(CommandKind::CalibrateGyro),
                frame_of(CommandKind::ControlsOn),
                frame_of(CommandKind::HoverOn),
                frame_of(CommandKind::RotorOn),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_each_step_is_resent_every_tick() {
        let sink = MockCommandSink::new();
        let mut session = CommandSession::new(
            sink.clone(),
            SessionTiming::default(),
            SteeringProfile::default(),
            DirectionState::default(),
        );
        let (_tx, mut rx) = watch::channel(false);

        session.handshake(&mut rx).await;

        let gyro = frame_of(CommandKind::CalibrateGyro);
        let count = sink.get_written_data().iter().filter(|f| **f == gyro).count();
        // 2 s at 25 ms
        assert!((79..=81).contains(&count), "gyro frames: {}", count);
    }

    #[tokio::test(start_paused = true)]
    async fn test_land_sends_land_frames_then_closes() {
        let sink = MockCommandSink::new();
        let mut session = CommandSession::new(
            sink.clone(),
            SessionTiming::default(),
            SteeringProfile::default(),
            DirectionState::default(),
        );

        session.land().await;
        assert_eq!(session.state(), SessionState::Closed);

        let frames = sink.get_written_data();
        // 500 ms at 25 ms
        assert!((19..=21).contains(&frames.len()), "land frames: {}", frames.len());
        assert!(frames.iter().all(|f| *f == land_frame()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_closed_session_refuses_sends() {
        let sink = MockCommandSink::new();
        let mut session = CommandSession::new(
            sink.clone(),
            fast_timing(),
            SteeringProfile::default(),
            DirectionState::default(),
        );
        session.land().await;
        let sent = sink.get_written_data().len();

        let frame = CommandPayload::for_kind(CommandKind::Steer).to_frame();
        assert!(matches!(
            session.transmit(&frame).await,
            Err(LinkError::SessionClosed)
        ));

        // Landing twice is a no-op
        session.land().await;
        assert_eq!(sink.get_written_data().len(), sent);
    }

    #[tokio::test(start_paused = true)]
    async fn test_steer_tick_encodes_direction() {
        let sink = MockCommandSink::new();
        let direction = DirectionState::new(Direction::new(1, 0, -1));
        let mut session = CommandSession::new(
            sink.clone(),
            fast_timing(),
            SteeringProfile::default(),
            direction,
        );

        session.steer_tick().await;

        let frames = sink.get_written_data();
        assert_eq!(frames.len(), 1);
        let frame = &frames[0];
        assert_eq!(frame[2], 127); // uplift 0
        assert_eq!(frame[3], 63); // yaw 0
        assert_eq!(frame[4], 51); // pitch -0.2
        assert_eq!(frame[5], 76); // roll +0.2
        let expected = CommandPayload::from_bytes([
            0xff, 0x08, 127, 63, 51, 76, 0x90, 0x10, 0x10, 0x00,
        ])
        .to_frame();
        assert_eq!(frame.as_slice(), expected.as_bytes());
    }

    #[tokio::test(start_paused = true)]
    async fn test_steering_resends_same_frame_every_tick() {
        let sink = MockCommandSink::new();
        let direction = DirectionState::new(Direction::new(1, 0, -1));
        let mut session = CommandSession::new(
            sink.clone(),
            fast_timing(),
            SteeringProfile::default(),
            direction.clone(),
        );
        let (tx, mut rx) = watch::channel(false);

        let task = tokio::spawn(async move {
            session.steer_until(&mut rx).await;
            session
        });

        // 10 ticks of 25 ms, first tick fires immediately
        tokio::time::sleep(Duration::from_millis(250)).await;
        let held = sink.get_written_data();
        assert!((10..=11).contains(&held.len()), "sent {} frames", held.len());
        assert!(held.iter().all(|f| *f == held[0]));
        assert_eq!(&held[0][2..6], &[127, 63, 51, 76]);

        // Climb: uplift 0.37, everything else neutral
        let before = held.len();
        direction.set(Direction::new(0, 1, 0));
        tokio::time::sleep(Duration::from_millis(50)).await;

        let frames = sink.get_written_data();
        assert!(frames.len() > before);
        let expected = CommandPayload::from_bytes([
            0xff, 0x08, 174, 63, 63, 63, 0x90, 0x10, 0x10, 0x00,
        ])
        .to_frame();
        assert!(frames[before..].iter().all(|f| f.as_slice() == expected.as_bytes()));

        tx.send(true).unwrap();
        let session = task.await.unwrap();
        assert_eq!(session.state(), SessionState::Steering);
    }

    #[tokio::test(start_paused = true)]
    async fn test_trim_applies_to_next_steer_frame() {
        let sink = MockCommandSink::new();
        let mut session = CommandSession::new(
            sink.clone(),
            fast_timing(),
            SteeringProfile::default(),
            DirectionState::default(),
        );
        let trim = session.trim_handle();

        session.steer_tick().await;
        trim.adjust_steering(144, 16, 17);
        session.steer_tick().await;

        let frames = sink.get_written_data();
        assert_eq!(&frames[0][6..9], &[0x90, 0x10, 0x10]);
        assert_eq!(&frames[1][6..9], &[144, 16, 17]);
        assert_ne!(frames[0][10], frames[1][10]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_failures_do_not_change_state() {
        let sink = MockCommandSink::new();
        sink.set_write_error(io::ErrorKind::ConnectionRefused);

        let mut session = CommandSession::new(
            sink.clone(),
            fast_timing(),
            SteeringProfile::default(),
            DirectionState::default(),
        );
        let (_tx, mut rx) = watch::channel(false);

        assert!(session.handshake(&mut rx).await);
        assert_eq!(session.state(), SessionState::Steering);
        assert!(session.send_failures > 0);
        assert_eq!(session.frames_sent, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_mid_steering_lands_without_further_steering() {
        let sink = MockCommandSink::new();
        let direction = DirectionState::new(Direction::new(1, 0, -1));
        let session = CommandSession::new(
            sink.clone(),
            fast_timing(),
            SteeringProfile::default(),
            direction,
        );
        let (tx, rx) = watch::channel(false);

        let task = tokio::spawn(session.run(rx));

        // 4 handshake steps of 100 ms plus some steering
        tokio::time::sleep(Duration::from_millis(600)).await;
        tx.send(true).unwrap();

        let report = task.await.unwrap();
        assert!(report.handshake_completed);
        assert_eq!(report.final_state, SessionState::Closed);

        let frames = sink.get_written_data();
        let first_land = frames
            .iter()
            .position(|f| *f == land_frame())
            .expect("at least one land frame");

        assert!(frames[..first_land].iter().any(|f| is_steer(f)));
        assert!(frames[first_land..].iter().all(|f| *f == land_frame()));
        assert_eq!(report.frames_sent as usize, frames.len());
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_during_handshake_skips_steering() {
        let sink = MockCommandSink::new();
        let session = CommandSession::new(
            sink.clone(),
            fast_timing(),
            SteeringProfile::default(),
            DirectionState::default(),
        );
        let (tx, rx) = watch::channel(false);

        let task = tokio::spawn(session.run(rx));
        tokio::time::sleep(Duration::from_millis(150)).await;
        tx.send(true).unwrap();

        let report = task.await.unwrap();
        assert!(!report.handshake_completed);

        let frames = sink.get_written_data();
        assert!(!frames.iter().any(|f| is_steer(f)));
        assert_eq!(frames.last(), Some(&land_frame()));
        assert!(!frames.contains(&frame_of(CommandKind::RotorOn)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_sender_counts_as_shutdown() {
        let sink = MockCommandSink::new();
        let session = CommandSession::new(
            sink.clone(),
            fast_timing(),
            SteeringProfile::default(),
            DirectionState::default(),
        );
        let (tx, rx) = watch::channel(false);
        drop(tx);

        let report = session.run(rx).await;
        assert_eq!(report.final_state, SessionState::Closed);
        assert!(sink.get_written_data().iter().all(|f| *f == land_frame()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_as_shutdown_command() {
        let sink = MockCommandSink::new();
        let mut session = CommandSession::new(
            sink.clone(),
            fast_timing(),
            SteeringProfile::default(),
            DirectionState::default(),
        )
        .with_shutdown_command(CommandKind::Stop);

        session.land().await;

        let frames = sink.get_written_data();
        assert!(!frames.is_empty());
        assert!(frames.iter().all(|f| *f == frame_of(CommandKind::Stop)));
    }
}
