//! Perception-to-actuation control loop.
//!
//! Each tick:
//! 1. Pulls one frame from the source (blocking)
//! 2. Resizes it to the working resolution
//! 3. Runs the marker detector
//! 4. Steers toward the first marker, or stops when there is none
//!
//! Exactly one `MotorCommand` is dispatched per tick. Ticks never overlap.
//!
//! `run` owns the source lifecycle: it connects the source, and on every exit
//! path (shutdown signal, tick fault, or unwinding through `Drop`) sends a final
//! stop command and releases the source exactly once.

use anyhow::{anyhow, Context, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::actuate::{ActuationSink, MotorCommand};
use crate::config::{CalibrationConstants, ControlSettings};
use crate::detect::MarkerDetector;
use crate::geometry::{self, MarkerEstimate};
use crate::ingest::FrameSource;
use crate::steering::SteeringLaw;

/// Poll interval while waiting out the camera warm-up.
const WARM_UP_POLL: Duration = Duration::from_millis(20);

/// Cancellation flag shared between the loop and a signal handler.
#[derive(Clone, Debug, Default)]
pub struct ShutdownSignal {
    flag: Arc<AtomicBool>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a signal that is triggered by Ctrl-C.
    pub fn install_ctrlc() -> Result<Self> {
        let signal = Self::new();
        let handler_signal = signal.clone();
        ctrlc::set_handler(move || {
            handler_signal.trigger();
        })
        .context("install Ctrl-C handler")?;
        Ok(signal)
    }

    pub fn trigger(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_triggered(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoopState {
    /// Constructed, source not yet connected.
    Idle,
    Running,
    Stopped,
}

/// What a single tick did.
#[derive(Clone, Debug, PartialEq)]
pub enum TickOutcome {
    Steered {
        payload: String,
        estimate: MarkerEstimate,
        command: MotorCommand,
    },
    /// No marker in view; the robot was stopped.
    Idle,
}

impl TickOutcome {
    pub fn command(&self) -> MotorCommand {
        match self {
            TickOutcome::Steered { command, .. } => *command,
            TickOutcome::Idle => MotorCommand::STOP,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LoopStats {
    pub ticks: u64,
    pub steered: u64,
    pub idle: u64,
}

pub struct ControlLoop<S: FrameSource, D: MarkerDetector, A: ActuationSink> {
    source: S,
    detector: D,
    sink: A,
    calibration: CalibrationConstants,
    steering: SteeringLaw,
    settings: ControlSettings,
    state: LoopState,
    stats: LoopStats,
}

impl<S: FrameSource, D: MarkerDetector, A: ActuationSink> ControlLoop<S, D, A> {
    pub fn new(
        source: S,
        detector: D,
        sink: A,
        calibration: CalibrationConstants,
        settings: ControlSettings,
    ) -> Result<Self> {
        calibration.validate()?;
        let steering = SteeringLaw::new(&calibration)?;
        Ok(Self {
            source,
            detector,
            sink,
            calibration,
            steering,
            settings,
            state: LoopState::Idle,
            stats: LoopStats::default(),
        })
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn stats(&self) -> LoopStats {
        self.stats
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn detector(&self) -> &D {
        &self.detector
    }

    pub fn sink(&self) -> &A {
        &self.sink
    }

    /// Run until `shutdown` is triggered or a tick fails.
    ///
    /// The final stop command and source release happen before this returns,
    /// whatever the outcome. A tick fault takes precedence over a cleanup fault.
    pub fn run(&mut self, shutdown: &ShutdownSignal) -> Result<LoopStats> {
        if self.state == LoopState::Stopped {
            return Err(anyhow!("control loop already stopped"));
        }

        let outcome = self.start(shutdown).and_then(|()| self.drive(shutdown));
        let halted = self.halt();
        match (outcome, halted) {
            (Err(err), Err(cleanup)) => {
                log::error!("cleanup after failed run also failed: {:#}", cleanup);
                Err(err)
            }
            (Err(err), Ok(())) => Err(err),
            (Ok(()), halted) => halted.map(|()| self.stats),
        }
    }

    /// Run a single perception-to-actuation cycle.
    pub fn tick(&mut self) -> Result<TickOutcome> {
        let frame = self.source.next_frame().context("capture frame")?;
        let frame = frame.resize(
            self.calibration.frame_width_px,
            self.calibration.frame_height_px,
        )?;
        let detections = self
            .detector
            .detect(&frame)
            .with_context(|| format!("detect markers with {}", self.detector.name()))?;

        self.stats.ticks += 1;

        let outcome = match detections.into_iter().next() {
            None => TickOutcome::Idle,
            Some(marker) => {
                let estimate = geometry::estimate(
                    &marker.bbox,
                    frame.width,
                    frame.height,
                    &self.calibration,
                )?;
                let command = self.steering.command_for(&estimate);
                log::debug!(
                    "marker {:?} ({}) x_fraction={:.3} distance={}cm left={} right={}",
                    marker.payload,
                    marker.symbology.label(),
                    estimate.x_fraction,
                    estimate.distance_cm,
                    command.left,
                    command.right
                );
                TickOutcome::Steered {
                    payload: marker.payload,
                    estimate,
                    command,
                }
            }
        };

        self.sink.dispatch(outcome.command())?;
        match outcome {
            TickOutcome::Steered { .. } => self.stats.steered += 1,
            TickOutcome::Idle => self.stats.idle += 1,
        }
        Ok(outcome)
    }

    fn start(&mut self, shutdown: &ShutdownSignal) -> Result<()> {
        self.source.connect().context("connect frame source")?;
        // Marked running as soon as the source is open so that halt releases it.
        self.state = LoopState::Running;
        self.detector.warm_up()?;

        log::info!(
            "warming up {} for {:?}",
            self.source.name(),
            self.settings.warm_up
        );
        let deadline = Instant::now() + self.settings.warm_up;
        while !shutdown.is_triggered() {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            std::thread::sleep(WARM_UP_POLL.min(deadline - now));
        }
        Ok(())
    }

    fn drive(&mut self, shutdown: &ShutdownSignal) -> Result<()> {
        log::info!(
            "control loop running: source={} detector={} sink={}",
            self.source.name(),
            self.detector.name(),
            self.sink.name()
        );
        while !shutdown.is_triggered() {
            self.tick()?;
            if !self.settings.tick_period.is_zero() {
                std::thread::sleep(self.settings.tick_period);
            }
        }
        log::info!("shutdown requested after {} ticks", self.stats.ticks);
        Ok(())
    }

    /// Stop the motors and release the source. Runs at most once per run.
    fn halt(&mut self) -> Result<()> {
        if self.state != LoopState::Running {
            self.state = LoopState::Stopped;
            return Ok(());
        }
        self.state = LoopState::Stopped;

        let stopped = self
            .sink
            .dispatch(MotorCommand::STOP)
            .context("send final stop command");
        let released = self.source.release().context("release frame source");
        let stats = self.source.stats();
        log::info!(
            "stopped: ticks={} steered={} idle={} frames={} from {}",
            self.stats.ticks,
            self.stats.steered,
            self.stats.idle,
            stats.frames_captured,
            stats.origin
        );
        stopped.and(released)
    }
}

impl<S: FrameSource, D: MarkerDetector, A: ActuationSink> Drop for ControlLoop<S, D, A> {
    fn drop(&mut self) {
        if self.state == LoopState::Running {
            if let Err(err) = self.halt() {
                log::error!("halt on drop failed: {:#}", err);
            }
        }
    }
}
