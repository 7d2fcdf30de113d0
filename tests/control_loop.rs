use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};

use qr_follower::{
    BoundingBox, CalibrationConstants, ControlLoop, ControlSettings, Detection, Frame,
    FrameSource, LoopState, MarkerDetector, MotorCommand, RecordingSink, ScriptedBackend,
    ShutdownSignal, SourceStats,
};

/// Camera stand-in that counts lifecycle calls and can request shutdown.
struct CountingCamera {
    width: u32,
    height: u32,
    frames: u64,
    connects: u32,
    releases: u32,
    connected: bool,
    /// Trigger `shutdown` once this many frames have been handed out.
    stop_after: Option<(u64, ShutdownSignal)>,
    /// Fail the capture with this frame number.
    fail_at: Option<u64>,
    /// Mirrors `releases` for observation after the loop is dropped.
    release_counter: Option<Arc<AtomicU32>>,
}

impl CountingCamera {
    fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            frames: 0,
            connects: 0,
            releases: 0,
            connected: false,
            stop_after: None,
            fail_at: None,
            release_counter: None,
        }
    }

    fn stop_after(mut self, frames: u64, shutdown: &ShutdownSignal) -> Self {
        self.stop_after = Some((frames, shutdown.clone()));
        self
    }

    fn fail_at(mut self, frame: u64) -> Self {
        self.fail_at = Some(frame);
        self
    }
}

impl FrameSource for CountingCamera {
    fn name(&self) -> &'static str {
        "counting"
    }

    fn connect(&mut self) -> Result<()> {
        self.connects += 1;
        self.connected = true;
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Frame> {
        if !self.connected {
            return Err(anyhow!("camera not connected"));
        }
        let number = self.frames + 1;
        if self.fail_at == Some(number) {
            return Err(anyhow!("camera unplugged"));
        }
        self.frames = number;
        if let Some((limit, shutdown)) = &self.stop_after {
            if self.frames >= *limit {
                shutdown.trigger();
            }
        }
        Frame::filled(self.width, self.height, [90, 90, 90])
    }

    fn release(&mut self) -> Result<()> {
        self.releases += 1;
        self.connected = false;
        if let Some(counter) = &self.release_counter {
            counter.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.frames,
            origin: "memory".to_string(),
        }
    }
}

fn settings() -> ControlSettings {
    ControlSettings {
        tick_period: Duration::ZERO,
        warm_up: Duration::ZERO,
    }
}

fn centred_marker(height: u32) -> Detection {
    let x = 410 - (height / 2) as i32;
    Detection::qr(BoundingBox::new(x, 200, height, height), "dock")
}

#[test]
fn interrupt_sends_final_stop_and_releases_once() -> Result<()> {
    let shutdown = ShutdownSignal::new();
    let camera = CountingCamera::new(820, 616).stop_after(3, &shutdown);
    let detector = ScriptedBackend::new()
        .then(vec![centred_marker(100)])
        .then(vec![centred_marker(100)])
        .then(vec![centred_marker(100)]);

    let mut control = ControlLoop::new(
        camera,
        detector,
        RecordingSink::new(),
        CalibrationConstants::default(),
        settings(),
    )?;
    let stats = control.run(&shutdown)?;

    assert_eq!(stats.ticks, 3);
    assert_eq!(stats.steered, 3);
    assert_eq!(control.state(), LoopState::Stopped);
    assert_eq!(control.source().connects, 1);
    assert_eq!(control.source().releases, 1);
    assert_eq!(control.detector().calls(), 3);

    let commands = control.sink().commands();
    assert_eq!(commands.len(), 4);
    assert_eq!(commands[0], MotorCommand::new(225, 225));
    assert_eq!(commands.last(), Some(&MotorCommand::STOP));
    Ok(())
}

#[test]
fn one_command_per_tick_with_stop_when_nothing_is_seen() -> Result<()> {
    let shutdown = ShutdownSignal::new();
    let camera = CountingCamera::new(820, 616).stop_after(4, &shutdown);
    let detector = ScriptedBackend::new()
        .then_nothing()
        .then(vec![centred_marker(100)])
        .then_nothing();

    let mut control = ControlLoop::new(
        camera,
        detector,
        RecordingSink::new(),
        CalibrationConstants::default(),
        settings(),
    )?;
    let stats = control.run(&shutdown)?;

    assert_eq!(stats.ticks, 4);
    assert_eq!(stats.steered, 1);
    assert_eq!(stats.idle, 3);
    assert_eq!(
        control.sink().commands(),
        &[
            MotorCommand::STOP,
            MotorCommand::new(225, 225),
            MotorCommand::STOP,
            MotorCommand::STOP,
            MotorCommand::STOP,
        ]
    );
    Ok(())
}

#[test]
fn camera_frames_are_resized_before_detection() -> Result<()> {
    // A 1640x1232 capture is scaled to 820x616 before geometry runs, so the
    // golden distance still comes out at 65 cm.
    let shutdown = ShutdownSignal::new();
    let camera = CountingCamera::new(1640, 1232).stop_after(1, &shutdown);
    let detector = ScriptedBackend::new().then(vec![centred_marker(100)]);

    let mut control = ControlLoop::new(
        camera,
        detector,
        RecordingSink::new(),
        CalibrationConstants::default(),
        settings(),
    )?;
    control.run(&shutdown)?;

    assert_eq!(control.sink().commands()[0], MotorCommand::new(225, 225));
    Ok(())
}

#[test]
fn detector_fault_stops_robot_and_propagates() -> Result<()> {
    let shutdown = ShutdownSignal::new();
    let detector = ScriptedBackend::new()
        .then(vec![centred_marker(100)])
        .then_fail("decoder crashed");

    let mut control = ControlLoop::new(
        CountingCamera::new(820, 616),
        detector,
        RecordingSink::new(),
        CalibrationConstants::default(),
        settings(),
    )?;
    let err = control.run(&shutdown).unwrap_err();

    assert!(format!("{:#}", err).contains("decoder crashed"));
    assert_eq!(control.state(), LoopState::Stopped);
    assert_eq!(control.source().releases, 1);
    assert_eq!(
        control.sink().commands(),
        &[MotorCommand::new(225, 225), MotorCommand::STOP]
    );
    Ok(())
}

#[test]
fn capture_fault_releases_camera() -> Result<()> {
    let shutdown = ShutdownSignal::new();
    let camera = CountingCamera::new(820, 616).fail_at(2);

    let mut control = ControlLoop::new(
        camera,
        ScriptedBackend::new(),
        RecordingSink::new(),
        CalibrationConstants::default(),
        settings(),
    )?;
    assert!(control.run(&shutdown).is_err());

    assert_eq!(control.stats().ticks, 1);
    assert_eq!(control.source().releases, 1);
    assert_eq!(
        control.sink().commands(),
        &[MotorCommand::STOP, MotorCommand::STOP]
    );
    Ok(())
}

#[test]
fn marker_beyond_detection_limit_is_not_capped() -> Result<()> {
    let shutdown = ShutdownSignal::new();
    let camera = CountingCamera::new(820, 616).stop_after(1, &shutdown);
    // h = 50 px -> 1302 mm -> 130 cm -> speed (130 - 20) * 10 = 1100
    let detector = ScriptedBackend::new().then(vec![centred_marker(50)]);

    let mut control = ControlLoop::new(
        camera,
        detector,
        RecordingSink::new(),
        CalibrationConstants::default(),
        settings(),
    )?;
    control.run(&shutdown)?;

    assert_eq!(control.sink().commands()[0], MotorCommand::new(550, 550));
    Ok(())
}

#[test]
fn warm_up_is_cut_short_by_shutdown() -> Result<()> {
    let shutdown = ShutdownSignal::new();
    shutdown.trigger();

    let mut control = ControlLoop::new(
        CountingCamera::new(820, 616),
        ScriptedBackend::new(),
        RecordingSink::new(),
        CalibrationConstants::default(),
        ControlSettings {
            tick_period: Duration::ZERO,
            warm_up: Duration::from_secs(60),
        },
    )?;
    let started = std::time::Instant::now();
    control.run(&shutdown)?;

    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(control.source().frames, 0);
    assert_eq!(control.source().releases, 1);
    assert_eq!(control.sink().commands(), &[MotorCommand::STOP]);
    Ok(())
}

/// Detector that panics on first use.
struct PanickingDetector;

impl MarkerDetector for PanickingDetector {
    fn name(&self) -> &'static str {
        "panicking"
    }

    fn detect(&mut self, _frame: &Frame) -> Result<Vec<Detection>> {
        panic!("detector bug");
    }
}

#[test]
fn unwinding_out_of_run_still_stops_and_releases() {
    let releases = Arc::new(AtomicU32::new(0));
    let mut camera = CountingCamera::new(820, 616);
    camera.release_counter = Some(releases.clone());

    let result = std::panic::catch_unwind(AssertUnwindSafe(|| {
        let mut control = ControlLoop::new(
            camera,
            PanickingDetector,
            RecordingSink::new(),
            CalibrationConstants::default(),
            settings(),
        )
        .unwrap();
        let _ = control.run(&ShutdownSignal::new());
    }));

    assert!(result.is_err());
    assert_eq!(releases.load(Ordering::SeqCst), 1);
}
