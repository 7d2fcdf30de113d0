//! QR follower
//!
//! Drives a Thymio-II toward a QR marker. A camera frame is pulled, the marker
//! is located, its distance and horizontal offset are estimated with a fixed
//! pinhole model, and a proportional steering law turns that into left/right
//! motor targets written over the Aseba D-Bus network.
//!
//! # Module Structure
//!
//! - `ingest`: Frame sources (V4L2 camera, still images)
//! - `frame`: RGB frames, resize, grayscale
//! - `detect`: Marker detector backends (rqrr QR decoding, scripted)
//! - `geometry`: Distance and offset estimation
//! - `steering`: Proportional differential-drive steering
//! - `actuate`: Motor command sinks (Aseba D-Bus, logging, recording)
//! - `control`: The tick loop tying the above together
//! - `config`: Calibration and runtime configuration

pub mod actuate;
pub mod config;
pub mod control;
pub mod detect;
pub mod frame;
pub mod geometry;
pub mod ingest;
pub mod steering;

#[cfg(feature = "aseba-dbus")]
pub use actuate::{AsebaNetwork, BusKind};
pub use actuate::{ActuationSink, LoggingSink, MotorCommand, RecordingSink};
pub use config::{CalibrationConstants, ControlSettings, FollowerConfig};
pub use control::{ControlLoop, LoopState, LoopStats, ShutdownSignal, TickOutcome};
pub use detect::{Detection, MarkerDetector, QrBackend, ScriptedBackend, Symbology};
pub use frame::Frame;
pub use geometry::{estimate, BoundingBox, MarkerEstimate};
pub use ingest::{FrameSource, SourceStats, StillConfig, StillSource, V4l2Config, V4l2Source};
pub use steering::SteeringLaw;
