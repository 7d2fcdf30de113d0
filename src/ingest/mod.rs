//! Frame sources.
//!
//! This module provides the sources the follower can drive from:
//! - Local V4L2 cameras (feature: ingest-v4l2), with a synthetic `stub://` fallback
//! - Still images replayed from disk
//!
//! Every source follows the same lifecycle: `connect`, any number of blocking
//! `next_frame` pulls, then `release`. Sources hand frames over by value and
//! keep no copy.

#[cfg(feature = "ingest-v4l2")]
mod normalize;
pub mod still;
pub mod v4l2;

pub use still::{StillConfig, StillSource};
pub use v4l2::{V4l2Config, V4l2Source};

use anyhow::Result;

use crate::frame::Frame;

/// Statistics for a frame source.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceStats {
    pub frames_captured: u64,
    /// Device node, file path or stub URL the source reads from.
    pub origin: String,
}

/// Blocking, pull-based frame source.
pub trait FrameSource {
    /// Source identifier.
    fn name(&self) -> &'static str;

    /// Open the underlying device or file set.
    fn connect(&mut self) -> Result<()>;

    /// Capture the next frame, blocking until one is available.
    fn next_frame(&mut self) -> Result<Frame>;

    /// Close the device. Further `next_frame` calls fail until `connect` is called again.
    fn release(&mut self) -> Result<()>;

    fn stats(&self) -> SourceStats;
}

impl<T: FrameSource + ?Sized> FrameSource for Box<T> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn connect(&mut self) -> Result<()> {
        (**self).connect()
    }

    fn next_frame(&mut self) -> Result<Frame> {
        (**self).next_frame()
    }

    fn release(&mut self) -> Result<()> {
        (**self).release()
    }

    fn stats(&self) -> SourceStats {
        (**self).stats()
    }
}
