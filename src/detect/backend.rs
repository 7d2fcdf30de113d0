use anyhow::Result;

use crate::detect::result::Detection;
use crate::frame::Frame;

/// Marker detector backend.
///
/// Returns every marker found in the frame, in the backend's scan order.
/// Callers that act on a single marker take the first entry.
pub trait MarkerDetector {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Run detection on a frame.
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>>;

    /// Optional warm-up hook.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}

impl<T: MarkerDetector + ?Sized> MarkerDetector for Box<T> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>> {
        (**self).detect(frame)
    }

    fn warm_up(&mut self) -> Result<()> {
        (**self).warm_up()
    }
}
