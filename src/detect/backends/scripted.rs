use std::collections::VecDeque;

use anyhow::{anyhow, Result};

use crate::detect::backend::MarkerDetector;
use crate::detect::result::Detection;
use crate::frame::Frame;

/// Scripted backend for testing and synthetic runs.
///
/// Each call to `detect` pops the next scripted step. Once the script runs out
/// every frame yields no markers.
#[derive(Debug, Default)]
pub struct ScriptedBackend {
    script: VecDeque<Step>,
    calls: u64,
}

#[derive(Debug)]
enum Step {
    Markers(Vec<Detection>),
    Fault(String),
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the markers returned for the next frame.
    pub fn then(mut self, markers: Vec<Detection>) -> Self {
        self.script.push_back(Step::Markers(markers));
        self
    }

    /// Queue a frame with no markers.
    pub fn then_nothing(self) -> Self {
        self.then(Vec::new())
    }

    /// Queue a detector fault.
    pub fn then_fail(mut self, message: impl Into<String>) -> Self {
        self.script.push_back(Step::Fault(message.into()));
        self
    }

    pub fn calls(&self) -> u64 {
        self.calls
    }
}

impl MarkerDetector for ScriptedBackend {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn detect(&mut self, _frame: &Frame) -> Result<Vec<Detection>> {
        self.calls += 1;
        match self.script.pop_front() {
            Some(Step::Markers(markers)) => Ok(markers),
            Some(Step::Fault(message)) => Err(anyhow!(message)),
            None => Ok(Vec::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::BoundingBox;

    #[test]
    fn scripted_backend_replays_in_order() -> Result<()> {
        let frame = Frame::filled(4, 4, [0, 0, 0])?;
        let marker = Detection::qr(BoundingBox::new(1, 1, 2, 2), "dock");
        let mut backend = ScriptedBackend::new()
            .then(vec![marker.clone()])
            .then_nothing()
            .then_fail("lens cap on");

        assert_eq!(backend.detect(&frame)?, vec![marker]);
        assert!(backend.detect(&frame)?.is_empty());
        assert!(backend.detect(&frame).is_err());
        assert!(backend.detect(&frame)?.is_empty());
        assert_eq!(backend.calls(), 4);
        Ok(())
    }
}
