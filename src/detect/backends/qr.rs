use anyhow::Result;

use crate::detect::backend::MarkerDetector;
use crate::detect::result::Detection;
use crate::frame::Frame;
use crate::geometry::BoundingBox;

/// QR code backend built on `rqrr`.
///
/// Each grid that decodes becomes one `Detection` whose box is the axis-aligned
/// hull of the grid's four corners. Grids that fail to decode are dropped.
#[derive(Debug, Default)]
pub struct QrBackend {
    frames_scanned: u64,
    grids_rejected: u64,
}

impl QrBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames_scanned(&self) -> u64 {
        self.frames_scanned
    }

    /// Grids located in a frame whose contents failed to decode.
    pub fn grids_rejected(&self) -> u64 {
        self.grids_rejected
    }
}

impl MarkerDetector for QrBackend {
    fn name(&self) -> &'static str {
        "rqrr"
    }

    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>> {
        self.frames_scanned += 1;

        let luma = frame.to_luma()?;
        let width = luma.width() as usize;
        let height = luma.height() as usize;
        let plane = luma.as_raw();
        let mut prepared =
            rqrr::PreparedImage::prepare_from_greyscale(width, height, |x, y| plane[y * width + x]);

        let mut detections = Vec::new();
        for grid in prepared.detect_grids() {
            let b = &grid.bounds;
            let corners = [(b[0].x, b[0].y), (b[1].x, b[1].y), (b[2].x, b[2].y), (b[3].x, b[3].y)];
            match grid.decode() {
                Ok((_meta, payload)) => {
                    detections.push(Detection::qr(hull_of(&corners), payload));
                }
                Err(err) => {
                    self.grids_rejected += 1;
                    log::debug!("QrBackend: grid at {:?} did not decode: {:?}", corners, err);
                }
            }
        }
        Ok(detections)
    }
}

/// Axis-aligned hull of a quadrilateral.
fn hull_of(corners: &[(i32, i32); 4]) -> BoundingBox {
    let min_x = corners.iter().map(|c| c.0).min().unwrap_or(0);
    let max_x = corners.iter().map(|c| c.0).max().unwrap_or(0);
    let min_y = corners.iter().map(|c| c.1).min().unwrap_or(0);
    let max_y = corners.iter().map(|c| c.1).max().unwrap_or(0);
    BoundingBox::new(
        min_x,
        min_y,
        max_x.abs_diff(min_x),
        max_y.abs_diff(min_y),
    )
}
