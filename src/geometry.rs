//! Pinhole range and bearing estimation for a detected marker.
//!
//! Distance comes from the apparent height of the marker's bounding box:
//!
//! ```text
//! distance_mm = focal_mm * marker_mm * frame_h_px / (box_h_px * sensor_mm)
//! ```
//!
//! Bearing is the horizontal position of the box centre as a fraction of the
//! frame width. It is not clamped: a box partially outside the frame can give
//! a fraction below 0 or above 1.

use anyhow::{anyhow, Result};

use crate::config::CalibrationConstants;

/// Axis-aligned box in pixel coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BoundingBox {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn centre_x(&self) -> f64 {
        f64::from(self.x) + f64::from(self.width) / 2.0
    }
}

/// Range and bearing of one marker.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MarkerEstimate {
    pub distance_mm: i64,
    pub distance_cm: i64,
    pub x_fraction: f64,
}

/// Estimate range and bearing of `bbox` inside a `frame_width` x `frame_height` frame.
///
/// Fails on a zero-height box or an empty frame instead of dividing by zero.
pub fn estimate(
    bbox: &BoundingBox,
    frame_width: u32,
    frame_height: u32,
    calibration: &CalibrationConstants,
) -> Result<MarkerEstimate> {
    if bbox.height == 0 {
        return Err(anyhow!(
            "zero-height bounding box at ({}, {}); cannot estimate distance",
            bbox.x,
            bbox.y
        ));
    }
    if frame_width == 0 || frame_height == 0 {
        return Err(anyhow!(
            "cannot estimate geometry in an empty {}x{} frame",
            frame_width,
            frame_height
        ));
    }

    let numerator =
        calibration.focal_length_mm * calibration.marker_height_mm * f64::from(frame_height);
    let denominator = f64::from(bbox.height) * calibration.sensor_height_mm;
    let distance_mm = (numerator / denominator).trunc() as i64;
    let distance_cm = distance_mm / 10;

    let x_fraction = bbox.centre_x() / f64::from(frame_width);

    Ok(MarkerEstimate {
        distance_mm,
        distance_cm,
        x_fraction,
    })
}
