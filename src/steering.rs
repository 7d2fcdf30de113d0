//! Proportional steering law for a differential-drive robot.
//!
//! Forward speed ramps linearly from 0 at the standoff distance to
//! `max_speed` at `max_detection_distance_cm`. There is no saturation: farther
//! markers yield more than `max_speed`, nearer ones a negative (reverse) speed.
//! The speed is split between the wheels by the marker's horizontal fraction:
//! `left = speed * (1 - x)`, `right = speed * x`.

use anyhow::{anyhow, Result};

use crate::actuate::MotorCommand;
use crate::config::CalibrationConstants;
use crate::geometry::MarkerEstimate;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SteeringLaw {
    target_distance_cm: i64,
    /// Speed units per centimetre beyond the standoff distance.
    gain: f64,
    invert: bool,
}

impl SteeringLaw {
    pub fn new(calibration: &CalibrationConstants) -> Result<Self> {
        let span = calibration.max_detection_distance_cm - calibration.target_distance_cm;
        if span == 0 {
            return Err(anyhow!(
                "max detection distance equals target distance ({} cm); speed ramp is undefined",
                calibration.target_distance_cm
            ));
        }
        Ok(Self {
            target_distance_cm: calibration.target_distance_cm,
            gain: calibration.max_speed / span as f64,
            invert: calibration.invert_steering,
        })
    }

    /// Signed forward speed for a marker `distance_cm` away.
    pub fn speed(&self, distance_cm: i64) -> f64 {
        (distance_cm - self.target_distance_cm) as f64 * self.gain
    }

    /// Wheel targets for a marker at `distance_cm` and horizontal fraction `x_fraction`.
    pub fn command(&self, distance_cm: i64, x_fraction: f64) -> MotorCommand {
        let speed = self.speed(distance_cm);
        // `as` truncates toward zero and saturates at the i32 bounds.
        let left = (speed * (1.0 - x_fraction)) as i32;
        let right = (speed * x_fraction) as i32;
        if self.invert {
            MotorCommand::new(right, left)
        } else {
            MotorCommand::new(left, right)
        }
    }

    pub fn command_for(&self, estimate: &MarkerEstimate) -> MotorCommand {
        self.command(estimate.distance_cm, estimate.x_fraction)
    }
}
