use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

const DEFAULT_DEVICE: &str = "/dev/video0";
const DEFAULT_TARGET_FPS: u32 = 30;
const DEFAULT_NATIVE_WIDTH: u32 = 3280;
const DEFAULT_NATIVE_HEIGHT: u32 = 2464;
const DEFAULT_DOWNSCALE: u32 = 4;

const DEFAULT_FOCAL_LENGTH_MM: f64 = 3.04;
const DEFAULT_MARKER_HEIGHT_MM: f64 = 96.0;
const DEFAULT_SENSOR_HEIGHT_MM: f64 = 2.76;
const DEFAULT_MAX_SPEED: f64 = 500.0;
const DEFAULT_TARGET_DISTANCE_CM: i64 = 20;
const DEFAULT_MAX_DETECTION_DISTANCE_CM: i64 = 70;

pub const DEFAULT_ASEBA_SERVICE: &str = "ch.epfl.mobots.Aseba";
pub const DEFAULT_ASEBA_OBJECT_PATH: &str = "/";
pub const DEFAULT_ASEBA_INTERFACE: &str = "ch.epfl.mobots.AsebaNetwork";
pub const DEFAULT_NODE: &str = "thymio-II";
pub const DEFAULT_LEFT_VARIABLE: &str = "motor.left.target";
pub const DEFAULT_RIGHT_VARIABLE: &str = "motor.right.target";

const DEFAULT_TICK_PERIOD_MS: u64 = 1;
const DEFAULT_WARM_UP_MS: u64 = 2_000;

#[derive(Debug, Deserialize, Default)]
struct FollowerConfigFile {
    camera: Option<CameraConfigFile>,
    calibration: Option<CalibrationConfigFile>,
    aseba: Option<AsebaConfigFile>,
    control: Option<ControlConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct CameraConfigFile {
    device: Option<String>,
    target_fps: Option<u32>,
    native_width: Option<u32>,
    native_height: Option<u32>,
    downscale: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct CalibrationConfigFile {
    focal_length_mm: Option<f64>,
    marker_height_mm: Option<f64>,
    sensor_height_mm: Option<f64>,
    frame_width_px: Option<u32>,
    frame_height_px: Option<u32>,
    max_speed: Option<f64>,
    target_distance_cm: Option<i64>,
    max_detection_distance_cm: Option<i64>,
    invert_steering: Option<bool>,
}

#[derive(Debug, Deserialize, Default)]
struct AsebaConfigFile {
    service: Option<String>,
    object_path: Option<String>,
    interface: Option<String>,
    node: Option<String>,
    left_variable: Option<String>,
    right_variable: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct ControlConfigFile {
    tick_period_ms: Option<u64>,
    warm_up_ms: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct FollowerConfig {
    pub camera: CameraSettings,
    pub calibration: CalibrationConstants,
    pub aseba: AsebaSettings,
    pub control: ControlSettings,
}

#[derive(Debug, Clone)]
pub struct CameraSettings {
    pub device: String,
    pub target_fps: u32,
    pub native_width: u32,
    pub native_height: u32,
    pub downscale: u32,
}

/// Fixed pinhole and steering constants, read by geometry and steering.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationConstants {
    pub focal_length_mm: f64,
    /// Real-world edge length of the printed marker.
    pub marker_height_mm: f64,
    pub sensor_height_mm: f64,
    /// Working resolution frames are resized to before detection.
    pub frame_width_px: u32,
    pub frame_height_px: u32,
    pub max_speed: f64,
    /// Standoff distance: forward speed is zero here.
    pub target_distance_cm: i64,
    /// Distance at which speed reaches `max_speed`.
    pub max_detection_distance_cm: i64,
    /// Swap left/right outputs of the steering law.
    pub invert_steering: bool,
}

impl Default for CalibrationConstants {
    fn default() -> Self {
        Self {
            focal_length_mm: DEFAULT_FOCAL_LENGTH_MM,
            marker_height_mm: DEFAULT_MARKER_HEIGHT_MM,
            sensor_height_mm: DEFAULT_SENSOR_HEIGHT_MM,
            frame_width_px: DEFAULT_NATIVE_WIDTH / DEFAULT_DOWNSCALE,
            frame_height_px: DEFAULT_NATIVE_HEIGHT / DEFAULT_DOWNSCALE,
            max_speed: DEFAULT_MAX_SPEED,
            target_distance_cm: DEFAULT_TARGET_DISTANCE_CM,
            max_detection_distance_cm: DEFAULT_MAX_DETECTION_DISTANCE_CM,
            invert_steering: false,
        }
    }
}

impl CalibrationConstants {
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("focal_length_mm", self.focal_length_mm),
            ("marker_height_mm", self.marker_height_mm),
            ("sensor_height_mm", self.sensor_height_mm),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(anyhow!("{} must be a positive number, got {}", name, value));
            }
        }
        if !self.max_speed.is_finite() {
            return Err(anyhow!("max_speed must be finite"));
        }
        if self.frame_width_px == 0 || self.frame_height_px == 0 {
            return Err(anyhow!(
                "working resolution must be non-zero, got {}x{}",
                self.frame_width_px,
                self.frame_height_px
            ));
        }
        if self.max_detection_distance_cm <= self.target_distance_cm {
            return Err(anyhow!(
                "max_detection_distance_cm ({}) must exceed target_distance_cm ({})",
                self.max_detection_distance_cm,
                self.target_distance_cm
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct AsebaSettings {
    pub service: String,
    pub object_path: String,
    pub interface: String,
    pub node: String,
    pub left_variable: String,
    pub right_variable: String,
}

impl Default for AsebaSettings {
    fn default() -> Self {
        Self {
            service: DEFAULT_ASEBA_SERVICE.to_string(),
            object_path: DEFAULT_ASEBA_OBJECT_PATH.to_string(),
            interface: DEFAULT_ASEBA_INTERFACE.to_string(),
            node: DEFAULT_NODE.to_string(),
            left_variable: DEFAULT_LEFT_VARIABLE.to_string(),
            right_variable: DEFAULT_RIGHT_VARIABLE.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlSettings {
    pub tick_period: Duration,
    pub warm_up: Duration,
}

impl Default for ControlSettings {
    fn default() -> Self {
        Self {
            tick_period: Duration::from_millis(DEFAULT_TICK_PERIOD_MS),
            warm_up: Duration::from_millis(DEFAULT_WARM_UP_MS),
        }
    }
}

impl FollowerConfig {
    /// Defaults, then the JSON file (explicit path or `QR_FOLLOW_CONFIG`), then env overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let env_path = std::env::var("QR_FOLLOW_CONFIG").ok();
        let path = path.or_else(|| {
            env_path
                .as_deref()
                .filter(|p| !p.trim().is_empty())
                .map(Path::new)
        });
        let file_cfg = match path {
            Some(path) => read_config_file(path)?,
            None => FollowerConfigFile::default(),
        };
        let mut cfg = Self::from_file(file_cfg);
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: FollowerConfigFile) -> Self {
        let camera_file = file.camera.unwrap_or_default();
        let camera = CameraSettings {
            device: camera_file
                .device
                .unwrap_or_else(|| DEFAULT_DEVICE.to_string()),
            target_fps: camera_file.target_fps.unwrap_or(DEFAULT_TARGET_FPS),
            native_width: camera_file.native_width.unwrap_or(DEFAULT_NATIVE_WIDTH),
            native_height: camera_file.native_height.unwrap_or(DEFAULT_NATIVE_HEIGHT),
            downscale: camera_file.downscale.unwrap_or(DEFAULT_DOWNSCALE),
        };

        let defaults = CalibrationConstants::default();
        let cal = file.calibration.unwrap_or_default();
        let calibration = CalibrationConstants {
            focal_length_mm: cal.focal_length_mm.unwrap_or(defaults.focal_length_mm),
            marker_height_mm: cal.marker_height_mm.unwrap_or(defaults.marker_height_mm),
            sensor_height_mm: cal.sensor_height_mm.unwrap_or(defaults.sensor_height_mm),
            frame_width_px: cal
                .frame_width_px
                .unwrap_or_else(|| scaled(camera.native_width, camera.downscale)),
            frame_height_px: cal
                .frame_height_px
                .unwrap_or_else(|| scaled(camera.native_height, camera.downscale)),
            max_speed: cal.max_speed.unwrap_or(defaults.max_speed),
            target_distance_cm: cal.target_distance_cm.unwrap_or(defaults.target_distance_cm),
            max_detection_distance_cm: cal
                .max_detection_distance_cm
                .unwrap_or(defaults.max_detection_distance_cm),
            invert_steering: cal.invert_steering.unwrap_or(defaults.invert_steering),
        };

        let aseba_defaults = AsebaSettings::default();
        let aseba_file = file.aseba.unwrap_or_default();
        let aseba = AsebaSettings {
            service: aseba_file.service.unwrap_or(aseba_defaults.service),
            object_path: aseba_file.object_path.unwrap_or(aseba_defaults.object_path),
            interface: aseba_file.interface.unwrap_or(aseba_defaults.interface),
            node: aseba_file.node.unwrap_or(aseba_defaults.node),
            left_variable: aseba_file
                .left_variable
                .unwrap_or(aseba_defaults.left_variable),
            right_variable: aseba_file
                .right_variable
                .unwrap_or(aseba_defaults.right_variable),
        };

        let control_file = file.control.unwrap_or_default();
        let control = ControlSettings {
            tick_period: Duration::from_millis(
                control_file
                    .tick_period_ms
                    .unwrap_or(DEFAULT_TICK_PERIOD_MS),
            ),
            warm_up: Duration::from_millis(control_file.warm_up_ms.unwrap_or(DEFAULT_WARM_UP_MS)),
        };

        Self {
            camera,
            calibration,
            aseba,
            control,
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(device) = std::env::var("QR_FOLLOW_DEVICE") {
            if !device.trim().is_empty() {
                self.camera.device = device;
            }
        }
        if let Ok(node) = std::env::var("QR_FOLLOW_NODE") {
            if !node.trim().is_empty() {
                self.aseba.node = node;
            }
        }
        if let Ok(speed) = std::env::var("QR_FOLLOW_MAX_SPEED") {
            self.calibration.max_speed = speed
                .trim()
                .parse()
                .map_err(|_| anyhow!("QR_FOLLOW_MAX_SPEED must be a number"))?;
        }
        if let Ok(distance) = std::env::var("QR_FOLLOW_TARGET_DISTANCE_CM") {
            self.calibration.target_distance_cm = distance
                .trim()
                .parse()
                .map_err(|_| anyhow!("QR_FOLLOW_TARGET_DISTANCE_CM must be an integer"))?;
        }
        if let Ok(tick) = std::env::var("QR_FOLLOW_TICK_MS") {
            let millis: u64 = tick
                .trim()
                .parse()
                .map_err(|_| anyhow!("QR_FOLLOW_TICK_MS must be an integer number of ms"))?;
            self.control.tick_period = Duration::from_millis(millis);
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.camera.downscale == 0 {
            return Err(anyhow!("camera downscale must be at least 1"));
        }
        if self.camera.device.trim().is_empty() {
            return Err(anyhow!("camera device must not be empty"));
        }
        if self.aseba.node.trim().is_empty() {
            return Err(anyhow!("aseba node name must not be empty"));
        }
        self.calibration.validate()
    }
}

fn scaled(native: u32, downscale: u32) -> u32 {
    native.checked_div(downscale).unwrap_or(native)
}

fn read_config_file(path: &Path) -> Result<FollowerConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_working_resolution_is_quarter_native() {
        let cal = CalibrationConstants::default();
        assert_eq!(cal.frame_width_px, 820);
        assert_eq!(cal.frame_height_px, 616);
    }

    #[test]
    fn validate_rejects_degenerate_speed_ramp() {
        let cal = CalibrationConstants {
            max_detection_distance_cm: 20,
            target_distance_cm: 20,
            ..CalibrationConstants::default()
        };
        assert!(cal.validate().is_err());
    }

    #[test]
    fn validate_rejects_reversed_speed_ramp() {
        let cal = CalibrationConstants {
            max_detection_distance_cm: 15,
            target_distance_cm: 20,
            ..CalibrationConstants::default()
        };
        assert!(cal.validate().is_err());
    }

    #[test]
    fn validate_rejects_non_positive_optics() {
        let cal = CalibrationConstants {
            sensor_height_mm: 0.0,
            ..CalibrationConstants::default()
        };
        assert!(cal.validate().is_err());
    }

    #[test]
    fn frame_size_follows_downscale_when_unset() {
        let file: FollowerConfigFile =
            serde_json::from_str(r#"{"camera": {"downscale": 8}}"#).unwrap();
        let cfg = FollowerConfig::from_file(file);
        assert_eq!(cfg.calibration.frame_width_px, 410);
        assert_eq!(cfg.calibration.frame_height_px, 308);
    }
}
