//! V4L2 frame source.
//!
//! This module provides `V4l2Source` for capturing frames from a local camera
//! (a Raspberry Pi camera through the bcm2835 V4L2 driver, or any USB webcam).
//!
//! Device paths starting with `stub://` select a synthetic camera that needs no
//! hardware. Real device nodes require the `ingest-v4l2` feature.

use anyhow::Result;
#[cfg(feature = "ingest-v4l2")]
use anyhow::{anyhow, Context};

use super::{FrameSource, SourceStats};
use crate::frame::Frame;

/// Configuration for a V4L2 source.
#[derive(Clone, Debug)]
pub struct V4l2Config {
    /// Device path (e.g., "/dev/video0")
    pub device: String,
    /// Requested frame rate. Zero leaves the driver default.
    pub target_fps: u32,
    /// Preferred capture width.
    pub width: u32,
    /// Preferred capture height.
    pub height: u32,
}

impl Default for V4l2Config {
    fn default() -> Self {
        Self {
            device: "/dev/video0".to_string(),
            target_fps: 30,
            width: 820,
            height: 616,
        }
    }
}

/// V4L2 frame source.
///
/// Uses libv4l for real devices, with a synthetic fallback for `stub://` paths.
pub struct V4l2Source {
    backend: V4l2Backend,
}

enum V4l2Backend {
    Synthetic(SyntheticV4l2Source),
    #[cfg(feature = "ingest-v4l2")]
    Device(DeviceV4l2Source),
}

impl V4l2Source {
    pub fn new(config: V4l2Config) -> Result<Self> {
        if config.device.starts_with("stub://") {
            Ok(Self {
                backend: V4l2Backend::Synthetic(SyntheticV4l2Source::new(config)),
            })
        } else {
            #[cfg(feature = "ingest-v4l2")]
            {
                Ok(Self {
                    backend: V4l2Backend::Device(DeviceV4l2Source::new(config)),
                })
            }
            #[cfg(not(feature = "ingest-v4l2"))]
            {
                anyhow::bail!(
                    "camera {} requires the ingest-v4l2 feature",
                    config.device
                )
            }
        }
    }
}

impl FrameSource for V4l2Source {
    fn name(&self) -> &'static str {
        "v4l2"
    }

    fn connect(&mut self) -> Result<()> {
        match &mut self.backend {
            V4l2Backend::Synthetic(source) => source.connect(),
            #[cfg(feature = "ingest-v4l2")]
            V4l2Backend::Device(source) => source.connect(),
        }
    }

    fn next_frame(&mut self) -> Result<Frame> {
        match &mut self.backend {
            V4l2Backend::Synthetic(source) => source.next_frame(),
            #[cfg(feature = "ingest-v4l2")]
            V4l2Backend::Device(source) => source.next_frame(),
        }
    }

    fn release(&mut self) -> Result<()> {
        match &mut self.backend {
            V4l2Backend::Synthetic(source) => source.release(),
            #[cfg(feature = "ingest-v4l2")]
            V4l2Backend::Device(source) => source.release(),
        }
    }

    fn stats(&self) -> SourceStats {
        match &self.backend {
            V4l2Backend::Synthetic(source) => source.stats(),
            #[cfg(feature = "ingest-v4l2")]
            V4l2Backend::Device(source) => source.stats(),
        }
    }
}

// ----------------------------------------------------------------------------
// Synthetic source (stub://) for tests
// ----------------------------------------------------------------------------

struct SyntheticV4l2Source {
    config: V4l2Config,
    frame_count: u64,
    connected: bool,
}

impl SyntheticV4l2Source {
    fn new(config: V4l2Config) -> Self {
        Self {
            config,
            frame_count: 0,
            connected: false,
        }
    }

    fn connect(&mut self) -> Result<()> {
        self.connected = true;
        log::info!(
            "V4l2Source: connected to {} (synthetic)",
            self.config.device
        );
        Ok(())
    }

    /// A slowly brightening grey field. Contains no markers.
    fn next_frame(&mut self) -> Result<Frame> {
        if !self.connected {
            anyhow::bail!("v4l2 source {} not connected", self.config.device);
        }
        self.frame_count += 1;
        let level = (self.frame_count % 256) as u8;
        Frame::filled(self.config.width, self.config.height, [level; 3])
    }

    fn release(&mut self) -> Result<()> {
        if self.connected {
            log::info!("V4l2Source: released {} (synthetic)", self.config.device);
        }
        self.connected = false;
        Ok(())
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.frame_count,
            origin: self.config.device.clone(),
        }
    }
}

// ----------------------------------------------------------------------------
// Production V4L2 source using libv4l
// ----------------------------------------------------------------------------

#[cfg(feature = "ingest-v4l2")]
struct DeviceV4l2Source {
    config: V4l2Config,
    state: Option<DeviceV4l2State>,
    frame_count: u64,
    active_width: u32,
    active_height: u32,
    pixel_format: super::normalize::PixelFormat,
}

#[cfg(feature = "ingest-v4l2")]
struct DeviceV4l2State {
    // The stream holds its own handle to the device; the device is kept open
    // alongside it and both are dropped together on release.
    stream: v4l::prelude::MmapStream<'static>,
    _device: v4l::Device,
}

#[cfg(feature = "ingest-v4l2")]
impl DeviceV4l2Source {
    fn new(config: V4l2Config) -> Self {
        Self {
            active_width: config.width,
            active_height: config.height,
            config,
            state: None,
            frame_count: 0,
            pixel_format: super::normalize::PixelFormat::Rgb24,
        }
    }

    fn connect(&mut self) -> Result<()> {
        use super::normalize::PixelFormat;
        use v4l::buffer::Type;
        use v4l::video::Capture;

        let mut device = v4l::Device::with_path(&self.config.device)
            .with_context(|| format!("open v4l2 device {}", self.config.device))?;
        let mut format = device.format().context("read v4l2 format")?;
        format.width = self.config.width;
        format.height = self.config.height;
        format.fourcc = v4l::FourCC::new(b"RGB3");

        let format = match device.set_format(&format) {
            Ok(format) => format,
            Err(err) => {
                log::warn!(
                    "V4l2Source: failed to set format on {}: {}",
                    self.config.device,
                    err
                );
                device
                    .format()
                    .context("read v4l2 format after set failure")?
            }
        };

        self.pixel_format = if format.fourcc == v4l::FourCC::new(b"RGB3") {
            PixelFormat::Rgb24
        } else if format.fourcc == v4l::FourCC::new(b"YUYV") {
            PixelFormat::Yuyv
        } else {
            return Err(anyhow!(
                "v4l2 device {} offers unsupported pixel format {}",
                self.config.device,
                format.fourcc
            ));
        };

        if self.config.target_fps > 0 {
            let params = v4l::video::capture::Parameters::with_fps(self.config.target_fps);
            if let Err(err) = device.set_params(&params) {
                log::warn!(
                    "V4l2Source: failed to set fps on {}: {}",
                    self.config.device,
                    err
                );
            }
        }

        self.active_width = format.width;
        self.active_height = format.height;

        let stream = v4l::prelude::MmapStream::with_buffers(&mut device, Type::VideoCapture, 4)
            .context("create v4l2 buffer stream")?;
        self.state = Some(DeviceV4l2State {
            stream,
            _device: device,
        });

        log::info!(
            "V4l2Source: connected to {} ({}x{} {:?})",
            self.config.device,
            self.active_width,
            self.active_height,
            self.pixel_format
        );
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Frame> {
        use v4l::io::traits::CaptureStream;

        let state = self.state.as_mut().context("v4l2 device not connected")?;
        let (buf, meta) = state.stream.next().context("capture v4l2 frame")?;
        let used = (meta.bytesused as usize).min(buf.len());
        let rgb = super::normalize::normalize_to_rgb(
            &buf[..used],
            self.active_width,
            self.active_height,
            self.pixel_format,
        )?;

        self.frame_count += 1;

        Frame::new(rgb, self.active_width, self.active_height)
    }

    fn release(&mut self) -> Result<()> {
        if self.state.take().is_some() {
            log::info!("V4l2Source: released {}", self.config.device);
        }
        Ok(())
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.frame_count,
            origin: self.config.device.clone(),
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
