//! In-memory video frames.
//!
//! - `Frame`: RGB8 pixel buffer produced by a frame source.
//! - Resizing to the working resolution before detection.
//! - Grayscale conversion for detector backends.
//!
//! A frame is owned by the control loop for exactly one tick and dropped at the
//! end of it. Nothing here retains frames across ticks.

use anyhow::{anyhow, Result};
use image::imageops::{self, FilterType};
use image::{GrayImage, RgbImage};

/// Bytes per pixel of the packed RGB layout.
pub const RGB_CHANNELS: usize = 3;

/// RGB8 frame.
#[derive(Clone, Debug)]
pub struct Frame {
    pixels: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl Frame {
    /// Wrap a packed RGB buffer. The length must equal `width * height * 3`.
    pub fn new(pixels: Vec<u8>, width: u32, height: u32) -> Result<Self> {
        let expected = expected_len(width, height)?;
        if pixels.len() != expected {
            return Err(anyhow!(
                "frame length mismatch: expected {} bytes for {}x{}, got {}",
                expected,
                width,
                height,
                pixels.len()
            ));
        }
        Ok(Self {
            pixels,
            width,
            height,
        })
    }

    /// Solid-colour frame. Used by synthetic sources.
    pub fn filled(width: u32, height: u32, rgb: [u8; 3]) -> Result<Self> {
        let len = expected_len(width, height)?;
        let mut pixels = Vec::with_capacity(len);
        for _ in 0..(len / RGB_CHANNELS) {
            pixels.extend_from_slice(&rgb);
        }
        Self::new(pixels, width, height)
    }

    pub fn from_rgb_image(image: RgbImage) -> Self {
        let (width, height) = image.dimensions();
        Self {
            pixels: image.into_raw(),
            width,
            height,
        }
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Resample to exactly `width` x `height`.
    ///
    /// Returns the frame untouched when it already has the requested size.
    pub fn resize(self, width: u32, height: u32) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(anyhow!("cannot resize frame to {}x{}", width, height));
        }
        if self.width == width && self.height == height {
            return Ok(self);
        }
        let image = self.into_rgb_image()?;
        let resized = imageops::resize(&image, width, height, FilterType::Triangle);
        Ok(Self::from_rgb_image(resized))
    }

    /// 8-bit luma plane (ITU-R 601 weights, as used by `image`).
    pub fn to_luma(&self) -> Result<GrayImage> {
        let image = RgbImage::from_raw(self.width, self.height, self.pixels.clone())
            .ok_or_else(|| anyhow!("frame buffer does not match its dimensions"))?;
        Ok(imageops::grayscale(&image))
    }

    fn into_rgb_image(self) -> Result<RgbImage> {
        RgbImage::from_raw(self.width, self.height, self.pixels)
            .ok_or_else(|| anyhow!("frame buffer does not match its dimensions"))
    }
}

fn expected_len(width: u32, height: u32) -> Result<usize> {
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|v| v.checked_mul(RGB_CHANNELS))
        .ok_or_else(|| anyhow!("frame dimensions overflow: {}x{}", width, height))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_rejects_length_mismatch() {
        assert!(Frame::new(vec![0u8; 11], 2, 2).is_err());
        assert!(Frame::new(vec![0u8; 12], 2, 2).is_ok());
    }

    #[test]
    fn resize_produces_working_resolution() -> Result<()> {
        let frame = Frame::filled(3280 / 8, 2464 / 8, [10, 20, 30])?;
        let resized = frame.resize(820, 616)?;
        assert_eq!(resized.width, 820);
        assert_eq!(resized.height, 616);
        assert_eq!(resized.pixels().len(), 820 * 616 * 3);
        Ok(())
    }

    #[test]
    fn resize_rejects_zero_target() -> Result<()> {
        let frame = Frame::filled(4, 4, [0, 0, 0])?;
        assert!(frame.resize(0, 4).is_err());
        Ok(())
    }

    #[test]
    fn luma_of_white_is_white() -> Result<()> {
        let frame = Frame::filled(4, 2, [255, 255, 255])?;
        let luma = frame.to_luma()?;
        assert_eq!(luma.dimensions(), (4, 2));
        assert!(luma.pixels().all(|p| p.0[0] == 255));
        Ok(())
    }
}
