//! Still-image frame source.
//!
//! Replays PNG/JPEG files from disk as if they came from the camera. A
//! directory is read in file-name order; a single file is repeated. Used to
//! bench-test the follower on recorded frames without a robot or camera.

use anyhow::{anyhow, Context, Result};
use std::path::{Path, PathBuf};

use super::{FrameSource, SourceStats};
use crate::frame::Frame;

const IMAGE_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

/// Configuration for a still-image source.
#[derive(Clone, Debug)]
pub struct StillConfig {
    /// Image file or directory of images.
    pub path: PathBuf,
    /// Start over after the last image instead of failing.
    pub looping: bool,
}

pub struct StillSource {
    config: StillConfig,
    files: Vec<PathBuf>,
    cursor: usize,
    frame_count: u64,
    connected: bool,
}

impl StillSource {
    pub fn new(config: StillConfig) -> Self {
        Self {
            config,
            files: Vec::new(),
            cursor: 0,
            frame_count: 0,
            connected: false,
        }
    }

    /// Images this source will replay, in order. Empty until connected.
    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }
}

impl FrameSource for StillSource {
    fn name(&self) -> &'static str {
        "still"
    }

    fn connect(&mut self) -> Result<()> {
        self.files = list_images(&self.config.path)?;
        if self.files.is_empty() {
            return Err(anyhow!(
                "no png/jpeg images found at {}",
                self.config.path.display()
            ));
        }
        self.cursor = 0;
        self.connected = true;
        log::info!(
            "StillSource: connected to {} ({} images)",
            self.config.path.display(),
            self.files.len()
        );
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Frame> {
        if !self.connected {
            return Err(anyhow!(
                "still source {} not connected",
                self.config.path.display()
            ));
        }
        if self.cursor >= self.files.len() {
            if !self.config.looping {
                return Err(anyhow!(
                    "still source {} exhausted after {} frames",
                    self.config.path.display(),
                    self.frame_count
                ));
            }
            self.cursor = 0;
        }
        let path = &self.files[self.cursor];
        let image = image::open(path)
            .with_context(|| format!("decode image {}", path.display()))?
            .to_rgb8();
        self.cursor += 1;
        self.frame_count += 1;
        Ok(Frame::from_rgb_image(image))
    }

    fn release(&mut self) -> Result<()> {
        if self.connected {
            log::info!("StillSource: released {}", self.config.path.display());
        }
        self.connected = false;
        self.files.clear();
        Ok(())
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.frame_count,
            origin: self.config.path.display().to_string(),
        }
    }
}

fn list_images(path: &Path) -> Result<Vec<PathBuf>> {
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }
    let entries =
        std::fs::read_dir(path).with_context(|| format!("read directory {}", path.display()))?;
    let mut files = Vec::new();
    for entry in entries {
        let entry_path = entry?.path();
        if entry_path.is_file() && is_image(&entry_path) {
            files.push(entry_path);
        }
    }
    files.sort();
    Ok(files)
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}
