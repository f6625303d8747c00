//! Image sequence replay
//!
//! Presents a directory of screenshots as a single virtual display. Frames are
//! served in file name order, optionally paced like a real refresh rate, and
//! optionally looped.

use image::imageops;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use super::{CaptureRegion, CapturedFrame, DisplayDescriptor, DisplaySource, FrameGrabber};
use crate::error::{Result, SentryError};

const IMAGE_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "bmp", "webp"];

/// Virtual display backed by image files
#[derive(Debug, Clone)]
pub struct ImageSequenceSource {
    frames: Vec<PathBuf>,
    frame_interval: Option<Duration>,
    looping: bool,
}

impl ImageSequenceSource {
    /// Collect the images in `dir`, sorted by file name
    pub fn open(dir: &Path) -> Result<Self> {
        let entries = std::fs::read_dir(dir).map_err(|e| {
            SentryError::DisplayEnumeration(format!("cannot read replay directory {:?}: {}", dir, e))
        })?;

        let mut frames: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file() && is_image(path))
            .collect();
        frames.sort();

        info!("Replay source: {} frame(s) from {:?}", frames.len(), dir);
        Ok(Self {
            frames,
            frame_interval: None,
            looping: false,
        })
    }

    /// Serve at most one frame per `interval`
    pub fn with_frame_interval(mut self, interval: Duration) -> Self {
        self.frame_interval = Some(interval);
        self
    }

    /// Restart from the first frame after the last one
    pub fn looping(mut self, looping: bool) -> Self {
        self.looping = looping;
        self
    }
}

impl DisplaySource for ImageSequenceSource {
    type Grabber = ReplayGrabber;

    fn list_displays(&self) -> Result<Vec<DisplayDescriptor>> {
        let Some(first) = self.frames.first() else {
            return Ok(vec![]);
        };

        let (width, height) = image::image_dimensions(first).map_err(|e| {
            SentryError::DisplayEnumeration(format!("cannot read {:?}: {}", first, e))
        })?;

        Ok(vec![DisplayDescriptor {
            index: 0,
            name: Some("replay".to_string()),
            bounds: CaptureRegion {
                left: 0,
                top: 0,
                width,
                height,
            },
            is_primary: true,
        }])
    }

    fn open(&self, _display: &DisplayDescriptor) -> Result<Self::Grabber> {
        Ok(ReplayGrabber {
            frames: self.frames.clone(),
            next: 0,
            frame_interval: self.frame_interval,
            looping: self.looping,
            last_grab: None,
        })
    }
}

/// Grabber serving replay frames in order
#[derive(Debug)]
pub struct ReplayGrabber {
    frames: Vec<PathBuf>,
    next: usize,
    frame_interval: Option<Duration>,
    looping: bool,
    last_grab: Option<Instant>,
}

impl ReplayGrabber {
    fn pace(&mut self) {
        if let (Some(interval), Some(last)) = (self.frame_interval, self.last_grab) {
            let elapsed = last.elapsed();
            if elapsed < interval {
                thread::sleep(interval - elapsed);
            }
        }
        self.last_grab = Some(Instant::now());
    }
}

impl FrameGrabber for ReplayGrabber {
    fn grab(&mut self, region: &CaptureRegion) -> Result<Option<CapturedFrame>> {
        if self.next >= self.frames.len() {
            if !self.looping || self.frames.is_empty() {
                return Ok(None);
            }
            self.next = 0;
        }

        self.pace();

        let path = &self.frames[self.next];
        self.next += 1;

        let full = image::open(path)
            .map_err(|e| SentryError::Capture(format!("cannot load {:?}: {}", path, e)))?
            .to_rgba8();

        debug!("Replaying {:?}", path);
        Ok(Some(CapturedFrame::new(crop_to_region(&full, region))))
    }
}

/// Crop an image to a region given in its own pixel coordinates
fn crop_to_region(full: &image::RgbaImage, region: &CaptureRegion) -> image::RgbaImage {
    let (width, height) = full.dimensions();
    let x = region.left.max(0) as u32;
    let y = region.top.max(0) as u32;
    if x == 0 && y == 0 && region.width >= width && region.height >= height {
        return full.clone();
    }
    imageops::crop_imm(full, x, y, region.width, region.height).to_image()
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}
