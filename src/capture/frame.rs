//! Frame data structures for captured screen content

use image::{GrayImage, RgbaImage};
use std::time::Instant;

use crate::error::{Result, SentryError};

/// A captured frame from the screen
#[derive(Debug, Clone)]
pub struct CapturedFrame {
    /// RGBA pixels; redaction is painted here
    pub image: RgbaImage,
    /// Timestamp when frame was captured
    pub timestamp: Instant,
}

impl CapturedFrame {
    /// Wrap an already decoded image
    pub fn new(image: RgbaImage) -> Self {
        Self {
            image,
            timestamp: Instant::now(),
        }
    }

    /// Create a frame from raw RGBA bytes
    #[cfg_attr(not(feature = "desktop"), allow(dead_code))]
    pub fn from_rgba(data: Vec<u8>, width: u32, height: u32) -> Result<Self> {
        let len = data.len();
        let image = RgbaImage::from_raw(width, height, data).ok_or_else(|| {
            SentryError::Capture(format!(
                "buffer of {} bytes does not hold a {}x{} RGBA frame",
                len, width, height
            ))
        })?;
        Ok(Self::new(image))
    }

    /// Luminance copy used for analysis only
    pub fn to_grayscale(&self) -> GrayImage {
        image::imageops::grayscale(&self.image)
    }
}
