//! Vision/OCR Layer
//!
//! Text recognition on grayscale frames. The OCR engine is a collaborator
//! behind [`TextRecognizer`]; the shipped backend is libtesseract through
//! `leptess` (feature `tesseract`).

pub mod ocr_preprocess;
pub mod tesseract;

pub use tesseract::TesseractConfig;
#[cfg(feature = "tesseract")]
pub use tesseract::TesseractOcr;

use image::GrayImage;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::shared::CancelToken;

/// Region of a frame to redact, in frame pixel coordinates (origin top-left)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DetectionBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl DetectionBox {
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    /// Center point used for cross-frame matching
    pub fn center(&self) -> (f64, f64) {
        (
            self.x as f64 + self.width as f64 / 2.0,
            self.y as f64 + self.height as f64 / 2.0,
        )
    }
}

/// Single text fragment recognized by the OCR engine
#[derive(Debug, Clone, PartialEq)]
pub struct OcrToken {
    /// Recognized text (may be empty for layout-only rows)
    pub text: String,
    /// Engine confidence; values <= 0 mark whitespace or empty detections
    pub confidence: i32,
    /// Bounding box of the fragment
    pub bounds: DetectionBox,
}

impl OcrToken {
    pub fn new(text: impl Into<String>, confidence: i32, bounds: DetectionBox) -> Self {
        Self {
            text: text.into(),
            confidence,
            bounds,
        }
    }
}

/// OCR collaborator: recognizes text tokens in a grayscale frame
pub trait TextRecognizer: Send {
    /// Short backend name for logs
    fn name(&self) -> &str;

    /// Recognize tokens in scan order.
    ///
    /// Backends that can interrupt a running recognition should poll `cancel`
    /// and return early once it is set.
    fn recognize(&mut self, frame: &GrayImage, cancel: &CancelToken) -> Result<Vec<OcrToken>>;
}

impl<T: TextRecognizer + ?Sized> TextRecognizer for Box<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn recognize(&mut self, frame: &GrayImage, cancel: &CancelToken) -> Result<Vec<OcrToken>> {
        (**self).recognize(frame, cancel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_center() {
        let b = DetectionBox::new(10, 10, 20, 20);
        assert_eq!(b.center(), (20.0, 20.0));

        let odd = DetectionBox::new(0, 0, 5, 3);
        assert_eq!(odd.center(), (2.5, 1.5));
    }
}
