//! Image preprocessing before OCR
//!
//! Binarizes grayscale frames so screen text separates cleanly from
//! backgrounds before it reaches the recognizer.

#![cfg_attr(not(feature = "tesseract"), allow(dead_code))]

use image::GrayImage;
use imageproc::contrast::{otsu_level, threshold, ThresholdType};
use tracing::debug;

/// Binary threshold at the Otsu level.
///
/// Pixels strictly above the level become white (255), all others black (0).
pub fn binarize_otsu(gray: &GrayImage) -> GrayImage {
    let level = otsu_level(gray);
    debug!("Otsu threshold level: {}", level);
    threshold(gray, level, ThresholdType::Binary)
}
