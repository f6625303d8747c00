//! Message types exchanged between the render loop and the detection worker

use image::GrayImage;

use crate::vision::DetectionBox;

/// Outcome of one detection cycle
#[derive(Debug, Clone, PartialEq)]
pub enum DetectionUpdate {
    /// Boxes matched in the frame, in OCR scan order
    Boxes(Vec<DetectionBox>),
    /// OCR failed; the render loop keeps its current tracked set
    Failed(String),
}

/// Grayscale frame handed to the worker, numbered by the render loop
#[derive(Debug, Clone)]
pub struct DetectionRequest {
    pub seq: u64,
    pub gray: GrayImage,
}

/// Worker answer to the request with the same `seq`
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionResult {
    pub seq: u64,
    pub update: DetectionUpdate,
}
