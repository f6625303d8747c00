//! Session statistics shared between the render loop and the detection worker

use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;

/// Statistics handle shared across threads
pub type SharedStats = Arc<RwLock<SessionStats>>;

/// Counters describing a capture session (not persisted)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionStats {
    /// Frames redacted and handed to the sink
    pub frames_shown: u64,
    /// Detection cycles that completed
    pub detection_cycles: u64,
    /// Detection cycles that failed and were skipped
    pub failed_detections: u64,
    /// Frames replaced in the latest-wins slot before the worker took them
    pub dropped_frames: u64,
    /// Boxes currently tracked for redaction
    pub tracked_boxes: usize,
    /// Longest time from capture to output
    pub max_output_latency: Duration,
    /// Last recoverable error message (if any)
    pub last_error: Option<String>,
}

impl SessionStats {
    /// Create a new shared statistics handle
    pub fn shared() -> SharedStats {
        Arc::new(RwLock::new(Self::default()))
    }

    /// Record a failed detection cycle
    pub fn record_failure(&mut self, error: impl Into<String>) {
        self.failed_detections += 1;
        self.last_error = Some(error.into());
    }

    /// Record a frame handed to the sink `latency` after it was captured
    pub fn record_shown(&mut self, latency: Duration, tracked_boxes: usize) {
        self.frames_shown += 1;
        self.tracked_boxes = tracked_boxes;
        self.max_output_latency = self.max_output_latency.max(latency);
    }
}
