//! Cross-frame box tracking
//!
//! OCR boxes jitter by a few pixels between detections. A new detection whose
//! center lies within the match threshold of an already tracked box is treated
//! as the same region; anything else is added. Tracked boxes are kept even when
//! OCR stops reporting them, so a redaction never flickers off.

use std::time::{Duration, Instant};
use tracing::debug;

use crate::vision::DetectionBox;

/// Default center distance (pixels) under which two boxes are the same region
pub const DEFAULT_MATCH_THRESHOLD: f64 = 10.0;

/// Whether two boxes describe the same region.
///
/// Only center proximity matters: the Euclidean distance between the centers
/// must be strictly below `threshold`. Sizes are ignored.
pub fn is_matching_box(a: &DetectionBox, b: &DetectionBox, threshold: f64) -> bool {
    let (ax, ay) = a.center();
    let (bx, by) = b.center();
    (ax - bx).hypot(ay - by) < threshold
}

/// Merge current detections into the previously tracked boxes.
///
/// Detections matching no previous box come first, in detection order,
/// followed by the entire previous list unchanged. The result never shrinks.
pub fn merge_boxes(
    previous: &[DetectionBox],
    current: &[DetectionBox],
    threshold: f64,
) -> Vec<DetectionBox> {
    let mut merged: Vec<DetectionBox> = current
        .iter()
        .filter(|box_| !previous.iter().any(|prev| is_matching_box(box_, prev, threshold)))
        .copied()
        .collect();
    merged.extend_from_slice(previous);
    merged
}

/// How tracked boxes leave the set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EvictionPolicy {
    /// Boxes stay for the whole session
    #[default]
    Never,
    /// Boxes not re-detected within the duration are dropped
    TimeToLive(Duration),
}

/// A tracked box and when a detection last confirmed it
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackedBox {
    pub bounds: DetectionBox,
    pub last_seen: Instant,
}

/// Ordered set of boxes currently redacted, owned by the render loop
#[derive(Debug, Clone)]
pub struct BoxTracker {
    boxes: Vec<TrackedBox>,
    threshold: f64,
    eviction: EvictionPolicy,
}

impl Default for BoxTracker {
    fn default() -> Self {
        Self::new(DEFAULT_MATCH_THRESHOLD, EvictionPolicy::Never)
    }
}

impl BoxTracker {
    pub fn new(threshold: f64, eviction: EvictionPolicy) -> Self {
        Self {
            boxes: Vec::new(),
            threshold,
            eviction,
        }
    }

    /// Merge a detection cycle's boxes into the tracked set.
    ///
    /// Ordering follows [`merge_boxes`]; tracked boxes confirmed by a
    /// detection get their `last_seen` refreshed. Returns the number of boxes
    /// added.
    pub fn merge(&mut self, current: &[DetectionBox], now: Instant) -> usize {
        let threshold = self.threshold;
        for tracked in self.boxes.iter_mut() {
            if current
                .iter()
                .any(|detected| is_matching_box(detected, &tracked.bounds, threshold))
            {
                tracked.last_seen = now;
            }
        }

        let previous: Vec<DetectionBox> = self.boxes.iter().map(|tracked| tracked.bounds).collect();
        let merged = merge_boxes(&previous, current, threshold);
        let added_count = merged.len() - previous.len();

        let mut boxes: Vec<TrackedBox> = merged[..added_count]
            .iter()
            .map(|bounds| TrackedBox {
                bounds: *bounds,
                last_seen: now,
            })
            .collect();
        boxes.append(&mut self.boxes);
        self.boxes = boxes;

        let evicted = self.evict_expired(now);
        if added_count > 0 || evicted > 0 {
            debug!(
                "Tracker: +{} new, -{} expired, {} tracked",
                added_count,
                evicted,
                self.boxes.len()
            );
        }
        added_count
    }

    /// Drop boxes whose time-to-live elapsed. Returns how many were removed.
    pub fn evict_expired(&mut self, now: Instant) -> usize {
        let EvictionPolicy::TimeToLive(ttl) = self.eviction else {
            return 0;
        };
        let before = self.boxes.len();
        self.boxes
            .retain(|tracked| now.saturating_duration_since(tracked.last_seen) <= ttl);
        before - self.boxes.len()
    }

    /// Tracked boxes in merge order
    pub fn boxes(&self) -> impl Iterator<Item = &DetectionBox> + '_ {
        self.boxes.iter().map(|tracked| &tracked.bounds)
    }

    pub fn len(&self) -> usize {
        self.boxes.len()
    }
}
