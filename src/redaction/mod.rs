//! Redaction Renderer
//!
//! Paints opaque masks over tracked regions of the current color frame.

use image::{Rgba, RgbaImage};
use imageproc::drawing::draw_filled_rect_mut;
use imageproc::rect::Rect;
use std::thread;
use std::time::{Duration, Instant};

use crate::vision::DetectionBox;

/// Solid white, fully opaque
pub const DEFAULT_FILL: Rgba<u8> = Rgba([255, 255, 255, 255]);

/// Default padding (pixels) added around every box
pub const DEFAULT_PADDING: u32 = 1;

/// Rate limit on individual rectangle paints
#[derive(Debug, Clone)]
pub struct PaintPacing {
    min_interval: Duration,
    last_paint: Option<Instant>,
}

impl PaintPacing {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_paint: None,
        }
    }

    /// No pacing: paints run back to back
    pub fn unthrottled() -> Self {
        Self::new(Duration::ZERO)
    }

    /// Block until the next paint is allowed, then record it
    fn wait_turn(&mut self) {
        if self.min_interval.is_zero() {
            return;
        }
        if let Some(last) = self.last_paint {
            let elapsed = last.elapsed();
            if elapsed < self.min_interval {
                thread::sleep(self.min_interval - elapsed);
            }
        }
        self.last_paint = Some(Instant::now());
    }
}

impl Default for PaintPacing {
    fn default() -> Self {
        Self::unthrottled()
    }
}

/// Paints redaction masks onto frames
#[derive(Debug, Clone)]
pub struct RedactionRenderer {
    padding: u32,
    fill: Rgba<u8>,
    pacing: PaintPacing,
}

impl Default for RedactionRenderer {
    fn default() -> Self {
        Self::new(DEFAULT_PADDING, DEFAULT_FILL, PaintPacing::default())
    }
}

impl RedactionRenderer {
    pub fn new(padding: u32, fill: Rgba<u8>, pacing: PaintPacing) -> Self {
        Self {
            padding,
            fill,
            pacing,
        }
    }

    /// Paint every box onto the frame in order. Returns the number painted.
    pub fn paint<'a, I>(&mut self, frame: &mut RgbaImage, boxes: I) -> usize
    where
        I: IntoIterator<Item = &'a DetectionBox>,
    {
        let pacing = &mut self.pacing;
        apply_redactions(
            frame,
            boxes.into_iter().inspect(|_| pacing.wait_turn()),
            self.padding,
            self.fill,
        )
    }
}

/// Paint `fill` masks over `boxes` with `padding` pixels on every side.
/// Returns the number of boxes painted.
pub fn apply_redactions<'a, I>(frame: &mut RgbaImage, boxes: I, padding: u32, fill: Rgba<u8>) -> usize
where
    I: IntoIterator<Item = &'a DetectionBox>,
{
    let mut painted = 0;
    for bounds in boxes {
        draw_filled_rect_mut(frame, padded_rect(bounds, padding), fill);
        painted += 1;
    }
    painted
}

/// Padded, corner-inclusive rectangle for a box.
///
/// After padding the mask spans `(x, y)` through `(x + width, y + height)`
/// inclusive; coordinates may be negative and are clipped when drawn.
pub fn padded_rect(bounds: &DetectionBox, padding: u32) -> Rect {
    let pad = padding as i64;
    let x = bounds.x as i64 - pad;
    let y = bounds.y as i64 - pad;
    let width = bounds.width as i64 + 2 * pad + 1;
    let height = bounds.height as i64 + 2 * pad + 1;
    Rect::at(clamp_i32(x), clamp_i32(y)).of_size(clamp_u32(width), clamp_u32(height))
}

fn clamp_i32(v: i64) -> i32 {
    v.clamp(i32::MIN as i64, i32::MAX as i64) as i32
}

fn clamp_u32(v: i64) -> u32 {
    v.clamp(1, u32::MAX as i64) as u32
}
