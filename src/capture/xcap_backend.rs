//! Live monitor capture through `xcap`
//!
//! Works on Windows, macOS and X11/Wayland Linux sessions. The whole monitor is
//! grabbed and then cropped to the session region.

use image::imageops;
use tracing::debug;
use xcap::Monitor;

use super::{CaptureRegion, CapturedFrame, DisplayDescriptor, DisplaySource, FrameGrabber};
use crate::error::{Result, SentryError};

/// Physical monitors of the current desktop session
#[derive(Debug, Default, Clone, Copy)]
pub struct XcapDisplays;

impl XcapDisplays {
    pub fn new() -> Self {
        Self
    }
}

fn monitors() -> Result<Vec<Monitor>> {
    Monitor::all().map_err(|e| SentryError::DisplayEnumeration(e.to_string()))
}

impl DisplaySource for XcapDisplays {
    type Grabber = XcapGrabber;

    fn list_displays(&self) -> Result<Vec<DisplayDescriptor>> {
        Ok(monitors()?
            .iter()
            .enumerate()
            .map(|(index, monitor)| DisplayDescriptor {
                index,
                name: Some(monitor.name().to_string()),
                bounds: CaptureRegion {
                    left: monitor.x(),
                    top: monitor.y(),
                    width: monitor.width(),
                    height: monitor.height(),
                },
                is_primary: monitor.is_primary(),
            })
            .collect())
    }

    fn open(&self, display: &DisplayDescriptor) -> Result<Self::Grabber> {
        let monitor = monitors()?
            .into_iter()
            .nth(display.index)
            .ok_or_else(|| SentryError::Capture(format!("display {} disappeared", display.index)))?;
        Ok(XcapGrabber {
            monitor,
            origin: (display.bounds.left, display.bounds.top),
        })
    }
}

/// Grabs frames from one monitor
pub struct XcapGrabber {
    monitor: Monitor,
    origin: (i32, i32),
}

impl FrameGrabber for XcapGrabber {
    fn grab(&mut self, region: &CaptureRegion) -> Result<Option<CapturedFrame>> {
        let shot = self
            .monitor
            .capture_image()
            .map_err(|e| SentryError::Capture(e.to_string()))?;
        let (width, height) = (shot.width(), shot.height());
        let frame = CapturedFrame::from_rgba(shot.into_raw(), width, height)?;

        let x = (region.left - self.origin.0).max(0) as u32;
        let y = (region.top - self.origin.1).max(0) as u32;
        if x == 0 && y == 0 && region.width >= width && region.height >= height {
            return Ok(Some(frame));
        }

        debug!("Cropping {}x{} monitor shot to {:?}", width, height, region);
        let cropped = imageops::crop_imm(&frame.image, x, y, region.width, region.height).to_image();
        Ok(Some(CapturedFrame {
            image: cropped,
            timestamp: frame.timestamp,
        }))
    }
}
