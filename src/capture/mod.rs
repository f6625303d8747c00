//! Screen Capture Layer
//!
//! Display enumeration and pixel acquisition are collaborators behind
//! [`DisplaySource`] and [`FrameGrabber`]. Backends:
//! - [`replay::ImageSequenceSource`] replays image files as a virtual display
//! - `xcap_backend::XcapDisplays` captures live monitors (feature `desktop`)

pub mod frame;
pub mod replay;
#[cfg(feature = "desktop")]
pub mod xcap_backend;

pub use frame::CapturedFrame;
pub use replay::ImageSequenceSource;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{Result, SentryError};

/// Screen-space rectangle to grab
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureRegion {
    pub left: i32,
    pub top: i32,
    pub width: u32,
    pub height: u32,
}

/// A display reported by a [`DisplaySource`]
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayDescriptor {
    /// Position in the enumeration order
    pub index: usize,
    /// Human readable name, when the backend knows one
    pub name: Option<String>,
    /// Display bounds in screen coordinates
    pub bounds: CaptureRegion,
    pub is_primary: bool,
}

/// Display enumeration collaborator
pub trait DisplaySource {
    type Grabber: FrameGrabber;

    /// Available displays, in a stable order
    fn list_displays(&self) -> Result<Vec<DisplayDescriptor>>;

    /// Open a frame grabber for one display
    fn open(&self, display: &DisplayDescriptor) -> Result<Self::Grabber>;
}

/// Frame capture collaborator
pub trait FrameGrabber {
    /// Grab the current pixels of `region`.
    ///
    /// `Ok(None)` means the source has no more frames.
    fn grab(&mut self, region: &CaptureRegion) -> Result<Option<CapturedFrame>>;
}

impl<G: FrameGrabber + ?Sized> FrameGrabber for Box<G> {
    fn grab(&mut self, region: &CaptureRegion) -> Result<Option<CapturedFrame>> {
        (**self).grab(region)
    }
}

/// Region captured for a display: full bounds, or the top half only.
///
/// The top half keeps origin and width and halves the height (integer
/// division).
pub fn capture_region(display: &DisplayDescriptor, capture_entire_display: bool) -> CaptureRegion {
    let bounds = display.bounds;
    CaptureRegion {
        height: if capture_entire_display {
            bounds.height
        } else {
            bounds.height / 2
        },
        ..bounds
    }
}

/// Look up a display by index
pub fn select_display(displays: &[DisplayDescriptor], index: usize) -> Result<&DisplayDescriptor> {
    if displays.is_empty() {
        return Err(SentryError::DisplayEnumeration("no displays found".into()));
    }
    displays.get(index).ok_or(SentryError::InvalidDisplay {
        index,
        available: displays.len(),
    })
}

/// Resolve the display and region for a session
pub fn resolve_session_display<D: DisplaySource>(
    source: &D,
    display_index: usize,
    capture_entire_display: bool,
) -> Result<(DisplayDescriptor, CaptureRegion)> {
    let displays = source.list_displays()?;
    let selected = select_display(&displays, display_index)?.clone();
    let region = capture_region(&selected, capture_entire_display);

    info!(
        "Capturing display {} ({}) region {}x{} at ({}, {})",
        selected.index,
        selected.name.as_deref().unwrap_or("unnamed"),
        region.width,
        region.height,
        region.left,
        region.top
    );

    Ok((selected, region))
}
