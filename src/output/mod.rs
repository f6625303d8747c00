//! Output Presentation Layer
//!
//! Redacted frames go to a [`FrameSink`]. The sink is also polled once per
//! cycle for a close request, the equivalent of a viewer window being closed.

use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::capture::CapturedFrame;
use crate::error::{Result, SentryError};

/// Display/output collaborator
pub trait FrameSink {
    /// Present a redacted frame
    fn show(&mut self, frame: &CapturedFrame) -> Result<()>;

    /// Whether the user asked the output to close
    fn should_close(&mut self) -> bool {
        false
    }
}

impl<S: FrameSink + ?Sized> FrameSink for Box<S> {
    fn show(&mut self, frame: &CapturedFrame) -> Result<()> {
        (**self).show(frame)
    }

    fn should_close(&mut self) -> bool {
        (**self).should_close()
    }
}

/// Discards frames; used when no output is configured
#[derive(Debug, Default)]
pub struct NullSink;

impl FrameSink for NullSink {
    fn show(&mut self, _frame: &CapturedFrame) -> Result<()> {
        Ok(())
    }
}

/// Writes redacted frames as numbered PNG files
#[derive(Debug)]
pub struct PngSequenceSink {
    dir: PathBuf,
    every_nth: u64,
    seen: u64,
    written: u64,
}

impl PngSequenceSink {
    /// Write into `dir`, creating it if needed
    pub fn create(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir)
            .map_err(|e| SentryError::Output(format!("cannot create {:?}: {}", dir, e)))?;
        info!("Writing redacted frames to {:?}", dir);
        Ok(Self {
            dir: dir.to_path_buf(),
            every_nth: 1,
            seen: 0,
            written: 0,
        })
    }

    /// Only keep every n-th frame
    pub fn every_nth(mut self, n: u64) -> Self {
        self.every_nth = n.max(1);
        self
    }

    fn frame_path(&self, number: u64) -> PathBuf {
        self.dir.join(format!("frame_{:06}.png", number))
    }
}

impl FrameSink for PngSequenceSink {
    fn show(&mut self, frame: &CapturedFrame) -> Result<()> {
        let index = self.seen;
        self.seen += 1;
        if index % self.every_nth != 0 {
            return Ok(());
        }

        let path = self.frame_path(self.written);
        frame
            .image
            .save(&path)
            .map_err(|e| SentryError::Output(format!("cannot write {:?}: {}", path, e)))?;
        self.written += 1;
        debug!("Wrote {:?}", path);
        Ok(())
    }
}
