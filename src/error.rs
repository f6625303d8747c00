//! Error taxonomy for the redaction pipeline
//!
//! Startup and capture failures are fatal. Detection failures are recoverable:
//! the loop keeps the previously tracked boxes and tries again next cycle.

use thiserror::Error;

/// Errors raised by the capture-detect-track-redact pipeline
#[derive(Debug, Error)]
pub enum SentryError {
    /// No displays found, or the platform has no capture backend
    #[error("display enumeration failed: {0}")]
    DisplayEnumeration(String),

    /// Requested display index is out of range
    #[error("display index {index} is out of range ({available} display(s) available)")]
    InvalidDisplay { index: usize, available: usize },

    /// Grabbing pixels from the capture resource failed
    #[error("capture failed: {0}")]
    Capture(String),

    /// The OCR collaborator failed for this cycle
    #[error("OCR failed: {0}")]
    Ocr(String),

    /// A sensitive-data pattern did not compile
    #[error("pattern {name} failed to compile: {source}")]
    PatternCompile {
        name: &'static str,
        #[source]
        source: regex::Error,
    },

    /// Showing or writing a redacted frame failed
    #[error("output failed: {0}")]
    Output(String),

    /// Invalid configuration value
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl SentryError {
    /// Whether the loop may continue after this error
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Ocr(_) | Self::PatternCompile { .. })
    }
}

pub type Result<T> = std::result::Result<T, SentryError>;
