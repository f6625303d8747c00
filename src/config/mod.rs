//! Application Configuration
//!
//! Session and pipeline settings stored in TOML format. Every field has a
//! default, so a partial file (or none at all) is valid.

use anyhow::{Context, Result};
use image::Rgba;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::app::{ExecutionMode, SessionPlan};
use crate::error::SentryError;
use crate::pipeline::{validate_settings, PipelineSettings, SessionConfig, DEFAULT_OCR_INTERVAL};
use crate::redaction::{DEFAULT_FILL, DEFAULT_PADDING};
use crate::tracking::{EvictionPolicy, DEFAULT_MATCH_THRESHOLD};
use crate::vision::TesseractConfig;

/// Application settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Display and mode selection
    pub session: SessionConfig,
    /// Word list and OCR engine
    pub detection: DetectionSettings,
    /// Box persistence
    pub tracking: TrackingSettings,
    /// Rectangle painting
    pub redaction: RedactionSettings,
    /// Loop timing and threading
    pub pipeline: LoopSettings,
}

/// Detection-related settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionSettings {
    /// Extra words to redact; the defaults are always included
    pub words: Vec<String>,
    pub tesseract: TesseractConfig,
}

/// Tracking-related settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingSettings {
    /// Center distance (pixels) under which two boxes are the same region
    pub match_threshold_px: f64,
    /// Drop boxes not re-detected for this long; unset keeps them forever
    pub box_ttl_ms: Option<u64>,
}

impl Default for TrackingSettings {
    fn default() -> Self {
        Self {
            match_threshold_px: DEFAULT_MATCH_THRESHOLD,
            box_ttl_ms: None,
        }
    }
}

/// Redaction-related settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RedactionSettings {
    /// Pixels added on every side of a box
    pub padding: u32,
    /// RGBA fill color
    pub fill: [u8; 4],
    /// Minimum delay between individual rectangle paints
    pub paint_delay_ms: u64,
}

impl Default for RedactionSettings {
    fn default() -> Self {
        Self {
            padding: DEFAULT_PADDING,
            fill: DEFAULT_FILL.0,
            paint_delay_ms: 0,
        }
    }
}

/// Loop-related settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoopSettings {
    /// Minimum time between detection cycles
    pub ocr_interval_ms: u64,
    pub mode: ExecutionMode,
    /// Global quit hotkey (desktop builds)
    pub quit_hotkey: String,
}

impl Default for LoopSettings {
    fn default() -> Self {
        Self {
            ocr_interval_ms: DEFAULT_OCR_INTERVAL.as_millis() as u64,
            mode: ExecutionMode::default(),
            quit_hotkey: "Ctrl+Shift+Q".to_string(),
        }
    }
}

impl AppConfig {
    /// Runtime tunables derived from the file values
    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            ocr_interval: Duration::from_millis(self.pipeline.ocr_interval_ms),
            match_threshold: self.tracking.match_threshold_px,
            eviction: match self.tracking.box_ttl_ms {
                Some(ms) => EvictionPolicy::TimeToLive(Duration::from_millis(ms)),
                None => EvictionPolicy::Never,
            },
            padding: self.redaction.padding,
            fill: Rgba(self.redaction.fill),
            paint_interval: Duration::from_millis(self.redaction.paint_delay_ms),
        }
    }

    /// Build the session plan this configuration describes
    pub fn session_plan(&self) -> SessionPlan {
        SessionPlan {
            session: self.session.clone(),
            settings: self.pipeline_settings(),
            words: self.detection.words.clone(),
            mode: self.pipeline.mode,
        }
    }

    /// Reject values the pipeline cannot run with
    pub fn validate(&self) -> std::result::Result<(), SentryError> {
        if self.tracking.box_ttl_ms == Some(0) {
            return Err(SentryError::Config("box TTL must be greater than zero".into()));
        }
        validate_settings(&self.pipeline_settings())
    }
}

/// Default config file location
pub fn default_config_path() -> Result<PathBuf> {
    let proj_dirs = directories::ProjectDirs::from("com", "screensentry", "ScreenSentry")
        .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
    Ok(proj_dirs.config_dir().join("config.toml"))
}

/// Load configuration from file
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading config {:?}", path))?;
    let config: AppConfig =
        toml::from_str(&content).with_context(|| format!("parsing config {:?}", path))?;
    Ok(config)
}

/// Load the file at `path` if it exists, otherwise the defaults
pub fn load_or_default(path: &Path) -> Result<AppConfig> {
    if path.exists() {
        load_config(path)
    } else {
        Ok(AppConfig::default())
    }
}

/// Save configuration to file
pub fn save_config(config: &AppConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    Ok(())
}
