//! Session Coordinator
//!
//! Resolves the display, opens the frame grabber and runs the capture loop
//! in the selected execution mode.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::capture::{resolve_session_display, DisplaySource};
use crate::error::Result;
use crate::output::FrameSink;
use crate::pipeline::{
    run_threaded, validate_settings, CaptureLoop, PipelineSettings, RedactionPipeline,
    SessionConfig, SessionSummary,
};
use crate::shared::{CancelToken, SessionStats, SharedStats};
use crate::vision::TextRecognizer;

/// Where OCR runs relative to the display loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// OCR inline; display stalls while it runs
    SingleThread,
    /// OCR on a worker thread fed with the latest frame
    #[default]
    Threaded,
}

/// Everything one session needs besides its collaborators
#[derive(Debug, Clone)]
pub struct SessionPlan {
    pub session: SessionConfig,
    pub settings: PipelineSettings,
    pub words: Vec<String>,
    pub mode: ExecutionMode,
}

/// Run one capture session to completion.
///
/// Startup failures (no displays, bad index, bad settings) are returned
/// before any frame is grabbed.
pub fn run_session<D: DisplaySource>(
    source: &D,
    plan: &SessionPlan,
    recognizer: Box<dyn TextRecognizer>,
    sink: Box<dyn FrameSink>,
    cancel: CancelToken,
) -> Result<SessionSummary> {
    run_session_with_stats(source, plan, recognizer, sink, cancel, SessionStats::shared())
}

pub fn run_session_with_stats<D: DisplaySource>(
    source: &D,
    plan: &SessionPlan,
    recognizer: Box<dyn TextRecognizer>,
    sink: Box<dyn FrameSink>,
    cancel: CancelToken,
    stats: SharedStats,
) -> Result<SessionSummary> {
    validate_settings(&plan.settings)?;

    let (selected, region) = resolve_session_display(
        source,
        plan.session.display_index,
        plan.session.capture_entire_display,
    )?;
    let grabber = source.open(&selected)?;
    let pipeline = RedactionPipeline::new(&plan.session, &plan.settings, &plan.words);

    info!(
        "Session starting on display {} with {} ({:?})",
        selected.index,
        recognizer.name(),
        plan.mode
    );

    match plan.mode {
        ExecutionMode::SingleThread => {
            CaptureLoop::new(grabber, region, recognizer, sink, pipeline, cancel)
                .with_stats(stats)
                .run()
        }
        ExecutionMode::Threaded => {
            run_threaded(grabber, region, recognizer, sink, pipeline, cancel, stats)
        }
    }
}
