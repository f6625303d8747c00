//! Capture Loop Controller
//!
//! Owns the timing policy and drives capture, detection, tracking and
//! redaction once per frame. Two executions share the same parts:
//! - [`CaptureLoop`]: one synchronous loop, OCR inline on the render thread
//! - [`threaded::run_threaded`]: OCR on a worker fed by a latest-wins slot
//!
//! In both, the tracked box set is owned by the render loop and every output
//! frame is painted with the complete tracked set, whether or not detection
//! ran for that frame.

pub mod cadence;
pub mod slot;
pub mod threaded;

pub use cadence::{OcrCadence, DEFAULT_OCR_INTERVAL};
pub use threaded::run_threaded;

use image::{GrayImage, Rgba};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use crate::capture::{CaptureRegion, CapturedFrame, FrameGrabber};
use crate::detection::TokenMatcher;
use crate::error::{Result, SentryError};
use crate::output::FrameSink;
use crate::redaction::{PaintPacing, RedactionRenderer, DEFAULT_FILL, DEFAULT_PADDING};
use crate::shared::{CancelToken, DetectionUpdate, SessionStats, SharedStats};
use crate::tracking::{BoxTracker, EvictionPolicy, DEFAULT_MATCH_THRESHOLD};
use crate::vision::{DetectionBox, TextRecognizer};

/// Startup choices, fixed for the lifetime of the loop
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Zero-based display index
    pub display_index: usize,
    /// Match sensitive-data patterns instead of the word list
    pub privacy_mode: bool,
    /// Capture the full display; false captures the top half only
    pub capture_entire_display: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            display_index: 0,
            privacy_mode: false,
            capture_entire_display: true,
        }
    }
}

/// Tunables for detection cadence, tracking and painting
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineSettings {
    pub ocr_interval: Duration,
    pub match_threshold: f64,
    pub eviction: EvictionPolicy,
    pub padding: u32,
    pub fill: Rgba<u8>,
    /// Minimum spacing between individual rectangle paints
    pub paint_interval: Duration,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            ocr_interval: DEFAULT_OCR_INTERVAL,
            match_threshold: DEFAULT_MATCH_THRESHOLD,
            eviction: EvictionPolicy::Never,
            padding: DEFAULT_PADDING,
            fill: DEFAULT_FILL,
            paint_interval: Duration::ZERO,
        }
    }
}

/// Loop state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Running,
    Terminated(TerminationReason),
}

/// Why a loop stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationReason {
    /// Cancel token set (quit hotkey, signal, caller)
    Cancelled,
    /// The output sink asked to close
    OutputClosed,
    /// The frame source has no more frames
    SourceExhausted,
    /// A non-recoverable capture or output error; `run` returns it
    Failed,
}

/// Final report of a session
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSummary {
    pub reason: TerminationReason,
    pub stats: SessionStats,
}

/// Matching, tracking and painting state for one session
#[derive(Debug, Clone)]
pub struct RedactionPipeline {
    pub matcher: TokenMatcher,
    pub tracker: BoxTracker,
    pub renderer: RedactionRenderer,
    pub cadence: OcrCadence,
}

impl RedactionPipeline {
    /// Build the session pipeline: privacy mode uses the sensitive-data
    /// patterns, otherwise `words` (plus the defaults) are matched exactly
    pub fn new(session: &SessionConfig, settings: &PipelineSettings, words: &[String]) -> Self {
        let matcher = if session.privacy_mode {
            TokenMatcher::privacy()
        } else {
            TokenMatcher::exact(words)
        };
        Self {
            matcher,
            tracker: BoxTracker::new(settings.match_threshold, settings.eviction),
            renderer: RedactionRenderer::new(
                settings.padding,
                settings.fill,
                PaintPacing::new(settings.paint_interval),
            ),
            cadence: OcrCadence::new(settings.ocr_interval),
        }
    }

    /// Merge one cycle's detections into the tracked set
    pub fn apply_detections(&mut self, boxes: &[DetectionBox], now: Instant) -> usize {
        self.tracker.merge(boxes, now)
    }

    /// Paint all tracked boxes onto the frame
    pub fn paint(&mut self, frame: &mut CapturedFrame) -> usize {
        self.tracker.evict_expired(Instant::now());
        self.renderer.paint(&mut frame.image, self.tracker.boxes())
    }
}

/// Run OCR and matching on a grayscale frame
pub(crate) fn detect(
    recognizer: &mut dyn TextRecognizer,
    matcher: &TokenMatcher,
    gray: &GrayImage,
    cancel: &CancelToken,
) -> DetectionUpdate {
    match recognizer.recognize(gray, cancel) {
        Ok(tokens) => {
            let boxes = matcher.match_tokens(&tokens);
            debug!(
                "{}: {} tokens, {} matched",
                recognizer.name(),
                tokens.len(),
                boxes.len()
            );
            DetectionUpdate::Boxes(boxes)
        }
        Err(e) => DetectionUpdate::Failed(e.to_string()),
    }
}

/// Fold a detection result into the pipeline and statistics
pub(crate) fn apply_update(
    pipeline: &mut RedactionPipeline,
    stats: &SharedStats,
    update: DetectionUpdate,
) {
    match update {
        DetectionUpdate::Boxes(boxes) => {
            let added = pipeline.apply_detections(&boxes, Instant::now());
            let mut stats = stats.write();
            stats.detection_cycles += 1;
            stats.tracked_boxes = pipeline.tracker.len();
            if added > 0 {
                debug!("{} new region(s) redacted", added);
            }
        }
        DetectionUpdate::Failed(reason) => {
            // Keep the previous tracked set; it is known to be safe
            warn!("Detection skipped: {}", reason);
            stats.write().record_failure(reason);
        }
    }
}

/// Synchronous capture loop: capture, detect (throttled), track, paint, show
pub struct CaptureLoop<G: FrameGrabber> {
    grabber: G,
    region: CaptureRegion,
    recognizer: Box<dyn TextRecognizer>,
    sink: Box<dyn FrameSink>,
    pipeline: RedactionPipeline,
    cancel: CancelToken,
    stats: SharedStats,
    state: LoopState,
}

impl<G: FrameGrabber> CaptureLoop<G> {
    pub fn new(
        grabber: G,
        region: CaptureRegion,
        recognizer: Box<dyn TextRecognizer>,
        sink: Box<dyn FrameSink>,
        pipeline: RedactionPipeline,
        cancel: CancelToken,
    ) -> Self {
        Self {
            grabber,
            region,
            recognizer,
            sink,
            pipeline,
            cancel,
            stats: SessionStats::shared(),
            state: LoopState::Running,
        }
    }

    /// Report into an existing statistics handle
    pub fn with_stats(mut self, stats: SharedStats) -> Self {
        self.stats = stats;
        self
    }

    fn terminate(&mut self, reason: TerminationReason) -> LoopState {
        info!("Capture loop terminating: {:?}", reason);
        self.state = LoopState::Terminated(reason);
        self.state
    }

    /// Run one iteration.
    ///
    /// Capture and output failures are returned as errors and leave the loop
    /// running state untouched; [`CaptureLoop::run`] decides what is fatal.
    pub fn step(&mut self) -> Result<LoopState> {
        if let LoopState::Terminated(_) = self.state {
            return Ok(self.state);
        }
        if self.cancel.is_cancelled() {
            return Ok(self.terminate(TerminationReason::Cancelled));
        }
        if self.sink.should_close() {
            return Ok(self.terminate(TerminationReason::OutputClosed));
        }

        let Some(mut frame) = self.grabber.grab(&self.region)? else {
            return Ok(self.terminate(TerminationReason::SourceExhausted));
        };

        if self.pipeline.cadence.should_run(Instant::now()) {
            let gray = frame.to_grayscale();
            let update = detect(
                self.recognizer.as_mut(),
                &self.pipeline.matcher,
                &gray,
                &self.cancel,
            );
            apply_update(&mut self.pipeline, &self.stats, update);
        }

        self.pipeline.paint(&mut frame);
        self.sink.show(&frame)?;
        self.stats
            .write()
            .record_shown(frame.timestamp.elapsed(), self.pipeline.tracker.len());

        Ok(LoopState::Running)
    }

    /// Loop until cancelled, the output closes, or the source ends
    pub fn run(mut self) -> Result<SessionSummary> {
        info!(
            "Capture loop running (single thread, OCR every {:?}, {} mode)",
            self.pipeline.cadence.interval(),
            if self.pipeline.matcher.is_privacy_mode() { "privacy" } else { "exact" }
        );

        let reason = loop {
            match self.step() {
                Ok(LoopState::Running) => continue,
                Ok(LoopState::Terminated(reason)) => break reason,
                Err(e) if e.is_recoverable() => {
                    warn!("Recoverable error in capture loop: {}", e);
                    self.stats.write().record_failure(e.to_string());
                }
                Err(e) => {
                    error!("Capture loop failed: {}", e);
                    self.terminate(TerminationReason::Failed);
                    return Err(e);
                }
            }
        };

        let summary = SessionSummary {
            reason,
            stats: self.stats.read().clone(),
        };
        log_summary(&summary);
        Ok(summary)
    }
}

pub(crate) fn log_summary(summary: &SessionSummary) {
    let stats = &summary.stats;
    info!(
        "Session ended ({:?}): {} frames, {} detection cycles, {} failed, {} dropped, {} boxes tracked, worst latency {:?}",
        summary.reason,
        stats.frames_shown,
        stats.detection_cycles,
        stats.failed_detections,
        stats.dropped_frames,
        stats.tracked_boxes,
        stats.max_output_latency
    );
}

/// Fail fast on settings the loop cannot honor
pub fn validate_settings(settings: &PipelineSettings) -> Result<()> {
    if settings.ocr_interval.is_zero() {
        return Err(SentryError::Config("OCR interval must be greater than zero".into()));
    }
    if !(settings.match_threshold > 0.0) {
        return Err(SentryError::Config("match threshold must be positive".into()));
    }
    if settings.fill.0[3] != 255 {
        return Err(SentryError::Config("redaction fill must be fully opaque".into()));
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod test_support {
    //! Scripted collaborators shared by the loop tests

    use super::*;
    use crate::vision::OcrToken;
    use image::RgbaImage;
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use std::sync::Arc;

    /// Serves a fixed number of blank frames
    pub struct BlankGrabber {
        pub remaining: usize,
        pub width: u32,
        pub height: u32,
        pub delay: Duration,
    }

    impl BlankGrabber {
        pub fn new(frames: usize) -> Self {
            Self {
                remaining: frames,
                width: 64,
                height: 48,
                delay: Duration::ZERO,
            }
        }
    }

    impl FrameGrabber for BlankGrabber {
        fn grab(&mut self, _region: &CaptureRegion) -> Result<Option<CapturedFrame>> {
            if self.remaining == 0 {
                return Ok(None);
            }
            self.remaining -= 1;
            if !self.delay.is_zero() {
                std::thread::sleep(self.delay);
            }
            Ok(Some(CapturedFrame::new(RgbaImage::from_pixel(
                self.width,
                self.height,
                Rgba([0, 0, 0, 255]),
            ))))
        }
    }

    /// Grabber that fails on the n-th call
    pub struct FailingGrabber {
        pub fail_at: usize,
        pub calls: usize,
    }

    impl FrameGrabber for FailingGrabber {
        fn grab(&mut self, _region: &CaptureRegion) -> Result<Option<CapturedFrame>> {
            self.calls += 1;
            if self.calls >= self.fail_at {
                return Err(SentryError::Capture("display lost".into()));
            }
            Ok(Some(CapturedFrame::new(RgbaImage::new(8, 8))))
        }
    }

    /// Returns scripted results per call, then repeats the fallback
    pub struct ScriptedRecognizer {
        pub script: VecDeque<Result<Vec<OcrToken>>>,
        pub fallback: Vec<OcrToken>,
        pub calls: Arc<Mutex<usize>>,
        /// Time spent per recognition, like a real engine
        pub delay: Duration,
    }

    impl ScriptedRecognizer {
        pub fn repeating(tokens: Vec<OcrToken>) -> Self {
            Self {
                script: VecDeque::new(),
                fallback: tokens,
                calls: Arc::new(Mutex::new(0)),
                delay: Duration::ZERO,
            }
        }

        pub fn slow(tokens: Vec<OcrToken>, delay: Duration) -> Self {
            Self {
                delay,
                ..Self::repeating(tokens)
            }
        }
    }

    impl TextRecognizer for ScriptedRecognizer {
        fn name(&self) -> &str {
            "scripted"
        }

        fn recognize(&mut self, _frame: &GrayImage, _cancel: &CancelToken) -> Result<Vec<OcrToken>> {
            *self.calls.lock() += 1;
            if !self.delay.is_zero() {
                std::thread::sleep(self.delay);
            }
            match self.script.pop_front() {
                Some(result) => result,
                None => Ok(self.fallback.clone()),
            }
        }
    }

    /// Keeps a copy of every shown frame
    #[derive(Clone, Default)]
    pub struct RecordingSink {
        pub frames: Arc<Mutex<Vec<RgbaImage>>>,
        pub close_after: Option<usize>,
        pub cancel_when_painted: Option<(CancelToken, u32, u32)>,
    }

    impl FrameSink for RecordingSink {
        fn show(&mut self, frame: &CapturedFrame) -> Result<()> {
            if let Some((cancel, x, y)) = &self.cancel_when_painted {
                if *frame.image.get_pixel(*x, *y) == crate::redaction::DEFAULT_FILL {
                    cancel.cancel();
                }
            }
            self.frames.lock().push(frame.image.clone());
            Ok(())
        }

        fn should_close(&mut self) -> bool {
            self.close_after
                .map_or(false, |n| self.frames.lock().len() >= n)
        }
    }

    pub fn secret_token() -> OcrToken {
        OcrToken::new("secret", 91, DetectionBox::new(10, 10, 20, 8))
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use crate::vision::OcrToken;

    fn region() -> CaptureRegion {
        CaptureRegion {
            left: 0,
            top: 0,
            width: 64,
            height: 48,
        }
    }

    fn exact_pipeline(settings: &PipelineSettings) -> RedactionPipeline {
        RedactionPipeline::new(&SessionConfig::default(), settings, &["secret".to_string()])
    }

    #[test]
    fn test_every_frame_is_painted_between_detections() {
        let settings = PipelineSettings {
            ocr_interval: Duration::from_secs(3600),
            ..Default::default()
        };
        let recognizer = ScriptedRecognizer::repeating(vec![secret_token()]);
        let calls = recognizer.calls.clone();
        let sink = RecordingSink::default();
        let frames = sink.frames.clone();

        let summary = CaptureLoop::new(
            BlankGrabber::new(5),
            region(),
            Box::new(recognizer),
            Box::new(sink),
            exact_pipeline(&settings),
            CancelToken::new(),
        )
        .run()
        .unwrap();

        assert_eq!(summary.reason, TerminationReason::SourceExhausted);
        assert_eq!(summary.stats.frames_shown, 5);
        // Only the first frame triggered OCR
        assert_eq!(*calls.lock(), 1);
        assert_eq!(summary.stats.detection_cycles, 1);

        let frames = frames.lock();
        assert_eq!(frames.len(), 5);
        for frame in frames.iter() {
            assert_eq!(*frame.get_pixel(9, 9), crate::redaction::DEFAULT_FILL);
            assert_eq!(*frame.get_pixel(31, 19), crate::redaction::DEFAULT_FILL);
            assert_eq!(*frame.get_pixel(40, 30), Rgba([0, 0, 0, 255]));
        }
    }

    #[test]
    fn test_ocr_failure_keeps_tracked_set() {
        let settings = PipelineSettings {
            ocr_interval: Duration::from_nanos(1),
            ..Default::default()
        };
        let mut recognizer = ScriptedRecognizer::repeating(vec![]);
        recognizer.script.push_back(Ok(vec![secret_token()]));
        recognizer.script.push_back(Err(SentryError::Ocr("engine crashed".into())));
        let mut grabber = BlankGrabber::new(3);
        grabber.delay = Duration::from_millis(2);
        let sink = RecordingSink::default();
        let frames = sink.frames.clone();

        let summary = CaptureLoop::new(
            grabber,
            region(),
            Box::new(recognizer),
            Box::new(sink),
            exact_pipeline(&settings),
            CancelToken::new(),
        )
        .run()
        .unwrap();

        assert_eq!(summary.stats.failed_detections, 1);
        assert_eq!(summary.stats.detection_cycles, 2);
        assert_eq!(summary.stats.tracked_boxes, 1);
        assert_eq!(summary.stats.last_error.as_deref(), Some("OCR failed: engine crashed"));

        // Redaction stays on screen through the failed cycle and after it
        for frame in frames.lock().iter() {
            assert_eq!(*frame.get_pixel(15, 12), crate::redaction::DEFAULT_FILL);
        }
    }

    #[test]
    fn test_capture_error_is_fatal() {
        let mut capture_loop = CaptureLoop::new(
            FailingGrabber { fail_at: 3, calls: 0 },
            region(),
            Box::new(ScriptedRecognizer::repeating(vec![])),
            Box::new(RecordingSink::default()),
            exact_pipeline(&PipelineSettings::default()),
            CancelToken::new(),
        );
        assert_eq!(capture_loop.step().unwrap(), LoopState::Running);
        assert_eq!(capture_loop.step().unwrap(), LoopState::Running);
        let err = capture_loop.step().unwrap_err();
        assert!(matches!(err, SentryError::Capture(_)));
        // step leaves the decision to the caller
        assert_eq!(capture_loop.state, LoopState::Running);
        assert_eq!(
            capture_loop.terminate(TerminationReason::Failed),
            LoopState::Terminated(TerminationReason::Failed)
        );
        assert_eq!(
            capture_loop.step().unwrap(),
            LoopState::Terminated(TerminationReason::Failed)
        );

        let result = CaptureLoop::new(
            FailingGrabber { fail_at: 2, calls: 0 },
            region(),
            Box::new(ScriptedRecognizer::repeating(vec![])),
            Box::new(RecordingSink::default()),
            exact_pipeline(&PipelineSettings::default()),
            CancelToken::new(),
        )
        .run();
        assert!(matches!(result, Err(SentryError::Capture(_))));
    }

    #[test]
    fn test_cancellation_is_polled_per_iteration() {
        let cancel = CancelToken::new();
        let stats = SessionStats::shared();
        let mut capture_loop = CaptureLoop::new(
            BlankGrabber::new(100),
            region(),
            Box::new(ScriptedRecognizer::repeating(vec![])),
            Box::new(RecordingSink::default()),
            exact_pipeline(&PipelineSettings::default()),
            cancel.clone(),
        )
        .with_stats(stats.clone());

        assert_eq!(capture_loop.step().unwrap(), LoopState::Running);
        cancel.cancel();
        assert_eq!(
            capture_loop.step().unwrap(),
            LoopState::Terminated(TerminationReason::Cancelled)
        );
        // Terminated is final
        assert_eq!(
            capture_loop.step().unwrap(),
            LoopState::Terminated(TerminationReason::Cancelled)
        );
        assert_eq!(stats.read().frames_shown, 1);
    }

    #[test]
    fn test_box_ttl_expires_mask_after_redetection_stops() {
        let settings = PipelineSettings {
            ocr_interval: Duration::from_nanos(1),
            eviction: EvictionPolicy::TimeToLive(Duration::from_millis(150)),
            ..Default::default()
        };
        let mut recognizer = ScriptedRecognizer::repeating(vec![]);
        recognizer.script.push_back(Ok(vec![secret_token()]));
        let mut grabber = BlankGrabber::new(12);
        grabber.delay = Duration::from_millis(25);
        let sink = RecordingSink::default();
        let frames = sink.frames.clone();

        let summary = CaptureLoop::new(
            grabber,
            region(),
            Box::new(recognizer),
            Box::new(sink),
            exact_pipeline(&settings),
            CancelToken::new(),
        )
        .run()
        .unwrap();

        assert_eq!(summary.stats.frames_shown, 12);
        let frames = frames.lock();
        // Still within the TTL of the only detection
        assert_eq!(*frames[0].get_pixel(15, 12), crate::redaction::DEFAULT_FILL);
        assert_eq!(*frames[1].get_pixel(15, 12), crate::redaction::DEFAULT_FILL);
        // About 275ms later the box has expired
        assert_eq!(*frames[11].get_pixel(15, 12), Rgba([0, 0, 0, 255]));
        assert_eq!(summary.stats.tracked_boxes, 0);
    }

    #[test]
    fn test_sink_close_terminates() {
        let sink = RecordingSink {
            close_after: Some(2),
            ..Default::default()
        };
        let summary = CaptureLoop::new(
            BlankGrabber::new(100),
            region(),
            Box::new(ScriptedRecognizer::repeating(vec![])),
            Box::new(sink),
            exact_pipeline(&PipelineSettings::default()),
            CancelToken::new(),
        )
        .run()
        .unwrap();

        assert_eq!(summary.reason, TerminationReason::OutputClosed);
        assert_eq!(summary.stats.frames_shown, 2);
    }

    #[test]
    fn test_privacy_session_ignores_word_list() {
        let session = SessionConfig {
            privacy_mode: true,
            ..Default::default()
        };
        let pipeline = RedactionPipeline::new(&session, &PipelineSettings::default(), &["secret".to_string()]);
        assert!(pipeline.matcher.is_privacy_mode());

        let tokens = vec![
            secret_token(),
            OcrToken::new("555-123-4567", 77, DetectionBox::new(0, 30, 40, 8)),
        ];
        assert_eq!(
            pipeline.matcher.match_tokens(&tokens),
            vec![DetectionBox::new(0, 30, 40, 8)]
        );
    }

    #[test]
    fn test_validate_settings() {
        assert!(validate_settings(&PipelineSettings::default()).is_ok());

        let zero_interval = PipelineSettings {
            ocr_interval: Duration::ZERO,
            ..Default::default()
        };
        assert!(matches!(validate_settings(&zero_interval), Err(SentryError::Config(_))));

        let translucent = PipelineSettings {
            fill: Rgba([255, 255, 255, 128]),
            ..Default::default()
        };
        assert!(validate_settings(&translucent).is_err());

        let nan_threshold = PipelineSettings {
            match_threshold: f64::NAN,
            ..Default::default()
        };
        assert!(validate_settings(&nan_threshold).is_err());
    }
}
