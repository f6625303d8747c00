//! Threaded execution: capture at full rate, OCR on a worker
//!
//! The render loop numbers each due frame and offers a grayscale copy through
//! a latest-wins slot. A captured frame is held until the worker has answered
//! the most recent request made at or before it, then painted with the
//! tracked set and shown. Results are merged on the render loop, so the
//! tracked set has a single owner and needs no lock.

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use std::collections::VecDeque;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use super::slot::latest_slot;
use super::{
    apply_update, detect, log_summary, RedactionPipeline, SessionSummary, TerminationReason,
};
use crate::capture::{CaptureRegion, CapturedFrame, FrameGrabber};
use crate::detection::TokenMatcher;
use crate::error::{Result, SentryError};
use crate::output::FrameSink;
use crate::shared::{CancelToken, DetectionRequest, DetectionResult, SharedStats};
use crate::vision::TextRecognizer;

/// How often a blocked thread re-checks the cancel flag
const WORKER_POLL: Duration = Duration::from_millis(25);

/// Held frames beyond this make the render loop wait for the worker
pub(crate) const MAX_HELD_FRAMES: usize = 120;

fn detection_worker(
    mut recognizer: Box<dyn TextRecognizer>,
    matcher: TokenMatcher,
    requests: Receiver<DetectionRequest>,
    results: Sender<DetectionResult>,
    cancel: CancelToken,
) {
    info!("Detection worker started ({})", recognizer.name());
    loop {
        match requests.recv_timeout(WORKER_POLL) {
            Ok(DetectionRequest { seq, gray }) => {
                if cancel.is_cancelled() {
                    break;
                }
                let update = detect(recognizer.as_mut(), &matcher, &gray, &cancel);
                if results.send(DetectionResult { seq, update }).is_err() {
                    break;
                }
            }
            Err(RecvTimeoutError::Timeout) => {
                if cancel.is_cancelled() {
                    break;
                }
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    debug!("Detection worker stopped");
}

/// A captured frame waiting for detection request `awaits` to be answered
struct HeldFrame {
    frame: CapturedFrame,
    awaits: u64,
}

/// Render-side bookkeeping of requests, answers and held frames
struct RenderState {
    pipeline: RedactionPipeline,
    held: VecDeque<HeldFrame>,
    /// Sequence number of the last request offered to the worker
    offered: u64,
    /// Highest sequence number the worker has answered
    answered: u64,
}

impl RenderState {
    fn apply(&mut self, result: DetectionResult, stats: &SharedStats) {
        apply_update(&mut self.pipeline, stats, result.update);
        self.answered = self.answered.max(result.seq);
    }

    /// Paint and show every held frame whose request has been answered
    fn release(&mut self, sink: &mut dyn FrameSink, stats: &SharedStats) -> Result<()> {
        while self
            .held
            .front()
            .map_or(false, |held| held.awaits <= self.answered)
        {
            let Some(HeldFrame { mut frame, .. }) = self.held.pop_front() else {
                break;
            };
            self.pipeline.paint(&mut frame);
            sink.show(&frame)?;
            stats
                .write()
                .record_shown(frame.timestamp.elapsed(), self.pipeline.tracker.len());
        }
        Ok(())
    }

    /// Block until a result arrives. Ok(false) means cancelled.
    fn wait_for_result(
        &mut self,
        results: &Receiver<DetectionResult>,
        cancel: &CancelToken,
        stats: &SharedStats,
    ) -> Result<bool> {
        loop {
            if cancel.is_cancelled() {
                return Ok(false);
            }
            match results.recv_timeout(WORKER_POLL) {
                Ok(result) => {
                    self.apply(result, stats);
                    return Ok(true);
                }
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(SentryError::Ocr(
                        "detection worker stopped with frames awaiting results".into(),
                    ))
                }
            }
        }
    }

    fn discard_held(&mut self, reason: TerminationReason) {
        if !self.held.is_empty() {
            debug!("{} held frame(s) discarded ({:?})", self.held.len(), reason);
            self.held.clear();
        }
    }
}

/// Run the capture loop with detection on a separate thread.
///
/// Every frame shown has been painted with the detections of a frame captured
/// at or before it. When the source ends, the outstanding request is awaited
/// and the held frames are flushed. Termination cancels `cancel` so an
/// in-flight OCR call is abandoned, then the worker is joined before
/// returning.
pub fn run_threaded<G: FrameGrabber>(
    mut grabber: G,
    region: CaptureRegion,
    recognizer: Box<dyn TextRecognizer>,
    mut sink: Box<dyn FrameSink>,
    pipeline: RedactionPipeline,
    cancel: CancelToken,
    stats: SharedStats,
) -> Result<SessionSummary> {
    info!(
        "Capture loop running (threaded, OCR every {:?}, {} mode)",
        pipeline.cadence.interval(),
        if pipeline.matcher.is_privacy_mode() { "privacy" } else { "exact" }
    );

    let (slot, requests_rx) = latest_slot::<DetectionRequest>();
    let (results_tx, results_rx) = unbounded::<DetectionResult>();
    let matcher = pipeline.matcher.clone();
    let mut state = RenderState {
        pipeline,
        held: VecDeque::new(),
        offered: 0,
        answered: 0,
    };

    let outcome = thread::scope(|scope| {
        let worker_cancel = cancel.clone();
        let worker = scope.spawn(move || {
            detection_worker(recognizer, matcher, requests_rx, results_tx, worker_cancel)
        });

        let render = (|| -> Result<TerminationReason> {
            loop {
                if cancel.is_cancelled() {
                    state.discard_held(TerminationReason::Cancelled);
                    return Ok(TerminationReason::Cancelled);
                }
                if sink.should_close() {
                    state.discard_held(TerminationReason::OutputClosed);
                    return Ok(TerminationReason::OutputClosed);
                }

                let Some(frame) = grabber.grab(&region)? else {
                    while state.answered < state.offered {
                        if !state.wait_for_result(&results_rx, &cancel, &stats)? {
                            state.discard_held(TerminationReason::Cancelled);
                            return Ok(TerminationReason::Cancelled);
                        }
                    }
                    state.release(sink.as_mut(), &stats)?;
                    return Ok(TerminationReason::SourceExhausted);
                };

                if state.pipeline.cadence.should_run(Instant::now()) {
                    state.offered += 1;
                    let request = DetectionRequest {
                        seq: state.offered,
                        gray: frame.to_grayscale(),
                    };
                    if slot.offer(request) {
                        stats.write().dropped_frames += 1;
                    }
                }
                state.held.push_back(HeldFrame {
                    frame,
                    awaits: state.offered,
                });

                for result in results_rx.try_iter() {
                    state.apply(result, &stats);
                }
                while state.held.len() > MAX_HELD_FRAMES && state.answered < state.offered {
                    if !state.wait_for_result(&results_rx, &cancel, &stats)? {
                        break;
                    }
                }
                state.release(sink.as_mut(), &stats)?;
            }
        })();

        drop(slot);
        cancel.cancel();
        if worker.join().is_err() {
            warn!("Detection worker panicked");
        }
        render
    });

    match outcome {
        Ok(reason) => {
            info!("Capture loop terminating: {:?}", reason);
            let summary = SessionSummary {
                reason,
                stats: stats.read().clone(),
            };
            log_summary(&summary);
            Ok(summary)
        }
        Err(e) => {
            error!("Capture loop failed: {}", e);
            info!("Capture loop terminating: {:?}", TerminationReason::Failed);
            Err(e)
        }
    }
}
