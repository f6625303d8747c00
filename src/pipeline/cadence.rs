//! OCR cadence limiter
//!
//! A leaky interval check: detection runs when more than `interval` has passed
//! since the last run started. Missed slots do not accumulate, so a slow OCR
//! call only makes the next check pass immediately.

use std::time::{Duration, Instant};

/// Default minimum spacing between detection cycles
pub const DEFAULT_OCR_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug, Clone)]
pub struct OcrCadence {
    interval: Duration,
    last_run: Option<Instant>,
}

impl Default for OcrCadence {
    fn default() -> Self {
        Self::new(DEFAULT_OCR_INTERVAL)
    }
}

impl OcrCadence {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_run: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Whether detection should run at `now`; records the run when it should.
    ///
    /// The first call always fires.
    pub fn should_run(&mut self, now: Instant) -> bool {
        match self.last_run {
            Some(last) if now.saturating_duration_since(last) <= self.interval => false,
            _ => {
                self.last_run = Some(now);
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_check_fires() {
        let mut cadence = OcrCadence::default();
        assert!(cadence.should_run(Instant::now()));
    }

    #[test]
    fn test_interval_must_be_exceeded() {
        let start = Instant::now();
        let mut cadence = OcrCadence::new(Duration::from_millis(50));
        assert!(cadence.should_run(start));
        assert!(!cadence.should_run(start + Duration::from_millis(10)));
        assert!(!cadence.should_run(start + Duration::from_millis(50)));
        assert!(cadence.should_run(start + Duration::from_millis(51)));
    }

    #[test]
    fn test_no_burst_after_long_gap() {
        let start = Instant::now();
        let mut cadence = OcrCadence::new(Duration::from_millis(50));
        assert!(cadence.should_run(start));

        // A slow OCR call: one run fires, the missed slots are not replayed
        let late = start + Duration::from_millis(400);
        assert!(cadence.should_run(late));
        assert!(!cadence.should_run(late + Duration::from_millis(1)));
        assert!(!cadence.should_run(late + Duration::from_millis(2)));
    }
}
