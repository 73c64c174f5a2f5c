//! Effective and skipped frame rate meter

use std::time::{Duration, Instant};

/// Rates are recomputed once this much time has passed
const WINDOW: Duration = Duration::from_secs(1);

/// Counts processed and skipped frames, reporting rates once per window
#[derive(Debug, Clone)]
pub struct FpsMeter {
    window_start: Instant,
    frames: u32,
    skipped: u32,
    effective_fps: f64,
    skipped_fps: f64,
}

impl FpsMeter {
    /// Creates a meter whose first window starts at `now`
    #[must_use]
    pub fn new(now: Instant) -> Self {
        Self {
            window_start: now,
            frames: 0,
            skipped: 0,
            effective_fps: 0.0,
            skipped_fps: 0.0,
        }
    }

    /// Count a processed frame
    pub fn record_frame(&mut self) {
        self.frames += 1;
    }

    /// Count a cycle that found no new frame
    pub fn record_skip(&mut self) {
        self.skipped += 1;
    }

    /// Recompute the rates if a full window has elapsed
    ///
    /// Returns `true` when the rates changed.
    pub fn update(&mut self, now: Instant) -> bool {
        let elapsed = now.saturating_duration_since(self.window_start);
        if elapsed < WINDOW {
            return false;
        }

        let seconds = elapsed.as_secs_f64();
        self.effective_fps = f64::from(self.frames) / seconds;
        self.skipped_fps = f64::from(self.skipped) / seconds;
        self.frames = 0;
        self.skipped = 0;
        self.window_start = now;
        true
    }

    /// Processed frames per second over the last full window
    #[inline]
    #[must_use]
    pub fn effective_fps(&self) -> f64 {
        self.effective_fps
    }

    /// Skipped cycles per second over the last full window
    #[inline]
    #[must_use]
    pub fn skipped_fps(&self) -> f64 {
        self.skipped_fps
    }
}

impl Default for FpsMeter {
    fn default() -> Self {
        Self::new(Instant::now())
    }
}
