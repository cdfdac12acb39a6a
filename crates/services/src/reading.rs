use chrono::{DateTime, Duration, Utc};

use assess_core::model::{scroll_percentage, ReadingProgress};

/// Debounced progress estimator for reading material.
///
/// Scroll events arrive at UI frequency; the tracker folds them into the
/// high-water-mark [`ReadingProgress`] immediately but only *emits* a value
/// (for persistence or display) once per debounce window. Derived progress
/// never reports completion; only [`mark_complete`](Self::mark_complete)
/// produces 100.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadingTracker {
    progress: ReadingProgress,
    debounce: Duration,
    last_emit: Option<DateTime<Utc>>,
    pending: bool,
}

impl Default for ReadingTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ReadingTracker {
    #[must_use]
    pub fn new() -> Self {
        Self {
            progress: ReadingProgress::default(),
            debounce: Duration::seconds(2),
            last_emit: None,
            pending: false,
        }
    }

    /// Resume tracking from persisted progress.
    #[must_use]
    pub fn from_progress(progress: ReadingProgress) -> Self {
        Self {
            progress,
            ..Self::new()
        }
    }

    #[must_use]
    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    #[must_use]
    pub fn progress(&self) -> &ReadingProgress {
        &self.progress
    }

    /// Fold a raw scroll measurement into the tracker. Returns the new
    /// percentage if the debounce window allows an emit right now.
    pub fn on_scroll(
        &mut self,
        scroll_top: f64,
        scroll_height: f64,
        client_height: f64,
        now: DateTime<Utc>,
    ) -> Option<u8> {
        let derived = scroll_percentage(scroll_top, scroll_height, client_height);
        if self.progress.record_scroll(derived) {
            self.pending = true;
        }
        self.emit_if_due(now)
    }

    /// Emit a pending value once its debounce window has elapsed. Call this
    /// from a timer so the last scroll of a burst is not lost.
    pub fn poll(&mut self, now: DateTime<Utc>) -> Option<u8> {
        self.emit_if_due(now)
    }

    /// Explicit completion. Bypasses the debounce and the derived cap.
    pub fn mark_complete(&mut self, now: DateTime<Utc>) -> u8 {
        self.progress.mark_complete();
        self.pending = false;
        self.last_emit = Some(now);
        self.progress.completion_percentage()
    }

    /// Restart the material from the beginning.
    pub fn reset(&mut self) {
        self.progress.reset();
        self.last_emit = None;
        self.pending = false;
    }

    pub fn add_reading_time(&mut self, seconds: u64) {
        self.progress.add_time(seconds);
    }

    pub fn add_bookmark(&mut self, position: u32) -> bool {
        self.progress.add_bookmark(position)
    }

    pub fn remove_bookmark(&mut self, position: u32) -> bool {
        self.progress.remove_bookmark(position)
    }

    fn emit_if_due(&mut self, now: DateTime<Utc>) -> Option<u8> {
        if !self.pending {
            return None;
        }
        let due = self
            .last_emit
            .is_none_or(|last| now - last >= self.debounce);
        if !due {
            return None;
        }
        self.pending = false;
        self.last_emit = Some(now);
        Some(self.progress.completion_percentage())
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
