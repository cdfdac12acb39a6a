use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Derived scroll-position cap while content is not explicitly finished.
pub const DERIVED_SCROLL_CAP: u8 = 99;

/// Reading-completion state for long-form content (not an exam).
///
/// `completion_percentage` derived from scroll can never reach 100 on its
/// own; only `mark_complete` sets 100, and once completed the value is pinned
/// until an explicit `reset`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ReadingProgress {
    completion_percentage: u8,
    time_spent_seconds: u64,
    is_completed: bool,
    bookmarks: BTreeSet<u32>,
}

impl ReadingProgress {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn completion_percentage(&self) -> u8 {
        self.completion_percentage
    }

    #[must_use]
    pub fn time_spent_seconds(&self) -> u64 {
        self.time_spent_seconds
    }

    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.is_completed
    }

    #[must_use]
    pub fn bookmarks(&self) -> &BTreeSet<u32> {
        &self.bookmarks
    }

    /// Apply a scroll-derived percentage.
    ///
    /// Keeps a high-water mark capped at [`DERIVED_SCROLL_CAP`]; over-scroll
    /// cannot silently complete the content, and scrolling back up never
    /// lowers stored progress. Ignored entirely once completed.
    ///
    /// Returns true when the stored percentage changed.
    pub fn record_scroll(&mut self, derived: u8) -> bool {
        if self.is_completed {
            return false;
        }
        let capped = derived.min(DERIVED_SCROLL_CAP);
        if capped > self.completion_percentage {
            self.completion_percentage = capped;
            true
        } else {
            false
        }
    }

    /// Explicitly finish the content, pinning the percentage at 100.
    pub fn mark_complete(&mut self) {
        self.is_completed = true;
        self.completion_percentage = 100;
    }

    /// Explicitly unset completion; the only way back from `mark_complete`.
    pub fn reset(&mut self) {
        self.is_completed = false;
        self.completion_percentage = 0;
    }

    pub fn add_time(&mut self, seconds: u64) {
        self.time_spent_seconds = self.time_spent_seconds.saturating_add(seconds);
    }

    /// Returns false if the marker was already present.
    pub fn add_bookmark(&mut self, position: u32) -> bool {
        self.bookmarks.insert(position)
    }

    /// Returns false if the marker was absent.
    pub fn remove_bookmark(&mut self, position: u32) -> bool {
        self.bookmarks.remove(&position)
    }
}

/// Map a scroll position within a viewport to a completion percentage.
///
/// `round(scroll_top / (scroll_height - client_height) * 100)` clamped to
/// [0, 100]. Content that fits entirely in the viewport reads as 100.
#[must_use]
pub fn scroll_percentage(scroll_top: f64, scroll_height: f64, client_height: f64) -> u8 {
    let range = scroll_height - client_height;
    // zero, negative or NaN range means nothing to scroll
    if !(range > 0.0) {
        return 100;
    }
    let pct = (scroll_top / range * 100.0).round();
    pct.clamp(0.0, 100.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scroll_percentage_rounds_and_clamps() {
        assert_eq!(scroll_percentage(0.0, 2000.0, 800.0), 0);
        assert_eq!(scroll_percentage(600.0, 2000.0, 800.0), 50);
        assert_eq!(scroll_percentage(1200.0, 2000.0, 800.0), 100);
        // over-scroll (rubber banding) clamps
        assert_eq!(scroll_percentage(1500.0, 2000.0, 800.0), 100);
        assert_eq!(scroll_percentage(-50.0, 2000.0, 800.0), 0);
        // content shorter than the viewport is fully visible
        assert_eq!(scroll_percentage(0.0, 500.0, 800.0), 100);
    }

    #[test]
    fn derived_scroll_never_reports_100() {
        let mut progress = ReadingProgress::new();
        assert!(progress.record_scroll(100));
        assert_eq!(progress.completion_percentage(), 99);
        assert!(!progress.is_completed());
    }

    #[test]
    fn scroll_keeps_high_water_mark() {
        let mut progress = ReadingProgress::new();
        assert!(progress.record_scroll(40));
        assert!(!progress.record_scroll(25));
        assert_eq!(progress.completion_percentage(), 40);
    }

    #[test]
    fn completion_pins_until_reset() {
        let mut progress = ReadingProgress::new();
        progress.mark_complete();
        assert_eq!(progress.completion_percentage(), 100);
        assert!(!progress.record_scroll(10));
        assert_eq!(progress.completion_percentage(), 100);

        progress.reset();
        assert!(!progress.is_completed());
        assert_eq!(progress.completion_percentage(), 0);
    }

    #[test]
    fn bookmarks_stay_ordered_and_unique() {
        let mut progress = ReadingProgress::new();
        assert!(progress.add_bookmark(12));
        assert!(progress.add_bookmark(3));
        assert!(!progress.add_bookmark(12));
        assert_eq!(progress.bookmarks().iter().copied().collect::<Vec<_>>(), vec![3, 12]);
        assert!(progress.remove_bookmark(3));
        assert!(!progress.remove_bookmark(3));
    }
}
