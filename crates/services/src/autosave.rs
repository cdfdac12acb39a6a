use chrono::{DateTime, Duration, Utc};

/// What caused a flush attempt. All triggers converge on the same "persist
/// current snapshot" operation; only `Periodic` is subject to the interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushTrigger {
    /// Fixed-interval tick while the attempt is running.
    Periodic,
    /// Foreground/background visibility transition.
    Visibility,
    /// Best-effort flush on environment teardown.
    Teardown,
    /// Explicit save action by the user.
    Manual,
    /// Mandatory flush immediately before a lifecycle transition.
    Transition,
}

/// Result of routing a trigger through the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    Flushed,
    Suppressed,
    Failed,
}

/// Flush policy for one attempt.
///
/// Owns the autosave discipline as a single object with explicit
/// start/stop/reset instead of interval handles scattered across callbacks.
/// The in-flight guard is the sole synchronization primitive: a flush in
/// flight suppresses concurrent duplicates, and anything suppressed or
/// failed is owed again on the next trigger (flushes are idempotent
/// snapshots, so replays are harmless).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutosaveScheduler {
    interval: Duration,
    last_flush: Option<DateTime<Utc>>,
    in_flight: bool,
    dirty: bool,
    missed: bool,
    stopped: bool,
}

impl Default for AutosaveScheduler {
    fn default() -> Self {
        Self::new(Duration::seconds(15))
    }
}

impl AutosaveScheduler {
    #[must_use]
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_flush: None,
            in_flight: false,
            dirty: false,
            missed: false,
            stopped: false,
        }
    }

    /// (Re)activate the scheduler.
    pub fn start(&mut self) {
        self.stopped = false;
    }

    /// Deregister the scheduler: every later trigger is suppressed so a
    /// torn-down attempt can never be flushed by a stale callback.
    pub fn stop(&mut self) {
        self.stopped = true;
    }

    /// Clear all flush history and reactivate.
    pub fn reset(&mut self) {
        *self = Self::new(self.interval);
    }

    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    #[must_use]
    pub fn is_in_flight(&self) -> bool {
        self.in_flight
    }

    /// True when a suppressed or failed flush is owed a retry.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Decide whether a trigger may flush now. On `true` the flush is
    /// considered in flight until [`complete`](Self::complete) is called.
    pub fn begin(&mut self, trigger: FlushTrigger, now: DateTime<Utc>) -> bool {
        if self.stopped {
            return false;
        }
        if self.in_flight {
            // the snapshot may be newer than the one in flight
            self.missed = true;
            return false;
        }
        if trigger == FlushTrigger::Periodic && !self.dirty {
            if let Some(last) = self.last_flush {
                if now - last < self.interval {
                    return false;
                }
            }
        }
        self.in_flight = true;
        true
    }

    /// Report the outcome of a flush started via [`begin`](Self::begin).
    pub fn complete(&mut self, now: DateTime<Utc>, ok: bool) {
        self.in_flight = false;
        if ok {
            self.last_flush = Some(now);
            self.dirty = self.missed;
        } else {
            self.dirty = true;
        }
        self.missed = false;
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
