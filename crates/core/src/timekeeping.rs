use chrono::{DateTime, Utc};

use crate::model::Session;

/// Result of settling outstanding foreground time into a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settlement {
    /// Whole seconds credited to the session by this settle.
    pub credited_seconds: u64,
    /// True exactly once, when the settle pushed elapsed time to the ceiling.
    pub deadline_reached: bool,
}

impl Settlement {
    const NONE: Settlement = Settlement {
        credited_seconds: 0,
        deadline_reached: false,
    };
}

/// Wall-clock accounting for the time a session spends in the foreground.
///
/// A resume stamp is captured whenever the attempt (re)enters the active
/// condition. Every settle consumes the delta since that stamp exactly once
/// and re-stamps, so foreground time is never double-counted and background
/// gaps never counted at all. Sub-second remainders are carried, not
/// discarded; they roll into the next settle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TimeAccounting {
    last_resume: Option<DateTime<Utc>>,
    carry_ms: i64,
    deadline_signaled: bool,
}

impl TimeAccounting {
    /// Accounting for a session that is not currently in the foreground.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Accounting for a session already in the foreground at `now`.
    #[must_use]
    pub fn resumed_at(now: DateTime<Utc>) -> Self {
        Self {
            last_resume: Some(now),
            carry_ms: 0,
            deadline_signaled: false,
        }
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.last_resume.is_some()
    }

    /// Re-enter the foreground. A duplicate resume keeps the earlier stamp
    /// so the pending delta is not shrunk.
    pub fn resume(&mut self, now: DateTime<Utc>) {
        if self.last_resume.is_none() {
            self.last_resume = Some(now);
        }
    }

    /// Consume the foreground delta since the last stamp and credit it to
    /// the session, clamped at the allowed ceiling.
    ///
    /// The deadline-reached signal is raised exactly once per accounting
    /// instance; callers force submission when they observe it.
    pub fn settle(&mut self, session: &mut Session, now: DateTime<Utc>) -> Settlement {
        let Some(resumed) = self.last_resume else {
            return Settlement::NONE;
        };

        // Negative deltas (clock skew) credit nothing but still re-stamp.
        let delta_ms = (now - resumed).num_milliseconds().max(0) + self.carry_ms;
        let credited = session.credit_elapsed((delta_ms / 1000) as u64);
        self.carry_ms = delta_ms % 1000;
        self.last_resume = Some(now);

        let deadline_reached = session.deadline_reached()
            && session.state() == crate::model::SessionState::Running
            && !self.deadline_signaled;
        if deadline_reached {
            self.deadline_signaled = true;
        }

        Settlement {
            credited_seconds: credited,
            deadline_reached,
        }
    }

    /// Settle, then leave the foreground; the gap until the next resume is
    /// skipped entirely.
    pub fn suspend(&mut self, session: &mut Session, now: DateTime<Utc>) -> Settlement {
        let settlement = self.settle(session, now);
        self.last_resume = None;
        settlement
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
