use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::model::answer::AnswerPayload;
use crate::model::ids::{AssessmentId, QuestionId, SessionId, UserId};

//
// ─── STATE ─────────────────────────────────────────────────────────────────────
//

/// Lifecycle state of an attempt.
///
/// `Submitted` and `Expired` are both terminal and immutable. `Expired` marks
/// an attempt whose deadline was found already spent while rehydrating; a
/// deadline hit on a live session transitions to `Submitted`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    NotStarted,
    Running,
    Submitted,
    Expired,
}

impl SessionState {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Submitted | SessionState::Expired)
    }
}

/// Outcome of an answer-mutation event.
///
/// Writes against a terminal session are silently ignored rather than
/// applied, so a late event racing the deadline cannot corrupt a frozen
/// answer set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerWrite {
    Applied,
    Ignored,
}

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SessionError {
    #[error("invalid transition from {from:?}")]
    InvalidTransition { from: SessionState },

    #[error("session has not been started")]
    NotStarted,

    #[error("invalid persisted session: {0}")]
    InvalidPersistedState(String),
}

//
// ─── SESSION ───────────────────────────────────────────────────────────────────
//

/// One candidate's timed run through an assessment.
///
/// The in-memory session is authoritative; storage holds downstream
/// snapshots. Invariants enforced here:
/// - `elapsed_seconds <= allowed_duration_seconds` at all times
/// - once terminal, no field changes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    id: SessionId,
    user_id: UserId,
    assessment_id: AssessmentId,
    state: SessionState,
    allowed_duration_seconds: u64,
    elapsed_seconds: u64,
    answers: BTreeMap<QuestionId, AnswerPayload>,
    started_at: Option<DateTime<Utc>>,
    submitted_at: Option<DateTime<Utc>>,
}

impl Session {
    /// Create a fresh attempt in `NotStarted`.
    #[must_use]
    pub fn new(
        id: SessionId,
        user_id: UserId,
        assessment_id: AssessmentId,
        allowed_duration_seconds: u64,
    ) -> Self {
        Self {
            id,
            user_id,
            assessment_id,
            state: SessionState::NotStarted,
            allowed_duration_seconds,
            elapsed_seconds: 0,
            answers: BTreeMap::new(),
            started_at: None,
            submitted_at: None,
        }
    }

    /// Rehydrate a session from persisted storage.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidPersistedState` when the record violates
    /// a session invariant (elapsed beyond the ceiling, missing timestamps,
    /// answers on an unstarted attempt).
    #[allow(clippy::too_many_arguments)]
    pub fn from_persisted(
        id: SessionId,
        user_id: UserId,
        assessment_id: AssessmentId,
        state: SessionState,
        allowed_duration_seconds: u64,
        elapsed_seconds: u64,
        answers: BTreeMap<QuestionId, AnswerPayload>,
        started_at: Option<DateTime<Utc>>,
        submitted_at: Option<DateTime<Utc>>,
    ) -> Result<Self, SessionError> {
        if elapsed_seconds > allowed_duration_seconds {
            return Err(SessionError::InvalidPersistedState(format!(
                "elapsed {elapsed_seconds}s exceeds ceiling {allowed_duration_seconds}s"
            )));
        }
        if state.is_terminal() && submitted_at.is_none() {
            return Err(SessionError::InvalidPersistedState(
                "terminal session without submitted_at".into(),
            ));
        }
        if state != SessionState::NotStarted && started_at.is_none() {
            return Err(SessionError::InvalidPersistedState(
                "started session without started_at".into(),
            ));
        }
        if state == SessionState::NotStarted
            && (elapsed_seconds != 0 || !answers.is_empty() || submitted_at.is_some())
        {
            return Err(SessionError::InvalidPersistedState(
                "unstarted session carries progress".into(),
            ));
        }

        Ok(Self {
            id,
            user_id,
            assessment_id,
            state,
            allowed_duration_seconds,
            elapsed_seconds,
            answers,
            started_at,
            submitted_at,
        })
    }

    #[must_use]
    pub fn id(&self) -> SessionId {
        self.id
    }

    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    #[must_use]
    pub fn assessment_id(&self) -> AssessmentId {
        self.assessment_id
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    #[must_use]
    pub fn allowed_duration_seconds(&self) -> u64 {
        self.allowed_duration_seconds
    }

    #[must_use]
    pub fn elapsed_seconds(&self) -> u64 {
        self.elapsed_seconds
    }

    /// Seconds left before the deadline forces submission.
    #[must_use]
    pub fn remaining_seconds(&self) -> u64 {
        self.allowed_duration_seconds
            .saturating_sub(self.elapsed_seconds)
    }

    #[must_use]
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    #[must_use]
    pub fn submitted_at(&self) -> Option<DateTime<Utc>> {
        self.submitted_at
    }

    #[must_use]
    pub fn answers(&self) -> &BTreeMap<QuestionId, AnswerPayload> {
        &self.answers
    }

    #[must_use]
    pub fn answer(&self, question_id: &QuestionId) -> Option<&AnswerPayload> {
        self.answers.get(question_id)
    }

    /// Number of questions with a recorded, non-empty response.
    #[must_use]
    pub fn answered_count(&self) -> usize {
        self.answers.values().filter(|a| a.is_answered()).count()
    }

    /// True once accumulated time has reached the allowed ceiling.
    #[must_use]
    pub fn deadline_reached(&self) -> bool {
        self.elapsed_seconds >= self.allowed_duration_seconds
    }

    /// Begin the attempt: `NotStarted -> Running`.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidTransition` from any other state; there
    /// is no path back to `NotStarted`.
    pub fn start(&mut self, now: DateTime<Utc>) -> Result<(), SessionError> {
        match self.state {
            SessionState::NotStarted => {
                self.state = SessionState::Running;
                self.started_at = Some(now);
                Ok(())
            }
            from => Err(SessionError::InvalidTransition { from }),
        }
    }

    /// Record or replace an answer (the `Running -> Running` self-loop).
    ///
    /// Terminal sessions ignore the write and report `AnswerWrite::Ignored`.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NotStarted` when the attempt has not begun.
    pub fn record_answer(
        &mut self,
        question_id: QuestionId,
        payload: AnswerPayload,
    ) -> Result<AnswerWrite, SessionError> {
        match self.state {
            SessionState::Running => {
                self.answers.insert(question_id, payload);
                Ok(AnswerWrite::Applied)
            }
            SessionState::Submitted | SessionState::Expired => Ok(AnswerWrite::Ignored),
            SessionState::NotStarted => Err(SessionError::NotStarted),
        }
    }

    /// Add foreground time, clamped so elapsed never exceeds the ceiling.
    ///
    /// Returns the seconds actually credited; 0 when the session is not
    /// `Running`.
    pub fn credit_elapsed(&mut self, seconds: u64) -> u64 {
        if self.state != SessionState::Running {
            return 0;
        }
        let credited = seconds.min(self.remaining_seconds());
        self.elapsed_seconds += credited;
        credited
    }

    /// Finish the attempt: `Running -> Submitted`.
    ///
    /// Idempotent on terminal states, so a manual submit racing the deadline
    /// signal is a no-op for whichever arrives second.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidTransition` when the attempt was never
    /// started.
    pub fn submit(&mut self, now: DateTime<Utc>) -> Result<(), SessionError> {
        match self.state {
            SessionState::Running => {
                self.state = SessionState::Submitted;
                self.submitted_at = Some(now);
                Ok(())
            }
            SessionState::Submitted | SessionState::Expired => Ok(()),
            from @ SessionState::NotStarted => Err(SessionError::InvalidTransition { from }),
        }
    }

    /// Finalize an attempt whose deadline was already spent when rehydrated:
    /// `Running -> Expired`.
    ///
    /// No-op on `NotStarted` (an unstarted attempt has no deadline to spend,
    /// and expiring it would mint a terminal record without `started_at`)
    /// and on terminal states.
    pub fn expire(&mut self, now: DateTime<Utc>) {
        if self.state == SessionState::Running {
            self.state = SessionState::Expired;
            self.submitted_at = Some(now);
        }
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
