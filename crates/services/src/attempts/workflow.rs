use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use assess_core::grading::ScoreReport;
use assess_core::model::{
    AnswerPayload, AnswerWrite, AssessmentDefinition, AssessmentId, QuestionId, Session,
    SessionId, SessionState, UserId,
};
use assess_core::timekeeping::TimeAccounting;
use assess_core::Clock;
use storage::{AssessmentSource, SessionStore, Storage};

use super::attempt::Attempt;
use crate::autosave::{AutosaveScheduler, FlushOutcome, FlushTrigger};
use crate::error::AttemptError;

/// What a heartbeat tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatOutcome {
    /// Time was credited; the flush outcome follows the scheduler's policy.
    Ticked(FlushOutcome),
    /// The allowed duration was spent and the attempt was force-submitted.
    DeadlineSubmitted,
}

/// Orchestrates the attempt lifecycle against storage.
///
/// Read failures (definition or session fetch) propagate to the caller.
/// Write failures during autosave are logged and owed a retry by the
/// scheduler; they never interrupt the attempt.
pub struct AttemptService {
    clock: Clock,
    sessions: Arc<dyn SessionStore>,
    assessments: Arc<dyn AssessmentSource>,
}

impl AttemptService {
    #[must_use]
    pub fn new(sessions: Arc<dyn SessionStore>, assessments: Arc<dyn AssessmentSource>) -> Self {
        Self {
            clock: Clock::default_clock(),
            sessions,
            assessments,
        }
    }

    #[must_use]
    pub fn from_storage(storage: &Storage) -> Self {
        Self::new(Arc::clone(&storage.sessions), Arc::clone(&storage.assessments))
    }

    /// Replace the clock. Tests use `Clock::fixed` to script time.
    pub fn set_clock(&mut self, clock: Clock) {
        self.clock = clock;
    }

    fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    //
    // ─── REHYDRATION ───────────────────────────────────────────────────────────
    //

    /// Resume the user's open attempt for an assessment, or create a fresh
    /// one. At most one open attempt exists per (user, assessment) pair.
    ///
    /// # Errors
    ///
    /// Returns `AttemptError::Storage` when the definition cannot be
    /// fetched or the store cannot be read, and `AttemptError::Session` when
    /// a persisted record violates session invariants.
    pub async fn create_or_resume(
        &self,
        user_id: UserId,
        assessment_id: AssessmentId,
    ) -> Result<Attempt, AttemptError> {
        let definition = self.assessments.fetch_definition(assessment_id).await?;

        if let Some(record) = self.sessions.find_open(user_id, assessment_id).await? {
            let session = record.into_session()?;
            info!(session_id = %session.id(), %user_id, %assessment_id, "resuming open session");
            return self.rehydrate(session, definition).await;
        }

        let session = Session::new(
            SessionId::random(),
            user_id,
            assessment_id,
            definition.allowed_duration_seconds(),
        );
        info!(session_id = %session.id(), %user_id, %assessment_id, "created session");
        let attempt = Attempt::new(session, definition);
        self.try_flush_snapshot(&attempt).await;
        Ok(attempt)
    }

    /// Rehydrate a specific attempt by session id.
    ///
    /// # Errors
    ///
    /// Returns `AttemptError::Storage` (`NotFound` included) when the record
    /// or its definition cannot be fetched, and `AttemptError::Session` when
    /// the record violates session invariants.
    pub async fn load(&self, session_id: SessionId) -> Result<Attempt, AttemptError> {
        let record = self.sessions.load(session_id).await?;
        let definition = self.assessments.fetch_definition(record.assessment_id).await?;
        let session = record.into_session()?;
        self.rehydrate(session, definition).await
    }

    async fn rehydrate(
        &self,
        session: Session,
        definition: AssessmentDefinition,
    ) -> Result<Attempt, AttemptError> {
        let now = self.now();
        let time = if session.state() == SessionState::Running {
            TimeAccounting::resumed_at(now)
        } else {
            TimeAccounting::new()
        };
        let mut attempt = Attempt::rehydrated(session, definition, time);

        // the process died after the deadline but before the final flush
        if attempt.session().state() == SessionState::Running
            && attempt.session().deadline_reached()
        {
            warn!(
                session_id = %attempt.session().id(),
                "rehydrated session past its deadline, expiring"
            );
            attempt.expire(now)?;
            self.try_flush_snapshot(&attempt).await;
        } else if attempt.is_terminal() {
            // terminal rehydrations come back read-only with their report
            attempt.ensure_graded()?;
        }
        Ok(attempt)
    }

    //
    // ─── LIFECYCLE ─────────────────────────────────────────────────────────────
    //

    /// Begin the attempt, activate the scheduler, and flush the `Running`
    /// state immediately.
    ///
    /// # Errors
    ///
    /// Returns `AttemptError::Session` unless the attempt is `NotStarted`.
    pub async fn start(
        &self,
        attempt: &mut Attempt,
        scheduler: &mut AutosaveScheduler,
    ) -> Result<(), AttemptError> {
        attempt.start(self.now())?;
        scheduler.start();
        info!(session_id = %attempt.session().id(), "session started");
        self.flush(attempt, scheduler, FlushTrigger::Transition).await;
        Ok(())
    }

    /// Record an answer. The write itself is in-memory; persistence rides on
    /// the autosave cadence.
    ///
    /// # Errors
    ///
    /// Returns `AttemptError::Grading` for integrity faults and
    /// `AttemptError::Session` when the attempt never started.
    pub fn record_answer(
        &self,
        attempt: &mut Attempt,
        question_id: QuestionId,
        payload: AnswerPayload,
    ) -> Result<AnswerWrite, AttemptError> {
        attempt.record_answer(question_id, payload)
    }

    /// Periodic tick: credit foreground time, enforce the deadline, and give
    /// the scheduler a chance to flush.
    ///
    /// # Errors
    ///
    /// Returns `AttemptError::Grading` if a deadline submission fails to
    /// grade the stored answers.
    pub async fn heartbeat(
        &self,
        attempt: &mut Attempt,
        scheduler: &mut AutosaveScheduler,
    ) -> Result<HeartbeatOutcome, AttemptError> {
        let now = self.now();
        let settlement = attempt.settle(now);
        if settlement.deadline_reached {
            return self.force_submit(attempt, scheduler, now).await;
        }
        let outcome = self.flush(attempt, scheduler, FlushTrigger::Periodic).await;
        Ok(HeartbeatOutcome::Ticked(outcome))
    }

    /// The tab went to the background: stop crediting time and flush.
    ///
    /// # Errors
    ///
    /// Returns `AttemptError::Grading` if a deadline submission fails to
    /// grade the stored answers.
    pub async fn set_hidden(
        &self,
        attempt: &mut Attempt,
        scheduler: &mut AutosaveScheduler,
    ) -> Result<HeartbeatOutcome, AttemptError> {
        let now = self.now();
        let settlement = attempt.suspend_clock(now);
        if settlement.deadline_reached {
            return self.force_submit(attempt, scheduler, now).await;
        }
        let outcome = self.flush(attempt, scheduler, FlushTrigger::Visibility).await;
        Ok(HeartbeatOutcome::Ticked(outcome))
    }

    /// The tab came back to the foreground: restart the clock. Time spent
    /// hidden is never credited.
    pub fn set_visible(&self, attempt: &mut Attempt) {
        attempt.resume_clock(self.now());
    }

    /// Explicit save request.
    pub async fn save_now(
        &self,
        attempt: &mut Attempt,
        scheduler: &mut AutosaveScheduler,
    ) -> FlushOutcome {
        attempt.settle(self.now());
        self.flush(attempt, scheduler, FlushTrigger::Manual).await
    }

    /// Submit the attempt and flush the terminal snapshot. The scheduler is
    /// deregistered only once that snapshot is persisted; until then it stays
    /// active so later triggers retry the write. Idempotent once terminal.
    ///
    /// # Errors
    ///
    /// Returns `AttemptError::Session` when the attempt never started, or
    /// `AttemptError::Grading` if stored answers fail integrity checks.
    pub async fn submit(
        &self,
        attempt: &mut Attempt,
        scheduler: &mut AutosaveScheduler,
    ) -> Result<ScoreReport, AttemptError> {
        let report = attempt.submit(self.now())?;
        info!(
            session_id = %attempt.session().id(),
            elapsed = attempt.session().elapsed_seconds(),
            awarded = report.total_awarded(),
            "session submitted"
        );
        self.flush(attempt, scheduler, FlushTrigger::Transition).await;
        Ok(report)
    }

    /// Best-effort final flush when the environment is going away. The
    /// scheduler is stopped afterwards so stale callbacks cannot write.
    pub async fn teardown(
        &self,
        attempt: &mut Attempt,
        scheduler: &mut AutosaveScheduler,
    ) -> FlushOutcome {
        attempt.suspend_clock(self.now());
        let outcome = self.flush(attempt, scheduler, FlushTrigger::Teardown).await;
        scheduler.stop();
        outcome
    }

    //
    // ─── FLUSHING ──────────────────────────────────────────────────────────────
    //

    async fn force_submit(
        &self,
        attempt: &mut Attempt,
        scheduler: &mut AutosaveScheduler,
        now: DateTime<Utc>,
    ) -> Result<HeartbeatOutcome, AttemptError> {
        attempt.submit(now)?;
        info!(session_id = %attempt.session().id(), "allowed duration spent, submitting");
        self.flush(attempt, scheduler, FlushTrigger::Transition).await;
        Ok(HeartbeatOutcome::DeadlineSubmitted)
    }

    async fn flush(
        &self,
        attempt: &Attempt,
        scheduler: &mut AutosaveScheduler,
        trigger: FlushTrigger,
    ) -> FlushOutcome {
        let now = self.now();
        if !scheduler.begin(trigger, now) {
            return FlushOutcome::Suppressed;
        }
        match self.sessions.upsert(&attempt.snapshot()).await {
            Ok(()) => {
                scheduler.complete(now, true);
                // a persisted terminal snapshot is the last write this
                // attempt ever needs; deregister so stale callbacks stop here
                if attempt.is_terminal() {
                    scheduler.stop();
                }
                FlushOutcome::Flushed
            }
            Err(error) => {
                warn!(
                    session_id = %attempt.session().id(),
                    %error,
                    ?trigger,
                    "session flush failed, retrying on next trigger"
                );
                scheduler.complete(now, false);
                FlushOutcome::Failed
            }
        }
    }

    /// One-off flush outside the scheduler (snapshot of a freshly created or
    /// force-expired attempt). Failures are logged; the next scheduled flush
    /// persists the same state again.
    async fn try_flush_snapshot(&self, attempt: &Attempt) {
        if let Err(error) = self.sessions.upsert(&attempt.snapshot()).await {
            warn!(
                session_id = %attempt.session().id(),
                %error,
                "initial snapshot flush failed"
            );
        }
    }
}

impl std::fmt::Debug for AttemptService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttemptService")
            .field("clock", &self.clock)
            .finish_non_exhaustive()
    }
}
