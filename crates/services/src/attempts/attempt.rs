use chrono::{DateTime, Utc};

use assess_core::grading::{self, GradingError, ScoreReport};
use assess_core::model::{AnswerPayload, AnswerWrite, AssessmentDefinition, QuestionId, Session};
use assess_core::timekeeping::{Settlement, TimeAccounting};
use storage::SessionRecord;

use crate::error::AttemptError;

/// One in-memory assessment attempt: the session, the definition it runs
/// against, the foreground clock, and the cached score report once the
/// attempt reaches a terminal state.
///
/// The attempt owns all domain mutations; the service around it decides when
/// to call them and when to flush snapshots.
#[derive(Debug, Clone)]
pub struct Attempt {
    session: Session,
    definition: AssessmentDefinition,
    time: TimeAccounting,
    report: Option<ScoreReport>,
}

impl Attempt {
    pub(crate) fn new(session: Session, definition: AssessmentDefinition) -> Self {
        Self {
            session,
            definition,
            time: TimeAccounting::new(),
            report: None,
        }
    }

    pub(crate) fn rehydrated(
        session: Session,
        definition: AssessmentDefinition,
        time: TimeAccounting,
    ) -> Self {
        Self {
            session,
            definition,
            time,
            report: None,
        }
    }

    //
    // ─── ACCESSORS ─────────────────────────────────────────────────────────────
    //

    #[must_use]
    pub fn session(&self) -> &Session {
        &self.session
    }

    #[must_use]
    pub fn definition(&self) -> &AssessmentDefinition {
        &self.definition
    }

    /// Available once the attempt is submitted or expired.
    #[must_use]
    pub fn score_report(&self) -> Option<&ScoreReport> {
        self.report.as_ref()
    }

    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.session.is_terminal()
    }

    #[must_use]
    pub fn remaining_seconds(&self) -> u64 {
        self.session.remaining_seconds()
    }

    /// Snapshot for persistence.
    #[must_use]
    pub fn snapshot(&self) -> SessionRecord {
        SessionRecord::from_session(&self.session)
    }

    //
    // ─── LIFECYCLE ─────────────────────────────────────────────────────────────
    //

    /// Begin the attempt and start the foreground clock.
    ///
    /// # Errors
    ///
    /// Returns `AttemptError::Session` unless the session is `NotStarted`.
    pub fn start(&mut self, now: DateTime<Utc>) -> Result<(), AttemptError> {
        self.session.start(now)?;
        self.time.resume(now);
        Ok(())
    }

    /// Record (or overwrite) the answer for one question.
    ///
    /// Writes against a terminal attempt are ignored without validation so
    /// late in-flight events from a closing UI never surface errors.
    ///
    /// # Errors
    ///
    /// Returns `AttemptError::Grading` when the question is unknown, an
    /// option does not belong to it, or the payload shape does not match the
    /// question kind; `AttemptError::Session` when the attempt never started.
    pub fn record_answer(
        &mut self,
        question_id: QuestionId,
        payload: AnswerPayload,
    ) -> Result<AnswerWrite, AttemptError> {
        if self.session.is_terminal() {
            return Ok(AnswerWrite::Ignored);
        }
        let question = self
            .definition
            .question(&question_id)
            .ok_or_else(|| GradingError::UnknownQuestion(question_id.clone()))?;
        grading::validate_payload(question, &payload)?;
        Ok(self.session.record_answer(question_id, payload)?)
    }

    /// Credit foreground time up to `now`. See [`TimeAccounting::settle`].
    pub fn settle(&mut self, now: DateTime<Utc>) -> Settlement {
        self.time.settle(&mut self.session, now)
    }

    /// Restart the foreground clock (tab became visible). No-op when the
    /// clock is already active or the attempt is terminal.
    pub fn resume_clock(&mut self, now: DateTime<Utc>) {
        if !self.session.is_terminal() {
            self.time.resume(now);
        }
    }

    /// Settle and stop the foreground clock (tab hidden or torn down).
    pub fn suspend_clock(&mut self, now: DateTime<Utc>) -> Settlement {
        self.time.suspend(&mut self.session, now)
    }

    /// Submit the attempt and grade it. Idempotent once terminal: a second
    /// submit returns the cached report without re-settling time.
    ///
    /// # Errors
    ///
    /// Returns `AttemptError::Session` when the attempt never started, or
    /// `AttemptError::Grading` if stored answers fail integrity checks.
    pub fn submit(&mut self, now: DateTime<Utc>) -> Result<ScoreReport, AttemptError> {
        self.time.suspend(&mut self.session, now);
        self.session.submit(now)?;
        self.ensure_graded()
    }

    /// Mark a rehydrated attempt whose deadline had already passed as
    /// expired, and grade whatever answers were persisted.
    ///
    /// # Errors
    ///
    /// Returns `AttemptError::Grading` if stored answers fail integrity
    /// checks.
    pub fn expire(&mut self, now: DateTime<Utc>) -> Result<ScoreReport, AttemptError> {
        self.time.suspend(&mut self.session, now);
        self.session.expire(now);
        self.ensure_graded()
    }

    /// Grade once and cache. Grading is pure, so the cached report equals a
    /// recomputation.
    pub(crate) fn ensure_graded(&mut self) -> Result<ScoreReport, AttemptError> {
        if let Some(report) = &self.report {
            return Ok(report.clone());
        }
        let report = grading::grade_all(&self.definition, self.session.answers())?;
        self.report = Some(report.clone());
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assess_core::model::{
        AnswerOption, AssessmentId, Question, QuestionKind, SessionId, UserId,
    };
    use assess_core::time::fixed_now;
    use chrono::Duration;

    fn two_question_definition() -> AssessmentDefinition {
        let q1 = Question::new(
            QuestionId::new("q1"),
            "2 + 2 = ?",
            QuestionKind::SingleChoice,
            5,
            vec![
                AnswerOption::new("a", "3", false),
                AnswerOption::new("b", "4", true),
            ],
            None,
        )
        .unwrap();
        let q2 = Question::new(
            QuestionId::new("q2"),
            "Explain.",
            QuestionKind::Essay,
            5,
            Vec::new(),
            None,
        )
        .unwrap();
        AssessmentDefinition::new(AssessmentId::new(7), vec![q1, q2], 120).unwrap()
    }

    fn fresh_attempt() -> Attempt {
        let definition = two_question_definition();
        let session = Session::new(
            SessionId::random(),
            UserId::new(1),
            definition.id(),
            definition.allowed_duration_seconds(),
        );
        Attempt::new(session, definition)
    }

    #[test]
    fn start_answer_submit_produces_a_report() {
        let mut attempt = fresh_attempt();
        let t0 = fixed_now();
        attempt.start(t0).unwrap();

        attempt
            .record_answer(QuestionId::new("q1"), AnswerPayload::selection(["b"]))
            .unwrap();
        attempt
            .record_answer(QuestionId::new("q2"), AnswerPayload::text("because"))
            .unwrap();

        attempt.submit(t0 + Duration::seconds(30)).unwrap();
        let report = attempt.score_report().unwrap();
        assert_eq!(report.total_awarded(), 5);
        assert_eq!(report.pending_points(), 5);
        assert_eq!(attempt.session().elapsed_seconds(), 30);
    }

    #[test]
    fn unknown_question_is_rejected() {
        let mut attempt = fresh_attempt();
        attempt.start(fixed_now()).unwrap();

        let err = attempt
            .record_answer(QuestionId::new("ghost"), AnswerPayload::text("x"))
            .unwrap_err();
        assert!(matches!(
            err,
            AttemptError::Grading(GradingError::UnknownQuestion(_))
        ));
    }

    #[test]
    fn foreign_option_is_rejected() {
        let mut attempt = fresh_attempt();
        attempt.start(fixed_now()).unwrap();

        let err = attempt
            .record_answer(QuestionId::new("q1"), AnswerPayload::selection(["zz"]))
            .unwrap_err();
        assert!(matches!(
            err,
            AttemptError::Grading(GradingError::UnknownOption { .. })
        ));
    }

    #[test]
    fn writes_after_submission_are_ignored() {
        let mut attempt = fresh_attempt();
        let t0 = fixed_now();
        attempt.start(t0).unwrap();
        attempt.submit(t0 + Duration::seconds(10)).unwrap();

        // even a malformed late write is swallowed
        let write = attempt
            .record_answer(QuestionId::new("ghost"), AnswerPayload::text("late"))
            .unwrap();
        assert_eq!(write, AnswerWrite::Ignored);
        assert_eq!(attempt.session().answered_count(), 0);
    }

    #[test]
    fn submit_is_idempotent_and_keeps_the_first_report() {
        let mut attempt = fresh_attempt();
        let t0 = fixed_now();
        attempt.start(t0).unwrap();
        attempt
            .record_answer(QuestionId::new("q1"), AnswerPayload::selection(["b"]))
            .unwrap();
        attempt.submit(t0 + Duration::seconds(10)).unwrap();
        let first = attempt.score_report().unwrap().clone();

        attempt.submit(t0 + Duration::seconds(90)).unwrap();
        assert_eq!(attempt.score_report(), Some(&first));
        assert_eq!(attempt.session().elapsed_seconds(), 10);
    }

    #[test]
    fn expire_grades_persisted_answers() {
        let mut attempt = fresh_attempt();
        let t0 = fixed_now();
        attempt.start(t0).unwrap();
        attempt
            .record_answer(QuestionId::new("q1"), AnswerPayload::selection(["b"]))
            .unwrap();

        attempt.expire(t0 + Duration::seconds(5)).unwrap();
        assert!(attempt.is_terminal());
        assert_eq!(attempt.score_report().unwrap().total_awarded(), 5);
    }
}
