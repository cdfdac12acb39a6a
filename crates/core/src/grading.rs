use std::collections::BTreeMap;
use thiserror::Error;

use crate::model::{
    AnswerPayload, AssessmentDefinition, OptionId, Question, QuestionId, QuestionKind,
};

//
// ─── VERDICTS ──────────────────────────────────────────────────────────────────
//

/// Correctness verdict for a single question.
///
/// `PendingReview` marks answered text questions: they are never auto-graded
/// and deferring to manual review avoids penalizing open-ended responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Correct,
    Incorrect,
    PendingReview,
}

/// Verdict and auto-awarded points for one question.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GradeOutcome {
    pub verdict: Verdict,
    pub points_awarded: u32,
}

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

/// Data-integrity faults. These are rejected, never silently coerced into an
/// incorrect score, so callers can flag corrupted state.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum GradingError {
    #[error("answer references unknown question {0}")]
    UnknownQuestion(QuestionId),

    #[error("answer for question {question} references unknown option {option}")]
    UnknownOption {
        question: QuestionId,
        option: OptionId,
    },

    #[error("answer payload does not match question kind for {0}")]
    PayloadMismatch(QuestionId),
}

//
// ─── GRADING ───────────────────────────────────────────────────────────────────
//

/// Integrity gate shared by answer recording and grading: the payload shape
/// must match the question kind and every selected option must belong to the
/// question.
///
/// # Errors
///
/// Returns `GradingError` on mismatch.
pub fn validate_payload(question: &Question, payload: &AnswerPayload) -> Result<(), GradingError> {
    match (question.kind().is_choice(), payload) {
        (true, AnswerPayload::Selection(selected)) => {
            for id in selected {
                if !question.has_option(id) {
                    return Err(GradingError::UnknownOption {
                        question: question.id().clone(),
                        option: id.clone(),
                    });
                }
            }
            Ok(())
        }
        (false, AnswerPayload::Text(_)) => Ok(()),
        _ => Err(GradingError::PayloadMismatch(question.id().clone())),
    }
}

/// Grade one question against a recorded answer.
///
/// Pure and deterministic: calling twice with the same inputs returns
/// identical results. Unanswered questions are incorrect for zero points
/// regardless of kind; multiple choice requires exact set equality with the
/// correct options (no partial credit).
///
/// # Errors
///
/// Returns `GradingError` for malformed payloads (integrity fault).
pub fn grade(
    question: &Question,
    answer: Option<&AnswerPayload>,
) -> Result<GradeOutcome, GradingError> {
    let Some(payload) = answer else {
        return Ok(GradeOutcome {
            verdict: Verdict::Incorrect,
            points_awarded: 0,
        });
    };

    validate_payload(question, payload)?;

    if !payload.is_answered() {
        return Ok(GradeOutcome {
            verdict: Verdict::Incorrect,
            points_awarded: 0,
        });
    }

    let verdict = match (question.kind(), payload) {
        (QuestionKind::SingleChoice | QuestionKind::TrueFalse, AnswerPayload::Selection(sel)) => {
            let correct = question.correct_option_ids();
            if sel.len() == 1 && sel.iter().all(|id| correct.contains(id)) {
                Verdict::Correct
            } else {
                Verdict::Incorrect
            }
        }
        (QuestionKind::MultipleChoice, AnswerPayload::Selection(sel)) => {
            let selected: std::collections::BTreeSet<&OptionId> = sel.iter().collect();
            if selected == question.correct_option_ids() {
                Verdict::Correct
            } else {
                Verdict::Incorrect
            }
        }
        (QuestionKind::ShortAnswer | QuestionKind::Essay, AnswerPayload::Text(_)) => {
            Verdict::PendingReview
        }
        // validate_payload already rejected shape mismatches
        _ => return Err(GradingError::PayloadMismatch(question.id().clone())),
    };

    let points_awarded = if verdict == Verdict::Correct {
        question.points()
    } else {
        0
    };

    Ok(GradeOutcome {
        verdict,
        points_awarded,
    })
}

//
// ─── SCORE REPORT ──────────────────────────────────────────────────────────────
//

/// Per-question line in a score report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionScore {
    pub question_id: QuestionId,
    pub verdict: Verdict,
    pub points_awarded: u32,
    pub points_possible: u32,
}

/// Final score for an attempt.
///
/// Pending (manual-review) questions award zero auto points but stay inside
/// `max_points`; `pending_points` lets callers surface "N points awaiting
/// review" instead of displaying them as wrong.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoreReport {
    question_scores: Vec<QuestionScore>,
    total_awarded: u32,
    max_points: u32,
    pending_points: u32,
}

impl ScoreReport {
    #[must_use]
    pub fn question_scores(&self) -> &[QuestionScore] {
        &self.question_scores
    }

    #[must_use]
    pub fn total_awarded(&self) -> u32 {
        self.total_awarded
    }

    #[must_use]
    pub fn max_points(&self) -> u32 {
        self.max_points
    }

    #[must_use]
    pub fn pending_points(&self) -> u32 {
        self.pending_points
    }

    /// Rounded percentage, `None` when the assessment carries no points.
    #[must_use]
    pub fn percentage(&self) -> Option<u32> {
        if self.max_points == 0 {
            return None;
        }
        let pct = f64::from(self.total_awarded) / f64::from(self.max_points) * 100.0;
        Some(pct.round() as u32)
    }
}

/// Grade every question of a definition against a recorded answer set.
///
/// # Errors
///
/// Returns `GradingError::UnknownQuestion` when the answer set references a
/// question absent from the definition, and propagates per-question
/// integrity faults.
pub fn grade_all(
    definition: &AssessmentDefinition,
    answers: &BTreeMap<QuestionId, AnswerPayload>,
) -> Result<ScoreReport, GradingError> {
    for question_id in answers.keys() {
        if definition.question(question_id).is_none() {
            return Err(GradingError::UnknownQuestion(question_id.clone()));
        }
    }

    let mut question_scores = Vec::with_capacity(definition.questions().len());
    let mut total_awarded = 0_u32;
    let mut pending_points = 0_u32;

    for question in definition.questions() {
        let outcome = grade(question, answers.get(question.id()))?;
        total_awarded = total_awarded.saturating_add(outcome.points_awarded);
        if outcome.verdict == Verdict::PendingReview {
            pending_points = pending_points.saturating_add(question.points());
        }
        question_scores.push(QuestionScore {
            question_id: question.id().clone(),
            verdict: outcome.verdict,
            points_awarded: outcome.points_awarded,
            points_possible: question.points(),
        });
    }

    Ok(ScoreReport {
        question_scores,
        total_awarded,
        max_points: definition.total_points(),
        pending_points,
    })
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AnswerOption, AssessmentId};

    fn single_choice(id: &str, correct: &str, distractor: &str) -> Question {
        Question::new(
            QuestionId::new(id),
            "Pick one",
            QuestionKind::SingleChoice,
            1,
            vec![
                AnswerOption::new(correct, "Correct", true),
                AnswerOption::new(distractor, "Wrong", false),
            ],
            None,
        )
        .unwrap()
    }

    fn multi_choice(id: &str, points: u32) -> Question {
        Question::new(
            QuestionId::new(id),
            "Pick all that apply",
            QuestionKind::MultipleChoice,
            points,
            vec![
                AnswerOption::new("o1", "One", true),
                AnswerOption::new("o2", "Two", false),
                AnswerOption::new("o3", "Three", true),
            ],
            None,
        )
        .unwrap()
    }

    fn essay(id: &str, points: u32) -> Question {
        Question::new(
            QuestionId::new(id),
            "Discuss",
            QuestionKind::Essay,
            points,
            Vec::new(),
            None,
        )
        .unwrap()
    }

    #[test]
    fn unanswered_scores_zero_for_every_kind() {
        for question in [single_choice("q", "a", "b"), multi_choice("q", 2), essay("q", 5)] {
            let outcome = grade(&question, None).unwrap();
            assert_eq!(outcome.verdict, Verdict::Incorrect);
            assert_eq!(outcome.points_awarded, 0);

            let empty = AnswerPayload::selection(Vec::<String>::new());
            let blank = AnswerPayload::text("  ");
            let payload = if question.kind().is_choice() { empty } else { blank };
            let outcome = grade(&question, Some(&payload)).unwrap();
            assert_eq!(outcome.verdict, Verdict::Incorrect);
        }
    }

    #[test]
    fn single_choice_exact_match() {
        let q = single_choice("q1", "a1", "a2");
        let correct = grade(&q, Some(&AnswerPayload::selection(["a1"]))).unwrap();
        assert_eq!(correct.verdict, Verdict::Correct);
        assert_eq!(correct.points_awarded, 1);

        let wrong = grade(&q, Some(&AnswerPayload::selection(["a2"]))).unwrap();
        assert_eq!(wrong.verdict, Verdict::Incorrect);
        assert_eq!(wrong.points_awarded, 0);

        // two selections can never be correct for single choice
        let both = grade(&q, Some(&AnswerPayload::selection(["a1", "a2"]))).unwrap();
        assert_eq!(both.verdict, Verdict::Incorrect);
    }

    #[test]
    fn multiple_choice_requires_exact_set() {
        let q = multi_choice("q1", 4);
        let exact = grade(&q, Some(&AnswerPayload::selection(["o1", "o3"]))).unwrap();
        assert_eq!(exact.verdict, Verdict::Correct);
        assert_eq!(exact.points_awarded, 4);

        // superset, subset and disjoint all score zero
        for selection in [vec!["o1", "o2", "o3"], vec!["o1"], vec!["o2"]] {
            let outcome = grade(&q, Some(&AnswerPayload::selection(selection))).unwrap();
            assert_eq!(outcome.verdict, Verdict::Incorrect);
            assert_eq!(outcome.points_awarded, 0);
        }
    }

    #[test]
    fn text_questions_defer_to_manual_review() {
        let q = essay("q1", 5);
        let outcome = grade(&q, Some(&AnswerPayload::text("my essay"))).unwrap();
        assert_eq!(outcome.verdict, Verdict::PendingReview);
        assert_eq!(outcome.points_awarded, 0);
    }

    #[test]
    fn grading_is_idempotent() {
        let q = multi_choice("q1", 4);
        let payload = AnswerPayload::selection(["o1", "o3"]);
        assert_eq!(
            grade(&q, Some(&payload)).unwrap(),
            grade(&q, Some(&payload)).unwrap()
        );
    }

    #[test]
    fn foreign_option_is_integrity_fault() {
        let q = single_choice("q1", "a1", "a2");
        let err = grade(&q, Some(&AnswerPayload::selection(["zz"]))).unwrap_err();
        assert!(matches!(err, GradingError::UnknownOption { .. }));
    }

    #[test]
    fn payload_shape_mismatch_is_integrity_fault() {
        let q = single_choice("q1", "a1", "a2");
        let err = grade(&q, Some(&AnswerPayload::text("a1"))).unwrap_err();
        assert!(matches!(err, GradingError::PayloadMismatch(_)));

        let q = essay("q2", 5);
        let err = grade(&q, Some(&AnswerPayload::selection(["a1"]))).unwrap_err();
        assert!(matches!(err, GradingError::PayloadMismatch(_)));
    }

    #[test]
    fn unknown_question_in_answer_set_rejected() {
        let def = AssessmentDefinition::new(
            AssessmentId::new(1),
            vec![single_choice("q1", "a1", "a2")],
            600,
        )
        .unwrap();
        let mut answers = BTreeMap::new();
        answers.insert(QuestionId::new("ghost"), AnswerPayload::selection(["a1"]));

        let err = grade_all(&def, &answers).unwrap_err();
        assert!(matches!(err, GradingError::UnknownQuestion(_)));
    }

    #[test]
    fn report_totals_and_percentage() {
        // scenario: two single-choice questions, one answered correctly
        let def = AssessmentDefinition::new(
            AssessmentId::new(1),
            vec![single_choice("qa", "a1", "a2"), single_choice("qb", "b2", "b1")],
            600,
        )
        .unwrap();
        let mut answers = BTreeMap::new();
        answers.insert(QuestionId::new("qa"), AnswerPayload::selection(["a1"]));
        answers.insert(QuestionId::new("qb"), AnswerPayload::selection(["b1"]));

        let report = grade_all(&def, &answers).unwrap();
        assert_eq!(report.total_awarded(), 1);
        assert_eq!(report.max_points(), 2);
        assert_eq!(report.percentage(), Some(50));
        assert_eq!(report.pending_points(), 0);
    }

    #[test]
    fn pending_points_stay_in_max() {
        let def = AssessmentDefinition::new(
            AssessmentId::new(1),
            vec![single_choice("qa", "a1", "a2"), essay("qe", 5)],
            600,
        )
        .unwrap();
        let mut answers = BTreeMap::new();
        answers.insert(QuestionId::new("qa"), AnswerPayload::selection(["a1"]));
        answers.insert(QuestionId::new("qe"), AnswerPayload::text("long answer"));

        let report = grade_all(&def, &answers).unwrap();
        assert_eq!(report.total_awarded(), 1);
        assert_eq!(report.max_points(), 6);
        assert_eq!(report.pending_points(), 5);
        assert_eq!(report.percentage(), Some(17));
    }

    #[test]
    fn empty_assessment_has_no_percentage() {
        let def = AssessmentDefinition::new(AssessmentId::new(1), Vec::new(), 600).unwrap();
        let report = grade_all(&def, &BTreeMap::new()).unwrap();
        assert_eq!(report.percentage(), None);
    }
}
