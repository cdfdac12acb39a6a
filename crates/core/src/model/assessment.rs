use std::collections::BTreeSet;
use thiserror::Error;

use crate::model::ids::{AssessmentId, QuestionId};
use crate::model::question::Question;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum AssessmentError {
    #[error("duplicate question id {0}")]
    DuplicateQuestion(QuestionId),

    #[error("allowed duration must be positive")]
    ZeroDuration,
}

/// Read-only assessment definition, owned by the content-management
/// subsystem and fetched through `storage::AssessmentSource`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssessmentDefinition {
    id: AssessmentId,
    questions: Vec<Question>,
    allowed_duration_seconds: u64,
}

impl AssessmentDefinition {
    /// Build a definition, validating question-id uniqueness and a positive
    /// duration ceiling.
    ///
    /// # Errors
    ///
    /// Returns `AssessmentError` if validation fails.
    pub fn new(
        id: AssessmentId,
        questions: Vec<Question>,
        allowed_duration_seconds: u64,
    ) -> Result<Self, AssessmentError> {
        if allowed_duration_seconds == 0 {
            return Err(AssessmentError::ZeroDuration);
        }
        let mut seen = BTreeSet::new();
        for question in &questions {
            if !seen.insert(question.id()) {
                return Err(AssessmentError::DuplicateQuestion(question.id().clone()));
            }
        }

        Ok(Self {
            id,
            questions,
            allowed_duration_seconds,
        })
    }

    #[must_use]
    pub fn id(&self) -> AssessmentId {
        self.id
    }

    #[must_use]
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    #[must_use]
    pub fn allowed_duration_seconds(&self) -> u64 {
        self.allowed_duration_seconds
    }

    /// Look up a question by id.
    #[must_use]
    pub fn question(&self, id: &QuestionId) -> Option<&Question> {
        self.questions.iter().find(|q| q.id() == id)
    }

    /// Maximum achievable points across all questions.
    #[must_use]
    pub fn total_points(&self) -> u32 {
        self.questions
            .iter()
            .fold(0_u32, |acc, q| acc.saturating_add(q.points()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::question::{AnswerOption, QuestionKind};

    fn question(id: &str, points: u32) -> Question {
        Question::new(
            QuestionId::new(id),
            "Pick one",
            QuestionKind::SingleChoice,
            points,
            vec![
                AnswerOption::new("a", "A", true),
                AnswerOption::new("b", "B", false),
            ],
            None,
        )
        .unwrap()
    }

    #[test]
    fn duplicate_question_ids_rejected() {
        let err = AssessmentDefinition::new(
            AssessmentId::new(1),
            vec![question("q1", 1), question("q1", 2)],
            600,
        )
        .unwrap_err();
        assert!(matches!(err, AssessmentError::DuplicateQuestion(_)));
    }

    #[test]
    fn zero_duration_rejected() {
        let err =
            AssessmentDefinition::new(AssessmentId::new(1), vec![question("q1", 1)], 0).unwrap_err();
        assert_eq!(err, AssessmentError::ZeroDuration);
    }

    #[test]
    fn total_points_sums_questions() {
        let def = AssessmentDefinition::new(
            AssessmentId::new(1),
            vec![question("q1", 2), question("q2", 3)],
            600,
        )
        .unwrap();
        assert_eq!(def.total_points(), 5);
        assert!(def.question(&QuestionId::new("q2")).is_some());
        assert!(def.question(&QuestionId::new("q9")).is_none());
    }
}
