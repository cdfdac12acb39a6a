use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;

use crate::model::ids::{OptionId, QuestionId};

//
// ─── QUESTION TYPES ────────────────────────────────────────────────────────────
//

/// Kind of question, which determines how a response is recorded and graded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionKind {
    SingleChoice,
    MultipleChoice,
    TrueFalse,
    ShortAnswer,
    Essay,
}

impl QuestionKind {
    /// Returns true for kinds answered by selecting from fixed options.
    #[must_use]
    pub fn is_choice(self) -> bool {
        matches!(
            self,
            QuestionKind::SingleChoice | QuestionKind::MultipleChoice | QuestionKind::TrueFalse
        )
    }

    /// Returns true for kinds whose correctness can be computed without
    /// human review.
    #[must_use]
    pub fn is_auto_gradable(self) -> bool {
        self.is_choice()
    }
}

/// A selectable answer option. `is_correct` is hidden from candidates until
/// grading or review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerOption {
    pub id: OptionId,
    pub text: String,
    pub is_correct: bool,
}

impl AnswerOption {
    #[must_use]
    pub fn new(id: impl Into<String>, text: impl Into<String>, is_correct: bool) -> Self {
        Self {
            id: OptionId::new(id),
            text: text.into(),
            is_correct,
        }
    }
}

//
// ─── VALIDATION ERRORS ─────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuestionError {
    #[error("question points must be positive")]
    ZeroPoints,

    #[error("choice question has no options")]
    MissingOptions,

    #[error("non-choice question carries options")]
    UnexpectedOptions,

    #[error("duplicate option id {0}")]
    DuplicateOption(OptionId),

    #[error("question requires exactly one correct option, found {found}")]
    SingleCorrectRequired { found: usize },

    #[error("multiple-choice question has no correct option")]
    NoCorrectOption,
}

//
// ─── QUESTION ──────────────────────────────────────────────────────────────────
//

/// A question inside an assessment definition.
///
/// Construction validates the shape so grading can rely on it: positive
/// points, options present exactly for choice kinds, unique option ids, and
/// exactly one correct option for single-choice/true-false.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    id: QuestionId,
    prompt: String,
    kind: QuestionKind,
    points: u32,
    options: Vec<AnswerOption>,
    explanation: Option<String>,
}

impl Question {
    /// Create a validated question.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError` if the shape is inconsistent with the kind.
    pub fn new(
        id: QuestionId,
        prompt: impl Into<String>,
        kind: QuestionKind,
        points: u32,
        options: Vec<AnswerOption>,
        explanation: Option<String>,
    ) -> Result<Self, QuestionError> {
        if points == 0 {
            return Err(QuestionError::ZeroPoints);
        }

        if kind.is_choice() {
            if options.is_empty() {
                return Err(QuestionError::MissingOptions);
            }
            let mut seen = BTreeSet::new();
            for option in &options {
                if !seen.insert(&option.id) {
                    return Err(QuestionError::DuplicateOption(option.id.clone()));
                }
            }
            let correct = options.iter().filter(|o| o.is_correct).count();
            match kind {
                QuestionKind::SingleChoice | QuestionKind::TrueFalse if correct != 1 => {
                    return Err(QuestionError::SingleCorrectRequired { found: correct });
                }
                QuestionKind::MultipleChoice if correct == 0 => {
                    return Err(QuestionError::NoCorrectOption);
                }
                _ => {}
            }
        } else if !options.is_empty() {
            return Err(QuestionError::UnexpectedOptions);
        }

        Ok(Self {
            id,
            prompt: prompt.into(),
            kind,
            points,
            options,
            explanation,
        })
    }

    #[must_use]
    pub fn id(&self) -> &QuestionId {
        &self.id
    }

    #[must_use]
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    #[must_use]
    pub fn kind(&self) -> QuestionKind {
        self.kind
    }

    #[must_use]
    pub fn points(&self) -> u32 {
        self.points
    }

    #[must_use]
    pub fn options(&self) -> &[AnswerOption] {
        &self.options
    }

    #[must_use]
    pub fn explanation(&self) -> Option<&str> {
        self.explanation.as_deref()
    }

    /// Returns true if the given option id belongs to this question.
    #[must_use]
    pub fn has_option(&self, id: &OptionId) -> bool {
        self.options.iter().any(|o| &o.id == id)
    }

    /// Ids of the options flagged correct.
    #[must_use]
    pub fn correct_option_ids(&self) -> BTreeSet<&OptionId> {
        self.options
            .iter()
            .filter(|o| o.is_correct)
            .map(|o| &o.id)
            .collect()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;

    fn single_choice(options: Vec<AnswerOption>) -> Result<Question, QuestionError> {
        Question::new(
            QuestionId::new("q1"),
            "Pick one",
            QuestionKind::SingleChoice,
            1,
            options,
            None,
        )
    }

    #[test]
    fn zero_points_rejected() {
        let err = Question::new(
            QuestionId::new("q1"),
            "Essay",
            QuestionKind::Essay,
            0,
            Vec::new(),
            None,
        )
        .unwrap_err();
        assert_eq!(err, QuestionError::ZeroPoints);
    }

    #[test]
    fn single_choice_requires_exactly_one_correct() {
        let err = single_choice(vec![
            AnswerOption::new("a", "A", true),
            AnswerOption::new("b", "B", true),
        ])
        .unwrap_err();
        assert_eq!(err, QuestionError::SingleCorrectRequired { found: 2 });

        let err = single_choice(vec![
            AnswerOption::new("a", "A", false),
            AnswerOption::new("b", "B", false),
        ])
        .unwrap_err();
        assert_eq!(err, QuestionError::SingleCorrectRequired { found: 0 });
    }

    #[test]
    fn choice_without_options_rejected() {
        let err = single_choice(Vec::new()).unwrap_err();
        assert_eq!(err, QuestionError::MissingOptions);
    }

    #[test]
    fn duplicate_option_ids_rejected() {
        let err = single_choice(vec![
            AnswerOption::new("a", "A", true),
            AnswerOption::new("a", "B", false),
        ])
        .unwrap_err();
        assert!(matches!(err, QuestionError::DuplicateOption(_)));
    }

    #[test]
    fn text_question_with_options_rejected() {
        let err = Question::new(
            QuestionId::new("q1"),
            "Explain",
            QuestionKind::ShortAnswer,
            2,
            vec![AnswerOption::new("a", "A", false)],
            None,
        )
        .unwrap_err();
        assert_eq!(err, QuestionError::UnexpectedOptions);
    }

    #[test]
    fn correct_option_ids_collects_flagged() {
        let q = Question::new(
            QuestionId::new("q1"),
            "Pick all",
            QuestionKind::MultipleChoice,
            3,
            vec![
                AnswerOption::new("o1", "One", true),
                AnswerOption::new("o2", "Two", false),
                AnswerOption::new("o3", "Three", true),
            ],
            None,
        )
        .unwrap();

        let ids: Vec<_> = q.correct_option_ids().iter().map(|o| o.as_str()).collect();
        assert_eq!(ids, vec!["o1", "o3"]);
        assert!(q.kind().is_auto_gradable());
    }
}
