use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::model::ids::OptionId;

/// A candidate's recorded response to a single question.
///
/// Choice questions carry a set of selected option ids, text questions carry
/// the raw text. This is the payload persisted inside a session snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerPayload {
    Selection(BTreeSet<OptionId>),
    Text(String),
}

impl AnswerPayload {
    /// Build a selection payload from option ids.
    #[must_use]
    pub fn selection<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Selection(ids.into_iter().map(OptionId::new).collect())
    }

    /// Build a free-text payload.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    /// True iff a non-empty selection or non-empty trimmed text exists.
    #[must_use]
    pub fn is_answered(&self) -> bool {
        match self {
            AnswerPayload::Selection(ids) => !ids.is_empty(),
            AnswerPayload::Text(text) => !text.trim().is_empty(),
        }
    }
}
