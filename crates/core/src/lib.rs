#![forbid(unsafe_code)]

pub mod grading;
pub mod model;
pub mod time;
pub mod timekeeping;

pub use time::Clock;

pub use grading::{GradeOutcome, GradingError, QuestionScore, ScoreReport, Verdict};
pub use model::{
    AnswerOption, AnswerPayload, AnswerWrite, AssessmentDefinition, AssessmentError, AssessmentId,
    OptionId, Question, QuestionError, QuestionId, QuestionKind, ReadingProgress, Session,
    SessionError, SessionId, SessionState, UserId,
};
pub use timekeeping::{Settlement, TimeAccounting};
