mod answer;
mod assessment;
mod ids;
mod progress;
mod question;
mod session;

pub use answer::AnswerPayload;
pub use assessment::{AssessmentDefinition, AssessmentError};
pub use ids::{AssessmentId, OptionId, QuestionId, SessionId, UserId};
pub use progress::{DERIVED_SCROLL_CAP, ReadingProgress, scroll_percentage};
pub use question::{AnswerOption, Question, QuestionError, QuestionKind};
pub use session::{AnswerWrite, Session, SessionError, SessionState};
