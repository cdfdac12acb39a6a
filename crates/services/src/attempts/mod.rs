//! Attempt lifecycle: the in-memory [`Attempt`] aggregate and the
//! [`AttemptService`] orchestrating it against storage.

mod attempt;
mod workflow;

pub use attempt::Attempt;
pub use workflow::{AttemptService, HeartbeatOutcome};
