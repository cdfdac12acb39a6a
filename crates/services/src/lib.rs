#![forbid(unsafe_code)]

pub mod attempts;
pub mod autosave;
pub mod error;
pub mod reading;

pub use assess_core::Clock;

pub use attempts::{Attempt, AttemptService, HeartbeatOutcome};
pub use autosave::{AutosaveScheduler, FlushOutcome, FlushTrigger};
pub use error::AttemptError;
pub use reading::ReadingTracker;
