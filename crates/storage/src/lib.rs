#![forbid(unsafe_code)]

pub mod repository;

pub use repository::{
    AssessmentSource, InMemoryAssessmentSource, InMemorySessionStore, SessionRecord, SessionStore,
    Storage, StorageError,
};
