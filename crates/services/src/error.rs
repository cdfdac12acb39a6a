//! Shared error types for the services crate.

use thiserror::Error;

use assess_core::grading::GradingError;
use assess_core::model::SessionError;
use storage::StorageError;

/// Errors emitted by the attempt lifecycle manager.
///
/// Integrity faults (`Grading`) surface to the caller so corrupted state is
/// visible; autosave failures never appear here (they are logged and retried
/// on the next trigger).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AttemptError {
    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Grading(#[from] GradingError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}
