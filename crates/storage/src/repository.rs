use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use thiserror::Error;

use assess_core::model::{
    AnswerPayload, AssessmentDefinition, AssessmentId, QuestionId, Session, SessionError,
    SessionId, SessionState, UserId,
};

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Persisted shape for a session snapshot.
///
/// This mirrors the domain `Session` so stores can serialize/deserialize
/// without leaking storage concerns into the domain layer. The allowed
/// duration is carried so rehydration is self-contained.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: SessionId,
    pub user_id: UserId,
    pub assessment_id: AssessmentId,
    pub state: SessionState,
    pub allowed_duration_seconds: u64,
    pub elapsed_seconds: u64,
    pub answers: BTreeMap<QuestionId, AnswerPayload>,
    pub started_at: Option<DateTime<Utc>>,
    pub submitted_at: Option<DateTime<Utc>>,
}

impl SessionRecord {
    #[must_use]
    pub fn from_session(session: &Session) -> Self {
        Self {
            id: session.id(),
            user_id: session.user_id(),
            assessment_id: session.assessment_id(),
            state: session.state(),
            allowed_duration_seconds: session.allowed_duration_seconds(),
            elapsed_seconds: session.elapsed_seconds(),
            answers: session.answers().clone(),
            started_at: session.started_at(),
            submitted_at: session.submitted_at(),
        }
    }

    /// True while the record has not reached a terminal state.
    #[must_use]
    pub fn is_open(&self) -> bool {
        !self.state.is_terminal()
    }

    /// Convert the record back into a domain `Session`.
    ///
    /// # Errors
    ///
    /// Returns `SessionError` if the record violates session invariants.
    pub fn into_session(self) -> Result<Session, SessionError> {
        Session::from_persisted(
            self.id,
            self.user_id,
            self.assessment_id,
            self.state,
            self.allowed_duration_seconds,
            self.elapsed_seconds,
            self.answers,
            self.started_at,
            self.submitted_at,
        )
    }
}

/// Persistence contract for session snapshots.
///
/// At most one open (non-terminal) record exists per (user, assessment)
/// pair; the attempt lifecycle manager is the sole writer enforcing that
/// invariant, and `upsert` backs it with last-write-wins replacement.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Fetch the latest open record for the pair, if any.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failure; a missing record is
    /// `Ok(None)`.
    async fn find_open(
        &self,
        user_id: UserId,
        assessment_id: AssessmentId,
    ) -> Result<Option<SessionRecord>, StorageError>;

    /// Fetch a record by session id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if missing, or other storage errors.
    async fn load(&self, id: SessionId) -> Result<SessionRecord, StorageError>;

    /// Persist a snapshot. Open records replace any other open record for
    /// the same (user, assessment) pair; terminal records upsert by id.
    /// Persisting the same snapshot twice is harmless.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the snapshot cannot be stored.
    async fn upsert(&self, record: &SessionRecord) -> Result<(), StorageError>;
}

/// Read-only access to assessment definitions, owned by the
/// content-management subsystem.
#[async_trait]
pub trait AssessmentSource: Send + Sync {
    /// Fetch a definition by id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if missing, or other storage errors.
    async fn fetch_definition(
        &self,
        id: AssessmentId,
    ) -> Result<AssessmentDefinition, StorageError>;
}

/// Simple in-memory session store for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemorySessionStore {
    records: Arc<Mutex<HashMap<SessionId, SessionRecord>>>,
}

impl InMemorySessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn find_open(
        &self,
        user_id: UserId,
        assessment_id: AssessmentId,
    ) -> Result<Option<SessionRecord>, StorageError> {
        let guard = self
            .records
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let latest = guard
            .values()
            .filter(|r| r.user_id == user_id && r.assessment_id == assessment_id && r.is_open())
            .max_by_key(|r| r.started_at)
            .cloned();
        Ok(latest)
    }

    async fn load(&self, id: SessionId) -> Result<SessionRecord, StorageError> {
        let guard = self
            .records
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.get(&id).cloned().ok_or(StorageError::NotFound)
    }

    async fn upsert(&self, record: &SessionRecord) -> Result<(), StorageError> {
        let mut guard = self
            .records
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        if record.is_open() {
            // last-write-wins per (user, assessment) pair for open records
            guard.retain(|id, existing| {
                *id == record.id
                    || !(existing.is_open()
                        && existing.user_id == record.user_id
                        && existing.assessment_id == record.assessment_id)
            });
        }
        guard.insert(record.id, record.clone());
        Ok(())
    }
}

/// Simple in-memory definition source for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryAssessmentSource {
    definitions: Arc<Mutex<HashMap<AssessmentId, AssessmentDefinition>>>,
}

impl InMemoryAssessmentSource {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a definition.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Connection` if the map lock is poisoned.
    pub fn insert(&self, definition: AssessmentDefinition) -> Result<(), StorageError> {
        let mut guard = self
            .definitions
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.insert(definition.id(), definition);
        Ok(())
    }
}

#[async_trait]
impl AssessmentSource for InMemoryAssessmentSource {
    async fn fetch_definition(
        &self,
        id: AssessmentId,
    ) -> Result<AssessmentDefinition, StorageError> {
        let guard = self
            .definitions
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.get(&id).cloned().ok_or(StorageError::NotFound)
    }
}

/// Aggregates session and assessment stores behind trait objects for easy
/// backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub sessions: Arc<dyn SessionStore>,
    pub assessments: Arc<dyn AssessmentSource>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            sessions: Arc::new(InMemorySessionStore::new()),
            assessments: Arc::new(InMemoryAssessmentSource::new()),
        }
    }
}
