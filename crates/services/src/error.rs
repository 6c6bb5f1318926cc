//! Shared error types for the services crate.
//!
//! Every controller failure falls into one of three categories: the question
//! bank could not supply a quiz (`Load`), a store read or write failed
//! (`Persistence`), or the caller asked for something the current state does
//! not allow (`InvalidOperation`). None of them is fatal.

use thiserror::Error;

use quiz_core::model::{PlayerNameError, SessionError, SubjectId};
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// The question bank or subject catalog could not be read. Retryable.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LoadError {
    #[error("unknown subject: {0}")]
    UnknownSubject(SubjectId),
    #[error("subject {0} has no questions")]
    Empty(SubjectId),
    #[error("question bank unavailable: {0}")]
    Unavailable(#[source] StorageError),
}

/// A request the controller rejects without changing state.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum InvalidOperation {
    #[error("no player is signed in")]
    NoPlayer,
    #[error("no quiz is active")]
    NoActiveSession,
    #[error("active quiz is for {active}, not {requested}")]
    SubjectMismatch {
        active: SubjectId,
        requested: SubjectId,
    },
    #[error("quiz is not completed yet")]
    NotCompleted,
    #[error(transparent)]
    PlayerName(#[from] PlayerNameError),
    #[error(transparent)]
    Session(#[from] SessionError),
}

/// Errors emitted by the session controller.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum QuizError {
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error(transparent)]
    Persistence(#[from] StorageError),
    #[error(transparent)]
    InvalidOperation(#[from] InvalidOperation),
}

impl From<SessionError> for QuizError {
    fn from(err: SessionError) -> Self {
        Self::InvalidOperation(InvalidOperation::Session(err))
    }
}

impl From<PlayerNameError> for QuizError {
    fn from(err: PlayerNameError) -> Self {
        Self::InvalidOperation(InvalidOperation::PlayerName(err))
    }
}

impl QuizError {
    /// True when retrying the same call may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Load(_) | Self::Persistence(_))
    }
}

/// Errors emitted by `RemoteQuestionBank`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RemoteBankError {
    #[error("question bank request failed with status {0}")]
    HttpStatus(reqwest::StatusCode),
    #[error("question bank rejected the request: {0}")]
    Rejected(String),
    #[error("question bank returned no data")]
    EmptyResponse,
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

impl From<RemoteBankError> for StorageError {
    fn from(err: RemoteBankError) -> Self {
        match err {
            RemoteBankError::HttpStatus(status) if status == reqwest::StatusCode::NOT_FOUND => {
                StorageError::NotFound
            }
            RemoteBankError::EmptyResponse | RemoteBankError::Rejected(_) => {
                StorageError::Serialization(err.to_string())
            }
            other => StorageError::Connection(other.to_string()),
        }
    }
}

/// Errors emitted while bootstrapping quiz services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum QuizServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}
