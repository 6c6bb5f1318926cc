use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::{PlayerName, SubjectId};
use crate::model::question::Question;
use crate::model::session::QuizSession;

/// Version written into every snapshot. Bump on incompatible layout changes.
pub const SNAPSHOT_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SnapshotError {
    #[error("unsupported snapshot schema version {found} (expected {expected})")]
    SchemaVersion { found: u32, expected: u32 },

    #[error("snapshot has no questions")]
    NoQuestions,

    #[error("answers length {answers} does not match {questions} questions")]
    AnswerCountMismatch { answers: usize, questions: usize },

    #[error("current question {index} is out of range for {questions} questions")]
    IndexOutOfRange { index: usize, questions: usize },

    #[error("answer {option} for question {question} is out of range")]
    AnswerOutOfRange { question: usize, option: usize },

    #[error("time left {time_left} exceeds budget {budget}")]
    TimeExceedsBudget { time_left: u32, budget: u32 },

    #[error("snapshot belongs to {found_subject}/{found_player}")]
    KeyMismatch {
        found_subject: SubjectId,
        found_player: PlayerName,
    },

    #[error("malformed snapshot: {0}")]
    Malformed(String),
}

/// Serialized form of a `QuizSession`.
///
/// Carries the question set actually served so a resumed attempt never
/// re-fetches a different set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub schema_version: u32,
    pub subject_id: SubjectId,
    pub player_name: PlayerName,
    pub questions: Vec<Question>,
    pub current_question_index: usize,
    pub answers: Vec<Option<usize>>,
    pub time_left_seconds: u32,
    pub time_budget_seconds: u32,
    pub quiz_started: bool,
    pub quiz_completed: bool,
}

impl SessionSnapshot {
    #[must_use]
    pub fn capture(session: &QuizSession) -> Self {
        Self {
            schema_version: SNAPSHOT_SCHEMA_VERSION,
            subject_id: session.subject_id().clone(),
            player_name: session.player().clone(),
            questions: session.questions().to_vec(),
            current_question_index: session.current_index(),
            answers: session.answers().to_vec(),
            time_left_seconds: session.time_left_secs(),
            time_budget_seconds: session.time_budget_secs(),
            quiz_started: session.is_started(),
            quiz_completed: session.is_complete(),
        }
    }

    /// Encode as JSON text for storage.
    ///
    /// # Errors
    ///
    /// Returns `SnapshotError::Malformed` if serialization fails.
    pub fn to_json(&self) -> Result<String, SnapshotError> {
        serde_json::to_string(self).map_err(|e| SnapshotError::Malformed(e.to_string()))
    }

    /// Decode JSON text produced by [`SessionSnapshot::to_json`].
    ///
    /// # Errors
    ///
    /// Returns `SnapshotError::Malformed` for unparsable input and
    /// `SnapshotError::SchemaVersion` for a foreign schema version.
    pub fn from_json(raw: &str) -> Result<Self, SnapshotError> {
        let snapshot: Self =
            serde_json::from_str(raw).map_err(|e| SnapshotError::Malformed(e.to_string()))?;
        if snapshot.schema_version != SNAPSHOT_SCHEMA_VERSION {
            return Err(SnapshotError::SchemaVersion {
                found: snapshot.schema_version,
                expected: SNAPSHOT_SCHEMA_VERSION,
            });
        }
        Ok(snapshot)
    }

    /// Rebuild the session, checking every session invariant.
    ///
    /// # Errors
    ///
    /// Returns a `SnapshotError` describing the first violated invariant.
    pub fn into_session(self) -> Result<QuizSession, SnapshotError> {
        if self.schema_version != SNAPSHOT_SCHEMA_VERSION {
            return Err(SnapshotError::SchemaVersion {
                found: self.schema_version,
                expected: SNAPSHOT_SCHEMA_VERSION,
            });
        }
        let questions = self.questions.len();
        if questions == 0 {
            return Err(SnapshotError::NoQuestions);
        }
        if self.answers.len() != questions {
            return Err(SnapshotError::AnswerCountMismatch {
                answers: self.answers.len(),
                questions,
            });
        }
        if self.current_question_index >= questions {
            return Err(SnapshotError::IndexOutOfRange {
                index: self.current_question_index,
                questions,
            });
        }
        for (i, (q, a)) in self.questions.iter().zip(&self.answers).enumerate() {
            match *a {
                Some(option) if option >= q.option_count() => {
                    return Err(SnapshotError::AnswerOutOfRange {
                        question: i,
                        option,
                    });
                }
                _ => {}
            }
        }
        if self.time_left_seconds > self.time_budget_seconds {
            return Err(SnapshotError::TimeExceedsBudget {
                time_left: self.time_left_seconds,
                budget: self.time_budget_seconds,
            });
        }

        Ok(QuizSession::from_parts(
            self.subject_id,
            self.player_name,
            self.questions,
            self.current_question_index,
            self.answers,
            self.time_left_seconds,
            self.time_budget_seconds,
            self.quiz_started,
            self.quiz_completed,
        ))
    }

    /// Like [`SessionSnapshot::into_session`] but also checks the storage key.
    ///
    /// # Errors
    ///
    /// Returns `SnapshotError::KeyMismatch` when the snapshot was stored under
    /// a different subject/player, or any invariant error.
    pub fn into_session_for(
        self,
        subject_id: &SubjectId,
        player: &PlayerName,
    ) -> Result<QuizSession, SnapshotError> {
        if &self.subject_id != subject_id || &self.player_name != player {
            return Err(SnapshotError::KeyMismatch {
                found_subject: self.subject_id,
                found_player: self.player_name,
            });
        }
        self.into_session()
    }
}
