use async_trait::async_trait;
use chrono::{DateTime, Utc};
use quiz_core::model::{
    LeaderboardEntry, PlayerName, Question, SessionSnapshot, Subject, SubjectId, rank_entries,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

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

/// Read side of the question bank: the subject catalog and per-subject questions.
#[async_trait]
pub trait QuestionBank: Send + Sync {
    /// List subjects in catalog order.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the catalog cannot be read.
    async fn list_subjects(&self) -> Result<Vec<Subject>, StorageError>;

    /// Ordered questions for a subject.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` for an unknown subject, or other storage errors.
    async fn get_questions(&self, subject_id: &SubjectId) -> Result<Vec<Question>, StorageError>;
}

/// Durable session snapshots keyed by (subject, player).
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Fetch the snapshot for a subject/player pair.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Serialization` if the stored record cannot be
    /// decoded, or other storage errors.
    async fn get_snapshot(
        &self,
        subject_id: &SubjectId,
        player: &PlayerName,
    ) -> Result<Option<SessionSnapshot>, StorageError>;

    /// Insert or overwrite the snapshot for its subject/player pair.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the snapshot cannot be stored.
    async fn put_snapshot(
        &self,
        snapshot: &SessionSnapshot,
        saved_at: DateTime<Utc>,
    ) -> Result<(), StorageError>;

    /// Remove one snapshot. Removing a missing snapshot is not an error.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the delete fails.
    async fn delete_snapshot(
        &self,
        subject_id: &SubjectId,
        player: &PlayerName,
    ) -> Result<(), StorageError>;

    /// Remove every snapshot for a player, returning how many were removed.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the delete fails.
    async fn delete_all_snapshots(&self, player: &PlayerName) -> Result<u64, StorageError>;
}

/// Score submissions per subject.
#[async_trait]
pub trait LeaderboardRepository: Send + Sync {
    /// Append a score and return the stored entry with its sequence number.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the entry cannot be stored.
    async fn submit_score(
        &self,
        subject_id: &SubjectId,
        player: &PlayerName,
        score: u32,
        submitted_at: DateTime<Utc>,
    ) -> Result<LeaderboardEntry, StorageError>;

    /// Entries for a subject, score descending then submission order.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the entries cannot be read.
    async fn list_entries(
        &self,
        subject_id: &SubjectId,
    ) -> Result<Vec<LeaderboardEntry>, StorageError>;
}

/// The remembered player identity for this installation.
#[async_trait]
pub trait PlayerRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` if the record cannot be read or decoded.
    async fn load_player(&self) -> Result<Option<PlayerName>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` if the record cannot be stored.
    async fn save_player(&self, player: &PlayerName) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` if the record cannot be removed.
    async fn clear_player(&self) -> Result<(), StorageError>;
}

type SnapshotKey = (SubjectId, PlayerName);

#[derive(Default)]
struct QuestionBankState {
    subjects: Vec<Subject>,
    questions: HashMap<SubjectId, Vec<Question>>,
}

#[derive(Default)]
struct LeaderboardState {
    next_sequence: u64,
    entries: HashMap<SubjectId, Vec<LeaderboardEntry>>,
}

/// Simple in-memory repository implementation for testing and prototyping.
///
/// Snapshots are kept as encoded JSON so decoding failures behave the same
/// way they do against a real database.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    bank: Arc<Mutex<QuestionBankState>>,
    snapshots: Arc<Mutex<HashMap<SnapshotKey, String>>>,
    leaderboard: Arc<Mutex<LeaderboardState>>,
    player: Arc<Mutex<Option<PlayerName>>>,
}

fn poisoned<E: std::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a catalog subject, keeping its catalog position.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Connection` if the lock is poisoned.
    pub fn upsert_subject(&self, subject: Subject) -> Result<(), StorageError> {
        let mut guard = self.bank.lock().map_err(poisoned)?;
        match guard.subjects.iter_mut().find(|s| s.id == subject.id) {
            Some(existing) => *existing = subject,
            None => guard.subjects.push(subject),
        }
        Ok(())
    }

    /// Replace the question set for a subject.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Connection` if the lock is poisoned.
    pub fn replace_questions(
        &self,
        subject_id: &SubjectId,
        questions: Vec<Question>,
    ) -> Result<(), StorageError> {
        let mut guard = self.bank.lock().map_err(poisoned)?;
        guard.questions.insert(subject_id.clone(), questions);
        Ok(())
    }

    /// Store an arbitrary payload under a snapshot key, bypassing encoding.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Connection` if the lock is poisoned.
    pub fn put_raw_snapshot(
        &self,
        subject_id: &SubjectId,
        player: &PlayerName,
        raw: impl Into<String>,
    ) -> Result<(), StorageError> {
        let mut guard = self.snapshots.lock().map_err(poisoned)?;
        guard.insert((subject_id.clone(), player.clone()), raw.into());
        Ok(())
    }
}

#[async_trait]
impl QuestionBank for InMemoryRepository {
    async fn list_subjects(&self) -> Result<Vec<Subject>, StorageError> {
        let guard = self.bank.lock().map_err(poisoned)?;
        Ok(guard.subjects.clone())
    }

    async fn get_questions(&self, subject_id: &SubjectId) -> Result<Vec<Question>, StorageError> {
        let guard = self.bank.lock().map_err(poisoned)?;
        guard
            .questions
            .get(subject_id)
            .cloned()
            .ok_or(StorageError::NotFound)
    }
}

#[async_trait]
impl SnapshotStore for InMemoryRepository {
    async fn get_snapshot(
        &self,
        subject_id: &SubjectId,
        player: &PlayerName,
    ) -> Result<Option<SessionSnapshot>, StorageError> {
        let guard = self.snapshots.lock().map_err(poisoned)?;
        guard
            .get(&(subject_id.clone(), player.clone()))
            .map(|raw| {
                SessionSnapshot::from_json(raw)
                    .map_err(|e| StorageError::Serialization(e.to_string()))
            })
            .transpose()
    }

    async fn put_snapshot(
        &self,
        snapshot: &SessionSnapshot,
        _saved_at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let raw = snapshot
            .to_json()
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        let mut guard = self.snapshots.lock().map_err(poisoned)?;
        guard.insert(
            (snapshot.subject_id.clone(), snapshot.player_name.clone()),
            raw,
        );
        Ok(())
    }

    async fn delete_snapshot(
        &self,
        subject_id: &SubjectId,
        player: &PlayerName,
    ) -> Result<(), StorageError> {
        let mut guard = self.snapshots.lock().map_err(poisoned)?;
        guard.remove(&(subject_id.clone(), player.clone()));
        Ok(())
    }

    async fn delete_all_snapshots(&self, player: &PlayerName) -> Result<u64, StorageError> {
        let mut guard = self.snapshots.lock().map_err(poisoned)?;
        let before = guard.len();
        guard.retain(|(_, p), _| p != player);
        Ok(u64::try_from(before - guard.len()).unwrap_or(u64::MAX))
    }
}

#[async_trait]
impl LeaderboardRepository for InMemoryRepository {
    async fn submit_score(
        &self,
        subject_id: &SubjectId,
        player: &PlayerName,
        score: u32,
        submitted_at: DateTime<Utc>,
    ) -> Result<LeaderboardEntry, StorageError> {
        let mut guard = self.leaderboard.lock().map_err(poisoned)?;
        guard.next_sequence += 1;
        let entry = LeaderboardEntry {
            player: player.clone(),
            score,
            submitted_at,
            sequence: guard.next_sequence,
        };
        guard
            .entries
            .entry(subject_id.clone())
            .or_default()
            .push(entry.clone());
        Ok(entry)
    }

    async fn list_entries(
        &self,
        subject_id: &SubjectId,
    ) -> Result<Vec<LeaderboardEntry>, StorageError> {
        let guard = self.leaderboard.lock().map_err(poisoned)?;
        let mut entries = guard.entries.get(subject_id).cloned().unwrap_or_default();
        rank_entries(&mut entries);
        Ok(entries)
    }
}

#[async_trait]
impl PlayerRepository for InMemoryRepository {
    async fn load_player(&self) -> Result<Option<PlayerName>, StorageError> {
        let guard = self.player.lock().map_err(poisoned)?;
        Ok(guard.clone())
    }

    async fn save_player(&self, player: &PlayerName) -> Result<(), StorageError> {
        let mut guard = self.player.lock().map_err(poisoned)?;
        *guard = Some(player.clone());
        Ok(())
    }

    async fn clear_player(&self) -> Result<(), StorageError> {
        let mut guard = self.player.lock().map_err(poisoned)?;
        *guard = None;
        Ok(())
    }
}

/// Aggregates repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub questions: Arc<dyn QuestionBank>,
    pub snapshots: Arc<dyn SnapshotStore>,
    pub leaderboard: Arc<dyn LeaderboardRepository>,
    pub players: Arc<dyn PlayerRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        Self::from_in_memory(InMemoryRepository::new())
    }

    #[must_use]
    pub fn from_in_memory(repo: InMemoryRepository) -> Self {
        let questions: Arc<dyn QuestionBank> = Arc::new(repo.clone());
        let snapshots: Arc<dyn SnapshotStore> = Arc::new(repo.clone());
        let leaderboard: Arc<dyn LeaderboardRepository> = Arc::new(repo.clone());
        let players: Arc<dyn PlayerRepository> = Arc::new(repo);
        Self {
            questions,
            snapshots,
            leaderboard,
            players,
        }
    }
}
