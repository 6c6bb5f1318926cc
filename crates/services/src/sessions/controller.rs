use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use quiz_core::model::{
    LeaderboardEntry, PlayerName, QuizSession, ReviewItem, SECONDS_PER_QUESTION, SessionSnapshot,
    SubjectId, TickOutcome,
};
use rand::seq::SliceRandom;
use storage::repository::{
    LeaderboardRepository, PlayerRepository, QuestionBank, SnapshotStore, Storage, StorageError,
};
use tracing::{debug, info, warn};

use super::listeners::{ListenerRegistry, SessionEvent, Subscription};
use super::standings::LeaderboardStandings;
use crate::Clock;
use crate::error::{InvalidOperation, LoadError, QuizError};

/// Controller handle shared between the caller and the countdown task.
pub type SharedController = Arc<tokio::sync::Mutex<SessionController>>;

/// Shortest countdown period a controller accepts.
pub const MIN_TICK_PERIOD: Duration = Duration::from_millis(1);

/// Tunables for a controller instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerSettings {
    pub seconds_per_question: u32,
    pub shuffle_questions: bool,
    pub tick_period: Duration,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            seconds_per_question: SECONDS_PER_QUESTION,
            shuffle_questions: false,
            tick_period: Duration::from_secs(1),
        }
    }
}

/// How `enter_subject` obtained the active session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnterOutcome {
    /// An in-progress attempt was restored.
    Resumed,
    /// No usable snapshot existed; a fresh attempt was started.
    Started,
    /// The previous attempt was completed; it was cleared and a fresh one started.
    Restarted,
}

/// Result of `complete_quiz`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub score: u32,
    pub accuracy_percent: u32,
    /// `true` only for the call that performed the transition.
    pub newly_completed: bool,
    /// The leaderboard entry recorded by this call, if any.
    pub entry: Option<LeaderboardEntry>,
}

/// Owns the single active quiz session for one player.
///
/// Every mutating call applies the change in memory, writes a snapshot and
/// then notifies subscribers. Snapshot write failures are logged and do not
/// undo the in-memory change.
pub struct SessionController {
    clock: Clock,
    settings: ControllerSettings,
    questions: Arc<dyn QuestionBank>,
    snapshots: Arc<dyn SnapshotStore>,
    leaderboard: Arc<dyn LeaderboardRepository>,
    players: Arc<dyn PlayerRepository>,
    player: Option<PlayerName>,
    session: Option<QuizSession>,
    epoch: u64,
    listeners: ListenerRegistry,
}

impl SessionController {
    #[must_use]
    pub fn new(
        clock: Clock,
        questions: Arc<dyn QuestionBank>,
        snapshots: Arc<dyn SnapshotStore>,
        leaderboard: Arc<dyn LeaderboardRepository>,
        players: Arc<dyn PlayerRepository>,
    ) -> Self {
        Self {
            clock,
            settings: ControllerSettings::default(),
            questions,
            snapshots,
            leaderboard,
            players,
            player: None,
            session: None,
            epoch: 0,
            listeners: ListenerRegistry::new(),
        }
    }

    #[must_use]
    pub fn from_storage(clock: Clock, storage: &Storage) -> Self {
        Self::new(
            clock,
            Arc::clone(&storage.questions),
            Arc::clone(&storage.snapshots),
            Arc::clone(&storage.leaderboard),
            Arc::clone(&storage.players),
        )
    }

    /// Wrap for sharing with a [`super::QuizTimer`].
    #[must_use]
    pub fn into_shared(self) -> SharedController {
        Arc::new(tokio::sync::Mutex::new(self))
    }

    /// Replace the tunables. A tick period below [`MIN_TICK_PERIOD`] is raised to it.
    #[must_use]
    pub fn with_settings(mut self, settings: ControllerSettings) -> Self {
        self.settings = ControllerSettings {
            tick_period: settings.tick_period.max(MIN_TICK_PERIOD),
            ..settings
        };
        self
    }

    #[must_use]
    pub fn settings(&self) -> ControllerSettings {
        self.settings
    }

    #[must_use]
    pub fn player(&self) -> Option<&PlayerName> {
        self.player.as_ref()
    }

    #[must_use]
    pub fn session(&self) -> Option<&QuizSession> {
        self.session.as_ref()
    }

    /// Identifies the active session; changes whenever it is replaced or cleared.
    #[must_use]
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// True while the active session's countdown should run.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.session.as_ref().is_some_and(QuizSession::is_running)
    }

    //
    // ─── SUBSCRIPTIONS ─────────────────────────────────────────────────────────
    //

    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&SessionEvent) + Send + Sync + 'static,
    {
        self.listeners.subscribe(listener)
    }

    fn notify(&self, event: &SessionEvent) {
        self.listeners.notify(event);
    }

    //
    // ─── PLAYER IDENTITY ───────────────────────────────────────────────────────
    //

    /// Restore the remembered player, if any.
    ///
    /// A failed read is logged and treated as "no player".
    pub async fn load_player_name(&mut self) -> Option<&PlayerName> {
        match self.players.load_player().await {
            Ok(player) => self.player = player,
            Err(err) => {
                warn!(error = %err, "failed to load player name");
                self.player = None;
            }
        }
        self.player.as_ref()
    }

    /// Validate, remember and persist the player name.
    ///
    /// # Errors
    ///
    /// Returns `InvalidOperation::PlayerName` for a blank name.
    pub async fn save_player_name(&mut self, raw: &str) -> Result<PlayerName, QuizError> {
        let player = PlayerName::new(raw)?;
        if let Err(err) = self.players.save_player(&player).await {
            warn!(error = %err, player = %player, "failed to persist player name");
        }
        if self.player.as_ref() != Some(&player) {
            self.drop_session();
        }
        self.player = Some(player.clone());
        self.notify(&SessionEvent::PlayerChanged);
        Ok(player)
    }

    /// Sign out: erase every snapshot of the player and forget the player.
    ///
    /// Store failures are logged; the player is signed out regardless.
    ///
    /// # Errors
    ///
    /// Returns `InvalidOperation::NoPlayer` if nobody is signed in.
    pub async fn clear_all_data(&mut self) -> Result<(), QuizError> {
        let player = self.player.clone().ok_or(InvalidOperation::NoPlayer)?;
        match self.snapshots.delete_all_snapshots(&player).await {
            Ok(removed) => info!(player = %player, removed, "cleared player data"),
            Err(err) => warn!(player = %player, error = %err, "failed to remove saved quizzes"),
        }
        if let Err(err) = self.players.clear_player().await {
            warn!(error = %err, "failed to clear stored player name");
        }
        self.drop_session();
        self.player = None;
        self.notify(&SessionEvent::SignedOut);
        Ok(())
    }

    fn require_player(&self) -> Result<PlayerName, InvalidOperation> {
        self.player.clone().ok_or(InvalidOperation::NoPlayer)
    }

    fn drop_session(&mut self) {
        if self.session.take().is_some() {
            self.epoch += 1;
        }
    }

    fn install_session(&mut self, session: QuizSession) -> &QuizSession {
        self.epoch += 1;
        self.session.insert(session)
    }

    //
    // ─── LIFECYCLE ─────────────────────────────────────────────────────────────
    //

    /// Load the subject's questions and start a fresh attempt.
    ///
    /// The new session replaces any active one and is persisted immediately.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::Load` if the question bank cannot supply questions;
    /// the previous session, if any, is left untouched in that case.
    pub async fn start_quiz(&mut self, subject_id: &SubjectId) -> Result<&QuizSession, QuizError> {
        let player = self.require_player()?;
        let mut questions = self
            .questions
            .get_questions(subject_id)
            .await
            .map_err(|err| match err {
                StorageError::NotFound => LoadError::UnknownSubject(subject_id.clone()),
                other => LoadError::Unavailable(other),
            })?;
        if questions.is_empty() {
            return Err(LoadError::Empty(subject_id.clone()).into());
        }
        if self.settings.shuffle_questions {
            questions.shuffle(&mut rand::rng());
        }

        let session = QuizSession::start(
            subject_id.clone(),
            player,
            questions,
            self.settings.seconds_per_question,
        )?;
        info!(
            subject = %subject_id,
            questions = session.questions().len(),
            time_left = session.time_left_secs(),
            "quiz started"
        );
        self.install_session(session);
        self.persist().await;
        self.notify(&SessionEvent::Started(subject_id.clone()));
        self.active()
    }

    /// Restore the persisted attempt for this subject and the current player.
    ///
    /// Returns `Ok(None)` when there is nothing to resume. Unreadable or
    /// inconsistent snapshots are logged and also reported as `None`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidOperation::NoPlayer` if nobody is signed in.
    pub async fn load_state(
        &mut self,
        subject_id: &SubjectId,
    ) -> Result<Option<&QuizSession>, QuizError> {
        let player = self.require_player()?;
        let snapshot = match self.snapshots.get_snapshot(subject_id, &player).await {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => return Ok(None),
            Err(err) => {
                warn!(subject = %subject_id, error = %err, "discarding unreadable snapshot");
                return Ok(None);
            }
        };
        let session = match snapshot.into_session_for(subject_id, &player) {
            Ok(session) => session,
            Err(err) => {
                warn!(subject = %subject_id, error = %err, "discarding inconsistent snapshot");
                return Ok(None);
            }
        };

        debug!(
            subject = %subject_id,
            completed = session.is_complete(),
            time_left = session.time_left_secs(),
            "snapshot restored"
        );
        self.install_session(session);
        self.notify(&SessionEvent::Restored(subject_id.clone()));
        Ok(self.session.as_ref())
    }

    /// Overwrite the stored snapshot with the active session.
    ///
    /// # Errors
    ///
    /// Returns `InvalidOperation` if the active session is not for
    /// `subject_id`, or `QuizError::Persistence` if the write fails.
    pub async fn save_state(&self, subject_id: &SubjectId) -> Result<(), QuizError> {
        self.active_for(subject_id)?;
        self.save_current_state().await
    }

    /// Write the active session, if any.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::Persistence` if the write fails.
    pub async fn save_current_state(&self) -> Result<(), QuizError> {
        let Some(session) = self.session.as_ref() else {
            return Ok(());
        };
        self.snapshots
            .put_snapshot(&SessionSnapshot::capture(session), self.clock.now())
            .await?;
        Ok(())
    }

    /// Remove the stored snapshot for this subject. Also discards the active
    /// session when it belongs to the same subject.
    ///
    /// A failed delete is logged; the active session is discarded anyway.
    ///
    /// # Errors
    ///
    /// Returns `InvalidOperation::NoPlayer` if nobody is signed in.
    pub async fn clear_state(&mut self, subject_id: &SubjectId) -> Result<(), QuizError> {
        let player = self.require_player()?;
        if let Err(err) = self.snapshots.delete_snapshot(subject_id, &player).await {
            warn!(subject = %subject_id, error = %err, "failed to delete quiz state");
        }
        if self
            .session
            .as_ref()
            .is_some_and(|s| s.subject_id() == subject_id)
        {
            self.drop_session();
        }
        info!(subject = %subject_id, "quiz state cleared");
        self.notify(&SessionEvent::Cleared(subject_id.clone()));
        Ok(())
    }

    /// Open a subject: resume an in-progress attempt, or start fresh.
    ///
    /// A completed attempt is cleared before starting again. The fresh
    /// snapshot overwrites the completed one even if the delete failed.
    ///
    /// # Errors
    ///
    /// Returns `InvalidOperation::NoPlayer` if nobody is signed in, or
    /// `QuizError::Load` if a fresh start is needed and the question bank fails.
    pub async fn enter_subject(&mut self, subject_id: &SubjectId) -> Result<EnterOutcome, QuizError> {
        let restored = self
            .load_state(subject_id)
            .await?
            .map(|s| (s.is_complete(), s.is_started()));

        match restored {
            Some((true, _)) => {
                self.clear_state(subject_id).await?;
                self.start_quiz(subject_id).await?;
                Ok(EnterOutcome::Restarted)
            }
            Some((false, true)) => Ok(EnterOutcome::Resumed),
            _ => {
                self.start_quiz(subject_id).await?;
                Ok(EnterOutcome::Started)
            }
        }
    }

    //
    // ─── ANSWERING / NAVIGATION ────────────────────────────────────────────────
    //

    /// Record an answer for the current question.
    ///
    /// # Errors
    ///
    /// Returns `InvalidOperation` for a completed session, an out-of-range
    /// option, or when no session is active. State is unchanged on error.
    pub async fn select_answer(&mut self, option: usize) -> Result<(), QuizError> {
        let session = self.active_mut()?;
        session.select_answer(option)?;
        let question = session.current_index();
        self.persist().await;
        self.notify(&SessionEvent::AnswerSelected { question, option });
        Ok(())
    }

    /// Move to the next question; `false` on the last question (call
    /// `complete_quiz` instead).
    ///
    /// # Errors
    ///
    /// Returns `InvalidOperation` for a completed session or when no session is active.
    pub async fn next_question(&mut self) -> Result<bool, QuizError> {
        let session = self.active_mut()?;
        if !session.next_question()? {
            return Ok(false);
        }
        let question = session.current_index();
        self.persist().await;
        self.notify(&SessionEvent::Navigated { question });
        Ok(true)
    }

    /// Move to the previous question; `false` at the first question.
    ///
    /// # Errors
    ///
    /// Returns `InvalidOperation` for a completed session or when no session is active.
    pub async fn previous_question(&mut self) -> Result<bool, QuizError> {
        let session = self.active_mut()?;
        if !session.previous_question()? {
            return Ok(false);
        }
        let question = session.current_index();
        self.persist().await;
        self.notify(&SessionEvent::Navigated { question });
        Ok(true)
    }

    /// Advance the countdown by one second, completing the quiz when it runs out.
    ///
    /// # Errors
    ///
    /// Returns `InvalidOperation` if no session is running.
    pub async fn tick(&mut self) -> Result<TickOutcome, QuizError> {
        let outcome = self.active_mut()?.tick()?;
        self.persist().await;
        self.notify(&SessionEvent::Ticked(outcome));
        if outcome == TickOutcome::Expired {
            info!("time is up");
            self.complete_quiz().await?;
        }
        Ok(outcome)
    }

    /// Freeze the session and submit its score.
    ///
    /// Calling this again on a completed session reports the same score and
    /// submits nothing.
    ///
    /// # Errors
    ///
    /// Returns `InvalidOperation::NoActiveSession` if there is no session.
    pub async fn complete_quiz(&mut self) -> Result<Completion, QuizError> {
        let session = self.active_mut()?;
        let newly_completed = session.complete();
        let score = session.score();
        let accuracy_percent = session.accuracy_percent();
        if !newly_completed {
            return Ok(Completion {
                score,
                accuracy_percent,
                newly_completed,
                entry: None,
            });
        }

        let subject_id = session.subject_id().clone();
        let player = session.player().clone();
        self.persist().await;

        let entry = match self
            .leaderboard
            .submit_score(&subject_id, &player, score, self.clock.now())
            .await
        {
            Ok(entry) => Some(entry),
            Err(err) => {
                warn!(subject = %subject_id, error = %err, "failed to submit score");
                None
            }
        };
        info!(subject = %subject_id, player = %player, score, "quiz completed");
        self.notify(&SessionEvent::Completed { score });

        Ok(Completion {
            score,
            accuracy_percent,
            newly_completed,
            entry,
        })
    }

    //
    // ─── RESULTS ───────────────────────────────────────────────────────────────
    //

    /// Number of correct answers in the active session.
    ///
    /// # Errors
    ///
    /// Returns `InvalidOperation::NoActiveSession` if there is no session.
    pub fn calculate_score(&self) -> Result<u32, QuizError> {
        Ok(self.active()?.score())
    }

    /// Per-question review of a completed attempt.
    ///
    /// # Errors
    ///
    /// Returns `InvalidOperation::NotCompleted` while the quiz is still running.
    pub fn review(&self) -> Result<Vec<ReviewItem>, QuizError> {
        let session = self.active()?;
        if !session.is_complete() {
            return Err(InvalidOperation::NotCompleted.into());
        }
        Ok(session.review())
    }

    /// Ranked leaderboard for the active session's subject.
    ///
    /// # Errors
    ///
    /// Returns `InvalidOperation::NoActiveSession` without a session, or
    /// `QuizError::Persistence` if the leaderboard cannot be read.
    pub async fn get_leaderboard(&self) -> Result<Vec<LeaderboardEntry>, QuizError> {
        let subject_id = self.active()?.subject_id();
        self.leaderboard_for(subject_id).await
    }

    /// Ranked leaderboard for any subject.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::Persistence` if the leaderboard cannot be read.
    pub async fn leaderboard_for(
        &self,
        subject_id: &SubjectId,
    ) -> Result<Vec<LeaderboardEntry>, QuizError> {
        Ok(self.leaderboard.list_entries(subject_id).await?)
    }

    /// Leaderboard plus the current player's rank and accuracy.
    ///
    /// # Errors
    ///
    /// Same as [`SessionController::get_leaderboard`].
    pub async fn standings(&self) -> Result<LeaderboardStandings, QuizError> {
        let entries = self.get_leaderboard().await?;
        let session = self.active()?;
        Ok(LeaderboardStandings::build(
            entries,
            session.player(),
            session.score(),
            session.questions().len(),
        ))
    }

    //
    // ─── INTERNALS ─────────────────────────────────────────────────────────────
    //

    fn active(&self) -> Result<&QuizSession, QuizError> {
        self.session
            .as_ref()
            .ok_or_else(|| InvalidOperation::NoActiveSession.into())
    }

    fn active_mut(&mut self) -> Result<&mut QuizSession, QuizError> {
        self.session
            .as_mut()
            .ok_or_else(|| InvalidOperation::NoActiveSession.into())
    }

    fn active_for(&self, subject_id: &SubjectId) -> Result<&QuizSession, QuizError> {
        let session = self.active()?;
        if session.subject_id() != subject_id {
            return Err(InvalidOperation::SubjectMismatch {
                active: session.subject_id().clone(),
                requested: subject_id.clone(),
            }
            .into());
        }
        Ok(session)
    }

    /// Write the active session; failures are logged only.
    pub(crate) async fn persist(&self) {
        let Some(session) = self.session.as_ref() else {
            return;
        };
        let snapshot = SessionSnapshot::capture(session);
        if let Err(err) = self.snapshots.put_snapshot(&snapshot, self.clock.now()).await {
            warn!(
                subject = %session.subject_id(),
                error = %err,
                "failed to save quiz state"
            );
        }
    }
}

impl fmt::Debug for SessionController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionController")
            .field("player", &self.player)
            .field("subject", &self.session.as_ref().map(QuizSession::subject_id))
            .field("epoch", &self.epoch)
            .field("settings", &self.settings)
            .field("listeners", &self.listeners.len())
            .finish_non_exhaustive()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
