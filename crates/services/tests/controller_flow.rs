use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use quiz_core::model::{
    LeaderboardEntry, PlayerName, Question, SessionSnapshot, Subject, SubjectId, TickOutcome,
};
use quiz_core::time::fixed_now;
use services::{
    Clock, ControllerSettings, EnterOutcome, QuizServices, QuizTimer, SessionEvent,
    SharedController,
};
use storage::repository::{
    InMemoryRepository, LeaderboardRepository, SnapshotStore, Storage, StorageError,
};

fn seed(repo: &InMemoryRepository, id: &str, name: &str, key: &[usize]) {
    let subject_id = SubjectId::new(id);
    repo.upsert_subject(Subject {
        id: subject_id.clone(),
        name: name.to_string(),
        time_in_minutes: u32::try_from(key.len()).unwrap(),
        question_count: u32::try_from(key.len()).unwrap(),
    })
    .unwrap();
    let questions = key
        .iter()
        .enumerate()
        .map(|(i, &correct)| {
            Question::new(
                format!("{name} #{i}"),
                vec!["A".into(), "B".into(), "C".into(), "D".into()],
                correct,
                Some(format!("answer is {correct}")),
            )
        })
        .collect();
    repo.replace_questions(&subject_id, questions).unwrap();
}

fn services(repo: &InMemoryRepository) -> QuizServices {
    QuizServices::from_storage(
        Storage::from_in_memory(repo.clone()),
        Clock::fixed(fixed_now()),
        ControllerSettings::default(),
    )
}

async fn signed_in(repo: &InMemoryRepository) -> SharedController {
    let controller = services(repo).controller();
    controller.lock().await.save_player_name("Ada").await.unwrap();
    controller
}

fn ada() -> PlayerName {
    PlayerName::new("Ada").unwrap()
}

/// Snapshot and leaderboard store that fails on demand, backed by an in-memory repo.
#[derive(Clone)]
struct FlakyStore {
    inner: InMemoryRepository,
    fail_reads: Arc<AtomicBool>,
    fail_puts: Arc<AtomicBool>,
    fail_deletes: Arc<AtomicBool>,
    fail_submits: Arc<AtomicBool>,
}

impl FlakyStore {
    fn new(inner: &InMemoryRepository) -> Self {
        Self {
            inner: inner.clone(),
            fail_reads: Arc::default(),
            fail_puts: Arc::default(),
            fail_deletes: Arc::default(),
            fail_submits: Arc::default(),
        }
    }

    fn check(flag: &AtomicBool) -> Result<(), StorageError> {
        if flag.load(Ordering::SeqCst) {
            return Err(StorageError::Connection("disk full".into()));
        }
        Ok(())
    }

    async fn controller(&self) -> SharedController {
        let storage = Storage {
            questions: Arc::new(self.inner.clone()),
            snapshots: Arc::new(self.clone()),
            leaderboard: Arc::new(self.clone()),
            players: Arc::new(self.inner.clone()),
        };
        let controller = QuizServices::from_storage(
            storage,
            Clock::fixed(fixed_now()),
            ControllerSettings::default(),
        )
        .controller();
        controller.lock().await.save_player_name("Ada").await.unwrap();
        controller
    }
}

#[async_trait]
impl SnapshotStore for FlakyStore {
    async fn get_snapshot(
        &self,
        subject_id: &SubjectId,
        player: &PlayerName,
    ) -> Result<Option<SessionSnapshot>, StorageError> {
        Self::check(&self.fail_reads)?;
        self.inner.get_snapshot(subject_id, player).await
    }

    async fn put_snapshot(
        &self,
        snapshot: &SessionSnapshot,
        saved_at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        Self::check(&self.fail_puts)?;
        self.inner.put_snapshot(snapshot, saved_at).await
    }

    async fn delete_snapshot(
        &self,
        subject_id: &SubjectId,
        player: &PlayerName,
    ) -> Result<(), StorageError> {
        Self::check(&self.fail_deletes)?;
        self.inner.delete_snapshot(subject_id, player).await
    }

    async fn delete_all_snapshots(&self, player: &PlayerName) -> Result<u64, StorageError> {
        Self::check(&self.fail_deletes)?;
        self.inner.delete_all_snapshots(player).await
    }
}

#[async_trait]
impl LeaderboardRepository for FlakyStore {
    async fn submit_score(
        &self,
        subject_id: &SubjectId,
        player: &PlayerName,
        score: u32,
        submitted_at: DateTime<Utc>,
    ) -> Result<LeaderboardEntry, StorageError> {
        Self::check(&self.fail_submits)?;
        self.inner
            .submit_score(subject_id, player, score, submitted_at)
            .await
    }

    async fn list_entries(
        &self,
        subject_id: &SubjectId,
    ) -> Result<Vec<LeaderboardEntry>, StorageError> {
        self.inner.list_entries(subject_id).await
    }
}

#[tokio::test]
async fn catalog_lists_and_filters_subjects() {
    let repo = InMemoryRepository::new();
    seed(&repo, "js", "JavaScript", &[0]);
    seed(&repo, "py", "Python", &[0]);
    seed(&repo, "java", "Java Basics", &[0]);

    let services = services(&repo);
    let all = services.list_subjects(None).await.unwrap();
    assert_eq!(all.len(), 3);

    let hits = services.list_subjects(Some("java")).await.unwrap();
    let ids: Vec<_> = hits.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(ids, vec!["js", "java"]);
}

#[tokio::test]
async fn full_attempt_ranks_on_leaderboard() {
    let repo = InMemoryRepository::new();
    seed(&repo, "geo", "Geography", &[0, 1, 2, 3, 0]);
    let subject = SubjectId::new("geo");
    repo.submit_score(&subject, &PlayerName::new("Grace").unwrap(), 5, fixed_now())
        .await
        .unwrap();

    let controller = signed_in(&repo).await;
    let mut c = controller.lock().await;
    assert_eq!(c.enter_subject(&subject).await.unwrap(), EnterOutcome::Started);
    for answer in [0, 1, 2, 3, 1] {
        c.select_answer(answer).await.unwrap();
        c.next_question().await.unwrap();
    }
    let completion = c.complete_quiz().await.unwrap();
    assert_eq!(completion.score, 4);
    assert_eq!(completion.accuracy_percent, 80);

    let standings = c.standings().await.unwrap();
    assert_eq!(standings.player_rank, Some(2));
    assert_eq!(standings.rows.len(), 2);
    assert!(standings.rows[1].is_current_player);
    assert!(standings.band.celebrate());
}

#[tokio::test(start_paused = true)]
async fn timer_runs_out_and_completes_once() {
    let repo = InMemoryRepository::new();
    seed(&repo, "geo", "Geography", &[0, 1, 2]);
    let subject = SubjectId::new("geo");
    let controller = signed_in(&repo).await;
    controller.lock().await.start_quiz(&subject).await.unwrap();

    let completions = Arc::new(Mutex::new(0));
    let counter = Arc::clone(&completions);
    let _sub = controller.lock().await.subscribe(move |event| {
        if matches!(event, SessionEvent::Completed { .. }) {
            *counter.lock().unwrap() += 1;
        }
    });

    let timer = QuizTimer::start(SharedController::clone(&controller)).await;
    tokio::time::sleep(Duration::from_secs(200)).await;
    assert!(!timer.is_active());

    {
        let c = controller.lock().await;
        let session = c.session().unwrap();
        assert!(session.is_complete());
        assert_eq!(session.time_left_secs(), 0);
        assert_eq!(c.calculate_score().unwrap(), 0);
    }
    assert_eq!(*completions.lock().unwrap(), 1);
    assert_eq!(repo.list_entries(&subject).await.unwrap().len(), 1);
    timer.stop().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn stopped_timer_persists_remaining_time() {
    let repo = InMemoryRepository::new();
    seed(&repo, "geo", "Geography", &[0, 1]);
    let subject = SubjectId::new("geo");
    let controller = signed_in(&repo).await;
    controller.lock().await.start_quiz(&subject).await.unwrap();

    let timer = QuizTimer::start(SharedController::clone(&controller)).await;
    tokio::time::sleep(Duration::from_millis(5_500)).await;
    timer.stop().await.unwrap();
    tokio::time::sleep(Duration::from_secs(10)).await;

    let c = controller.lock().await;
    assert_eq!(c.session().unwrap().time_left_secs(), 115);
    let stored = repo.get_snapshot(&subject, &ada()).await.unwrap().unwrap();
    assert_eq!(stored.time_left_seconds, 115);
}

#[tokio::test(start_paused = true)]
async fn answering_while_timer_runs_keeps_both_changes() {
    let repo = InMemoryRepository::new();
    seed(&repo, "geo", "Geography", &[2, 1]);
    let subject = SubjectId::new("geo");
    let controller = signed_in(&repo).await;
    controller.lock().await.start_quiz(&subject).await.unwrap();

    let timer = QuizTimer::start(SharedController::clone(&controller)).await;
    tokio::time::sleep(Duration::from_millis(2_500)).await;
    controller.lock().await.select_answer(2).await.unwrap();
    tokio::time::sleep(Duration::from_secs(1)).await;
    timer.stop().await.unwrap();

    let stored = repo.get_snapshot(&subject, &ada()).await.unwrap().unwrap();
    assert_eq!(stored.answers, vec![Some(2), None]);
    assert_eq!(stored.time_left_seconds, 117);
}

#[tokio::test(start_paused = true)]
async fn timer_from_replaced_session_leaves_new_session_alone() {
    let repo = InMemoryRepository::new();
    seed(&repo, "geo", "Geography", &[0]);
    seed(&repo, "math", "Math", &[0, 0]);
    let controller = signed_in(&repo).await;
    controller
        .lock()
        .await
        .start_quiz(&SubjectId::new("geo"))
        .await
        .unwrap();

    let stale = QuizTimer::start(SharedController::clone(&controller)).await;
    tokio::time::sleep(Duration::from_millis(1_500)).await;
    controller
        .lock()
        .await
        .start_quiz(&SubjectId::new("math"))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_secs(5)).await;

    assert!(!stale.is_active());
    let c = controller.lock().await;
    let session = c.session().unwrap();
    assert_eq!(session.subject_id().as_str(), "math");
    assert_eq!(session.time_left_secs(), 120);
}

#[tokio::test]
async fn ticks_are_reported_to_listeners() {
    let repo = InMemoryRepository::new();
    seed(&repo, "geo", "Geography", &[0]);
    let controller = signed_in(&repo).await;
    let mut c = controller.lock().await;
    c.start_quiz(&SubjectId::new("geo")).await.unwrap();

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let sub = c.subscribe(move |event| {
        if let SessionEvent::Ticked(outcome) = event {
            sink.lock().unwrap().push(*outcome);
        }
    });
    for _ in 0..3 {
        c.tick().await.unwrap();
    }
    assert!(sub.unsubscribe());
    c.tick().await.unwrap();

    assert_eq!(
        *seen.lock().unwrap(),
        vec![
            TickOutcome::Running(59),
            TickOutcome::Running(58),
            TickOutcome::Running(57)
        ]
    );
}

#[tokio::test]
async fn corrupt_snapshot_starts_fresh_attempt() {
    let repo = InMemoryRepository::new();
    seed(&repo, "geo", "Geography", &[0, 1]);
    let subject = SubjectId::new("geo");
    repo.put_raw_snapshot(&subject, &ada(), "not json at all")
        .unwrap();

    let controller = signed_in(&repo).await;
    let mut c = controller.lock().await;
    assert!(c.load_state(&subject).await.unwrap().is_none());
    assert_eq!(c.enter_subject(&subject).await.unwrap(), EnterOutcome::Started);
    assert_eq!(c.session().unwrap().time_left_secs(), 120);
}

#[tokio::test]
async fn repeated_completion_submits_one_entry() {
    let repo = InMemoryRepository::new();
    seed(&repo, "geo", "Geography", &[0]);
    let subject = SubjectId::new("geo");
    let controller = signed_in(&repo).await;
    {
        let mut c = controller.lock().await;
        c.start_quiz(&subject).await.unwrap();
        c.select_answer(0).await.unwrap();
        c.complete_quiz().await.unwrap();
        c.complete_quiz().await.unwrap();
    }

    // A restored completed attempt must not resubmit either.
    let other = signed_in(&repo).await;
    {
        let mut c = other.lock().await;
        c.load_state(&subject).await.unwrap();
        let completion = c.complete_quiz().await.unwrap();
        assert!(!completion.newly_completed);
        assert_eq!(completion.score, 1);
    }
    assert_eq!(repo.list_entries(&subject).await.unwrap().len(), 1);
}

#[tokio::test]
async fn sign_out_clears_every_subject() {
    let repo = InMemoryRepository::new();
    seed(&repo, "geo", "Geography", &[0]);
    seed(&repo, "math", "Math", &[0]);
    let controller = signed_in(&repo).await;
    let mut c = controller.lock().await;
    c.start_quiz(&SubjectId::new("geo")).await.unwrap();
    c.start_quiz(&SubjectId::new("math")).await.unwrap();
    c.clear_all_data().await.unwrap();

    for id in ["geo", "math"] {
        assert!(
            repo.get_snapshot(&SubjectId::new(id), &ada())
                .await
                .unwrap()
                .is_none()
        );
    }
    assert!(c.start_quiz(&SubjectId::new("geo")).await.is_err());
}

#[tokio::test]
async fn failed_snapshot_writes_keep_in_memory_changes() {
    let repo = InMemoryRepository::new();
    seed(&repo, "geo", "Geography", &[0, 1]);
    let subject = SubjectId::new("geo");
    let store = FlakyStore::new(&repo);
    let controller = store.controller().await;
    let mut c = controller.lock().await;
    c.start_quiz(&subject).await.unwrap();

    store.fail_puts.store(true, Ordering::SeqCst);
    c.select_answer(1).await.unwrap();
    assert_eq!(c.tick().await.unwrap(), TickOutcome::Running(119));
    assert!(c.save_current_state().await.is_err());

    let session = c.session().unwrap();
    assert_eq!(session.current_answer(), Some(1));
    assert_eq!(session.time_left_secs(), 119);
    let stored = repo.get_snapshot(&subject, &ada()).await.unwrap().unwrap();
    assert_eq!(stored.answers, vec![None, None]);
    assert_eq!(stored.time_left_seconds, 120);
}

#[tokio::test]
async fn failed_score_submission_still_completes() {
    let repo = InMemoryRepository::new();
    seed(&repo, "geo", "Geography", &[0]);
    let subject = SubjectId::new("geo");
    let store = FlakyStore::new(&repo);
    store.fail_submits.store(true, Ordering::SeqCst);
    let controller = store.controller().await;
    let mut c = controller.lock().await;
    c.start_quiz(&subject).await.unwrap();
    c.select_answer(0).await.unwrap();

    let completion = c.complete_quiz().await.unwrap();
    assert!(completion.newly_completed);
    assert_eq!(completion.score, 1);
    assert!(completion.entry.is_none());
    assert!(c.session().unwrap().is_complete());
    assert!(repo.list_entries(&subject).await.unwrap().is_empty());

    let stored = repo.get_snapshot(&subject, &ada()).await.unwrap().unwrap();
    assert!(stored.quiz_completed);
}

#[tokio::test]
async fn unreadable_store_loads_as_not_found() {
    let repo = InMemoryRepository::new();
    seed(&repo, "geo", "Geography", &[0, 1]);
    let subject = SubjectId::new("geo");
    let store = FlakyStore::new(&repo);
    {
        let controller = store.controller().await;
        let mut c = controller.lock().await;
        c.start_quiz(&subject).await.unwrap();
        c.select_answer(1).await.unwrap();
    }

    store.fail_reads.store(true, Ordering::SeqCst);
    let controller = store.controller().await;
    let mut c = controller.lock().await;
    assert!(c.load_state(&subject).await.unwrap().is_none());
    assert_eq!(c.enter_subject(&subject).await.unwrap(), EnterOutcome::Started);
    assert_eq!(c.session().unwrap().current_answer(), None);
}

#[tokio::test]
async fn failed_deletes_do_not_block_retake_or_sign_out() {
    let repo = InMemoryRepository::new();
    seed(&repo, "geo", "Geography", &[0, 1]);
    let subject = SubjectId::new("geo");
    let store = FlakyStore::new(&repo);
    {
        let controller = store.controller().await;
        let mut c = controller.lock().await;
        c.start_quiz(&subject).await.unwrap();
        c.complete_quiz().await.unwrap();
    }

    store.fail_deletes.store(true, Ordering::SeqCst);
    let controller = store.controller().await;
    let mut c = controller.lock().await;
    assert_eq!(
        c.enter_subject(&subject).await.unwrap(),
        EnterOutcome::Restarted
    );
    assert!(!c.session().unwrap().is_complete());
    let stored = repo.get_snapshot(&subject, &ada()).await.unwrap().unwrap();
    assert!(!stored.quiz_completed);

    c.clear_state(&subject).await.unwrap();
    assert!(c.session().is_none());

    c.start_quiz(&subject).await.unwrap();
    c.clear_all_data().await.unwrap();
    assert!(c.player().is_none());
    assert!(c.session().is_none());
    assert!(c.load_player_name().await.is_none());
}

#[tokio::test(start_paused = true)]
async fn stop_requested_while_tick_waits_for_lock_skips_that_tick() {
    let repo = InMemoryRepository::new();
    seed(&repo, "geo", "Geography", &[0]);
    let controller = signed_in(&repo).await;
    controller
        .lock()
        .await
        .start_quiz(&SubjectId::new("geo"))
        .await
        .unwrap();

    let timer = QuizTimer::start(SharedController::clone(&controller)).await;
    let guard = controller.lock().await;
    tokio::time::advance(Duration::from_millis(1_500)).await;
    for _ in 0..5 {
        tokio::task::yield_now().await;
    }
    drop(timer);
    drop(guard);
    tokio::time::sleep(Duration::from_secs(3)).await;

    let c = controller.lock().await;
    assert_eq!(c.session().unwrap().time_left_secs(), 60);
}
