use quiz_core::model::{
    PlayerName, Question, QuizSession, SECONDS_PER_QUESTION, SessionSnapshot, Subject, SubjectId,
};
use quiz_core::time::fixed_now;
use storage::repository::{
    LeaderboardRepository, PlayerRepository, QuestionBank, SnapshotStore, StorageError,
};
use storage::sqlite::SqliteRepository;

async fn repo(name: &str) -> SqliteRepository {
    let url = format!("sqlite:file:{name}?mode=memory&cache=shared");
    let repo = SqliteRepository::connect(&url).await.expect("connect");
    repo.migrate().await.expect("migrate");
    repo
}

fn player(name: &str) -> PlayerName {
    PlayerName::new(name).unwrap()
}

fn questions() -> Vec<Question> {
    vec![
        Question::new(
            "First?",
            vec!["a".into(), "b".into()],
            1,
            Some("because".into()),
        ),
        Question::new("Second?", vec!["x".into(), "y".into(), "z".into()], 2, None),
    ]
}

#[tokio::test]
async fn sqlite_question_bank_preserves_order() {
    let repo = repo("memdb_bank").await;
    let subject = Subject {
        id: SubjectId::new("geo"),
        name: "Geography".into(),
        time_in_minutes: 2,
        question_count: 2,
    };
    repo.upsert_subject(&subject).await.unwrap();
    repo.replace_questions(&subject.id, &questions()).await.unwrap();

    let listed = repo.list_subjects().await.unwrap();
    assert_eq!(listed, vec![subject.clone()]);

    let fetched = repo.get_questions(&subject.id).await.unwrap();
    assert_eq!(fetched, questions());

    let missing = repo.get_questions(&SubjectId::new("nope")).await.unwrap_err();
    assert!(matches!(missing, StorageError::NotFound));
}

#[tokio::test]
async fn sqlite_snapshot_round_trip_and_delete_all() {
    let repo = repo("memdb_snapshots").await;
    let mut session = QuizSession::start(
        SubjectId::new("geo"),
        player("ada"),
        questions(),
        SECONDS_PER_QUESTION,
    )
    .unwrap();
    session.select_answer(1).unwrap();
    session.next_question().unwrap();
    session.tick().unwrap();

    let snapshot = SessionSnapshot::capture(&session);
    repo.put_snapshot(&snapshot, fixed_now()).await.unwrap();
    repo.put_snapshot(&snapshot, fixed_now()).await.unwrap();

    let restored = repo
        .get_snapshot(session.subject_id(), session.player())
        .await
        .unwrap()
        .expect("snapshot stored")
        .into_session()
        .unwrap();
    assert_eq!(restored, session);

    let other = QuizSession::start(
        SubjectId::new("math"),
        player("ada"),
        questions(),
        SECONDS_PER_QUESTION,
    )
    .unwrap();
    repo.put_snapshot(&SessionSnapshot::capture(&other), fixed_now())
        .await
        .unwrap();

    let removed = repo.delete_all_snapshots(&player("ada")).await.unwrap();
    assert_eq!(removed, 2);
    assert!(
        repo.get_snapshot(session.subject_id(), session.player())
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn sqlite_corrupt_snapshot_is_a_serialization_error() {
    let repo = repo("memdb_corrupt").await;
    sqlx::query(
        "INSERT INTO session_snapshots (subject_id, player_name, payload, saved_at) VALUES (?1, ?2, ?3, ?4)",
    )
    .bind("geo")
    .bind("ada")
    .bind("{\"schemaVersion\":1")
    .bind(fixed_now())
    .execute(repo.pool())
    .await
    .unwrap();

    let err = repo
        .get_snapshot(&SubjectId::new("geo"), &player("ada"))
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::Serialization(_)));
}

#[tokio::test]
async fn sqlite_leaderboard_orders_by_score_then_submission() {
    let repo = repo("memdb_leaderboard").await;
    let subject = SubjectId::new("geo");
    for (name, score) in [("early", 2), ("top", 5), ("late", 2), ("low", 0)] {
        repo.submit_score(&subject, &player(name), score, fixed_now())
            .await
            .unwrap();
    }
    repo.submit_score(&SubjectId::new("other"), &player("x"), 9, fixed_now())
        .await
        .unwrap();

    let entries = repo.list_entries(&subject).await.unwrap();
    let names: Vec<_> = entries.iter().map(|e| e.player.as_str()).collect();
    assert_eq!(names, vec!["top", "early", "late", "low"]);
    assert!(entries[1].sequence < entries[2].sequence);
}

#[tokio::test]
async fn sqlite_player_profile_save_load_clear() {
    let repo = repo("memdb_player").await;
    assert_eq!(repo.load_player().await.unwrap(), None);

    repo.save_player(&player("ada")).await.unwrap();
    repo.save_player(&player("grace")).await.unwrap();
    assert_eq!(repo.load_player().await.unwrap(), Some(player("grace")));

    repo.clear_player().await.unwrap();
    assert_eq!(repo.load_player().await.unwrap(), None);
}
