// tests/practice_flow.rs
//
// End-to-end exercise of the practice session machine and the
// pass-probability estimator over the in-memory store, the same path an
// embedder without a database would take.

use barprep::models::session::{SelectionMode, SessionConfig};
use barprep::session::{PracticeSession, TimerStatus};
use barprep::stats::estimator;
use barprep::store::{MemoryStore, PracticeStore};

const USER: i64 = 42;

fn config(question_count: u32, mode: SelectionMode, tutor: bool, timed: bool) -> SessionConfig {
    SessionConfig {
        subject_ids: vec![1],
        question_count,
        selection_mode: mode,
        tutor,
        timed,
    }
}

fn seeded_store() -> MemoryStore {
    let store = MemoryStore::new();
    for id in 1..=5 {
        store.add_question(id, 1, 1, Some("See the annotated statute."));
    }
    // A second subject that the filter must exclude.
    for id in 6..=8 {
        store.add_question(id, 2, 1, None);
    }
    store
}

#[tokio::test]
async fn full_timed_tutor_run() {
    let store = seeded_store();
    let mut session = PracticeSession::start(&store, USER, config(3, SelectionMode::All, true, true))
        .await
        .unwrap();

    let view = session.view();
    assert_eq!(view.total_questions, 3);
    assert_eq!(view.remaining_seconds, Some(300));
    let question = view.question.expect("current question");
    assert_eq!(question.subject_id, 1);
    assert_eq!(question.choices.len(), 4);

    // Tutor mode reveals the outcome per question.
    let outcome = session.submit_answer(&store, 1).await.unwrap();
    assert_eq!(outcome.correct, Some(true));
    session.advance(&store).await.unwrap();

    let outcome = session.submit_answer(&store, 3).await.unwrap();
    assert_eq!(outcome.correct, Some(false));
    assert_eq!(outcome.correct_choice, Some(1));

    // Clock keeps counting down between answers.
    for _ in 0..10 {
        assert!(matches!(
            session.tick(&store).await.unwrap(),
            TimerStatus::Running(_)
        ));
    }
    assert_eq!(session.view().remaining_seconds, Some(290));

    session.advance(&store).await.unwrap();
    session.submit_answer(&store, 1).await.unwrap();

    let summary = session.complete(&store).await.unwrap();
    assert_eq!(summary.score, 2);
    assert_eq!(summary.answered_count, 3);
    assert_eq!(summary.total_questions, 3);

    // The completed session no longer resumes.
    assert!(PracticeSession::resume(&store, USER).await.unwrap().is_none());
}

#[tokio::test]
async fn reload_mid_session_resumes_where_it_left_off() {
    let store = seeded_store();
    let mut session = PracticeSession::start(&store, USER, config(3, SelectionMode::All, false, true))
        .await
        .unwrap();
    let session_id = session.session_id();
    let first_question = session.view().question.unwrap().id;

    session.submit_answer(&store, 1).await.unwrap();
    session.advance(&store).await.unwrap();
    for _ in 0..25 {
        session.tick(&store).await.unwrap();
    }
    drop(session); // simulated page reload

    let mut resumed = PracticeSession::resume(&store, USER)
        .await
        .unwrap()
        .expect("session should survive a reload");
    assert_eq!(resumed.session_id(), session_id);

    let view = resumed.view();
    assert_eq!(view.question_index, 1);
    assert_eq!(view.remaining_seconds, Some(275));
    assert_eq!(view.answered_count, 1);

    // Review of the first question keeps its answer locked.
    resumed.go_back(&store).await.unwrap();
    let view = resumed.view();
    assert_eq!(view.question.unwrap().id, first_question);
    assert!(view.answered);
    assert!(resumed.submit_answer(&store, 2).await.is_err());
}

#[tokio::test]
async fn unused_mode_narrows_across_sessions() {
    let store = seeded_store();

    // First run answers three subject-1 questions.
    let mut session = PracticeSession::start(&store, USER, config(3, SelectionMode::All, false, false))
        .await
        .unwrap();
    let mut seen = Vec::new();
    for i in 0..3 {
        seen.push(session.view().question.unwrap().id);
        session.submit_answer(&store, 1).await.unwrap();
        if i < 2 {
            session.advance(&store).await.unwrap();
        }
    }
    session.complete(&store).await.unwrap();

    // The next unused-mode run may only draw the remaining two.
    let session = PracticeSession::start(&store, USER, config(10, SelectionMode::Unused, false, false))
        .await
        .unwrap();
    let view = session.view();
    assert_eq!(view.total_questions, 2);
    let drawn = view.question.unwrap().id;
    assert!(!seen.contains(&drawn));
}

#[tokio::test]
async fn incorrect_mode_replays_only_missed_questions() {
    let store = seeded_store();

    let mut session = PracticeSession::start(&store, USER, config(2, SelectionMode::All, false, false))
        .await
        .unwrap();
    let missed = session.view().question.unwrap().id;
    session.submit_answer(&store, 4).await.unwrap(); // wrong
    session.advance(&store).await.unwrap();
    session.submit_answer(&store, 1).await.unwrap(); // right
    session.complete(&store).await.unwrap();

    let session = PracticeSession::start(
        &store,
        USER,
        config(10, SelectionMode::Incorrect, false, false),
    )
    .await
    .unwrap();
    let view = session.view();
    assert_eq!(view.total_questions, 1);
    assert_eq!(view.question.unwrap().id, missed);
}

#[tokio::test]
async fn answer_history_feeds_the_estimator() {
    let store = seeded_store();

    let mut session = PracticeSession::start(&store, USER, config(5, SelectionMode::All, false, false))
        .await
        .unwrap();
    for (i, choice) in [1i16, 1, 1, 1, 2].iter().enumerate() {
        session.submit_answer(&store, *choice).await.unwrap();
        if i < 4 {
            session.advance(&store).await.unwrap();
        }
    }
    session.complete(&store).await.unwrap();

    let counts = store.answer_counts(USER).await.unwrap();
    assert_eq!(counts.total, 5);
    assert_eq!(counts.correct, 4);

    let estimate = estimator::estimate(counts.total as u64, counts.correct as u64);
    assert!(estimate.lower > 0.0);
    assert!(estimate.upper <= 1.0);
    assert!(estimate.pass_probability > 0.0);
    assert!(estimate.pass_probability_lower <= estimate.pass_probability);
    assert!(estimate.pass_probability <= estimate.pass_probability_upper);

    // A user with no history gets the defined no-data state.
    let empty = store.answer_counts(999).await.unwrap();
    assert_eq!(
        estimator::estimate(empty.total as u64, empty.correct as u64),
        estimator::ProbabilityEstimate::default()
    );
}

#[tokio::test]
async fn abandoning_a_test_replaces_it() {
    let store = seeded_store();

    let mut first = PracticeSession::start(&store, USER, config(3, SelectionMode::All, false, false))
        .await
        .unwrap();
    first.submit_answer(&store, 1).await.unwrap();

    // Starting over discards the stale run and its answer records.
    let second = PracticeSession::start(&store, USER, config(3, SelectionMode::All, false, false))
        .await
        .unwrap();
    assert_eq!(store.incomplete_session_count(USER), 1);
    assert_eq!(store.answer_counts(USER).await.unwrap().total, 0);

    // Operations against the replaced session now fail fatally; the
    // caller is expected to restart the flow.
    assert!(first.advance(&store).await.is_err());

    let resumed = PracticeSession::resume(&store, USER).await.unwrap().unwrap();
    assert_eq!(resumed.session_id(), second.session_id());
}
