//! Integration tests for the full study-session lifecycle
//!
//! These tests run against an on-disk database in a temp directory to
//! exercise the same open/migrate/seed path the binary uses, including
//! state surviving a database reopen.

use fokus_core::db::Database;
use fokus_core::history::HistoryService;
use fokus_core::timer::{SessionTimer, SwitchPolicy, Tick, TimerState};
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

fn open_db(dir: &TempDir) -> (Arc<Database>, PathBuf) {
    let path = dir.path().join("fokus").join("data.db");
    let db = Database::open(&path).expect("open database");
    db.migrate().expect("run migrations");
    (Arc::new(db), path)
}

// ============================================
// Seeding and subject management
// ============================================

#[test]
fn fresh_database_seeds_a_default_subject_once() {
    let dir = TempDir::new().unwrap();
    let (db, _) = open_db(&dir);

    db.seed_defaults("General", 1500).unwrap();
    let subjects = db.list_subjects().unwrap();
    assert_eq!(subjects.len(), 1);
    assert_eq!(subjects[0].name, "General");
    assert_eq!(subjects[0].session_duration_secs, 1500);

    // Seeding again must not duplicate
    db.seed_defaults("General", 1500).unwrap();
    assert_eq!(db.list_subjects().unwrap().len(), 1);

    // The last subject cannot be deleted
    let err = db.delete_subject(&subjects[0].id).unwrap_err();
    assert!(matches!(err, fokus_core::Error::LastSubject(_)));
}

// ============================================
// Full timer lifecycle
// ============================================

#[test]
fn pomodoro_session_ticks_down_to_twenty_five_studied_minutes() {
    let dir = TempDir::new().unwrap();
    let (db, _) = open_db(&dir);
    let math = db.create_subject("Math", 1500).unwrap();

    let mut timer = SessionTimer::new(Arc::clone(&db), SwitchPolicy::default());
    timer.select_subject(Some(math.clone()));

    let state = timer.toggle().unwrap();
    assert!(state.is_running());
    let session_id = state.session_id().unwrap().to_string();

    // 25 minutes of ticks: 1499 running, then completion on the last
    for expected in (1..1500).rev() {
        assert_eq!(
            timer.tick(),
            Tick::Running {
                remaining_secs: expected
            }
        );
    }
    assert_eq!(timer.tick(), Tick::Completed);
    assert_eq!(*timer.state(), TimerState::Idle);

    let stored = db.get_session(&session_id).unwrap().unwrap();
    assert!(stored.completed);
    assert_eq!(stored.studied_minutes(), 25);

    let history = HistoryService::new(Arc::clone(&db));
    let stats = history
        .subject_stats(&math.id, 7)
        .unwrap()
        .expect("subject has a completed session");
    assert_eq!(stats.subject_name, "Math");
    assert_eq!(stats.total_minutes, 25);
    assert_eq!(stats.total_sessions, 1);

    let overall = history.overall_stats(7).unwrap();
    assert_eq!(overall.total_minutes, 25);
    assert_eq!(overall.most_active_subject, "Math");
    assert_eq!(overall.study_streak, 1);
}

#[test]
fn pause_survives_a_database_reopen() {
    let dir = TempDir::new().unwrap();
    let (db, path) = open_db(&dir);
    let math = db.create_subject("Math", 600).unwrap();

    let mut timer = SessionTimer::new(Arc::clone(&db), SwitchPolicy::ResumeActive);
    timer.select_subject(Some(math.clone()));

    timer.toggle().unwrap();
    timer.tick();
    timer.tick();
    timer.toggle().unwrap(); // pause at 598
    drop(timer);
    drop(db);

    // New process: reopen, restore the last subject, adopt the paused session
    let db = Arc::new(Database::open(&path).unwrap());
    db.migrate().unwrap();

    let mut timer = SessionTimer::new(Arc::clone(&db), SwitchPolicy::ResumeActive);
    timer.restore_last_subject();
    assert_eq!(timer.subject().map(|s| s.name.as_str()), Some("Math"));
    assert!(matches!(timer.state(), TimerState::Paused { .. }));
    assert_eq!(timer.remaining_secs(), 598);

    // Resume and finish
    timer.toggle().unwrap();
    loop {
        if timer.tick() == Tick::Completed {
            break;
        }
    }

    let sessions = db.get_sessions_by_subject(&math.id).unwrap();
    assert_eq!(sessions.len(), 1);
    assert!(sessions[0].completed);
    assert_eq!(sessions[0].studied_minutes(), 10);
}

#[test]
fn reset_discards_the_persisted_session() {
    let dir = TempDir::new().unwrap();
    let (db, _) = open_db(&dir);
    let math = db.create_subject("Math", 300).unwrap();

    let mut timer = SessionTimer::new(Arc::clone(&db), SwitchPolicy::default());
    timer.select_subject(Some(math.clone()));

    let state = timer.toggle().unwrap();
    let session_id = state.session_id().unwrap().to_string();
    timer.tick();
    timer.reset();

    assert_eq!(*timer.state(), TimerState::Idle);
    assert_eq!(timer.remaining_secs(), 300);
    assert!(db.get_session(&session_id).unwrap().is_none());
    assert!(db
        .get_active_session_for_subject(&math.id)
        .unwrap()
        .is_none());
}

// ============================================
// Reporting over a realistic mix
// ============================================

#[test]
fn reports_cover_completed_sessions_across_subjects() {
    let dir = TempDir::new().unwrap();
    let (db, _) = open_db(&dir);
    let math = db.create_subject("Math", 1200).unwrap();
    let biology = db.create_subject("Biology", 300).unwrap();

    let mut timer = SessionTimer::new(Arc::clone(&db), SwitchPolicy::default());

    // 20 completed minutes of Math
    timer.select_subject(Some(math.clone()));
    timer.toggle().unwrap();
    while timer.tick() != Tick::Completed {}

    // 5 completed minutes of Biology
    timer.select_subject(Some(biology));
    timer.toggle().unwrap();
    while timer.tick() != Tick::Completed {}

    // An abandoned Math session must not leak into completed stats
    timer.select_subject(Some(math));
    timer.toggle().unwrap();
    timer.tick();
    timer.toggle().unwrap(); // leave it paused

    let history = HistoryService::new(Arc::clone(&db));

    let overall = history.overall_stats(7).unwrap();
    assert_eq!(overall.total_minutes, 25);
    assert_eq!(overall.total_sessions, 2);
    assert_eq!(overall.most_active_subject, "Math");

    let comparison = history.subject_comparison(7).unwrap();
    assert_eq!(comparison.labels, vec!["Math", "Biology"]);
    assert_eq!(comparison.data, vec![20, 5]);

    // Calendar covers the whole window even with one active day
    let calendar = history.calendar_data(6).unwrap();
    assert_eq!(calendar.len(), 7);
    let today = calendar.last().unwrap();
    assert!(today.minutes >= 25);
}
