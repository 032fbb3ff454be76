//! End-to-end CLI tests against an isolated XDG tree in a temp directory.

use assert_cmd::Command;
use tempfile::TempDir;

fn fokus(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("fokus").unwrap();
    cmd.env("HOME", dir.path())
        .env("XDG_CONFIG_HOME", dir.path().join(".config"))
        .env("XDG_DATA_HOME", dir.path().join(".local/share"))
        .env("XDG_STATE_HOME", dir.path().join(".local/state"));
    cmd
}

fn stdout_of(mut cmd: Command) -> String {
    let output = cmd.output().expect("run fokus");
    assert!(
        output.status.success(),
        "command failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8(output.stdout).expect("utf-8 output")
}

#[test]
fn first_run_seeds_the_default_subject() {
    let dir = TempDir::new().unwrap();

    let mut cmd = fokus(&dir);
    cmd.args(["subject", "list"]);
    let out = stdout_of(cmd);
    assert!(out.contains("General"));
    assert!(out.contains("25:00"));
}

#[test]
fn subject_lifecycle_through_the_cli() {
    let dir = TempDir::new().unwrap();

    let mut cmd = fokus(&dir);
    cmd.args(["subject", "add", "Math", "--duration-mins", "20"]);
    let out = stdout_of(cmd);
    assert!(out.contains("Added subject 'Math'"));
    assert!(out.contains("20:00"));

    let mut cmd = fokus(&dir);
    cmd.args(["subject", "rename", "Math", "Algebra"]);
    stdout_of(cmd);

    let mut cmd = fokus(&dir);
    cmd.args(["subject", "list"]);
    let out = stdout_of(cmd);
    assert!(out.contains("Algebra"));
    assert!(!out.contains("Math"));

    let mut cmd = fokus(&dir);
    cmd.args(["subject", "rm", "Algebra"]);
    let out = stdout_of(cmd);
    assert!(out.contains("Removed subject 'Algebra'"));

    // Removing an unknown subject fails with a clear message
    let mut cmd = fokus(&dir);
    cmd.args(["subject", "rm", "Algebra"]);
    cmd.assert().failure();
}

#[test]
fn start_pause_status_round_trip() {
    let dir = TempDir::new().unwrap();

    let mut cmd = fokus(&dir);
    cmd.args(["subject", "add", "Math"]);
    stdout_of(cmd);

    let mut cmd = fokus(&dir);
    cmd.args(["use", "Math"]);
    let out = stdout_of(cmd);
    assert!(out.contains("Studying 'Math'"));

    let mut cmd = fokus(&dir);
    cmd.arg("start");
    let out = stdout_of(cmd);
    assert!(out.contains("Started 'Math'"));

    let mut cmd = fokus(&dir);
    cmd.arg("status");
    let out = stdout_of(cmd);
    assert!(out.contains("State:     running"));

    let mut cmd = fokus(&dir);
    cmd.arg("pause");
    let out = stdout_of(cmd);
    assert!(out.contains("Paused 'Math'"));

    let mut cmd = fokus(&dir);
    cmd.arg("status");
    let out = stdout_of(cmd);
    assert!(out.contains("State:     paused"));

    let mut cmd = fokus(&dir);
    cmd.arg("reset");
    let out = stdout_of(cmd);
    assert!(out.contains("Discarded 'Math' session"));

    let mut cmd = fokus(&dir);
    cmd.arg("status");
    let out = stdout_of(cmd);
    assert!(out.contains("State:     idle"));
}

#[test]
fn streak_counts_todays_session() {
    let dir = TempDir::new().unwrap();

    let mut cmd = fokus(&dir);
    cmd.arg("streak");
    let out = stdout_of(cmd);
    assert!(out.contains("Study streak: 0 day(s)"));

    let mut cmd = fokus(&dir);
    cmd.arg("start");
    stdout_of(cmd);

    let mut cmd = fokus(&dir);
    cmd.arg("streak");
    let out = stdout_of(cmd);
    assert!(out.contains("Study streak: 1 day(s)"));
}

#[test]
fn stats_on_an_empty_database() {
    let dir = TempDir::new().unwrap();

    let mut cmd = fokus(&dir);
    cmd.arg("stats");
    let out = stdout_of(cmd);
    assert!(out.contains("Total studied:      0m"));
    assert!(out.contains("Most active subject: None"));

    let mut cmd = fokus(&dir);
    cmd.args(["calendar", "--days", "6"]);
    let out = stdout_of(cmd);
    assert_eq!(out.lines().count(), 7);
}
