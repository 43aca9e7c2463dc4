//! Binary-level smoke tests.

use assert_cmd::Command;
use predicates::prelude::*;

fn repsync() -> Command {
    Command::cargo_bin("repsync").unwrap()
}

#[test]
fn help_prints_usage() {
    repsync()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("repsync"));
}

#[test]
fn init_then_status() {
    let dir = tempfile::tempdir().unwrap();

    repsync()
        .args(["--data-dir", dir.path().to_str().unwrap()])
        .args(["init", "--name", "Test Watch", "--role", "companion"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Initialized"));

    repsync()
        .args(["--data-dir", dir.path().to_str().unwrap()])
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("Test Watch"));
}

#[test]
fn init_twice_fails() {
    let dir = tempfile::tempdir().unwrap();
    let data_dir = dir.path().to_str().unwrap();

    repsync()
        .args(["--data-dir", data_dir])
        .args(["init", "--name", "A"])
        .assert()
        .success();

    repsync()
        .args(["--data-dir", data_dir])
        .args(["init", "--name", "B"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already initialized"));
}

#[test]
fn status_without_init_is_helpful() {
    let dir = tempfile::tempdir().unwrap();

    repsync()
        .args(["--data-dir", dir.path().to_str().unwrap()])
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("NOT INITIALIZED"));
}

#[test]
fn demo_runs_the_full_scenario() {
    repsync()
        .arg("demo")
        .assert()
        .success()
        .stdout(predicate::str::contains("Demo complete."));
}

#[test]
fn log_without_workout_fails_cleanly() {
    let dir = tempfile::tempdir().unwrap();
    let data_dir = dir.path().to_str().unwrap();

    repsync()
        .args(["--data-dir", data_dir])
        .args(["init", "--name", "W"])
        .assert()
        .success();

    repsync()
        .args(["--data-dir", data_dir])
        .args(["log", "0", "1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No active workout"));
}
