#![forbid(unsafe_code)]
use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::tempdir;

fn cli() -> Command {
    Command::cargo_bin("camp-scheduler-cli").unwrap()
}

#[test]
fn sample_then_check_passes() {
    let tmp = tempdir().unwrap();
    let data = tmp.path().join("data");
    let out = tmp.path().join("out");

    cli()
        .args(["--week-start", "07/07/2025", "--seed", "4", "sample", "--staff", "30", "--campers", "60", "--dir"])
        .arg(&data)
        .assert()
        .success()
        .stdout(predicate::str::contains("30 staff, 60 campers"));
    assert!(data.join("index.csv").exists());
    assert!(data.join("classes.json").exists());

    cli()
        .args(["--week-start", "07/07/2025", "--seed", "4", "--data-dir"])
        .arg(&data)
        .arg("--out-dir")
        .arg(&out)
        .arg("check")
        .assert()
        .code(0)
        .stdout(predicate::str::contains("Week of 07/07/2025"))
        .stdout(predicate::str::contains("OK: no violations"));

    let runs: Vec<_> = fs::read_dir(&out).unwrap().collect();
    assert_eq!(runs.len(), 1);
}

#[test]
fn invalid_week_start_fails() {
    let tmp = tempdir().unwrap();
    cli()
        .args(["--week-start", "31/02/2025", "--data-dir"])
        .arg(tmp.path())
        .arg("time-off")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("invalid week start"));
}

#[test]
fn missing_inputs_leave_an_error_log() {
    let tmp = tempdir().unwrap();
    let out = tmp.path().join("out");
    cli()
        .args(["--week-start", "07/07/2025", "--data-dir"])
        .arg(tmp.path().join("nowhere"))
        .arg("--out-dir")
        .arg(&out)
        .arg("full")
        .assert()
        .failure()
        .stderr(predicate::str::starts_with("Error:"));

    let run_dir = fs::read_dir(&out).unwrap().next().unwrap().unwrap().path();
    assert!(run_dir.join("ERROR_LOG.txt").exists());
}

#[test]
fn non_monday_start_warns() {
    let tmp = tempdir().unwrap();
    let data = tmp.path().join("data");
    let out = tmp.path().join("out");
    cli()
        .args(["--week-start", "07/07/2025", "--seed", "2", "sample", "--staff", "20", "--campers", "30", "--dir"])
        .arg(&data)
        .assert()
        .success();

    cli()
        .args(["--week-start", "08/07/2025", "--seed", "2", "--data-dir"])
        .arg(&data)
        .arg("--out-dir")
        .arg(&out)
        .arg("campers")
        .assert()
        .success()
        .stderr(predicate::str::contains("week start 08/07/2025 is not a Monday"))
        .stdout(predicate::str::contains("Week of 08/07/2025"));

    let run_dir = fs::read_dir(&out).unwrap().next().unwrap().unwrap().path();
    assert!(run_dir.join("camper_assignments.csv").exists());
}
