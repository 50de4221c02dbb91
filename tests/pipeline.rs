#![forbid(unsafe_code)]
use camp_scheduler::config::CLASSES_FILE;
use camp_scheduler::pipeline::{self, RunRequest, Stage};
use camp_scheduler::sample::{self, SampleOptions};
use camp_scheduler::scheduler::WeekCalendar;
use camp_scheduler::storage;
use chrono::{NaiveDate, NaiveDateTime};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

fn week() -> WeekCalendar {
    WeekCalendar::new(NaiveDate::from_ymd_opt(2025, 7, 7).unwrap())
}

fn now() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2025, 7, 1)
        .unwrap()
        .and_hms_opt(9, 30, 0)
        .unwrap()
}

fn seed_data(dir: &Path) {
    let opts = SampleOptions {
        staff: 40,
        campers: 90,
        week: week(),
    };
    let data = sample::generate(&opts, &mut StdRng::seed_from_u64(3));
    sample::write_sample(dir, &data).unwrap();
}

const ARTIFACTS: [&str; 9] = [
    storage::DAY_OFF_RESULTS,
    storage::DAY_OFF_UNASSIGNED,
    storage::FREETIME_SCHEDULE,
    storage::SKILLS_SCHEDULE,
    storage::SKILLS_UNASSIGNED,
    storage::COVERAGE_SCHEDULE,
    storage::CAMPER_ASSIGNMENTS,
    storage::SKILLS_NOT_RUN,
    storage::CAMPER_UNASSIGNED,
];

#[test]
fn seeded_full_runs_are_reproducible() {
    let tmp = tempdir().unwrap();
    let data = tmp.path().join("data");
    seed_data(&data);
    let mut request = RunRequest::new(&data, tmp.path().join("out"), week());
    request.seed = Some(17);

    let first = pipeline::run(Stage::Full, &request, now()).unwrap();
    let second = pipeline::run(Stage::Full, &request, now()).unwrap();
    assert_ne!(first.dir, second.dir);
    assert!(first.violations.is_empty(), "{:?}", first.violations);
    assert_eq!(first.summary.produced(), ARTIFACTS.len());

    for name in ARTIFACTS {
        let a = fs::read(first.dir.join(name)).unwrap();
        let b = fs::read(second.dir.join(name)).unwrap();
        assert_eq!(a, b, "{name} differs between runs");
    }
    let log = fs::read_to_string(first.dir.join(storage::SUMMARY_LOG)).unwrap();
    assert!(log.starts_with("== Summary Log =="));
    assert!(log.contains("Timestamp: 2025-07-01"));
}

#[test]
fn time_off_stage_only_writes_its_artifacts() {
    let tmp = tempdir().unwrap();
    let data = tmp.path().join("data");
    seed_data(&data);
    let mut request = RunRequest::new(&data, tmp.path().join("out"), week());
    request.seed = Some(1);

    let report = pipeline::run(Stage::TimeOff, &request, now()).unwrap();
    assert!(report.dir.join(storage::DAY_OFF_RESULTS).exists());
    assert!(report.dir.join(storage::SUMMARY_LOG).exists());
    assert!(!report.dir.join(storage::FREETIME_SCHEDULE).exists());
    assert!(!report.dir.join(storage::CAMPER_ASSIGNMENTS).exists());
}

#[test]
fn locations_can_reuse_persisted_time_off() {
    let tmp = tempdir().unwrap();
    let data = tmp.path().join("data");
    seed_data(&data);
    let mut request = RunRequest::new(&data, tmp.path().join("out"), week());
    request.seed = Some(5);
    let time_off = pipeline::run(Stage::TimeOff, &request, now()).unwrap();

    request.time_off_results = Some(time_off.dir.join(storage::DAY_OFF_RESULTS));
    let report = pipeline::run(Stage::Locations, &request, now()).unwrap();
    assert!(report.dir.join(storage::FREETIME_SCHEDULE).exists());
    assert!(!report.dir.join(storage::DAY_OFF_RESULTS).exists());
}

#[test]
fn fatal_error_is_written_to_the_error_log() {
    let tmp = tempdir().unwrap();
    let data = tmp.path().join("data");
    seed_data(&data);
    fs::remove_file(data.join(CLASSES_FILE)).unwrap();
    let out = tmp.path().join("out");
    let request = RunRequest::new(&data, &out, week());

    let err = pipeline::run(Stage::Full, &request, now()).unwrap_err();
    assert!(format!("{err:#}").contains(CLASSES_FILE));

    let run_dir = fs::read_dir(&out).unwrap().next().unwrap().unwrap().path();
    let log = fs::read_to_string(run_dir.join(storage::ERROR_LOG)).unwrap();
    assert!(log.contains(CLASSES_FILE), "{log}");
    assert!(!run_dir.join(storage::SUMMARY_LOG).exists());
}
