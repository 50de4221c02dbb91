use crate::config::ConfigStore;
use crate::io;
use crate::model::StaffRoster;
use crate::scheduler::{Scheduler, Violation, WeekCalendar};
use crate::storage::{self, RunDirectory};
use crate::summary::{prepare_summary, RunSummary, SummaryRenderer, TextSummary};
use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use std::path::PathBuf;

/// Étape(s) à exécuter ; chaque étape exécute ses prérequis en mémoire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    TimeOff,
    Locations,
    /// Patrons des périodes de skills et remplacements qui en découlent.
    Skills,
    Campers,
    Full,
}

impl Stage {
    fn runs_time_off(self, persisted: bool) -> bool {
        match self {
            Stage::TimeOff | Stage::Full => true,
            Stage::Locations => !persisted,
            Stage::Skills | Stage::Campers => false,
        }
    }
    fn runs_locations(self) -> bool {
        matches!(self, Stage::Locations | Stage::Full)
    }
    fn runs_skills(self) -> bool {
        matches!(self, Stage::Skills | Stage::Full)
    }
    fn runs_campers(self) -> bool {
        matches!(self, Stage::Campers | Stage::Full)
    }
    fn needs_staff(self) -> bool {
        self != Stage::Campers
    }
}

/// Paramètres d'un run.
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub data_dir: PathBuf,
    pub out_dir: PathBuf,
    pub week: WeekCalendar,
    pub seed: Option<u64>,
    pub viability: Option<u32>,
    /// `day_off_results.csv` déjà écrit, repris par l'étape des lieux.
    pub time_off_results: Option<PathBuf>,
}

impl RunRequest {
    pub fn new<P: Into<PathBuf>, Q: Into<PathBuf>>(data_dir: P, out_dir: Q, week: WeekCalendar) -> Self {
        Self {
            data_dir: data_dir.into(),
            out_dir: out_dir.into(),
            week,
            seed: None,
            viability: None,
            time_off_results: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunReport {
    pub dir: PathBuf,
    pub summary: RunSummary,
    pub violations: Vec<Violation>,
}

/// Exécute `stage` dans un nouveau répertoire horodaté sous `out_dir`.
///
/// Une erreur fatale est écrite dans `ERROR_LOG.txt` avant d'être propagée.
pub fn run(stage: Stage, request: &RunRequest, now: NaiveDateTime) -> Result<RunReport> {
    let run_dir = RunDirectory::create(&request.out_dir, now)?;
    tracing::info!(?stage, dir = %run_dir.path().display(), "run started");
    match execute(stage, request, &run_dir) {
        Ok(violations) => {
            let summary = prepare_summary(&run_dir, now)?;
            run_dir.write_with(storage::SUMMARY_LOG, |buf| {
                buf.extend_from_slice(TextSummary.render(&summary).as_bytes());
                Ok(())
            })?;
            tracing::info!(
                artifacts = summary.produced(),
                violations = violations.len(),
                "run finished"
            );
            Ok(RunReport {
                dir: run_dir.path().to_path_buf(),
                summary,
                violations,
            })
        }
        Err(err) => {
            tracing::error!(error = %err, "run failed");
            if let Err(write_err) = run_dir.write_error(&err, now) {
                tracing::warn!(error = %write_err, "could not write error log");
            }
            Err(err)
        }
    }
}

fn execute(stage: Stage, request: &RunRequest, run_dir: &RunDirectory) -> Result<Vec<Violation>> {
    let store = ConfigStore::new(&request.data_dir);
    let mut config = store.load_all()?;
    if let Some(seed) = request.seed {
        config.options.seed = Some(seed);
    }
    if let Some(viability) = request.viability {
        config.options.viability_multiplier = viability;
    }

    let roster = if stage.needs_staff() {
        io::import_roster_csv(store.path(io::ROSTER_FILE))?
    } else {
        StaffRoster::default()
    };
    let week = request.week;
    let mut scheduler = Scheduler::new(roster, config, week)?;

    if stage.runs_time_off(request.time_off_results.is_some()) {
        let requests = io::import_time_off_csv(store.path(io::TIME_OFF_FORM_FILE))?;
        let outcome = scheduler.assign_time_off(&requests);
        run_dir.write_with(storage::DAY_OFF_RESULTS, |buf| {
            io::export_time_off_results(buf, outcome)
        })?;
        run_dir.write_with(storage::DAY_OFF_UNASSIGNED, |buf| {
            io::export_time_off_unassigned(buf, outcome)
        })?;
    }

    if stage.runs_locations() {
        let outcome = match &request.time_off_results {
            Some(path) if !stage.runs_time_off(true) => {
                let day_offs = io::import_day_off_results_csv(path)
                    .with_context(|| format!("loading time-off results {}", path.display()))?;
                scheduler.staff_locations_with(&day_offs)
            }
            _ => scheduler.staff_locations()?,
        };
        run_dir.write_with(storage::FREETIME_SCHEDULE, |buf| {
            io::export_freetime_schedule(buf, outcome)
        })?;
    }

    if stage.runs_skills() {
        let skills = scheduler.assign_skills().clone();
        run_dir.write_with(storage::SKILLS_SCHEDULE, |buf| {
            io::export_skills_schedule(buf, &skills, &week)
        })?;
        run_dir.write_with(storage::SKILLS_UNASSIGNED, |buf| {
            io::export_skills_unassigned(buf, &skills)
        })?;
        let coverage = scheduler.backfill_coverage()?;
        run_dir.write_with(storage::COVERAGE_SCHEDULE, |buf| {
            io::export_coverage_schedule(buf, coverage, &skills.patterns, &week)
        })?;
    }

    if stage.runs_campers() {
        let campers = io::import_camper_choices_csv(store.path(io::CAMPER_CHOICES_FILE))?;
        let outcome = scheduler.enroll_campers(&campers);
        run_dir.write_with(storage::CAMPER_ASSIGNMENTS, |buf| {
            io::export_camper_assignments(buf, outcome)
        })?;
        run_dir.write_with(storage::SKILLS_NOT_RUN, |buf| {
            io::export_inactive_classes(buf, outcome)
        })?;
        run_dir.write_with(storage::CAMPER_UNASSIGNED, |buf| {
            io::export_camper_unassigned(buf, outcome)
        })?;
    }

    let violations = scheduler.audit();
    for v in &violations {
        tracing::warn!(violation = %v, "audit");
    }
    Ok(violations)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locations_with_persisted_results_skips_time_off() {
        assert!(Stage::Locations.runs_time_off(false));
        assert!(!Stage::Locations.runs_time_off(true));
        assert!(Stage::Full.runs_time_off(true));
        assert!(!Stage::Campers.needs_staff());
    }
}
