mod audit;
mod coverage;
mod enrollment;
mod fairness;
mod locations;
mod skills;
mod time_off;
mod types;
pub mod util;

pub use coverage::backfill_coverage;
pub use enrollment::enroll_campers;
pub use fairness::FairnessTracker;
pub use locations::staff_locations;
pub use skills::allocate_skills;
pub use time_off::allocate_time_off;
pub use types::{
    AllocOptions, CamperAssignment, CoverageAssignment, CoverageGap, CoverageOutcome, DaySchedule,
    EnrollmentIssue, EnrollmentOutcome, LocationOutcome, LocationSlot, OffLeg, Provenance,
    RejectReason, SchedError, SkillsOutcome, SkillsShortfall, TimeOffAssignment, TimeOffLogEntry,
    TimeOffOutcome, DAY_OFF_BUCKET, OFF_BUCKET,
};
pub use util::WeekCalendar;

use crate::config::CampConfig;
use crate::model::{Camper, PersonId, StaffRoster, TimeOffRequest};
use chrono::NaiveDate;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::BTreeMap;
use std::fmt;

/// Type d'incohérence relevée par l'audit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViolationKind {
    /// Jour et nuit de congé sur deux dates consécutives.
    AdjacentTimeOff,
    DateOverCapacity,
    DoubleBooked,
    OffQuota,
    SplitDoublePeriod,
    /// Classe simple tenue sur plusieurs périodes.
    RepeatedClass,
    RosterOverCapacity,
    /// Effectif non vide mais sous le seuil de viabilité.
    BelowViability,
    InactiveNotEmpty,
    DuplicateCover,
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ViolationKind::AdjacentTimeOff => "adjacent time off",
            ViolationKind::DateOverCapacity => "date over capacity",
            ViolationKind::DoubleBooked => "double booked",
            ViolationKind::OffQuota => "too many OFF periods",
            ViolationKind::SplitDoublePeriod => "split double period",
            ViolationKind::RepeatedClass => "class held twice",
            ViolationKind::RosterOverCapacity => "roster over capacity",
            ViolationKind::BelowViability => "roster below viability",
            ViolationKind::InactiveNotEmpty => "inactive class not empty",
            ViolationKind::DuplicateCover => "duplicate cover",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub kind: ViolationKind,
    pub subject: String,
    pub detail: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} ({})", self.kind, self.subject, self.detail)
    }
}

/// Scheduler : enchaîne les étapes de la semaine et garde leurs résultats.
///
/// Le générateur aléatoire et le suivi d'équité sont portés ici et passés
/// explicitement aux allocateurs.
#[derive(Debug)]
pub struct Scheduler {
    roster: StaffRoster,
    config: CampConfig,
    week: WeekCalendar,
    fairness: FairnessTracker,
    rng: StdRng,
    time_off: Option<TimeOffOutcome>,
    locations: Option<LocationOutcome>,
    skills: Option<SkillsOutcome>,
    coverage: Option<CoverageOutcome>,
    enrollment: Option<EnrollmentOutcome>,
}

impl Scheduler {
    pub fn new(roster: StaffRoster, config: CampConfig, week: WeekCalendar) -> Result<Self, SchedError> {
        config.options.validate()?;
        let rng = match config.options.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Ok(Self {
            roster,
            config,
            week,
            fairness: FairnessTracker::new(),
            rng,
            time_off: None,
            locations: None,
            skills: None,
            coverage: None,
            enrollment: None,
        })
    }

    /// Re-seed le générateur (exécutions reproductibles).
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.config.options.seed = Some(seed);
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn roster(&self) -> &StaffRoster {
        &self.roster
    }
    pub fn config(&self) -> &CampConfig {
        &self.config
    }
    pub fn options(&self) -> &AllocOptions {
        &self.config.options
    }
    pub fn week(&self) -> &WeekCalendar {
        &self.week
    }
    pub fn fairness(&self) -> &FairnessTracker {
        &self.fairness
    }

    pub fn time_off(&self) -> Option<&TimeOffOutcome> {
        self.time_off.as_ref()
    }
    pub fn locations(&self) -> Option<&LocationOutcome> {
        self.locations.as_ref()
    }
    pub fn skills(&self) -> Option<&SkillsOutcome> {
        self.skills.as_ref()
    }
    pub fn coverage(&self) -> Option<&CoverageOutcome> {
        self.coverage.as_ref()
    }
    pub fn enrollment(&self) -> Option<&EnrollmentOutcome> {
        self.enrollment.as_ref()
    }

    pub fn assign_time_off(&mut self, requests: &[TimeOffRequest]) -> &TimeOffOutcome {
        let outcome = allocate_time_off(
            &self.roster,
            requests,
            &self.config.blackouts,
            &self.week,
            &self.config.options,
            &mut self.rng,
        );
        self.time_off.insert(outcome)
    }

    /// Lieux de temps libre à partir des congés de l'étape précédente.
    pub fn staff_locations(&mut self) -> Result<&LocationOutcome, SchedError> {
        let day_offs = self
            .time_off
            .as_ref()
            .ok_or(SchedError::StageNotRun("time-off"))?
            .day_offs();
        Ok(self.staff_locations_with(&day_offs))
    }

    /// Lieux de temps libre à partir de congés fournis (ex. relus d'un CSV).
    pub fn staff_locations_with(&mut self, day_offs: &BTreeMap<PersonId, NaiveDate>) -> &LocationOutcome {
        self.fairness.reset();
        let outcome = staff_locations(
            &self.roster,
            day_offs,
            &self.config.locations,
            &self.week,
            &self.config.options,
            &mut self.fairness,
        );
        self.locations.insert(outcome)
    }

    pub fn assign_skills(&mut self) -> &SkillsOutcome {
        let outcome = allocate_skills(
            &self.roster,
            &self.config.classes,
            &self.config.fixed_off,
            &self.config.options,
        );
        self.coverage = None;
        self.skills.insert(outcome)
    }

    pub fn backfill_coverage(&mut self) -> Result<&CoverageOutcome, SchedError> {
        let skills = self.skills.as_ref().ok_or(SchedError::StageNotRun("skills"))?;
        let outcome = backfill_coverage(&skills.patterns, &self.week);
        Ok(self.coverage.insert(outcome))
    }

    pub fn enroll_campers(&mut self, campers: &[Camper]) -> &EnrollmentOutcome {
        let outcome = enroll_campers(campers, &self.config.classes, &self.config.options);
        self.enrollment.insert(outcome)
    }

    /// Vérifie les invariants des étapes déjà exécutées.
    pub fn audit(&self) -> Vec<Violation> {
        audit::detect_violations(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Person;

    fn scheduler() -> Scheduler {
        let roster = StaffRoster::new(vec![Person::new("1", "Ada"), Person::new("2", "Bo")]);
        let week = WeekCalendar::new(NaiveDate::from_ymd_opt(2025, 7, 7).unwrap());
        Scheduler::new(roster, CampConfig::default(), week)
            .unwrap()
            .with_seed(7)
    }

    #[test]
    fn dependent_stages_require_their_inputs() {
        let mut s = scheduler();
        assert!(matches!(
            s.staff_locations(),
            Err(SchedError::StageNotRun("time-off"))
        ));
        assert!(matches!(
            s.backfill_coverage(),
            Err(SchedError::StageNotRun("skills"))
        ));
        s.assign_time_off(&[]);
        assert!(s.staff_locations().is_ok());
        s.assign_skills();
        assert!(s.backfill_coverage().is_ok());
        assert!(s.audit().is_empty());
    }

    #[test]
    fn invalid_options_are_rejected() {
        let mut config = CampConfig::default();
        config.options.lifeguard_min = 9;
        let week = WeekCalendar::new(NaiveDate::from_ymd_opt(2025, 7, 7).unwrap());
        let err = Scheduler::new(StaffRoster::default(), config, week).unwrap_err();
        assert!(matches!(err, SchedError::InvalidConfig(_)));
    }
}
