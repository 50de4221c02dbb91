use crate::model::{CamperId, IdentityPolicy, PersonId, Period, StaffWeeklyPattern};
use chrono::{NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use thiserror::Error;

/// Options d'allocation (`settings.json`, toutes optionnelles)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AllocOptions {
    /// Part du registre autorisée en congé à la même date.
    pub max_slot_ratio: f64,
    pub blackout_buffer_days: u32,
    /// Tire une date valide de la semaine quand aucune préférence ne passe.
    pub auto_fallback: bool,
    pub lifeguard_min: usize,
    pub lifeguard_max: usize,
    pub working_periods: usize,
    pub capacity_multiplier: u32,
    pub viability_multiplier: u32,
    pub seed: Option<u64>,
    pub identity: IdentityPolicy,
}

impl Default for AllocOptions {
    fn default() -> Self {
        Self {
            max_slot_ratio: 0.25,
            blackout_buffer_days: 1,
            auto_fallback: true,
            lifeguard_min: 3,
            lifeguard_max: 5,
            working_periods: 2,
            capacity_multiplier: 8,
            viability_multiplier: 3,
            seed: None,
            identity: IdentityPolicy::IdOrEmail,
        }
    }
}

impl AllocOptions {
    pub fn validate(&self) -> Result<(), SchedError> {
        if !(self.max_slot_ratio > 0.0 && self.max_slot_ratio <= 1.0) {
            return Err(SchedError::InvalidConfig(
                "max_slot_ratio must be in (0, 1]".into(),
            ));
        }
        if self.lifeguard_min > self.lifeguard_max {
            return Err(SchedError::InvalidConfig(
                "lifeguard_min must not exceed lifeguard_max".into(),
            ));
        }
        if self.working_periods > Period::ALL.len() {
            return Err(SchedError::InvalidConfig(
                "working_periods must be at most 3".into(),
            ));
        }
        if self.capacity_multiplier == 0 {
            return Err(SchedError::InvalidConfig(
                "capacity_multiplier must be > 0".into(),
            ));
        }
        if self.viability_multiplier > self.capacity_multiplier {
            return Err(SchedError::InvalidConfig(
                "viability_multiplier must not exceed capacity_multiplier".into(),
            ));
        }
        Ok(())
    }

    /// `max(1, floor(staff_count × ratio))`
    pub fn max_per_slot(&self, staff_count: usize) -> usize {
        let cap = (staff_count as f64 * self.max_slot_ratio).floor() as usize;
        cap.max(1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    Preferred,
    /// Option préférée accordée après levée de la règle du partenaire.
    PartnerRelaxed,
    Automatic,
    Unassigned,
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Provenance::Preferred => "preferred",
            Provenance::PartnerRelaxed => "partner-relaxed",
            Provenance::Automatic => "automatic",
            Provenance::Unassigned => "unassigned",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OffLeg {
    pub date: Option<NaiveDate>,
    pub provenance: Provenance,
}

impl OffLeg {
    pub fn granted(date: NaiveDate, provenance: Provenance) -> Self {
        Self {
            date: Some(date),
            provenance,
        }
    }
    pub fn unassigned() -> Self {
        Self {
            date: None,
            provenance: Provenance::Unassigned,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeOffAssignment {
    pub staff: PersonId,
    pub name: String,
    pub email: String,
    pub day_off: OffLeg,
    pub night_off: OffLeg,
    pub notes: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeOffLogEntry {
    /// Identifiant résolu, ou la référence brute du formulaire à défaut.
    pub staff_ref: String,
    pub name: String,
    pub email: String,
    pub day_off: OffLeg,
    pub night_off: OffLeg,
    pub reason: String,
}

#[derive(Debug, Clone, Default)]
pub struct TimeOffOutcome {
    pub assignments: Vec<TimeOffAssignment>,
    pub unassigned: Vec<TimeOffLogEntry>,
    pub max_per_slot: usize,
}

impl TimeOffOutcome {
    pub fn find(&self, staff: &PersonId) -> Option<&TimeOffAssignment> {
        self.assignments.iter().find(|a| &a.staff == staff)
    }

    /// Jour de congé par membre du staff (entrée de l'allocation des lieux).
    pub fn day_offs(&self) -> BTreeMap<PersonId, NaiveDate> {
        self.assignments
            .iter()
            .filter_map(|a| a.day_off.date.map(|d| (a.staff.clone(), d)))
            .collect()
    }

    pub fn day_usage(&self, date: NaiveDate) -> usize {
        self.assignments
            .iter()
            .filter(|a| a.day_off.date == Some(date))
            .count()
    }

    pub fn night_usage(&self, date: NaiveDate) -> usize {
        self.assignments
            .iter()
            .filter(|a| a.night_off.date == Some(date))
            .count()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocationSlot {
    pub location: String,
    pub staff: Vec<PersonId>,
}

/// Planning d'un jour : lieux dans l'ordre d'affectation, puis `Off`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaySchedule {
    pub weekday: Weekday,
    pub date: NaiveDate,
    pub slots: Vec<LocationSlot>,
    pub off: Vec<PersonId>,
    /// Staff absent du jour à cause de son congé.
    pub unavailable: Vec<PersonId>,
    /// Lieux ouverts qu'aucun éligible n'a pu prendre.
    pub unstaffed: Vec<String>,
}

impl DaySchedule {
    pub fn new(weekday: Weekday, date: NaiveDate) -> Self {
        Self {
            weekday,
            date,
            slots: Vec::new(),
            off: Vec::new(),
            unavailable: Vec::new(),
            unstaffed: Vec::new(),
        }
    }

    pub fn staff_at(&self, location: &str) -> &[PersonId] {
        self.slots
            .iter()
            .find(|s| s.location == location)
            .map(|s| s.staff.as_slice())
            .unwrap_or(&[])
    }

    pub fn is_filled(&self, location: &str) -> bool {
        !self.staff_at(location).is_empty()
    }

    pub fn filled_count(&self) -> usize {
        self.slots.iter().filter(|s| !s.staff.is_empty()).count()
    }

    pub(crate) fn push(&mut self, location: &str, staff: PersonId) {
        match self.slots.iter_mut().find(|s| s.location == location) {
            Some(slot) => slot.staff.push(staff),
            None => self.slots.push(LocationSlot {
                location: location.to_string(),
                staff: vec![staff],
            }),
        }
    }

    /// Toutes les affectations du jour, `Off` compris.
    pub fn buckets(&self) -> impl Iterator<Item = (&str, &PersonId)> {
        self.slots
            .iter()
            .flat_map(|s| s.staff.iter().map(move |p| (s.location.as_str(), p)))
            .chain(self.off.iter().map(|p| (OFF_BUCKET, p)))
    }
}

pub const OFF_BUCKET: &str = "Off";
pub const DAY_OFF_BUCKET: &str = "Day Off";

#[derive(Debug, Clone, Default)]
pub struct LocationOutcome {
    pub days: Vec<DaySchedule>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkillsShortfall {
    pub class: String,
    pub period: Period,
    pub missing: u32,
}

#[derive(Debug, Clone, Default)]
pub struct SkillsOutcome {
    /// Un patron par membre du staff, dans l'ordre du registre.
    pub patterns: Vec<StaffWeeklyPattern>,
    pub shortfalls: Vec<SkillsShortfall>,
}

impl SkillsOutcome {
    pub fn pattern(&self, staff: &PersonId) -> Option<&StaffWeeklyPattern> {
        self.patterns.iter().find(|p| &p.staff == staff)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoverageAssignment {
    pub day: Weekday,
    pub period: Period,
    pub replacement: PersonId,
    pub absent: PersonId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoverageGap {
    pub day: Weekday,
    pub period: Period,
    pub absent: PersonId,
}

#[derive(Debug, Clone, Default)]
pub struct CoverageOutcome {
    pub assignments: Vec<CoverageAssignment>,
    pub gaps: Vec<CoverageGap>,
}

impl CoverageOutcome {
    pub fn covering(&self, staff: &PersonId, day: Weekday, period: Period) -> Option<&PersonId> {
        self.assignments
            .iter()
            .find(|a| &a.replacement == staff && a.day == day && a.period == period)
            .map(|a| &a.absent)
    }
}

/// Raison structurée d'un refus d'inscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    UnknownClass,
    NotCamperAssignable,
    NotOfferedInPeriod,
    Inactive,
    Full,
    AlreadyEnrolled,
    PeriodTaken,
    NextPeriodTaken,
    Deactivated,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RejectReason::UnknownClass => "class is not configured",
            RejectReason::NotCamperAssignable => "class is staff-only",
            RejectReason::NotOfferedInPeriod => "class not offered that period",
            RejectReason::Inactive => "class not running that period",
            RejectReason::Full => "class full",
            RejectReason::AlreadyEnrolled => "class already held",
            RejectReason::PeriodTaken => "period already taken",
            RejectReason::NextPeriodTaken => "double period needs the next period free",
            RejectReason::Deactivated => "evicted: class under minimum size",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrollmentIssue {
    pub camper: CamperId,
    /// `None` quand le choix n'a pu être rattaché à aucune période.
    pub period: Option<Period>,
    pub class: String,
    pub reason: RejectReason,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CamperAssignment {
    pub camper: CamperId,
    pub periods: BTreeMap<Period, String>,
}

impl CamperAssignment {
    pub fn is_complete(&self) -> bool {
        self.periods.len() >= Period::ALL.len()
    }
}

#[derive(Debug, Clone, Default)]
pub struct EnrollmentOutcome {
    /// Ordre d'entrée.
    pub assignments: Vec<CamperAssignment>,
    /// `(classe, période de début)` → campeurs, dans l'ordre d'inscription.
    pub rosters: BTreeMap<(String, Period), Vec<CamperId>>,
    pub inactive: BTreeSet<(String, Period)>,
    pub issues: Vec<EnrollmentIssue>,
}

impl EnrollmentOutcome {
    pub fn assignment(&self, camper: &CamperId) -> Option<&CamperAssignment> {
        self.assignments.iter().find(|a| &a.camper == camper)
    }

    pub fn roster(&self, class: &str, period: Period) -> &[CamperId] {
        self.rosters
            .get(&(class.to_string(), period))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn incomplete(&self) -> impl Iterator<Item = &CamperAssignment> {
        self.assignments.iter().filter(|a| !a.is_complete())
    }

    /// Refus expliquant les périodes manquantes d'un campeur.
    pub fn reasons_for<'a>(
        &'a self,
        assignment: &'a CamperAssignment,
    ) -> impl Iterator<Item = &'a EnrollmentIssue> {
        self.issues.iter().filter(move |i| {
            i.camper == assignment.camper
                && i.period.map_or(true, |p| !assignment.periods.contains_key(&p))
        })
    }
}

#[derive(Error, Debug)]
pub enum SchedError {
    #[error("stage `{0}` has not run yet")]
    StageNotRun(&'static str),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
