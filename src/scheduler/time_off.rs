use super::types::{
    AllocOptions, OffLeg, Provenance, TimeOffAssignment, TimeOffLogEntry, TimeOffOutcome,
};
use super::util::{self, WeekCalendar};
use crate::model::{BlackoutWindow, Person, PersonId, StaffRoster, TimeOffRequest};
use chrono::NaiveDate;
use rand::seq::IndexedRandom;
use rand::Rng;
use std::collections::{HashMap, HashSet};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Leg {
    Day,
    Night,
}

impl fmt::Display for Leg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Leg::Day => "day off",
            Leg::Night => "night off",
        })
    }
}

/// Pourquoi aucune option préférée n'a pu être retenue pour une jambe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LegFailure {
    NoOptions,
    AllBlackout,
    NoSlots,
    Consecutive,
    PartnerHolds,
}

impl fmt::Display for LegFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LegFailure::NoOptions => "no preferred dates given",
            LegFailure::AllBlackout => "all preferred dates in blackout periods",
            LegFailure::NoSlots => "no available slots",
            LegFailure::Consecutive => "would be consecutive to day off",
            LegFailure::PartnerHolds => "coverage partner already holds the preferred date",
        })
    }
}

/// Occupation des dates, par catégorie.
#[derive(Debug, Default)]
struct SlotBook {
    day: HashMap<NaiveDate, usize>,
    night: HashMap<NaiveDate, usize>,
    day_of: HashMap<PersonId, NaiveDate>,
    night_of: HashMap<PersonId, NaiveDate>,
}

impl SlotBook {
    fn usage(&self, leg: Leg, date: NaiveDate) -> usize {
        let map = match leg {
            Leg::Day => &self.day,
            Leg::Night => &self.night,
        };
        map.get(&date).copied().unwrap_or(0)
    }

    fn holder_date(&self, leg: Leg, person: &PersonId) -> Option<NaiveDate> {
        match leg {
            Leg::Day => self.day_of.get(person).copied(),
            Leg::Night => self.night_of.get(person).copied(),
        }
    }

    fn book(&mut self, leg: Leg, person: &PersonId, date: NaiveDate) {
        let (usage, holders) = match leg {
            Leg::Day => (&mut self.day, &mut self.day_of),
            Leg::Night => (&mut self.night, &mut self.night_of),
        };
        *usage.entry(date).or_insert(0) += 1;
        holders.insert(person.clone(), date);
    }
}

struct Allocator<'a> {
    blackouts: &'a [BlackoutWindow],
    opts: &'a AllocOptions,
    max_per_slot: usize,
    book: SlotBook,
}

impl<'a> Allocator<'a> {
    fn is_valid(&self, date: NaiveDate) -> bool {
        !util::in_blackout(date, self.blackouts, self.opts.blackout_buffer_days)
    }

    /// Dates du formulaire hors blackout ; une date illisible compte comme
    /// blackout.
    fn valid_options(&self, raw: &[String]) -> Result<Vec<NaiveDate>, LegFailure> {
        let given: Vec<&String> = raw.iter().filter(|r| !r.trim().is_empty()).collect();
        if given.is_empty() {
            return Err(LegFailure::NoOptions);
        }
        let valid: Vec<NaiveDate> = given
            .into_iter()
            .filter_map(|r| util::parse_form_date(r))
            .filter(|d| self.is_valid(*d))
            .collect();
        if valid.is_empty() {
            Err(LegFailure::AllBlackout)
        } else {
            Ok(valid)
        }
    }

    fn pick_preferred(
        &self,
        leg: Leg,
        options: &[NaiveDate],
        day_off: Option<NaiveDate>,
        partner: Option<&PersonId>,
    ) -> Result<NaiveDate, LegFailure> {
        let mut failure = LegFailure::NoSlots;
        for &date in options {
            if self.book.usage(leg, date) >= self.max_per_slot {
                continue;
            }
            if leg == Leg::Night && day_off.is_some_and(|d| util::adjacent(d, date)) {
                if failure == LegFailure::NoSlots {
                    failure = LegFailure::Consecutive;
                }
                continue;
            }
            if let Some(partner) = partner {
                if self.book.holder_date(leg, partner) == Some(date) {
                    failure = LegFailure::PartnerHolds;
                    continue;
                }
            }
            return Ok(date);
        }
        Err(failure)
    }

    fn pick_automatic<R: Rng>(
        &self,
        leg: Leg,
        week: &WeekCalendar,
        day_off: Option<NaiveDate>,
        rng: &mut R,
    ) -> Option<NaiveDate> {
        let pool: Vec<NaiveDate> = week
            .all_dates()
            .into_iter()
            .filter(|d| self.is_valid(*d))
            .filter(|d| self.book.usage(leg, *d) < self.max_per_slot)
            .filter(|d| leg == Leg::Day || !day_off.is_some_and(|off| util::adjacent(off, *d)))
            .collect();
        pool.choose(rng).copied()
    }

    /// Résout une jambe : préférences strictes, puis sans la règle du
    /// partenaire, puis tirage automatique.
    fn resolve_leg<R: Rng>(
        &self,
        leg: Leg,
        raw: &[String],
        day_off: Option<NaiveDate>,
        partner: Option<&PersonId>,
        week: &WeekCalendar,
        rng: &mut R,
    ) -> (OffLeg, Option<LegFailure>) {
        let options = match self.valid_options(raw) {
            Ok(options) => options,
            Err(failure) => {
                let leg = self.fallback(leg, week, day_off, rng);
                return (leg, Some(failure));
            }
        };
        match self.pick_preferred(leg, &options, day_off, partner) {
            Ok(date) => (OffLeg::granted(date, Provenance::Preferred), None),
            Err(failure) => {
                if partner.is_some() {
                    if let Ok(date) = self.pick_preferred(leg, &options, day_off, None) {
                        return (
                            OffLeg::granted(date, Provenance::PartnerRelaxed),
                            Some(failure),
                        );
                    }
                }
                (self.fallback(leg, week, day_off, rng), Some(failure))
            }
        }
    }

    fn fallback<R: Rng>(
        &self,
        leg: Leg,
        week: &WeekCalendar,
        day_off: Option<NaiveDate>,
        rng: &mut R,
    ) -> OffLeg {
        if !self.opts.auto_fallback {
            return OffLeg::unassigned();
        }
        match self.pick_automatic(leg, week, day_off, rng) {
            Some(date) => OffLeg::granted(date, Provenance::Automatic),
            None => OffLeg::unassigned(),
        }
    }
}

fn describe(day: Option<LegFailure>, night: Option<LegFailure>) -> Option<String> {
    match (day, night) {
        (None, None) => None,
        (Some(d), Some(n)) if d == n => Some(d.to_string()),
        (Some(d), None) => Some(format!("{}: {d}", Leg::Day)),
        (None, Some(n)) => Some(format!("{}: {n}", Leg::Night)),
        (Some(d), Some(n)) => Some(format!("{}: {d}; {}: {n}", Leg::Day, Leg::Night)),
    }
}

fn log_entry(request: &TimeOffRequest, person: Option<&Person>, reason: String) -> TimeOffLogEntry {
    TimeOffLogEntry {
        staff_ref: person
            .map(|p| p.id.as_str().to_string())
            .unwrap_or_else(|| request.staff_ref.clone()),
        name: request.name.clone(),
        email: request.email.clone(),
        day_off: OffLeg::unassigned(),
        night_off: OffLeg::unassigned(),
        reason,
    }
}

/// Attribue un jour et une nuit de congé par demande, dans l'ordre de lecture.
///
/// Une seule affectation par personne ; les demandes inconnues ou en double
/// sont ignorées et journalisées. Un échec n'est jamais fatal.
pub fn allocate_time_off<R: Rng>(
    roster: &StaffRoster,
    requests: &[TimeOffRequest],
    blackouts: &[BlackoutWindow],
    week: &WeekCalendar,
    opts: &AllocOptions,
    rng: &mut R,
) -> TimeOffOutcome {
    let max_per_slot = opts.max_per_slot(roster.len());
    let mut alloc = Allocator {
        blackouts,
        opts,
        max_per_slot,
        book: SlotBook::default(),
    };
    let mut outcome = TimeOffOutcome {
        max_per_slot,
        ..TimeOffOutcome::default()
    };
    let mut seen: HashSet<PersonId> = HashSet::new();

    tracing::info!(
        requests = requests.len(),
        staff = roster.len(),
        max_per_slot,
        "allocating time off"
    );

    for request in requests {
        let Some(person) = roster.resolve(&request.staff_ref, &request.email, opts.identity) else {
            tracing::warn!(reference = %request.staff_ref, "time-off request for unknown staff member");
            outcome
                .unassigned
                .push(log_entry(request, None, "unknown staff member".into()));
            continue;
        };
        if !seen.insert(person.id.clone()) {
            tracing::warn!(id = %person.id, "duplicate time-off request ignored");
            outcome
                .unassigned
                .push(log_entry(request, Some(person), "duplicate request".into()));
            continue;
        }

        let partner = person
            .coverage_partner
            .as_ref()
            .filter(|p| **p != person.id);

        let (day_off, day_failure) =
            alloc.resolve_leg(Leg::Day, &request.day_options, None, partner, week, rng);
        if let Some(date) = day_off.date {
            alloc.book.book(Leg::Day, &person.id, date);
        }
        let (night_off, night_failure) = alloc.resolve_leg(
            Leg::Night,
            &request.night_options,
            day_off.date,
            partner,
            week,
            rng,
        );
        if let Some(date) = night_off.date {
            alloc.book.book(Leg::Night, &person.id, date);
        }

        if let Some(reason) = describe(day_failure, night_failure) {
            tracing::debug!(id = %person.id, %reason, "time-off preference not honoured");
            let mut entry = log_entry(request, Some(person), reason);
            entry.day_off = day_off;
            entry.night_off = night_off;
            outcome.unassigned.push(entry);
        }

        outcome.assignments.push(TimeOffAssignment {
            staff: person.id.clone(),
            name: person.name.clone(),
            email: if person.email.is_empty() {
                request.email.clone()
            } else {
                person.email.clone()
            },
            day_off,
            night_off,
            notes: request.notes.clone(),
        });
    }

    tracing::info!(
        assigned = outcome.assignments.len(),
        logged = outcome.unassigned.len(),
        "time off allocated"
    );
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 7, day).unwrap()
    }

    fn request(id: &str, days: [&str; 2], nights: [&str; 2]) -> TimeOffRequest {
        TimeOffRequest {
            staff_ref: id.into(),
            name: format!("Staff {id}"),
            day_options: days.iter().map(|s| s.to_string()).collect(),
            night_options: nights.iter().map(|s| s.to_string()).collect(),
            ..TimeOffRequest::default()
        }
    }

    fn roster(n: usize) -> StaffRoster {
        StaffRoster::new(
            (0..n)
                .map(|i| Person::new(i.to_string(), format!("Staff {i}")))
                .collect(),
        )
    }

    #[test]
    fn night_adjacent_to_day_is_skipped() {
        let roster = roster(4);
        let reqs = vec![request("0", ["08/07/2025", ""], ["09/07/2025", "11/07/2025"])];
        let week = WeekCalendar::new(d(7));
        let mut rng = StdRng::seed_from_u64(1);
        let out = allocate_time_off(&roster, &reqs, &[], &week, &AllocOptions::default(), &mut rng);
        let a = &out.assignments[0];
        assert_eq!(a.day_off.date, Some(d(8)));
        assert_eq!(a.night_off.date, Some(d(11)));
        assert_eq!(a.night_off.provenance, Provenance::Preferred);
        assert!(out.unassigned.is_empty());
    }

    #[test]
    fn blackout_only_options_fall_back_to_week() {
        let roster = roster(4);
        let blackout = BlackoutWindow::new("Visiting day", d(9), d(9)).unwrap();
        let reqs = vec![request("0", ["09/07/2025", "10/07/2025"], ["garbage", ""])];
        let week = WeekCalendar::new(d(7));
        let mut rng = StdRng::seed_from_u64(3);
        let out = allocate_time_off(
            &roster,
            &reqs,
            &[blackout.clone()],
            &week,
            &AllocOptions::default(),
            &mut rng,
        );
        let a = &out.assignments[0];
        assert_eq!(a.day_off.provenance, Provenance::Automatic);
        let day = a.day_off.date.unwrap();
        assert!(!blackout.covers(day, 1));
        assert_eq!(out.unassigned.len(), 1);
        assert!(out.unassigned[0]
            .reason
            .contains("all preferred dates in blackout periods"));
    }

    #[test]
    fn unknown_and_duplicate_requests_are_logged() {
        let roster = roster(2);
        let reqs = vec![
            request("0", ["07/07/2025", ""], ["12/07/2025", ""]),
            request("0", ["08/07/2025", ""], ["12/07/2025", ""]),
            request("nobody", ["08/07/2025", ""], ["12/07/2025", ""]),
        ];
        let week = WeekCalendar::new(d(7));
        let mut rng = StdRng::seed_from_u64(3);
        let out = allocate_time_off(&roster, &reqs, &[], &week, &AllocOptions::default(), &mut rng);
        assert_eq!(out.assignments.len(), 1);
        let reasons: Vec<&str> = out.unassigned.iter().map(|e| e.reason.as_str()).collect();
        assert_eq!(reasons, vec!["duplicate request", "unknown staff member"]);
    }

    #[test]
    fn no_fallback_leaves_leg_unassigned() {
        let roster = roster(1);
        let reqs = vec![
            request("0", ["07/07/2025", ""], ["10/07/2025", ""]),
        ];
        let opts = AllocOptions {
            auto_fallback: false,
            ..AllocOptions::default()
        };
        let blackout = BlackoutWindow::new("Trip", d(7), d(7)).unwrap();
        let week = WeekCalendar::new(d(7));
        let mut rng = StdRng::seed_from_u64(3);
        let out = allocate_time_off(&roster, &reqs, &[blackout], &week, &opts, &mut rng);
        assert_eq!(out.assignments[0].day_off, OffLeg::unassigned());
        assert_eq!(out.assignments[0].night_off.date, Some(d(10)));
    }
}
