use super::fairness::FairnessTracker;
use super::types::{AllocOptions, DaySchedule, LocationOutcome};
use super::util::WeekCalendar;
use crate::config::LocationConfig;
use crate::model::{Certification, PersonId, StaffRoster};
use chrono::{Datelike, Duration, NaiveDate, Weekday};
use std::collections::{BTreeMap, HashSet};

/// Staff absent le jour `day` : un jour de congé écarte la personne
/// du temps libre du lendemain.
fn unavailable_on(
    roster: &StaffRoster,
    day_offs: &BTreeMap<PersonId, NaiveDate>,
    day: Weekday,
) -> HashSet<PersonId> {
    day_offs
        .iter()
        .filter(|(id, _)| roster.contains(id))
        .filter(|(_, off)| (**off + Duration::days(1)).weekday() == day)
        .map(|(id, _)| id.clone())
        .collect()
}

struct DayPlanner<'a> {
    roster: &'a StaffRoster,
    unavailable: HashSet<PersonId>,
    assigned: HashSet<PersonId>,
    schedule: DaySchedule,
}

impl<'a> DayPlanner<'a> {
    fn is_free(&self, id: &PersonId) -> bool {
        !self.unavailable.contains(id) && !self.assigned.contains(id)
    }

    fn place(&mut self, location: &str, id: &PersonId, fairness: &mut FairnessTracker) {
        self.schedule.push(location, id.clone());
        self.assigned.insert(id.clone());
        fairness.record(id);
    }

    fn lifeguard_pool(&self) -> Vec<&'a PersonId> {
        let roster = self.roster;
        roster
            .certified(Certification::Lifeguard)
            .map(|p| &p.id)
            .filter(|id| !self.unavailable.contains(*id))
            .collect()
    }
}

/// Affecte le staff aux lieux de temps libre pour chaque jour ouvré.
///
/// Ordre par jour : coordinateurs, minimum de sauveteurs, autres lieux
/// (le moins sollicité d'abord), complément de sauveteurs, puis `Off`.
pub fn staff_locations(
    roster: &StaffRoster,
    day_offs: &BTreeMap<PersonId, NaiveDate>,
    config: &LocationConfig,
    week: &WeekCalendar,
    opts: &AllocOptions,
    fairness: &mut FairnessTracker,
) -> LocationOutcome {
    let lifeguard = config.lifeguard_location.as_str();
    let mut outcome = LocationOutcome::default();

    for (weekday, date) in week.working_days() {
        let mut planner = DayPlanner {
            roster,
            unavailable: unavailable_on(roster, day_offs, weekday),
            assigned: HashSet::new(),
            schedule: DaySchedule::new(weekday, date),
        };

        // coordinateurs
        for location in config.locations.iter().filter(|l| l.is_open_on(weekday)) {
            let chosen = location
                .coordinators
                .iter()
                .find(|id| roster.contains(id) && planner.is_free(id));
            if let Some(id) = chosen {
                planner.place(&location.name, id, fairness);
            }
        }

        // minimum de sauveteurs
        let pool = planner.lifeguard_pool();
        for id in fairness.rank(pool.iter().copied()) {
            if planner.schedule.staff_at(lifeguard).len() >= opts.lifeguard_min {
                break;
            }
            if planner.is_free(id) {
                planner.place(lifeguard, id, fairness);
            }
        }
        if planner.schedule.staff_at(lifeguard).len() < opts.lifeguard_min {
            tracing::warn!(
                day = %weekday,
                found = planner.schedule.staff_at(lifeguard).len(),
                "not enough lifeguards available"
            );
        }

        for location in &config.locations {
            if location.name == lifeguard
                || planner.schedule.is_filled(&location.name)
                || !location.is_open_on(weekday)
            {
                continue;
            }
            let candidates = roster
                .iter()
                .filter(|p| location.admits(p) && planner.is_free(&p.id))
                .map(|p| &p.id);
            match fairness.least_used(candidates) {
                Some(id) => planner.place(&location.name, id, fairness),
                None => {
                    tracing::warn!(day = %weekday, location = %location.name, "no eligible staff");
                    planner.schedule.unstaffed.push(location.name.clone());
                }
            }
        }

        // complément de sauveteurs quand le reste est couvert
        let threshold = config.locations.len().saturating_sub(2);
        if planner.schedule.filled_count() >= threshold {
            while planner.schedule.staff_at(lifeguard).len() < opts.lifeguard_max {
                let extra = pool.iter().copied().filter(|id| planner.is_free(id));
                let Some(id) = fairness.least_used(extra) else {
                    break;
                };
                planner.place(lifeguard, id, fairness);
            }
        }

        // le reste est "Off", et compte quand même pour l'équité
        let leftover: Vec<&PersonId> = roster.ids().filter(|id| planner.is_free(id)).collect();
        for id in leftover {
            planner.schedule.off.push(id.clone());
            planner.assigned.insert(id.clone());
            fairness.record(id);
        }

        planner.schedule.unavailable = roster
            .ids()
            .filter(|id| planner.unavailable.contains(*id))
            .cloned()
            .collect();

        tracing::debug!(
            day = %weekday,
            staffed = planner.schedule.filled_count(),
            off = planner.schedule.off.len(),
            away = planner.schedule.unavailable.len(),
            "freetime day planned"
        );
        outcome.days.push(planner.schedule);
    }

    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ActivityLocation, Person};

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 7, day).unwrap()
    }

    fn config() -> LocationConfig {
        let mut archery = ActivityLocation::new("Archery");
        archery.certification = Some(Certification::Archery);
        archery.closed_days = vec![Weekday::Tue, Weekday::Thu];
        let mut chippe = ActivityLocation::new("Chippe");
        chippe.department = Some("Chippe".into());
        let mut waterfront = ActivityLocation::new("Canteen");
        waterfront.coordinators = vec![PersonId::new("9"), PersonId::new("0")];
        LocationConfig {
            lifeguard_location: "Lifeguard".into(),
            locations: vec![
                ActivityLocation::new("Lifeguard"),
                waterfront,
                archery,
                chippe,
            ],
        }
    }

    fn roster() -> StaffRoster {
        let mut people = Vec::new();
        for i in 0..8 {
            let mut p = Person::new(i.to_string(), format!("S{i}"));
            if i < 6 {
                p = p.with_certification(Certification::Lifeguard);
            }
            if i == 7 {
                p = p.with_certification(Certification::Archery).with_department("Chippe");
            }
            people.push(p);
        }
        StaffRoster::new(people)
    }

    #[test]
    fn each_staff_appears_once_per_day() {
        let roster = roster();
        let mut day_offs = BTreeMap::new();
        // day off Sunday 06/07 → away Monday
        day_offs.insert(PersonId::new("1"), d(6));
        let mut fairness = FairnessTracker::new();
        let out = staff_locations(
            &roster,
            &day_offs,
            &config(),
            &WeekCalendar::new(d(7)),
            &AllocOptions::default(),
            &mut fairness,
        );
        assert_eq!(out.days.len(), 5);
        for day in &out.days {
            let mut seen = HashSet::new();
            for (_, id) in day.buckets() {
                assert!(seen.insert(id.clone()), "{id} twice on {}", day.weekday);
            }
            for id in &day.unavailable {
                assert!(!seen.contains(id));
            }
        }
        let monday = &out.days[0];
        assert_eq!(monday.unavailable, vec![PersonId::new("1")]);
        assert_eq!(monday.staff_at("Canteen"), &[PersonId::new("0")]);
        assert!(monday.staff_at("Lifeguard").len() >= 3);
        assert_eq!(monday.staff_at("Archery"), &[PersonId::new("7")]);
        // the only Chippe member is already at archery
        assert!(monday.unstaffed.contains(&"Chippe".to_string()));

        let tuesday = &out.days[1];
        assert!(!tuesday.is_filled("Archery"));
        assert_eq!(tuesday.staff_at("Chippe"), &[PersonId::new("7")]);
        // everyone counted every day, including Off
        assert_eq!(fairness.total(), 8 * 5 - 1);
    }

    /// Sauveteur + quatre lieux, dont `restricted` réservés à une
    /// certification que personne n'a.
    fn lifeguard_week(restricted: usize) -> Vec<DaySchedule> {
        let mut locations = vec![ActivityLocation::new("Lifeguard")];
        for (i, name) in ["A", "B", "C", "D"].into_iter().enumerate() {
            let mut location = ActivityLocation::new(name);
            if i < restricted {
                location.certification = Some(Certification::Archery);
            }
            locations.push(location);
        }
        let config = LocationConfig {
            lifeguard_location: "Lifeguard".into(),
            locations,
        };
        let roster = StaffRoster::new(
            (0..10)
                .map(|i| Person::new(i.to_string(), format!("S{i}")).with_certification(Certification::Lifeguard))
                .collect(),
        );
        staff_locations(
            &roster,
            &BTreeMap::new(),
            &config,
            &WeekCalendar::new(d(7)),
            &AllocOptions::default(),
            &mut FairnessTracker::new(),
        )
        .days
    }

    #[test]
    fn lifeguards_topped_up_to_max_once_locations_are_covered() {
        // 5 lieux, seuil 3 : tout est couvert
        for day in lifeguard_week(0) {
            assert_eq!(day.staff_at("Lifeguard").len(), 5, "{}", day.weekday);
            assert_eq!(day.off.len(), 1);
        }
        // seuil tout juste atteint : Lifeguard + C + D
        for day in lifeguard_week(2) {
            assert_eq!(day.filled_count(), 3);
            assert_eq!(day.staff_at("Lifeguard").len(), 5, "{}", day.weekday);
            assert_eq!(day.off.len(), 3);
        }
    }

    #[test]
    fn lifeguards_stay_at_min_below_the_gate() {
        for day in lifeguard_week(3) {
            assert_eq!(day.filled_count(), 2);
            assert_eq!(day.staff_at("Lifeguard").len(), 3, "{}", day.weekday);
            assert_eq!(day.unstaffed, vec!["A".to_string(), "B".to_string(), "C".to_string()]);
            assert_eq!(day.off.len(), 6);
        }
    }
}
