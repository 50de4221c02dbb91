use super::types::{CoverageAssignment, CoverageGap, CoverageOutcome};
use super::util::WeekCalendar;
use crate::model::{Period, PersonId, StaffWeeklyPattern};
use std::collections::HashSet;

/// Un candidat couvre s'il n'est pas en congé imposé sur la période, ne tient
/// pas de vraie classe et ne couvre pas déjà quelqu'un sur ce créneau.
fn can_cover(candidate: &StaffWeeklyPattern, absent: &PersonId, period: Period) -> bool {
    &candidate.staff != absent
        && !candidate.mandated_off.contains(&period)
        && !candidate.slot(period).is_working()
}

/// Remplace chaque congé imposé, jour par jour, par le premier membre du
/// staff libre dans l'ordre du registre.
pub fn backfill_coverage(patterns: &[StaffWeeklyPattern], week: &WeekCalendar) -> CoverageOutcome {
    let mut outcome = CoverageOutcome::default();

    for (day, _) in week.working_days() {
        for period in Period::ALL {
            let mut busy: HashSet<&PersonId> = HashSet::new();
            for absent in patterns.iter().filter(|p| p.mandated_off.contains(&period)) {
                let replacement = patterns
                    .iter()
                    .find(|c| !busy.contains(&c.staff) && can_cover(c, &absent.staff, period));
                match replacement {
                    Some(cover) => {
                        busy.insert(&cover.staff);
                        outcome.assignments.push(CoverageAssignment {
                            day,
                            period,
                            replacement: cover.staff.clone(),
                            absent: absent.staff.clone(),
                        });
                    }
                    None => {
                        tracing::warn!(
                            absent = %absent.staff,
                            day = %day,
                            %period,
                            "no available staff to cover"
                        );
                        outcome.gaps.push(CoverageGap {
                            day,
                            period,
                            absent: absent.staff.clone(),
                        });
                    }
                }
            }
        }
    }

    tracing::info!(
        covered = outcome.assignments.len(),
        gaps = outcome.gaps.len(),
        "coverage backfilled"
    );
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Role, SlotAssignment};
    use chrono::{NaiveDate, Weekday};

    fn pattern(id: &str, slots: [SlotAssignment; 3], mandated: Vec<Period>) -> StaffWeeklyPattern {
        StaffWeeklyPattern {
            staff: PersonId::new(id),
            slots,
            mandated_off: mandated,
        }
    }

    fn working(class: &str) -> SlotAssignment {
        SlotAssignment::Working {
            class: class.into(),
            role: Role::Assistant,
        }
    }

    #[test]
    fn first_idle_staff_covers_and_gaps_are_kept() {
        use SlotAssignment::{Help, Off};
        let patterns = vec![
            pattern("a", [Off, working("Tennis"), working("Soccer")], vec![Period::P1]),
            pattern("b", [Off, working("Tennis"), working("Soccer")], vec![Period::P1]),
            pattern("c", [working("DnD"), Off, Help], vec![]),
            pattern("d", [Help, working("DnD"), Off], vec![]),
        ];
        let week = WeekCalendar::new(NaiveDate::from_ymd_opt(2025, 7, 7).unwrap());
        let out = backfill_coverage(&patterns, &week);

        // only "d" is idle in period 1, so "b" is left uncovered every day
        assert_eq!(out.assignments.len(), 5);
        assert_eq!(out.gaps.len(), 5);
        assert_eq!(
            out.covering(&PersonId::new("d"), Weekday::Wed, Period::P1),
            Some(&PersonId::new("a"))
        );
        assert!(out.gaps.iter().all(|g| g.absent == PersonId::new("b")));
    }
}
