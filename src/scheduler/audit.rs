use super::types::{
    AllocOptions, CoverageOutcome, EnrollmentOutcome, LocationOutcome, SkillsOutcome, TimeOffOutcome,
};
use super::{util, Scheduler, Violation, ViolationKind};
use crate::model::{Period, SkillClass};
use chrono::NaiveDate;
use std::collections::{HashMap, HashSet};

fn violation(kind: ViolationKind, subject: impl Into<String>, detail: impl Into<String>) -> Violation {
    Violation {
        kind,
        subject: subject.into(),
        detail: detail.into(),
    }
}

pub(super) fn detect_violations(scheduler: &Scheduler) -> Vec<Violation> {
    let classes = &scheduler.config().classes;
    let mut out = Vec::new();
    if let Some(time_off) = scheduler.time_off() {
        check_time_off(time_off, &mut out);
    }
    if let Some(locations) = scheduler.locations() {
        check_locations(locations, &mut out);
    }
    if let Some(skills) = scheduler.skills() {
        check_skills(skills, classes, &mut out);
    }
    if let Some(coverage) = scheduler.coverage() {
        check_coverage(coverage, &mut out);
    }
    if let Some(enrollment) = scheduler.enrollment() {
        check_enrollment(enrollment, classes, scheduler.options(), &mut out);
    }
    out
}

fn check_time_off(outcome: &TimeOffOutcome, out: &mut Vec<Violation>) {
    let mut day_usage: HashMap<NaiveDate, usize> = HashMap::new();
    let mut night_usage: HashMap<NaiveDate, usize> = HashMap::new();

    for a in &outcome.assignments {
        if let (Some(day), Some(night)) = (a.day_off.date, a.night_off.date) {
            if util::adjacent(day, night) {
                out.push(violation(
                    ViolationKind::AdjacentTimeOff,
                    a.staff.as_str(),
                    format!("day off {day} next to night off {night}"),
                ));
            }
        }
        if let Some(day) = a.day_off.date {
            *day_usage.entry(day).or_insert(0) += 1;
        }
        if let Some(night) = a.night_off.date {
            *night_usage.entry(night).or_insert(0) += 1;
        }
    }

    for (label, usage) in [("day", &day_usage), ("night", &night_usage)] {
        let mut dates: Vec<_> = usage.iter().collect();
        dates.sort();
        for (date, count) in dates {
            if *count > outcome.max_per_slot {
                out.push(violation(
                    ViolationKind::DateOverCapacity,
                    util::format_form_date(*date),
                    format!("{count} {label} offs, cap {}", outcome.max_per_slot),
                ));
            }
        }
    }
}

fn check_locations(outcome: &LocationOutcome, out: &mut Vec<Violation>) {
    for day in &outcome.days {
        let mut seen = HashSet::new();
        let away: HashSet<_> = day.unavailable.iter().collect();
        for (location, id) in day.buckets() {
            if !seen.insert(id) {
                out.push(violation(
                    ViolationKind::DoubleBooked,
                    id.as_str(),
                    format!("{} twice on {}", location, util::weekday_name(day.weekday)),
                ));
            }
            if away.contains(id) {
                out.push(violation(
                    ViolationKind::DoubleBooked,
                    id.as_str(),
                    format!("{location} while on day off ({})", util::weekday_name(day.weekday)),
                ));
            }
        }
    }
}

/// Périodes tenues par classe, pour vérifier la contiguïté des doubles.
fn periods_by_class<'a, I>(slots: I) -> HashMap<&'a str, Vec<Period>>
where
    I: IntoIterator<Item = (Period, &'a str)>,
{
    let mut held: HashMap<&str, Vec<Period>> = HashMap::new();
    for (period, class) in slots {
        held.entry(class).or_default().push(period);
    }
    held
}

/// Une double se tient sur `[p, p+1]`, ou seule uniquement en période 3.
fn double_is_contiguous(periods: &[Period], allow_lone_last: bool) -> bool {
    match periods {
        [only] => allow_lone_last && *only == Period::P3,
        [a, b] => a.next() == Some(*b),
        _ => false,
    }
}

fn check_skills(outcome: &SkillsOutcome, classes: &[SkillClass], out: &mut Vec<Violation>) {
    let doubles: HashSet<&str> = classes
        .iter()
        .filter(|c| c.double_period)
        .map(|c| c.name.as_str())
        .collect();
    for pattern in &outcome.patterns {
        let allowed = pattern.mandated_off.len().max(1);
        if pattern.off_count() > allowed {
            out.push(violation(
                ViolationKind::OffQuota,
                pattern.staff.as_str(),
                format!("{} OFF periods", pattern.off_count()),
            ));
        }
        let held = periods_by_class(
            Period::ALL
                .iter()
                .filter_map(|p| pattern.slot(*p).class().map(|c| (*p, c))),
        );
        for (class, periods) in held {
            if doubles.contains(class) && !double_is_contiguous(&periods, false) {
                out.push(violation(
                    ViolationKind::SplitDoublePeriod,
                    pattern.staff.as_str(),
                    format!("{class} held in {periods:?}"),
                ));
            } else if !doubles.contains(class) && periods.len() > 1 {
                out.push(violation(
                    ViolationKind::RepeatedClass,
                    pattern.staff.as_str(),
                    format!("{class} held in {} periods", periods.len()),
                ));
            }
        }
    }
}

fn check_coverage(outcome: &CoverageOutcome, out: &mut Vec<Violation>) {
    let mut seen = HashSet::new();
    for a in &outcome.assignments {
        if !seen.insert((&a.replacement, a.day, a.period)) {
            out.push(violation(
                ViolationKind::DuplicateCover,
                a.replacement.as_str(),
                format!("covers twice on {} {}", util::weekday_name(a.day), a.period),
            ));
        }
    }
}

fn check_enrollment(
    outcome: &EnrollmentOutcome,
    classes: &[SkillClass],
    opts: &AllocOptions,
    out: &mut Vec<Violation>,
) {
    let by_name: HashMap<&str, &SkillClass> =
        classes.iter().map(|c| (c.name.as_str(), c)).collect();

    for ((class, period), roster) in &outcome.rosters {
        let Some(config) = by_name.get(class.as_str()) else {
            continue;
        };
        let cap = opts.capacity_multiplier.saturating_mul(config.staff_required) as usize;
        if roster.len() > cap {
            out.push(violation(
                ViolationKind::RosterOverCapacity,
                format!("{class} {period}"),
                format!("{} campers, cap {cap}", roster.len()),
            ));
        }
        let threshold = opts.viability_multiplier.saturating_mul(config.staff_required) as usize;
        if !roster.is_empty() && roster.len() < threshold {
            out.push(violation(
                ViolationKind::BelowViability,
                format!("{class} {period}"),
                format!("{} campers, threshold {threshold}", roster.len()),
            ));
        }
    }
    for (class, period) in &outcome.inactive {
        if !outcome.roster(class, *period).is_empty() {
            out.push(violation(
                ViolationKind::InactiveNotEmpty,
                format!("{class} {period}"),
                "inactive class still has campers",
            ));
        }
    }
    for assignment in &outcome.assignments {
        let held = periods_by_class(assignment.periods.iter().map(|(p, c)| (*p, c.as_str())));
        for (class, periods) in held {
            let double = by_name.get(class).is_some_and(|c| c.double_period);
            if double && !double_is_contiguous(&periods, true) {
                out.push(violation(
                    ViolationKind::SplitDoublePeriod,
                    assignment.camper.as_str(),
                    format!("{class} held in {periods:?}"),
                ));
            } else if !double && periods.len() > 1 {
                out.push(violation(
                    ViolationKind::RepeatedClass,
                    assignment.camper.as_str(),
                    format!("{class} held in {} periods", periods.len()),
                ));
            }
        }
    }
}
