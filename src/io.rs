use crate::model::{
    Camper, Certification, Period, Person, PersonId, StaffRoster, StaffWeeklyPattern,
    TimeOffRequest,
};
use crate::scheduler::util::{self, WeekCalendar};
use crate::scheduler::{
    CoverageOutcome, EnrollmentOutcome, LocationOutcome, OffLeg, SkillsOutcome, TimeOffOutcome,
    DAY_OFF_BUCKET,
};
use anyhow::Context;
use chrono::NaiveDateTime;
use csv::{ReaderBuilder, WriterBuilder};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;

pub const ROSTER_FILE: &str = "index.csv";
pub const TIME_OFF_FORM_FILE: &str = "off_times_form.csv";
pub const CAMPER_CHOICES_FILE: &str = "camper_choices.csv";

pub const UNASSIGNED: &str = "Unassigned";

fn is_yes(raw: &str) -> bool {
    raw.trim().eq_ignore_ascii_case("yes")
}

#[derive(Debug, Deserialize)]
struct RosterRow {
    #[serde(default)]
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default, rename = "personal email")]
    email: String,
    #[serde(default)]
    department: String,
    #[serde(default, rename = "coverage partner")]
    partner: String,
    #[serde(default, rename = "lifeguard certification")]
    lifeguard: String,
    #[serde(default, rename = "archery certification")]
    archery: String,
    #[serde(default, rename = "high ropes certification")]
    high_ropes: String,
    #[serde(default, rename = "fishing proficiency")]
    fishing: String,
}

/// Import du registre du staff (`index.csv`). Les lignes sans identifiant
/// sont ignorées.
pub fn import_roster_csv<P: AsRef<Path>>(path: P) -> anyhow::Result<StaffRoster> {
    let path = path.as_ref();
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("opening {}", path.display()))?;
    let mut people = Vec::new();
    for (line, row) in rdr.deserialize::<RosterRow>().enumerate() {
        let row = row.with_context(|| format!("{} row {}", path.display(), line + 2))?;
        if row.id.is_empty() {
            tracing::warn!(row = line + 2, "roster row without id skipped");
            continue;
        }
        let mut person = Person::new(&row.id, row.name)
            .with_email(row.email)
            .with_department(row.department);
        if !row.partner.is_empty() {
            person = person.with_partner(&row.partner);
        }
        for (cert, flag) in [
            (Certification::Lifeguard, &row.lifeguard),
            (Certification::Archery, &row.archery),
            (Certification::HighRopes, &row.high_ropes),
            (Certification::Fishing, &row.fishing),
        ] {
            person.certifications.set(cert, is_yes(flag));
        }
        people.push(person);
    }
    Ok(StaffRoster::new(people))
}

#[derive(Debug, Deserialize)]
struct TimeOffRow {
    #[serde(default)]
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default, rename = "personal email")]
    email: String,
    #[serde(default, rename = "first option day")]
    first_day: String,
    #[serde(default, rename = "second option day")]
    second_day: String,
    #[serde(default, rename = "first option night")]
    first_night: String,
    #[serde(default, rename = "second option night")]
    second_night: String,
    #[serde(default)]
    notes: String,
}

/// Import du formulaire de congés : `id` ou `personal email`, deux options de
/// jour et deux de nuit. Les dates restent brutes.
pub fn import_time_off_csv<P: AsRef<Path>>(path: P) -> anyhow::Result<Vec<TimeOffRequest>> {
    let path = path.as_ref();
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("opening {}", path.display()))?;
    let mut out = Vec::new();
    for (line, row) in rdr.deserialize::<TimeOffRow>().enumerate() {
        let row = row.with_context(|| format!("{} row {}", path.display(), line + 2))?;
        let staff_ref = if row.id.is_empty() {
            row.email.clone()
        } else {
            row.id
        };
        out.push(TimeOffRequest {
            staff_ref,
            name: row.name,
            email: row.email,
            day_options: vec![row.first_day, row.second_day],
            night_options: vec![row.first_night, row.second_night],
            notes: row.notes,
        });
    }
    Ok(out)
}

#[derive(Debug, Deserialize)]
struct CamperRow {
    #[serde(default)]
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    cabin: String,
    #[serde(default)]
    class1: String,
    #[serde(default)]
    class2: String,
    #[serde(default)]
    class3: String,
    #[serde(default)]
    class4: String,
    #[serde(default)]
    class5: String,
    #[serde(default)]
    submission_time: String,
}

fn parse_submission(raw: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M"))
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%d/%m/%Y %H:%M"))
        .ok()
}

/// Import des choix des campeurs : `id,name,cabin,class1..class5,submission_time`
pub fn import_camper_choices_csv<P: AsRef<Path>>(path: P) -> anyhow::Result<Vec<Camper>> {
    let path = path.as_ref();
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("opening {}", path.display()))?;
    let mut out = Vec::new();
    for (line, row) in rdr.deserialize::<CamperRow>().enumerate() {
        let row = row.with_context(|| format!("{} row {}", path.display(), line + 2))?;
        if row.id.is_empty() {
            tracing::warn!(row = line + 2, "camper row without id skipped");
            continue;
        }
        let mut camper = Camper::new(
            &row.id,
            row.name,
            vec![row.class1, row.class2, row.class3, row.class4, row.class5],
        );
        camper.cabin = row.cabin;
        camper.submitted_at = parse_submission(&row.submission_time);
        out.push(camper);
    }
    Ok(out)
}

#[derive(Debug, Deserialize)]
struct DayOffRow {
    #[serde(default)]
    id: String,
    #[serde(default)]
    day_off: String,
}

/// Relit `day_off_results.csv` : jour de congé par membre du staff. Les lignes
/// `Unassigned` ou illisibles sont ignorées.
pub fn import_day_off_results_csv<P: AsRef<Path>>(
    path: P,
) -> anyhow::Result<BTreeMap<PersonId, chrono::NaiveDate>> {
    let path = path.as_ref();
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("opening {}", path.display()))?;
    let mut out = BTreeMap::new();
    for row in rdr.deserialize::<DayOffRow>() {
        let row = row.with_context(|| format!("reading {}", path.display()))?;
        if row.id.is_empty() {
            continue;
        }
        match util::parse_form_date(&row.day_off) {
            Some(date) => {
                out.insert(PersonId::new(&row.id), date);
            }
            None => tracing::debug!(id = %row.id, value = %row.day_off, "no usable day off"),
        }
    }
    Ok(out)
}

fn leg_date(leg: &OffLeg) -> String {
    leg.date
        .map(util::format_form_date)
        .unwrap_or_else(|| UNASSIGNED.to_string())
}

/// `id,name,email,day_off,night_off,day_source,night_source,notes`
pub fn export_time_off_results<W: Write>(out: W, outcome: &TimeOffOutcome) -> anyhow::Result<()> {
    let mut w = WriterBuilder::new().has_headers(true).from_writer(out);
    w.write_record([
        "id",
        "name",
        "email",
        "day_off",
        "night_off",
        "day_source",
        "night_source",
        "notes",
    ])?;
    for a in &outcome.assignments {
        w.write_record([
            a.staff.as_str(),
            a.name.as_str(),
            a.email.as_str(),
            leg_date(&a.day_off).as_str(),
            leg_date(&a.night_off).as_str(),
            a.day_off.provenance.to_string().as_str(),
            a.night_off.provenance.to_string().as_str(),
            a.notes.as_str(),
        ])?;
    }
    w.flush()?;
    Ok(())
}

/// `id,name,email,day_off,night_off,reason`
pub fn export_time_off_unassigned<W: Write>(out: W, outcome: &TimeOffOutcome) -> anyhow::Result<()> {
    let mut w = WriterBuilder::new().has_headers(true).from_writer(out);
    w.write_record(["id", "name", "email", "day_off", "night_off", "reason"])?;
    for e in &outcome.unassigned {
        w.write_record([
            e.staff_ref.as_str(),
            e.name.as_str(),
            e.email.as_str(),
            leg_date(&e.day_off).as_str(),
            leg_date(&e.night_off).as_str(),
            e.reason.as_str(),
        ])?;
    }
    w.flush()?;
    Ok(())
}

/// Une ligne par occupant : lieux, puis `Off`, puis `Day Off`.
pub fn export_freetime_schedule<W: Write>(out: W, outcome: &LocationOutcome) -> anyhow::Result<()> {
    let mut w = WriterBuilder::new().has_headers(true).from_writer(out);
    w.write_record(["Day", "Date", "Location", "Assigned_Staff_ID"])?;
    for day in &outcome.days {
        let name = util::weekday_name(day.weekday);
        let date = util::format_form_date(day.date);
        for (location, id) in day.buckets() {
            w.write_record([name, date.as_str(), location, id.as_str()])?;
        }
        for id in &day.unavailable {
            w.write_record([name, date.as_str(), DAY_OFF_BUCKET, id.as_str()])?;
        }
    }
    w.flush()?;
    Ok(())
}

fn grid_header(week: &WeekCalendar) -> Vec<String> {
    let mut header = vec!["id".to_string()];
    for (day, _) in week.working_days() {
        for period in Period::ALL {
            header.push(format!("{} {}", util::weekday_name(day), period));
        }
    }
    header
}

/// Grille `id × (jour, période)` ; le modèle est répété sur les 5 jours.
pub fn export_skills_schedule<W: Write>(
    out: W,
    outcome: &SkillsOutcome,
    week: &WeekCalendar,
) -> anyhow::Result<()> {
    let mut w = WriterBuilder::new().has_headers(true).from_writer(out);
    w.write_record(grid_header(week))?;
    let days = week.working_days().len();
    for pattern in &outcome.patterns {
        let mut row = vec![pattern.staff.as_str().to_string()];
        for _ in 0..days {
            row.extend(pattern.slots.iter().map(ToString::to_string));
        }
        w.write_record(&row)?;
    }
    w.flush()?;
    Ok(())
}

fn help_periods(pattern: &StaffWeeklyPattern) -> impl Iterator<Item = Period> + '_ {
    Period::ALL
        .into_iter()
        .filter(|p| *pattern.slot(*p) == crate::model::SlotAssignment::Help)
}

/// `Class,Period,Staff_ID,Reason` : effectifs manquants puis créneaux `Help`.
pub fn export_skills_unassigned<W: Write>(out: W, outcome: &SkillsOutcome) -> anyhow::Result<()> {
    let mut w = WriterBuilder::new().has_headers(true).from_writer(out);
    w.write_record(["Class", "Period", "Staff_ID", "Reason"])?;
    for s in &outcome.shortfalls {
        w.write_record([
            s.class.as_str(),
            s.period.to_string().as_str(),
            "",
            format!("missing {} staff", s.missing).as_str(),
        ])?;
    }
    for pattern in &outcome.patterns {
        for period in help_periods(pattern) {
            w.write_record([
                "",
                period.to_string().as_str(),
                pattern.staff.as_str(),
                "no class needs this period",
            ])?;
        }
    }
    w.flush()?;
    Ok(())
}

/// Grille `id × (jour, période)` avec `Cover for <id>` ou vide.
pub fn export_coverage_schedule<W: Write>(
    out: W,
    coverage: &CoverageOutcome,
    patterns: &[StaffWeeklyPattern],
    week: &WeekCalendar,
) -> anyhow::Result<()> {
    let mut w = WriterBuilder::new().has_headers(true).from_writer(out);
    w.write_record(grid_header(week))?;
    for pattern in patterns {
        let mut row = vec![pattern.staff.as_str().to_string()];
        for (day, _) in week.working_days() {
            for period in Period::ALL {
                row.push(
                    coverage
                        .covering(&pattern.staff, day, period)
                        .map(|absent| format!("Cover for {absent}"))
                        .unwrap_or_default(),
                );
            }
        }
        w.write_record(&row)?;
    }
    w.flush()?;
    Ok(())
}

/// `id,P1,P2,P3`, `Unassigned` pour une période libre.
pub fn export_camper_assignments<W: Write>(out: W, outcome: &EnrollmentOutcome) -> anyhow::Result<()> {
    let mut w = WriterBuilder::new().has_headers(true).from_writer(out);
    w.write_record(["id", "P1", "P2", "P3"])?;
    for a in &outcome.assignments {
        let mut row = vec![a.camper.as_str()];
        for period in Period::ALL {
            row.push(a.periods.get(&period).map_or(UNASSIGNED, String::as_str));
        }
        w.write_record(&row)?;
    }
    w.flush()?;
    Ok(())
}

/// `Class,Period` des classes désactivées.
pub fn export_inactive_classes<W: Write>(out: W, outcome: &EnrollmentOutcome) -> anyhow::Result<()> {
    let mut w = WriterBuilder::new().has_headers(true).from_writer(out);
    w.write_record(["Class", "Period"])?;
    for (class, period) in &outcome.inactive {
        w.write_record([class.as_str(), period.number().to_string().as_str()])?;
    }
    w.flush()?;
    Ok(())
}

/// `id,Period,Class,Reason` pour chaque campeur incomplet.
pub fn export_camper_unassigned<W: Write>(out: W, outcome: &EnrollmentOutcome) -> anyhow::Result<()> {
    let mut w = WriterBuilder::new().has_headers(true).from_writer(out);
    w.write_record(["id", "Period", "Class", "Reason"])?;
    for a in outcome.incomplete() {
        let mut any = false;
        for issue in outcome.reasons_for(a) {
            any = true;
            let period = issue.period.map(|p| p.to_string()).unwrap_or_default();
            w.write_record([
                a.camper.as_str(),
                period.as_str(),
                issue.class.as_str(),
                issue.reason.to_string().as_str(),
            ])?;
        }
        if !any {
            w.write_record([a.camper.as_str(), "", "", "no class with room"])?;
        }
    }
    w.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::{Provenance, TimeOffAssignment};
    use std::fs;

    #[test]
    fn roster_reads_certifications_and_partner() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(ROSTER_FILE);
        fs::write(
            &path,
            "id,name,personal email,department,coverage partner,lifeguard certification,archery certification,high ropes certification,fishing proficiency\n\
             1, Ada ,ada@camp.org,Chippe,2,Yes,no,,YES\n\
             ,Ghost,,,,,,,\n\
             2,Bo,bo@camp.org,,,,Yes,,\n",
        )
        .unwrap();
        let roster = import_roster_csv(&path).unwrap();
        assert_eq!(roster.len(), 2);
        let ada = roster.get(&PersonId::new("1")).unwrap();
        assert_eq!(ada.name, "Ada");
        assert_eq!(ada.coverage_partner, Some(PersonId::new("2")));
        assert!(ada.is_certified(Certification::Lifeguard));
        assert!(ada.is_certified(Certification::Fishing));
        assert!(!ada.is_certified(Certification::Archery));
        assert!(roster.find_by_email("BO@camp.org").is_some());
    }

    #[test]
    fn time_off_form_falls_back_to_email() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(TIME_OFF_FORM_FILE);
        fs::write(
            &path,
            "personal email,name,first option day,second option day,first option night,second option night,notes\n\
             staff1@camp.org,Staff 1,07/07/2025,08/07/2025,10/07/2025,,Flexible\n",
        )
        .unwrap();
        let reqs = import_time_off_csv(&path).unwrap();
        assert_eq!(reqs[0].staff_ref, "staff1@camp.org");
        assert_eq!(reqs[0].day_options, vec!["07/07/2025", "08/07/2025"]);
        assert_eq!(reqs[0].night_options, vec!["10/07/2025", ""]);
    }

    #[test]
    fn unassigned_leg_is_written_as_such() {
        let outcome = TimeOffOutcome {
            assignments: vec![TimeOffAssignment {
                staff: PersonId::new("3"),
                name: "Cy".into(),
                email: String::new(),
                day_off: OffLeg::granted(
                    chrono::NaiveDate::from_ymd_opt(2025, 7, 9).unwrap(),
                    Provenance::Preferred,
                ),
                night_off: OffLeg::unassigned(),
                notes: String::new(),
            }],
            ..TimeOffOutcome::default()
        };
        let mut buf = Vec::new();
        export_time_off_results(&mut buf, &outcome).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("3,Cy,,09/07/2025,Unassigned,preferred,unassigned,"));
    }
}
