//! Jeu de données synthétique, reproductible à graine fixe.
//!
//! Sert aux démonstrations (`camp-scheduler-cli sample`) et aux tests
//! d'intégration du pipeline complet.

use crate::config::{CampConfig, ConfigStore, LocationConfig};
use crate::io::{CAMPER_CHOICES_FILE, ROSTER_FILE, TIME_OFF_FORM_FILE};
use crate::model::{
    ActivityLocation, BlackoutWindow, Camper, Certification, Period, Person, PersonId, SkillClass,
    StaffRoster, TimeOffRequest,
};
use crate::scheduler::util::{self, WeekCalendar};
use anyhow::{Context, Result};
use chrono::{Duration, NaiveDate, Weekday};
use csv::WriterBuilder;
use rand::prelude::IndexedRandom;
use rand::Rng;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

const DEPARTMENTS: [&str; 5] = ["Mad City", "Chippe", "Tamakwa", "Program", "Waterfront"];
const NOTES: [&str; 3] = ["", "Prefers early week", "Avoid Wednesdays"];

#[derive(Debug, Clone)]
pub struct SampleOptions {
    pub staff: usize,
    pub campers: usize,
    pub week: WeekCalendar,
}

impl Default for SampleOptions {
    fn default() -> Self {
        Self {
            staff: 60,
            campers: 150,
            week: WeekCalendar::upcoming(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SampleData {
    pub roster: StaffRoster,
    pub requests: Vec<TimeOffRequest>,
    pub campers: Vec<Camper>,
    pub config: CampConfig,
}

fn class(name: &str, staff: u32, periods: &[u8]) -> SkillClass {
    let periods = periods.iter().filter_map(|n| Period::new(*n)).collect();
    SkillClass::new(name, staff, periods)
}

fn staff_only(mut class: SkillClass) -> SkillClass {
    class.camper_assignable = false;
    class
}

fn certified(mut class: SkillClass, cert: Certification) -> SkillClass {
    class.certification = Some(cert);
    class
}

/// Catalogue des classes de skills par défaut.
pub fn default_classes() -> Vec<SkillClass> {
    let mut sailing = class("Sailing", 1, &[1, 2]).double();
    sailing.coordinators = vec![PersonId::new("5")];
    let mut high_ropes = certified(class("High Ropes", 1, &[1, 2]).double(), Certification::HighRopes);
    high_ropes.coordinators = vec![PersonId::new("6")];
    vec![
        staff_only(certified(class("Waterfront", 2, &[1, 2, 3]), Certification::Lifeguard)),
        class("Basketball", 1, &[1, 2, 3]),
        class("Tennis", 1, &[1, 2, 3]),
        sailing,
        high_ropes,
        staff_only(class("Program", 1, &[1, 2, 3])),
        staff_only(class("Attendance", 1, &[1])),
        certified(class("Fishing", 1, &[2, 3]), Certification::Fishing),
        class("Survival", 1, &[1, 3]),
        certified(class("Archery", 1, &[1, 2, 3]), Certification::Archery),
        class("Volleyball", 1, &[1, 2, 3]),
        class("Floor Hockey", 1, &[2, 3]),
        class("Arts & Crafts", 2, &[1, 2, 3]),
        staff_only(class("Office/Admin Help", 1, &[1, 2, 3])),
        class("DnD", 1, &[1, 2, 3]),
        class("Dodgeball", 1, &[1, 2]),
        certified(class("Snorkeling", 1, &[2, 3]), Certification::Lifeguard),
        class("Diamond Sports", 1, &[1, 2, 3]),
        class("Soccer", 1, &[1, 2, 3]),
        class("Leisure Sports", 1, &[1, 2, 3]),
        class("Skateboarding", 1, &[1, 3]),
        class("BFS", 1, &[1, 2, 3]),
        staff_only(class("Skull Session", 1, &[3])),
        class("Flag Football", 1, &[1, 2, 3]),
    ]
}

/// Lieux de temps libre par défaut, dans l'ordre de remplissage.
pub fn default_locations() -> LocationConfig {
    let restricted = |name: &str, cert: Certification| {
        let mut l = ActivityLocation::new(name);
        l.certification = Some(cert);
        l
    };
    let department = |name: &str| {
        let mut l = ActivityLocation::new(name);
        l.department = Some(name.to_string());
        l
    };
    let mut archery = restricted("Archery", Certification::Archery);
    archery.closed_days = vec![Weekday::Tue, Weekday::Thu];
    let mut climbing = restricted("Climbing", Certification::HighRopes);
    climbing.closed_days = vec![Weekday::Tue, Weekday::Thu];
    let mut canteen = ActivityLocation::new("Canteen");
    canteen.coordinators = vec![PersonId::new("1"), PersonId::new("2")];
    let mut waterfront = ActivityLocation::new("Waterfront Desk");
    waterfront.coordinators = vec![PersonId::new("3")];

    LocationConfig {
        lifeguard_location: "Lifeguard".to_string(),
        locations: vec![
            ActivityLocation::new("Lifeguard"),
            canteen,
            waterfront,
            archery,
            climbing,
            restricted("Fishing Dock", Certification::Fishing),
            department("Mad City"),
            department("Chippe"),
            department("Tamakwa"),
            ActivityLocation::new("Gaga Pit"),
            ActivityLocation::new("Arts Hut"),
            ActivityLocation::new("Sports Field"),
        ],
    }
}

/// Configuration complète : fermeture le dimanche de la semaine et un congé
/// imposé en période 3 pour le membre `4`.
pub fn default_config(week: &WeekCalendar) -> CampConfig {
    let sunday = week.start() + Duration::days(6);
    let mut fixed_off = BTreeMap::new();
    fixed_off.insert(PersonId::new("4"), vec![Period::P3]);
    CampConfig {
        blackouts: vec![BlackoutWindow {
            name: "Closing Ceremony".to_string(),
            start: sunday,
            end: sunday,
        }],
        locations: default_locations(),
        classes: default_classes(),
        fixed_off,
        options: Default::default(),
    }
}

fn sample_staff<R: Rng>(count: usize, rng: &mut R) -> StaffRoster {
    let mut people = Vec::with_capacity(count);
    for i in 1..=count {
        let mut person = Person::new(i.to_string(), format!("Staff Member {i}"))
            .with_email(format!("staff{i}@camp.org"))
            .with_department(DEPARTMENTS[(i - 1) % DEPARTMENTS.len()]);
        // paires de partenaires 1-2, 3-4…
        let partner = if i % 2 == 1 { i + 1 } else { i - 1 };
        if partner <= count {
            person = person.with_partner(partner.to_string());
        }
        for (cert, p) in [
            (Certification::Lifeguard, 0.4),
            (Certification::Archery, 0.2),
            (Certification::HighRopes, 0.2),
            (Certification::Fishing, 0.15),
        ] {
            person.certifications.set(cert, rng.random_bool(p));
        }
        people.push(person);
    }
    StaffRoster::new(people)
}

fn pick_two<R: Rng>(dates: &[NaiveDate], rng: &mut R) -> Vec<String> {
    dates
        .choose_multiple(rng, 2)
        .map(|d| util::format_form_date(*d))
        .collect()
}

fn sample_requests<R: Rng>(roster: &StaffRoster, week: &WeekCalendar, rng: &mut R) -> Vec<TimeOffRequest> {
    let all = week.all_dates();
    let early = &all[..3];
    roster
        .iter()
        .map(|person| {
            let roll: f64 = rng.random();
            let note = if roll < 0.6 {
                NOTES[0]
            } else if roll < 0.85 {
                NOTES[1]
            } else {
                NOTES[2]
            };
            let pool = if note == NOTES[1] { early } else { &all[..] };
            TimeOffRequest {
                staff_ref: String::new(),
                name: person.name.clone(),
                email: person.email.clone(),
                day_options: pick_two(pool, rng),
                night_options: pick_two(pool, rng),
                notes: note.to_string(),
            }
        })
        .collect()
}

fn sample_campers<R: Rng>(count: usize, classes: &[SkillClass], rng: &mut R) -> Vec<Camper> {
    let assignable: Vec<&str> = classes
        .iter()
        .filter(|c| c.camper_assignable)
        .map(|c| c.name.as_str())
        .collect();
    (1001..1001 + count)
        .map(|id| {
            let choices = assignable
                .choose_multiple(rng, Camper::MAX_CHOICES)
                .map(|c| c.to_string())
                .collect();
            let mut camper = Camper::new(id.to_string(), format!("Camper {id}"), choices);
            camper.cabin = format!("Cabin {}", rng.random_range(1..=10));
            camper.submitted_at = NaiveDate::from_ymd_opt(2025, 6, 30)
                .and_then(|d| d.and_hms_opt(rng.random_range(8..=18), rng.random_range(0..60), 0));
            camper
        })
        .collect()
}

/// Génère un jeu complet ; le formulaire de congés référence le staff par email.
pub fn generate<R: Rng>(opts: &SampleOptions, rng: &mut R) -> SampleData {
    let config = default_config(&opts.week);
    let roster = sample_staff(opts.staff, rng);
    let requests = sample_requests(&roster, &opts.week, rng);
    let campers = sample_campers(opts.campers, &config.classes, rng);
    tracing::info!(
        staff = roster.len(),
        requests = requests.len(),
        campers = campers.len(),
        "sample data generated"
    );
    SampleData {
        roster,
        requests,
        campers,
        config,
    }
}

/// Écrit les CSV et les fichiers JSON dans `dir`.
pub fn write_sample<P: AsRef<Path>>(dir: P, data: &SampleData) -> Result<()> {
    let dir = dir.as_ref();
    fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;

    let mut w = WriterBuilder::new().from_path(dir.join(ROSTER_FILE))?;
    let mut header = vec!["id", "name", "personal email", "department", "coverage partner"];
    header.extend(Certification::ALL.iter().map(|c| c.column()));
    w.write_record(&header)?;
    for p in data.roster.iter() {
        let mut row = vec![
            p.id.as_str().to_string(),
            p.name.clone(),
            p.email.clone(),
            p.department.clone(),
            p.coverage_partner
                .as_ref()
                .map(|id| id.as_str().to_string())
                .unwrap_or_default(),
        ];
        row.extend(
            Certification::ALL
                .iter()
                .map(|c| if p.is_certified(*c) { "Yes" } else { "No" }.to_string()),
        );
        w.write_record(&row)?;
    }
    w.flush()?;

    let mut w = WriterBuilder::new().from_path(dir.join(TIME_OFF_FORM_FILE))?;
    w.write_record([
        "personal email",
        "name",
        "first option day",
        "second option day",
        "first option night",
        "second option night",
        "notes",
    ])?;
    for r in &data.requests {
        let opt = |v: &[String], i: usize| v.get(i).cloned().unwrap_or_default();
        w.write_record([
            r.email.clone(),
            r.name.clone(),
            opt(&r.day_options[..], 0),
            opt(&r.day_options[..], 1),
            opt(&r.night_options[..], 0),
            opt(&r.night_options[..], 1),
            r.notes.clone(),
        ])?;
    }
    w.flush()?;

    let mut w = WriterBuilder::new().from_path(dir.join(CAMPER_CHOICES_FILE))?;
    w.write_record([
        "id",
        "name",
        "cabin",
        "class1",
        "class2",
        "class3",
        "class4",
        "class5",
        "submission_time",
    ])?;
    for c in &data.campers {
        let mut row = vec![c.id.as_str().to_string(), c.name.clone(), c.cabin.clone()];
        for i in 0..Camper::MAX_CHOICES {
            row.push(c.choices.get(i).cloned().unwrap_or_default());
        }
        row.push(
            c.submitted_at
                .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_default(),
        );
        w.write_record(&row)?;
    }
    w.flush()?;

    ConfigStore::new(dir).save_all(&data.config)?;
    tracing::info!(dir = %dir.display(), "sample data written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn opts() -> SampleOptions {
        SampleOptions {
            staff: 20,
            campers: 30,
            week: WeekCalendar::new(NaiveDate::from_ymd_opt(2025, 7, 7).unwrap()),
        }
    }

    #[test]
    fn same_seed_same_data() {
        let a = generate(&opts(), &mut StdRng::seed_from_u64(42));
        let b = generate(&opts(), &mut StdRng::seed_from_u64(42));
        assert_eq!(a.requests, b.requests);
        assert_eq!(a.campers, b.campers);
    }

    #[test]
    fn campers_pick_distinct_assignable_classes() {
        let data = generate(&opts(), &mut StdRng::seed_from_u64(1));
        assert_eq!(data.campers[0].id.as_str(), "1001");
        for camper in &data.campers {
            let mut names = camper.choices.clone();
            names.sort();
            names.dedup();
            assert_eq!(names.len(), Camper::MAX_CHOICES);
            for name in &camper.choices {
                let class = data.config.classes.iter().find(|c| &c.name == name).unwrap();
                assert!(class.camper_assignable);
            }
        }
    }

    #[test]
    fn default_config_is_valid() {
        default_config(&opts().week).validate().unwrap();
    }
}
