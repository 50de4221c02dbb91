use chrono::{Duration, NaiveDate, NaiveDateTime, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Identifiant fort pour un membre du staff
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PersonId(String);

impl PersonId {
    pub fn new<S: AsRef<str>>(s: S) -> Self {
        Self(s.as_ref().trim().to_owned())
    }
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PersonId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifiant fort pour un campeur
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CamperId(String);

impl CamperId {
    pub fn new<S: AsRef<str>>(s: S) -> Self {
        Self(s.as_ref().trim().to_owned())
    }
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Ids numériques triés numériquement (attribués dans l'ordre de
    /// soumission), les autres ensuite, lexicalement.
    pub fn sort_key(&self) -> (u64, &str) {
        (self.0.parse::<u64>().unwrap_or(u64::MAX), self.0.as_str())
    }
}

impl fmt::Display for CamperId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Certification {
    Lifeguard,
    Archery,
    HighRopes,
    Fishing,
}

impl Certification {
    pub const ALL: [Certification; 4] = [
        Certification::Lifeguard,
        Certification::Archery,
        Certification::HighRopes,
        Certification::Fishing,
    ];

    /// En-tête de colonne dans la table du staff.
    pub fn column(self) -> &'static str {
        match self {
            Certification::Lifeguard => "lifeguard certification",
            Certification::Archery => "archery certification",
            Certification::HighRopes => "high ropes certification",
            Certification::Fishing => "fishing proficiency",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Certifications {
    #[serde(default)]
    pub lifeguard: bool,
    #[serde(default)]
    pub archery: bool,
    #[serde(default)]
    pub high_ropes: bool,
    #[serde(default)]
    pub fishing: bool,
}

impl Certifications {
    pub fn has(&self, cert: Certification) -> bool {
        match cert {
            Certification::Lifeguard => self.lifeguard,
            Certification::Archery => self.archery,
            Certification::HighRopes => self.high_ropes,
            Certification::Fishing => self.fishing,
        }
    }

    pub fn set(&mut self, cert: Certification, value: bool) {
        match cert {
            Certification::Lifeguard => self.lifeguard = value,
            Certification::Archery => self.archery = value,
            Certification::HighRopes => self.high_ropes = value,
            Certification::Fishing => self.fishing = value,
        }
    }
}

/// Membre du staff, immuable pendant un run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
    pub id: PersonId,
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub department: String,
    /// Référence faible : le partenaire peut être absent du registre.
    #[serde(default)]
    pub coverage_partner: Option<PersonId>,
    #[serde(default)]
    pub certifications: Certifications,
}

impl Person {
    pub fn new<I: AsRef<str>, N: Into<String>>(id: I, name: N) -> Self {
        Self {
            id: PersonId::new(id),
            name: name.into(),
            email: String::new(),
            department: String::new(),
            coverage_partner: None,
            certifications: Certifications::default(),
        }
    }

    pub fn with_email<S: Into<String>>(mut self, email: S) -> Self {
        self.email = email.into();
        self
    }

    pub fn with_department<S: Into<String>>(mut self, department: S) -> Self {
        self.department = department.into();
        self
    }

    pub fn with_partner<S: AsRef<str>>(mut self, partner: S) -> Self {
        self.coverage_partner = Some(PersonId::new(partner));
        self
    }

    pub fn with_certification(mut self, cert: Certification) -> Self {
        self.certifications.set(cert, true);
        self
    }

    pub fn is_certified(&self, cert: Certification) -> bool {
        self.certifications.has(cert)
    }
}

/// Campeur et ses choix ordonnés (position 1 = priorité la plus haute)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Camper {
    pub id: CamperId,
    pub name: String,
    #[serde(default)]
    pub cabin: String,
    #[serde(default)]
    pub submitted_at: Option<NaiveDateTime>,
    pub choices: Vec<String>,
}

impl Camper {
    pub const MAX_CHOICES: usize = 5;

    pub fn new<I: AsRef<str>, N: Into<String>>(id: I, name: N, choices: Vec<String>) -> Self {
        let mut choices: Vec<String> = choices
            .into_iter()
            .map(|c| c.trim().to_string())
            .collect();
        choices.truncate(Self::MAX_CHOICES);
        Self {
            id: CamperId::new(id),
            name: name.into(),
            cabin: String::new(),
            submitted_at: None,
            choices,
        }
    }

    /// Paires `(priorité, classe)`, choix vides ignorés.
    pub fn ranked_choices(&self) -> impl Iterator<Item = (u8, &str)> {
        self.choices
            .iter()
            .enumerate()
            .filter(|(_, c)| !c.is_empty())
            .map(|(i, c)| ((i + 1) as u8, c.as_str()))
    }
}

/// Demande de congés telle que lue dans le formulaire (dates encore brutes)
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TimeOffRequest {
    /// Id du staff, ou email selon la politique d'identité.
    pub staff_ref: String,
    pub name: String,
    pub email: String,
    pub day_options: Vec<String>,
    pub night_options: Vec<String>,
    #[serde(default)]
    pub notes: String,
}

/// Fenêtre d'interdiction de congés, bornes incluses
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlackoutWindow {
    pub name: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl BlackoutWindow {
    pub fn new<S: Into<String>>(name: S, start: NaiveDate, end: NaiveDate) -> Result<Self, String> {
        if end < start {
            return Err("blackout end must not be before start".to_string());
        }
        Ok(Self {
            name: name.into(),
            start,
            end,
        })
    }

    /// `true` si `date` tombe dans `[start - buffer, end + buffer]`.
    pub fn covers(&self, date: NaiveDate, buffer_days: u32) -> bool {
        let buffer = Duration::days(i64::from(buffer_days));
        self.start - buffer <= date && date <= self.end + buffer
    }
}

/// Période de skills (1, 2 ou 3)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Period(u8);

impl Period {
    pub const P1: Period = Period(1);
    pub const P2: Period = Period(2);
    pub const P3: Period = Period(3);
    pub const ALL: [Period; 3] = [Period::P1, Period::P2, Period::P3];

    pub fn new(n: u8) -> Option<Self> {
        (1..=3).contains(&n).then_some(Self(n))
    }
    pub fn number(self) -> u8 {
        self.0
    }
    pub fn index(self) -> usize {
        usize::from(self.0 - 1)
    }
    pub fn next(self) -> Option<Period> {
        Period::new(self.0 + 1)
    }
}

impl TryFrom<u8> for Period {
    type Error = String;

    fn try_from(n: u8) -> Result<Self, Self::Error> {
        Period::new(n).ok_or_else(|| format!("period must be 1, 2 or 3 (got {n})"))
    }
}

impl From<Period> for u8 {
    fn from(p: Period) -> u8 {
        p.0
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P{}", self.0)
    }
}

/// Lieu d'activité de temps libre
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityLocation {
    pub name: String,
    #[serde(default)]
    pub certification: Option<Certification>,
    #[serde(default)]
    pub department: Option<String>,
    /// Jours où le lieu ne fonctionne pas.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub closed_days: Vec<Weekday>,
    /// Liste de priorité : le premier disponible l'emporte.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub coordinators: Vec<PersonId>,
}

impl ActivityLocation {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            certification: None,
            department: None,
            closed_days: Vec::new(),
            coordinators: Vec::new(),
        }
    }

    pub fn is_open_on(&self, day: Weekday) -> bool {
        !self.closed_days.contains(&day)
    }

    pub fn admits(&self, person: &Person) -> bool {
        if let Some(cert) = self.certification {
            if !person.is_certified(cert) {
                return false;
            }
        }
        match &self.department {
            Some(dept) => person.department.trim() == dept.as_str(),
            None => true,
        }
    }
}

/// Classe de skills, partagée entre staff et campeurs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillClass {
    pub name: String,
    pub staff_required: u32,
    #[serde(alias = "preferred_periods")]
    pub periods: Vec<Period>,
    #[serde(default)]
    pub double_period: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub coordinators: Vec<PersonId>,
    #[serde(default = "default_true")]
    pub camper_assignable: bool,
    #[serde(default)]
    pub certification: Option<Certification>,
}

fn default_true() -> bool {
    true
}

impl SkillClass {
    pub fn new<S: Into<String>>(name: S, staff_required: u32, periods: Vec<Period>) -> Self {
        Self {
            name: name.into(),
            staff_required,
            periods,
            double_period: false,
            coordinators: Vec::new(),
            camper_assignable: true,
            certification: None,
        }
    }

    pub fn double(mut self) -> Self {
        self.double_period = true;
        self
    }

    pub fn offers(&self, period: Period) -> bool {
        self.periods.contains(&period)
    }

    /// Périodes éligibles, triées.
    pub fn sorted_periods(&self) -> Vec<Period> {
        let mut periods = self.periods.clone();
        periods.sort();
        periods.dedup();
        periods
    }

    /// Périodes de départ pour le staff : une double période ne commence
    /// jamais en période 3.
    pub fn staff_start_periods(&self) -> Vec<Period> {
        self.sorted_periods()
            .into_iter()
            .filter(|p| !self.double_period || p.next().is_some())
            .collect()
    }

    /// Périodes occupées en partant de `start`, `None` si la double période
    /// n'a pas de suivante.
    pub fn staff_span(&self, start: Period) -> Option<Vec<Period>> {
        if self.double_period {
            start.next().map(|next| vec![start, next])
        } else {
            Some(vec![start])
        }
    }

    /// Côté campeur, une double période ancrée en période 3 n'occupe que la 3.
    pub fn camper_span(&self, start: Period) -> Vec<Period> {
        match (self.double_period, start.next()) {
            (true, Some(next)) => vec![start, next],
            _ => vec![start],
        }
    }

    pub fn admits(&self, person: &Person) -> bool {
        self.certification.map_or(true, |c| person.is_certified(c))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Lead,
    Assistant,
}

/// Contenu d'une période du planning hebdomadaire d'un membre du staff
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SlotAssignment {
    Working { class: String, role: Role },
    Off,
    /// Débordement : aucune classe n'a besoin de la personne, quota OFF déjà pris.
    Help,
}

impl SlotAssignment {
    pub fn is_working(&self) -> bool {
        matches!(self, SlotAssignment::Working { .. })
    }
    pub fn class(&self) -> Option<&str> {
        match self {
            SlotAssignment::Working { class, .. } => Some(class),
            _ => None,
        }
    }
}

impl fmt::Display for SlotAssignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlotAssignment::Working {
                class,
                role: Role::Lead,
            } => write!(f, "Lead {class}"),
            SlotAssignment::Working {
                class,
                role: Role::Assistant,
            } => write!(f, "Assistant {class}"),
            SlotAssignment::Off => f.write_str("OFF"),
            SlotAssignment::Help => f.write_str("Help"),
        }
    }
}

/// Modèle fixe de 3 périodes, identique les 5 jours de la semaine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaffWeeklyPattern {
    pub staff: PersonId,
    pub slots: [SlotAssignment; 3],
    /// Périodes OFF imposées par la table des congés fixes.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mandated_off: Vec<Period>,
}

impl StaffWeeklyPattern {
    pub fn slot(&self, period: Period) -> &SlotAssignment {
        &self.slots[period.index()]
    }
    pub fn off_count(&self) -> usize {
        self.slots
            .iter()
            .filter(|s| matches!(s, SlotAssignment::Off))
            .count()
    }
    pub fn working_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_working()).count()
    }
    pub fn holds(&self, class: &str) -> bool {
        self.slots.iter().any(|s| s.class() == Some(class))
    }
}

/// Rattachement des lignes du formulaire de congés au staff.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentityPolicy {
    /// Seule la colonne identifiant fait foi.
    IdOnly,
    /// Repli sur l'email si l'identifiant est vide ou inconnu.
    #[default]
    IdOrEmail,
}

/// Registre du staff : ordre d'insertion conservé, index par id et email
#[derive(Debug, Clone, Default)]
pub struct StaffRoster {
    people: Vec<Person>,
    by_id: HashMap<PersonId, usize>,
    by_email: HashMap<String, usize>,
}

impl StaffRoster {
    /// Id dupliqué : la première occurrence gagne.
    pub fn new(people: Vec<Person>) -> Self {
        let mut roster = Self::default();
        for person in people {
            roster.insert(person);
        }
        roster
    }

    pub fn insert(&mut self, person: Person) -> bool {
        if self.by_id.contains_key(&person.id) {
            tracing::warn!(id = %person.id, "duplicate staff id ignored");
            return false;
        }
        let idx = self.people.len();
        self.by_id.insert(person.id.clone(), idx);
        let email = person.email.trim().to_ascii_lowercase();
        if !email.is_empty() {
            self.by_email.entry(email).or_insert(idx);
        }
        self.people.push(person);
        true
    }

    pub fn len(&self) -> usize {
        self.people.len()
    }
    pub fn is_empty(&self) -> bool {
        self.people.is_empty()
    }
    pub fn iter(&self) -> impl Iterator<Item = &Person> {
        self.people.iter()
    }
    pub fn ids(&self) -> impl Iterator<Item = &PersonId> {
        self.people.iter().map(|p| &p.id)
    }
    pub fn get(&self, id: &PersonId) -> Option<&Person> {
        self.by_id.get(id).map(|&i| &self.people[i])
    }
    pub fn contains(&self, id: &PersonId) -> bool {
        self.by_id.contains_key(id)
    }
    pub fn find_by_email(&self, email: &str) -> Option<&Person> {
        self.by_email
            .get(&email.trim().to_ascii_lowercase())
            .map(|&i| &self.people[i])
    }

    /// Position dans l'ordre du registre (départage déterministe).
    pub fn position(&self, id: &PersonId) -> Option<usize> {
        self.by_id.get(id).copied()
    }

    pub fn resolve(
        &self,
        reference: &str,
        email: &str,
        policy: IdentityPolicy,
    ) -> Option<&Person> {
        let reference = reference.trim();
        if !reference.is_empty() {
            if let Some(p) = self.get(&PersonId::new(reference)) {
                return Some(p);
            }
        }
        match policy {
            IdentityPolicy::IdOnly => None,
            IdentityPolicy::IdOrEmail => {
                let candidate = if reference.contains('@') { reference } else { email };
                if candidate.trim().is_empty() {
                    None
                } else {
                    self.find_by_email(candidate)
                }
            }
        }
    }

    pub fn certified(&self, cert: Certification) -> impl Iterator<Item = &Person> {
        self.people.iter().filter(move |p| p.is_certified(cert))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blackout_buffer_is_inclusive() {
        let d = |day| NaiveDate::from_ymd_opt(2025, 7, day).unwrap();
        let w = BlackoutWindow::new("Canada Day", d(4), d(5)).unwrap();
        assert!(w.covers(d(3), 1));
        assert!(w.covers(d(6), 1));
        assert!(!w.covers(d(7), 1));
        assert!(!w.covers(d(3), 0));
    }

    #[test]
    fn double_period_spans() {
        let class = SkillClass::new("Sailing", 1, vec![Period::P2, Period::P3, Period::P1]).double();
        assert_eq!(class.staff_start_periods(), vec![Period::P1, Period::P2]);
        assert_eq!(class.staff_span(Period::P3), None);
        assert_eq!(class.camper_span(Period::P3), vec![Period::P3]);
        assert_eq!(class.camper_span(Period::P2), vec![Period::P2, Period::P3]);
    }

    #[test]
    fn roster_resolves_by_email_only_when_allowed() {
        let roster = StaffRoster::new(vec![
            Person::new("7", "Ada").with_email("Ada@Camp.org"),
            Person::new("7", "Dup"),
        ]);
        assert_eq!(roster.len(), 1);
        assert!(roster
            .resolve("", "ada@camp.org", IdentityPolicy::IdOrEmail)
            .is_some());
        assert!(roster
            .resolve("", "ada@camp.org", IdentityPolicy::IdOnly)
            .is_none());
        assert_eq!(
            roster
                .resolve("7", "", IdentityPolicy::IdOnly)
                .map(|p| p.name.as_str()),
            Some("Ada")
        );
    }

    #[test]
    fn camper_ids_sort_numerically() {
        let mut ids = vec![CamperId::new("1010"), CamperId::new("999"), CamperId::new("x")];
        ids.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
        let ids: Vec<&str> = ids.iter().map(|i| i.as_str()).collect();
        assert_eq!(ids, vec!["999", "1010", "x"]);
    }
}
