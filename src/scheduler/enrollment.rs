use super::types::{
    AllocOptions, CamperAssignment, EnrollmentIssue, EnrollmentOutcome, RejectReason,
};
use crate::model::{Camper, CamperId, Period, SkillClass};
use std::collections::{BTreeMap, BTreeSet, HashMap};

struct Enrollment<'a> {
    /// Classes ouvertes aux campeurs, dans l'ordre de configuration.
    classes: Vec<&'a SkillClass>,
    by_name: HashMap<&'a str, &'a SkillClass>,
    held: HashMap<CamperId, BTreeMap<Period, String>>,
    rosters: BTreeMap<(String, Period), Vec<CamperId>>,
    /// Campeurs présents par `(classe, période)` ; une double compte sur
    /// ses deux moitiés.
    occupancy: HashMap<(String, Period), usize>,
    inactive: BTreeSet<(String, Period)>,
    issues: Vec<EnrollmentIssue>,
    capacity_multiplier: u32,
}

impl<'a> Enrollment<'a> {
    fn new(classes: &'a [SkillClass], opts: &AllocOptions) -> Self {
        let assignable: Vec<&SkillClass> = classes.iter().filter(|c| c.camper_assignable).collect();
        Self {
            by_name: assignable.iter().map(|c| (c.name.as_str(), *c)).collect(),
            classes: assignable,
            held: HashMap::new(),
            rosters: BTreeMap::new(),
            occupancy: HashMap::new(),
            inactive: BTreeSet::new(),
            issues: Vec::new(),
            capacity_multiplier: opts.capacity_multiplier,
        }
    }

    fn held_count(&self, camper: &CamperId) -> usize {
        self.held.get(camper).map_or(0, BTreeMap::len)
    }

    fn is_full(&self, camper: &CamperId) -> bool {
        self.held_count(camper) >= Period::ALL.len()
    }

    fn occupied(&self, class: &str, period: Period) -> usize {
        self.occupancy
            .get(&(class.to_string(), period))
            .copied()
            .unwrap_or(0)
    }

    fn capacity(&self, class: &SkillClass) -> usize {
        self.capacity_multiplier.saturating_mul(class.staff_required) as usize
    }

    fn reject(&mut self, camper: &CamperId, period: Option<Period>, class: &str, reason: RejectReason) {
        self.issues.push(EnrollmentIssue {
            camper: camper.clone(),
            period,
            class: class.to_string(),
            reason,
        });
    }

    /// Inscrit `camper` à `class` en partant de `start`, atomiquement sur
    /// toute la plage (double période comprise).
    fn try_place(&mut self, camper: &CamperId, class: &SkillClass, start: Period) -> Result<(), RejectReason> {
        if !class.offers(start) {
            return Err(RejectReason::NotOfferedInPeriod);
        }
        let key = (class.name.clone(), start);
        if self.inactive.contains(&key) {
            return Err(RejectReason::Inactive);
        }
        let held = self.held.get(camper);
        if held.is_some_and(|h| h.values().any(|c| c == &class.name)) {
            return Err(RejectReason::AlreadyEnrolled);
        }
        let span = class.camper_span(start);
        if held.is_some_and(|h| h.contains_key(&start)) {
            return Err(RejectReason::PeriodTaken);
        }
        if held.is_some_and(|h| span.iter().any(|p| h.contains_key(p))) {
            return Err(RejectReason::NextPeriodTaken);
        }
        let capacity = self.capacity(class);
        if span.iter().any(|p| self.occupied(&class.name, *p) >= capacity) {
            return Err(RejectReason::Full);
        }
        self.rosters.entry(key).or_default().push(camper.clone());
        let slots = self.held.entry(camper.clone()).or_default();
        for p in span {
            slots.insert(p, class.name.clone());
            *self.occupancy.entry((class.name.clone(), p)).or_insert(0) += 1;
        }
        Ok(())
    }

    /// Essaie les périodes de la classe dans l'ordre ; chaque refus est noté.
    fn offer(&mut self, camper: &CamperId, class: &SkillClass) -> bool {
        for start in class.sorted_periods() {
            match self.try_place(camper, class, start) {
                Ok(()) => return true,
                Err(reason) => self.reject(camper, Some(start), &class.name, reason),
            }
        }
        false
    }

    fn roster_len(&self, class: &str, start: Period) -> usize {
        self.rosters
            .get(&(class.to_string(), start))
            .map_or(0, Vec::len)
    }

    /// Repasse sur les choix classés de chaque campeur incomplet.
    fn refill(&mut self, campers: &[Camper]) {
        for camper in campers {
            for (_, choice) in camper.ranked_choices() {
                if self.is_full(&camper.id) {
                    break;
                }
                if let Some(class) = self.by_name.get(choice).copied() {
                    self.offer(&camper.id, class);
                }
            }
        }
    }

    /// Désactive les `(classe, période)` sous le seuil de viabilité et
    /// libère leurs campeurs.
    fn deactivate_underfilled(&mut self, viability_multiplier: u32) -> bool {
        let mut evicted: Vec<(CamperId, String, Period)> = Vec::new();
        for ((name, period), roster) in self.rosters.iter_mut() {
            let Some(class) = self.by_name.get(name.as_str()) else {
                continue;
            };
            let threshold = viability_multiplier.saturating_mul(class.staff_required) as usize;
            if roster.is_empty() || roster.len() >= threshold {
                continue;
            }
            tracing::info!(class = %name, %period, size = roster.len(), threshold, "class deactivated");
            self.inactive.insert((name.clone(), *period));
            for camper in roster.drain(..) {
                evicted.push((camper, name.clone(), *period));
            }
        }
        let changed = !evicted.is_empty();
        for (camper, name, start) in evicted {
            let span = self
                .by_name
                .get(name.as_str())
                .map(|c| c.camper_span(start))
                .unwrap_or_else(|| vec![start]);
            if let Some(slots) = self.held.get_mut(&camper) {
                for p in &span {
                    if slots.get(p) == Some(&name) {
                        slots.remove(p);
                        if let Some(n) = self.occupancy.get_mut(&(name.clone(), *p)) {
                            *n = n.saturating_sub(1);
                        }
                    }
                }
            }
            self.reject(&camper, Some(start), &name, RejectReason::Deactivated);
        }
        changed
    }
}

/// Inscrit les campeurs : passe par priorité, désactivation des classes trop
/// petites, repasse sur les choix, puis rattrapage sur toute classe ouverte.
pub fn enroll_campers(campers: &[Camper], classes: &[SkillClass], opts: &AllocOptions) -> EnrollmentOutcome {
    let mut state = Enrollment::new(classes, opts);

    // demande : classe → (priorité, campeur), trié par priorité puis id
    let mut demand: HashMap<&str, Vec<(u8, &Camper)>> = HashMap::new();
    for camper in campers {
        for (priority, choice) in camper.ranked_choices() {
            if state.by_name.contains_key(choice) {
                demand.entry(choice).or_default().push((priority, camper));
            } else {
                let reason = if classes.iter().any(|c| c.name == choice) {
                    RejectReason::NotCamperAssignable
                } else {
                    RejectReason::UnknownClass
                };
                state.reject(&camper.id, None, choice, reason);
            }
        }
    }
    for list in demand.values_mut() {
        list.sort_by(|a, b| (a.0, a.1.id.sort_key()).cmp(&(b.0, b.1.id.sort_key())));
    }

    let order: Vec<&SkillClass> = state.classes.clone();
    for priority in 1..=Camper::MAX_CHOICES as u8 {
        for class in &order {
            let Some(list) = demand.get(class.name.as_str()) else {
                continue;
            };
            for (_, camper) in list.iter().filter(|(p, _)| *p == priority) {
                if state.is_full(&camper.id) {
                    continue;
                }
                state.offer(&camper.id, class);
            }
        }
    }

    // désactivation puis repasse, jusqu'à ce qu'aucune classe ne tombe
    // sous le seuil
    state.deactivate_underfilled(opts.viability_multiplier);
    loop {
        state.refill(campers);
        if !state.deactivate_underfilled(opts.viability_multiplier) {
            break;
        }
    }

    // rattrapage : n'importe quelle classe déjà ouverte avec de la place
    let viability = opts.viability_multiplier;
    for camper in campers {
        for period in Period::ALL {
            if state.held.get(&camper.id).is_some_and(|h| h.contains_key(&period)) {
                continue;
            }
            for class in &order {
                let running = viability == 0 || state.roster_len(&class.name, period) > 0;
                let placed = if running {
                    state.try_place(&camper.id, class, period)
                } else {
                    Err(RejectReason::Inactive)
                };
                match placed {
                    Ok(()) => break,
                    Err(reason) => state.reject(&camper.id, Some(period), &class.name, reason),
                }
            }
        }
    }

    let assignments: Vec<CamperAssignment> = campers
        .iter()
        .map(|c| CamperAssignment {
            camper: c.id.clone(),
            periods: state.held.get(&c.id).cloned().unwrap_or_default(),
        })
        .collect();
    let incomplete = assignments.iter().filter(|a| !a.is_complete()).count();
    tracing::info!(
        campers = assignments.len(),
        incomplete,
        inactive = state.inactive.len(),
        "campers enrolled"
    );

    EnrollmentOutcome {
        assignments,
        rosters: state.rosters.into_iter().filter(|(_, r)| !r.is_empty()).collect(),
        inactive: state.inactive,
        issues: state.issues,
    }
}
