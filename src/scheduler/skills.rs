use super::types::{AllocOptions, SkillsOutcome, SkillsShortfall};
use crate::model::{
    Period, Person, PersonId, Role, SkillClass, SlotAssignment, StaffRoster, StaffWeeklyPattern,
};
use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap, HashSet};

/// Tableau plat `(personne, période) → affectation` pendant la construction.
#[derive(Debug, Default)]
struct Board {
    slots: HashMap<(PersonId, Period), SlotAssignment>,
    /// Staff placé par `(classe, période de début)`.
    filled: HashMap<(String, Period), u32>,
    leads: HashSet<(String, Period)>,
    /// `(personne, classe)` → période de début, pour libérer tout l'empan.
    starts: HashMap<(PersonId, String), Period>,
    mandated: HashMap<PersonId, Vec<Period>>,
}

impl Board {
    fn is_free(&self, id: &PersonId, period: Period) -> bool {
        !self.slots.contains_key(&(id.clone(), period))
    }

    fn span_free(&self, id: &PersonId, span: &[Period]) -> bool {
        span.iter().all(|p| self.is_free(id, *p))
    }

    fn filled(&self, class: &str, period: Period) -> u32 {
        self.filled
            .get(&(class.to_string(), period))
            .copied()
            .unwrap_or(0)
    }

    fn holds(&self, id: &PersonId, class: &str) -> bool {
        self.starts.contains_key(&(id.clone(), class.to_string()))
    }

    fn working_count(&self, id: &PersonId) -> usize {
        Period::ALL
            .iter()
            .filter(|p| {
                self.slots
                    .get(&(id.clone(), **p))
                    .is_some_and(SlotAssignment::is_working)
            })
            .count()
    }

    fn has_off(&self, id: &PersonId) -> bool {
        Period::ALL
            .iter()
            .any(|p| self.slots.get(&(id.clone(), *p)) == Some(&SlotAssignment::Off))
    }

    fn place(&mut self, id: &PersonId, class: &SkillClass, span: &[Period], role: Role) {
        let start = span[0];
        for p in span {
            self.slots.insert(
                (id.clone(), *p),
                SlotAssignment::Working {
                    class: class.name.clone(),
                    role,
                },
            );
        }
        *self.filled.entry((class.name.clone(), start)).or_insert(0) += 1;
        if role == Role::Lead {
            self.leads.insert((class.name.clone(), start));
        }
        self.starts.insert((id.clone(), class.name.clone()), start);
    }

    /// Libère toute la plage d'une classe tenue par `id`.
    fn release(&mut self, id: &PersonId, class: &str) {
        let Some(start) = self.starts.remove(&(id.clone(), class.to_string())) else {
            return;
        };
        let mut was_lead = false;
        for p in Period::ALL {
            let key = (id.clone(), p);
            if self.slots.get(&key).and_then(SlotAssignment::class) == Some(class) {
                if let Some(SlotAssignment::Working { role, .. }) = self.slots.remove(&key) {
                    was_lead |= role == Role::Lead;
                }
            }
        }
        if let Some(n) = self.filled.get_mut(&(class.to_string(), start)) {
            *n = n.saturating_sub(1);
        }
        if was_lead {
            self.leads.remove(&(class.to_string(), start));
        }
    }

    fn set_off(&mut self, id: &PersonId, period: Period, mandated: bool) {
        self.slots.insert((id.clone(), period), SlotAssignment::Off);
        if mandated {
            self.mandated.entry(id.clone()).or_default().push(period);
        }
    }
}

/// Demande agrégée par période : chaque période de départ d'une classe
/// réclame `staff_required` personnes sur toute sa plage.
fn demand_by_period(classes: &[SkillClass]) -> BTreeMap<Period, u32> {
    let mut demand: BTreeMap<Period, u32> = Period::ALL.iter().map(|p| (*p, 0)).collect();
    for class in classes {
        for start in class.staff_start_periods() {
            for p in class.staff_span(start).unwrap_or_default() {
                let slot = demand.entry(p).or_insert(0);
                *slot = slot.saturating_add(class.staff_required);
            }
        }
    }
    demand
}

/// Construit le modèle hebdomadaire fixe de chaque membre du staff.
pub fn allocate_skills(
    roster: &StaffRoster,
    classes: &[SkillClass],
    fixed_off: &BTreeMap<PersonId, Vec<Period>>,
    opts: &AllocOptions,
) -> SkillsOutcome {
    let mut board = Board::default();

    // 1. coordinateurs en lead
    for class in classes {
        for coord in &class.coordinators {
            if !roster.contains(coord) {
                tracing::warn!(class = %class.name, id = %coord, "coordinator not in roster");
                continue;
            }
            if board.holds(coord, &class.name) {
                continue;
            }
            let slot = class.staff_start_periods().into_iter().find_map(|start| {
                let span = class.staff_span(start)?;
                (board.filled(&class.name, start) < class.staff_required
                    && board.span_free(coord, &span))
                .then_some(span)
            });
            match slot {
                Some(span) => board.place(coord, class, &span, Role::Lead),
                None => tracing::warn!(class = %class.name, id = %coord, "no period left for coordinator"),
            }
        }
    }

    // 2. congés imposés
    for (id, periods) in fixed_off {
        if !roster.contains(id) {
            tracing::warn!(id = %id, "fixed-off entry for unknown staff member");
            continue;
        }
        for period in periods {
            let held = board
                .slots
                .get(&(id.clone(), *period))
                .and_then(SlotAssignment::class)
                .map(str::to_string);
            if let Some(class) = held {
                tracing::warn!(id = %id, %class, %period, "fixed off overrides coordinator slot");
                board.release(id, &class);
            }
            board.set_off(id, *period, true);
        }
    }

    // 3. OFF là où l'offre restante dépasse le plus la demande restante
    let demand = demand_by_period(classes);
    for person in roster.iter() {
        if board.has_off(&person.id) {
            continue;
        }
        let slack = |p: Period| -> i64 {
            let free = roster.ids().filter(|id| board.is_free(id, p)).count() as i64;
            let working = roster
                .ids()
                .filter(|id| board.slots.get(&((*id).clone(), p)).is_some_and(SlotAssignment::is_working))
                .count() as i64;
            let needed = i64::from(demand.get(&p).copied().unwrap_or(0)) - working;
            free - needed.max(0)
        };
        let roomiest = Period::ALL
            .iter()
            .copied()
            .filter(|p| board.is_free(&person.id, *p))
            .min_by_key(|p| (Reverse(slack(*p)), demand.get(p).copied().unwrap_or(0), *p));
        if let Some(period) = roomiest {
            board.set_off(&person.id, period, false);
        }
    }

    // 4. file de demande globale, période par période
    let mut shortfalls = Vec::new();
    for period in Period::ALL {
        for class in classes {
            if !class.staff_start_periods().contains(&period) {
                continue;
            }
            let Some(span) = class.staff_span(period) else {
                continue;
            };
            let mut needed = class
                .staff_required
                .saturating_sub(board.filled(&class.name, period));
            for person in roster.iter() {
                if needed == 0 {
                    break;
                }
                let id = &person.id;
                if class.coordinators.contains(id)
                    || !class.admits(person)
                    || board.holds(id, &class.name)
                    || board.working_count(id) + span.len() > opts.working_periods
                    || !board.span_free(id, &span)
                {
                    continue;
                }
                let role = if board.leads.contains(&(class.name.clone(), period)) {
                    Role::Assistant
                } else {
                    Role::Lead
                };
                board.place(id, class, &span, role);
                needed -= 1;
            }
            if needed > 0 {
                tracing::warn!(class = %class.name, %period, missing = needed, "skills class short of staff");
                shortfalls.push(SkillsShortfall {
                    class: class.name.clone(),
                    period,
                    missing: needed,
                });
            }
        }
    }

    // 5. reste : OFF si le quota est libre, sinon Help
    for person in roster.iter() {
        for period in Period::ALL {
            if board.is_free(&person.id, period) {
                if board.has_off(&person.id) {
                    board.slots.insert((person.id.clone(), period), SlotAssignment::Help);
                } else {
                    board.set_off(&person.id, period, false);
                }
            }
        }
    }

    let mut patterns = Vec::with_capacity(roster.len());
    for person in roster.iter() {
        patterns.push(board.finish_one(person));
    }

    tracing::info!(
        staff = patterns.len(),
        shortfalls = shortfalls.len(),
        "skills patterns built"
    );
    SkillsOutcome {
        patterns,
        shortfalls,
    }
}

impl Board {
    fn finish_one(&mut self, person: &Person) -> StaffWeeklyPattern {
        let slots = Period::ALL.map(|p| {
            self.slots
                .remove(&(person.id.clone(), p))
                .unwrap_or(SlotAssignment::Help)
        });
        let mut mandated = self.mandated.remove(&person.id).unwrap_or_default();
        mandated.sort();
        mandated.dedup();
        StaffWeeklyPattern {
            staff: person.id.clone(),
            slots,
            mandated_off: mandated,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Certification;

    fn roster(n: usize) -> StaffRoster {
        StaffRoster::new(
            (0..n)
                .map(|i| {
                    let p = Person::new(i.to_string(), format!("S{i}"));
                    if i % 2 == 0 {
                        p.with_certification(Certification::Archery)
                    } else {
                        p
                    }
                })
                .collect(),
        )
    }

    fn classes() -> Vec<SkillClass> {
        let mut archery = SkillClass::new("Archery", 1, vec![Period::P1, Period::P2]);
        archery.certification = Some(Certification::Archery);
        let mut sailing = SkillClass::new("Sailing", 1, vec![Period::P1, Period::P2, Period::P3]).double();
        sailing.coordinators = vec![PersonId::new("1")];
        let tennis = SkillClass::new("Tennis", 2, vec![Period::P1, Period::P2, Period::P3]);
        vec![archery, sailing, tennis]
    }

    #[test]
    fn coordinator_leads_double_period() {
        let out = allocate_skills(&roster(6), &classes(), &BTreeMap::new(), &AllocOptions::default());
        let coord = out.pattern(&PersonId::new("1")).unwrap();
        assert_eq!(
            coord.slot(Period::P1),
            &SlotAssignment::Working {
                class: "Sailing".into(),
                role: Role::Lead
            }
        );
        assert_eq!(coord.slot(Period::P2), coord.slot(Period::P1));
        assert_eq!(coord.slot(Period::P3), &SlotAssignment::Off);
    }

    #[test]
    fn every_pattern_has_single_off_and_eligible_classes() {
        let roster = roster(6);
        let out = allocate_skills(&roster, &classes(), &BTreeMap::new(), &AllocOptions::default());
        assert_eq!(out.patterns.len(), 6);
        for pattern in &out.patterns {
            assert_eq!(pattern.off_count(), 1, "{pattern:?}");
            assert!(pattern.working_count() <= 2);
            let person = roster.get(&pattern.staff).unwrap();
            if pattern.holds("Archery") {
                assert!(person.is_certified(Certification::Archery));
            }
        }
    }

    #[test]
    fn fixed_off_releases_coordinator_span() {
        let mut fixed = BTreeMap::new();
        fixed.insert(PersonId::new("1"), vec![Period::P2]);
        let out = allocate_skills(&roster(6), &classes(), &fixed, &AllocOptions::default());
        let coord = out.pattern(&PersonId::new("1")).unwrap();
        assert_eq!(coord.slot(Period::P2), &SlotAssignment::Off);
        assert_eq!(coord.mandated_off, vec![Period::P2]);
        assert!(!coord.holds("Sailing"));
        // someone else picks up sailing as a contiguous pair
        let sailor = out
            .patterns
            .iter()
            .find(|p| p.holds("Sailing"))
            .expect("sailing staffed");
        let held: Vec<Period> = Period::ALL
            .into_iter()
            .filter(|p| sailor.slot(*p).class() == Some("Sailing"))
            .collect();
        assert_eq!(held.len(), 2);
        assert_eq!(held[0].next(), Some(held[1]));
    }

    #[test]
    fn unmet_demand_is_reported() {
        let class = SkillClass::new("Soccer", 5, vec![Period::P1]);
        let out = allocate_skills(&roster(2), &[class], &BTreeMap::new(), &AllocOptions::default());
        assert_eq!(
            out.shortfalls,
            vec![SkillsShortfall {
                class: "Soccer".into(),
                period: Period::P1,
                missing: 3
            }]
        );
        assert!(out.patterns.iter().all(|p| p.slots.contains(&SlotAssignment::Help)));
    }

    fn off_per_period(out: &SkillsOutcome) -> [usize; 3] {
        let mut offs = [0; 3];
        for pattern in &out.patterns {
            for p in Period::ALL {
                if pattern.slot(p) == &SlotAssignment::Off {
                    offs[p.index()] += 1;
                }
            }
        }
        offs
    }

    #[test]
    fn off_periods_spread_with_demand() {
        let classes = vec![
            SkillClass::new("Archery", 4, vec![Period::P1]),
            SkillClass::new("Tennis", 4, vec![Period::P2]),
            SkillClass::new("Soccer", 4, vec![Period::P3]),
        ];
        let out = allocate_skills(&roster(18), &classes, &BTreeMap::new(), &AllocOptions::default());
        assert_eq!(off_per_period(&out), [6, 6, 6]);
        assert!(out.shortfalls.is_empty(), "{:?}", out.shortfalls);
    }

    #[test]
    fn busy_period_keeps_its_staff() {
        let classes = vec![
            SkillClass::new("Waterfront", 6, vec![Period::P1]),
            SkillClass::new("Tennis", 1, vec![Period::P2]),
            SkillClass::new("Soccer", 1, vec![Period::P3]),
        ];
        let roster = StaffRoster::new((0..9).map(|i| Person::new(i.to_string(), format!("S{i}"))).collect());
        let out = allocate_skills(&roster, &classes, &BTreeMap::new(), &AllocOptions::default());
        assert!(out.shortfalls.is_empty(), "{:?}", out.shortfalls);
        assert_eq!(off_per_period(&out)[0], 0);
    }
}
