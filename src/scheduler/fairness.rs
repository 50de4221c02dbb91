use crate::model::PersonId;
use std::collections::HashMap;

/// Compteur d'affectations par personne, partagé entre les étapes gloutonnes.
///
/// Passé explicitement à chaque allocateur : aucune étape ne lit les
/// compteurs d'une autre pendant qu'elle tourne.
#[derive(Debug, Clone, Default)]
pub struct FairnessTracker {
    counts: HashMap<PersonId, u32>,
}

impl FairnessTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self, id: &PersonId) -> u32 {
        self.counts.get(id).copied().unwrap_or(0)
    }

    pub fn record(&mut self, id: &PersonId) {
        *self.counts.entry(id.clone()).or_insert(0) += 1;
    }

    /// Candidat le moins sollicité ; à égalité, le premier dans l'ordre d'itération.
    pub fn least_used<'a, I>(&self, candidates: I) -> Option<&'a PersonId>
    where
        I: IntoIterator<Item = &'a PersonId>,
    {
        candidates.into_iter().min_by_key(|id| self.count(id))
    }

    /// Candidats par compteur croissant, stable sur l'ordre d'itération.
    pub fn rank<'a, I>(&self, candidates: I) -> Vec<&'a PersonId>
    where
        I: IntoIterator<Item = &'a PersonId>,
    {
        let mut ranked: Vec<&PersonId> = candidates.into_iter().collect();
        ranked.sort_by_key(|id| self.count(id));
        ranked
    }

    pub fn total(&self) -> u32 {
        self.counts.values().sum()
    }

    pub fn reset(&mut self) {
        self.counts.clear();
    }
}
