use crate::storage::{self, ArtifactStore};
use anyhow::Result;
use chrono::NaiveDateTime;

/// Ligne du résumé : un artefact attendu et son état.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryEntry {
    pub file: &'static str,
    pub label: &'static str,
    pub present: bool,
    /// Lignes de données, pour les journaux dont la taille compte.
    pub rows: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub timestamp: NaiveDateTime,
    pub entries: Vec<SummaryEntry>,
}

impl RunSummary {
    pub fn produced(&self) -> usize {
        self.entries.iter().filter(|e| e.present).count()
    }
}

/// Permet de customiser le rendu du résumé (texte, markdown, etc.).
pub trait SummaryRenderer {
    fn render(&self, summary: &RunSummary) -> String;
}

/// Rendu texte de `log.txt`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TextSummary;

impl SummaryRenderer for TextSummary {
    fn render(&self, summary: &RunSummary) -> String {
        let mut lines = vec![
            "== Summary Log ==".to_string(),
            format!("Timestamp: {}", summary.timestamp.format("%Y-%m-%d %H:%M:%S")),
            String::new(),
        ];
        for entry in &summary.entries {
            lines.push(match (entry.present, entry.rows) {
                (false, _) => format!("Missing file: {}", entry.file),
                (true, Some(rows)) => format!("{}: {rows}", entry.label),
                (true, None) => entry.label.to_string(),
            });
        }
        lines.join("\n") + "\n"
    }
}

const EXPECTED: [(&str, &str, bool); 9] = [
    (storage::DAY_OFF_RESULTS, "Day off assignments exported", false),
    (storage::DAY_OFF_UNASSIGNED, "Day off unassigned entries", true),
    (storage::FREETIME_SCHEDULE, "Freetime schedule exported", false),
    (storage::SKILLS_SCHEDULE, "Skills schedule exported", false),
    (storage::SKILLS_UNASSIGNED, "Skills unassigned entries", true),
    (storage::COVERAGE_SCHEDULE, "Coverage schedule exported", false),
    (storage::CAMPER_ASSIGNMENTS, "Camper assignments exported", false),
    (storage::SKILLS_NOT_RUN, "Skills not run", true),
    (storage::CAMPER_UNASSIGNED, "Campers not fully assigned", true),
];

fn data_rows(bytes: &[u8]) -> usize {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(bytes);
    rdr.records().filter(|r| r.is_ok()).count()
}

/// Inventorie les artefacts présents dans `store`.
pub fn prepare_summary(store: &dyn ArtifactStore, timestamp: NaiveDateTime) -> Result<RunSummary> {
    let mut entries = Vec::with_capacity(EXPECTED.len());
    for (file, label, counted) in EXPECTED {
        let present = store.contains(file);
        let rows = if present && counted {
            Some(data_rows(&store.read(file)?))
        } else {
            None
        };
        entries.push(SummaryEntry {
            file,
            label,
            present,
            rows,
        });
    }
    Ok(RunSummary { timestamp, entries })
}
