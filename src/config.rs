use crate::model::{ActivityLocation, BlackoutWindow, Period, PersonId, SkillClass};
use crate::scheduler::AllocOptions;
use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

pub const DATES_FILE: &str = "dates.json";
pub const LOCATIONS_FILE: &str = "locations.json";
pub const CLASSES_FILE: &str = "classes.json";
pub const FIXED_OFF_FILE: &str = "fixed_skills_off.json";
pub const SETTINGS_FILE: &str = "settings.json";

/// Bornes d'une fenêtre d'interdiction dans `dates.json`
#[derive(Debug, Clone, Serialize, Deserialize)]
struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

/// `dates.json` : `{"blackout_periods": {"<nom>": {"start", "end"}}}`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct DatesFile {
    #[serde(default)]
    blackout_periods: BTreeMap<String, DateRange>,
}

/// Lieux de temps libre (`locations.json`), dans l'ordre de remplissage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationConfig {
    #[serde(default = "default_lifeguard")]
    pub lifeguard_location: String,
    pub locations: Vec<ActivityLocation>,
}

fn default_lifeguard() -> String {
    "Lifeguard".to_string()
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self {
            lifeguard_location: default_lifeguard(),
            locations: Vec::new(),
        }
    }
}

impl LocationConfig {
    pub fn validate(&self) -> Result<()> {
        if self.lifeguard_location.trim().is_empty() {
            bail!("lifeguard_location cannot be empty");
        }
        let mut seen = HashSet::new();
        for location in &self.locations {
            if location.name.trim().is_empty() {
                bail!("location name cannot be empty");
            }
            if !seen.insert(location.name.as_str()) {
                bail!("duplicate location {}", location.name);
            }
        }
        Ok(())
    }
}

/// Congés imposés d'un membre du staff : une liste de périodes, ou une liste
/// par jour (réunie, le modèle étant hebdomadaire).
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum FixedOffEntry {
    Periods(Vec<Period>),
    ByDay(BTreeMap<String, Vec<Period>>),
}

impl FixedOffEntry {
    fn periods(self) -> Vec<Period> {
        let set: BTreeSet<Period> = match self {
            FixedOffEntry::Periods(p) => p.into_iter().collect(),
            FixedOffEntry::ByDay(days) => days.into_values().flatten().collect(),
        };
        set.into_iter().collect()
    }
}

fn validate_classes(classes: &[SkillClass]) -> Result<()> {
    let mut seen = HashSet::new();
    for class in classes {
        if class.name.trim().is_empty() {
            bail!("class name cannot be empty");
        }
        if !seen.insert(class.name.as_str()) {
            bail!("duplicate class {}", class.name);
        }
        if class.staff_required == 0 {
            bail!("class {}: staff_required must be > 0", class.name);
        }
        if class.periods.is_empty() {
            bail!("class {}: at least one period is required", class.name);
        }
        if class.double_period && class.staff_start_periods().is_empty() {
            bail!("class {}: double period needs a start period before 3", class.name);
        }
    }
    Ok(())
}

/// Configuration complète d'une semaine
#[derive(Debug, Clone, Default)]
pub struct CampConfig {
    pub blackouts: Vec<BlackoutWindow>,
    pub locations: LocationConfig,
    pub classes: Vec<SkillClass>,
    pub fixed_off: BTreeMap<PersonId, Vec<Period>>,
    pub options: AllocOptions,
}

impl CampConfig {
    pub fn validate(&self) -> Result<()> {
        self.locations.validate()?;
        validate_classes(&self.classes)?;
        self.options.validate()?;
        Ok(())
    }
}

/// Lecture/écriture des fichiers JSON du répertoire de données.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    base_dir: PathBuf,
}

impl ConfigStore {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            base_dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn path(&self, file: &str) -> PathBuf {
        self.base_dir.join(file)
    }

    fn read_json<T: DeserializeOwned>(&self, file: &str) -> Result<T> {
        let path = self.path(file);
        let data = fs::read(&path).with_context(|| format!("reading {}", path.display()))?;
        serde_json::from_slice(&data).with_context(|| format!("parsing {}", path.display()))
    }

    fn write_json<T: Serialize + ?Sized>(&self, file: &str, value: &T) -> Result<PathBuf> {
        fs::create_dir_all(&self.base_dir)
            .with_context(|| format!("creating data directory {}", self.base_dir.display()))?;
        let path = self.path(file);
        let json = serde_json::to_string_pretty(value)?;
        fs::write(&path, json).with_context(|| format!("writing {}", path.display()))?;
        Ok(path)
    }

    pub fn load_blackouts(&self) -> Result<Vec<BlackoutWindow>> {
        let dates: DatesFile = self.read_json(DATES_FILE)?;
        dates
            .blackout_periods
            .into_iter()
            .map(|(name, range)| {
                BlackoutWindow::new(name.clone(), range.start, range.end)
                    .map_err(anyhow::Error::msg)
                    .with_context(|| format!("blackout period {name}"))
            })
            .collect()
    }

    pub fn save_blackouts(&self, windows: &[BlackoutWindow]) -> Result<PathBuf> {
        let dates = DatesFile {
            blackout_periods: windows
                .iter()
                .map(|w| {
                    (
                        w.name.clone(),
                        DateRange {
                            start: w.start,
                            end: w.end,
                        },
                    )
                })
                .collect(),
        };
        self.write_json(DATES_FILE, &dates)
    }

    pub fn load_locations(&self) -> Result<LocationConfig> {
        let config: LocationConfig = self.read_json(LOCATIONS_FILE)?;
        config
            .validate()
            .with_context(|| format!("validating {LOCATIONS_FILE}"))?;
        Ok(config)
    }

    pub fn save_locations(&self, config: &LocationConfig) -> Result<PathBuf> {
        config.validate()?;
        self.write_json(LOCATIONS_FILE, config)
    }

    pub fn load_classes(&self) -> Result<Vec<SkillClass>> {
        let classes: Vec<SkillClass> = self.read_json(CLASSES_FILE)?;
        validate_classes(&classes).with_context(|| format!("validating {CLASSES_FILE}"))?;
        Ok(classes)
    }

    pub fn save_classes(&self, classes: &[SkillClass]) -> Result<PathBuf> {
        validate_classes(classes)?;
        self.write_json(CLASSES_FILE, classes)
    }

    /// Fichier absent : aucun congé imposé.
    pub fn load_fixed_off(&self) -> Result<BTreeMap<PersonId, Vec<Period>>> {
        if !self.path(FIXED_OFF_FILE).exists() {
            return Ok(BTreeMap::new());
        }
        let raw: BTreeMap<String, FixedOffEntry> = self.read_json(FIXED_OFF_FILE)?;
        Ok(raw
            .into_iter()
            .map(|(id, entry)| (PersonId::new(id), entry.periods()))
            .collect())
    }

    pub fn save_fixed_off(&self, fixed: &BTreeMap<PersonId, Vec<Period>>) -> Result<PathBuf> {
        self.write_json(FIXED_OFF_FILE, fixed)
    }

    /// Fichier absent : valeurs par défaut.
    pub fn load_settings(&self) -> Result<AllocOptions> {
        if !self.path(SETTINGS_FILE).exists() {
            return Ok(AllocOptions::default());
        }
        let options: AllocOptions = self.read_json(SETTINGS_FILE)?;
        options
            .validate()
            .with_context(|| format!("validating {SETTINGS_FILE}"))?;
        Ok(options)
    }

    pub fn save_settings(&self, options: &AllocOptions) -> Result<PathBuf> {
        options.validate()?;
        self.write_json(SETTINGS_FILE, options)
    }

    pub fn load_all(&self) -> Result<CampConfig> {
        let config = CampConfig {
            blackouts: self.load_blackouts()?,
            locations: self.load_locations()?,
            classes: self.load_classes()?,
            fixed_off: self.load_fixed_off()?,
            options: self.load_settings()?,
        };
        tracing::debug!(
            dir = %self.base_dir.display(),
            blackouts = config.blackouts.len(),
            locations = config.locations.locations.len(),
            classes = config.classes.len(),
            "configuration loaded"
        );
        Ok(config)
    }

    pub fn save_all(&self, config: &CampConfig) -> Result<()> {
        config.validate()?;
        self.save_blackouts(&config.blackouts)?;
        self.save_locations(&config.locations)?;
        self.save_classes(&config.classes)?;
        self.save_fixed_off(&config.fixed_off)?;
        self.save_settings(&config.options)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_off_accepts_both_shapes() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join(FIXED_OFF_FILE),
            r#"{"12": [3], "14": {"Monday": [1], "Friday": [1, 2]}}"#,
        )
        .unwrap();
        let fixed = ConfigStore::new(dir.path()).load_fixed_off().unwrap();
        assert_eq!(fixed[&PersonId::new("12")], vec![Period::P3]);
        assert_eq!(fixed[&PersonId::new("14")], vec![Period::P1, Period::P2]);
    }

    #[test]
    fn classes_reject_zero_staff() {
        let classes = vec![SkillClass::new("Tennis", 0, vec![Period::P1])];
        let err = validate_classes(&classes).unwrap_err();
        assert!(err.to_string().contains("staff_required"));
    }

    #[test]
    fn double_class_only_at_period_three_is_invalid() {
        let classes = vec![SkillClass::new("Sailing", 1, vec![Period::P3]).double()];
        assert!(validate_classes(&classes).is_err());
    }
}
