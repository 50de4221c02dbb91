use anyhow::Context;
use chrono::NaiveDateTime;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

pub const DAY_OFF_RESULTS: &str = "day_off_results.csv";
pub const DAY_OFF_UNASSIGNED: &str = "day_off_unassigned.csv";
pub const FREETIME_SCHEDULE: &str = "freetime_schedule.csv";
pub const SKILLS_SCHEDULE: &str = "skills_schedule.csv";
pub const SKILLS_UNASSIGNED: &str = "skills_unassigned.csv";
pub const COVERAGE_SCHEDULE: &str = "coverage_schedule.csv";
pub const CAMPER_ASSIGNMENTS: &str = "camper_assignments.csv";
pub const SKILLS_NOT_RUN: &str = "skills_not_run.csv";
pub const CAMPER_UNASSIGNED: &str = "camper_unassigned_log.csv";
pub const SUMMARY_LOG: &str = "log.txt";
pub const ERROR_LOG: &str = "ERROR_LOG.txt";

pub trait ArtifactStore {
    /// Écrit un artefact de manière atomique.
    fn put(&self, name: &str, bytes: &[u8]) -> anyhow::Result<PathBuf>;
    fn contains(&self, name: &str) -> bool;
    fn read(&self, name: &str) -> anyhow::Result<Vec<u8>>;
}

/// Répertoire de sortie d'un run : `<base>/<horodatage>[_n]`
#[derive(Debug, Clone)]
pub struct RunDirectory {
    path: PathBuf,
    timestamp: NaiveDateTime,
}

impl RunDirectory {
    pub const STAMP_FORMAT: &'static str = "%Y-%m-%d_%H-%M-%S";

    /// Crée un nouveau répertoire ; suffixe `_2`, `_3`… s'il existe déjà.
    pub fn create<P: AsRef<Path>>(base: P, timestamp: NaiveDateTime) -> anyhow::Result<Self> {
        let base = base.as_ref();
        fs::create_dir_all(base).with_context(|| format!("creating {}", base.display()))?;
        let stamp = timestamp.format(Self::STAMP_FORMAT).to_string();
        let mut path = base.join(&stamp);
        let mut n = 2;
        while path.exists() {
            path = base.join(format!("{stamp}_{n}"));
            n += 1;
        }
        fs::create_dir(&path).with_context(|| format!("creating run directory {}", path.display()))?;
        tracing::debug!(dir = %path.display(), "run directory created");
        Ok(Self { path, timestamp })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn timestamp(&self) -> NaiveDateTime {
        self.timestamp
    }

    /// Rend un artefact dans un tampon puis l'écrit atomiquement.
    pub fn write_with<F>(&self, name: &str, render: F) -> anyhow::Result<PathBuf>
    where
        F: FnOnce(&mut Vec<u8>) -> anyhow::Result<()>,
    {
        let mut buf = Vec::new();
        render(&mut buf).with_context(|| format!("rendering {name}"))?;
        self.put(name, &buf)
    }

    /// `ERROR_LOG.txt` : horodatage et chaîne d'erreurs.
    pub fn write_error(&self, err: &anyhow::Error, at: NaiveDateTime) -> anyhow::Result<PathBuf> {
        let mut text = format!("[{}] {err}\n", at.format("%Y-%m-%d %H:%M:%S"));
        for cause in err.chain().skip(1) {
            text.push_str(&format!("  caused by: {cause}\n"));
        }
        self.put(ERROR_LOG, text.as_bytes())
    }
}

impl ArtifactStore for RunDirectory {
    fn put(&self, name: &str, bytes: &[u8]) -> anyhow::Result<PathBuf> {
        let target = self.path.join(name);
        let mut tmp = NamedTempFile::new_in(&self.path).with_context(|| "creating temp file")?;
        tmp.write_all(bytes)?;
        tmp.flush()?;
        tmp.as_file().sync_all()?;
        tmp.persist(&target)
            .with_context(|| format!("atomic rename to {}", target.display()))?;
        Ok(target)
    }

    fn contains(&self, name: &str) -> bool {
        self.path.join(name).is_file()
    }

    fn read(&self, name: &str) -> anyhow::Result<Vec<u8>> {
        let path = self.path.join(name);
        fs::read(&path).with_context(|| format!("reading {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 7, 4)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap()
    }

    #[test]
    fn same_timestamp_gets_a_suffix() {
        let base = tempfile::tempdir().unwrap();
        let first = RunDirectory::create(base.path(), at()).unwrap();
        let second = RunDirectory::create(base.path(), at()).unwrap();
        assert!(first.path().ends_with("2025-07-04_09-30-00"));
        assert!(second.path().ends_with("2025-07-04_09-30-00_2"));
    }

    #[test]
    fn error_log_lists_causes() {
        let base = tempfile::tempdir().unwrap();
        let run = RunDirectory::create(base.path(), at()).unwrap();
        let err = anyhow::anyhow!("missing file").context("loading classes.json");
        run.write_error(&err, at()).unwrap();
        let text = String::from_utf8(run.read(ERROR_LOG).unwrap()).unwrap();
        assert!(text.starts_with("[2025-07-04 09:30:00] loading classes.json"));
        assert!(text.contains("caused by: missing file"));
    }
}
