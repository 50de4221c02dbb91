#![forbid(unsafe_code)]
//! Camp scheduler : moteur de planification hebdomadaire d'un camp (sans BD).
//!
//! - Entrées fichiers (CSV/JSON), un répertoire de sortie horodaté par run.
//! - Congés jour/nuit, lieux de temps libre, modèles de skills, couverture.
//! - Inscription des campeurs par priorité, avec seuil de viabilité.
//! - Aléa injecté et seedable ; audit des invariants après coup.

pub mod config;
pub mod io;
pub mod model;
pub mod pipeline;
pub mod sample;
pub mod scheduler;
pub mod storage;
pub mod summary;

pub use config::{CampConfig, ConfigStore, LocationConfig};
pub use model::{
    ActivityLocation, BlackoutWindow, Camper, CamperId, Certification, IdentityPolicy, Period,
    Person, PersonId, Role, SkillClass, SlotAssignment, StaffRoster, StaffWeeklyPattern,
    TimeOffRequest,
};
pub use pipeline::{run, RunReport, RunRequest, Stage};
pub use scheduler::{AllocOptions, SchedError, Scheduler, Violation, ViolationKind, WeekCalendar};
pub use storage::{ArtifactStore, RunDirectory};
pub use summary::{prepare_summary, RunSummary, SummaryRenderer, TextSummary};
