//! Mastery tracking core for a language-learning app.
//! Language -> Unit -> Item records, time-weighted scoring and
//! aggregation, current-unit selection and SQLite persistence.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use config::{ConfigError, EngineConfig, LappConfig};
pub use db::{open_db, open_db_in_memory, DbError, DbResult};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::item::{Associations, Item, ItemBody, ItemId};
pub use model::kind::{EntityKind, ItemKind};
pub use model::language::{Language, LanguageDetails, LanguageId};
pub use model::unit::{Unit, UnitDetails, UnitId};
pub use model::validation::{clamp_score, ModelValidationError};
pub use repo::study_repo::{RepoError, RepoResult, SqliteStudyRepository, StudyRepository};
pub use service::clock::{Clock, FixedClock, SystemClock};
pub use service::error::{MasteryError, MasteryResult};
pub use service::mastery_service::{MasteryService, OutcomeReport};
pub use service::scorer::MasteryScorer;

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
