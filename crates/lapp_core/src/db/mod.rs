//! SQLite bootstrap for the study store.
//!
//! Connections come back with foreign keys on, every schema step applied and
//! the hierarchy tables verified. The schema version lives in
//! `PRAGMA user_version`; hierarchy deletes cascade in SQLite, not in core
//! code.

use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod migrations;
mod open;

pub use open::{open_db, open_db_in_memory};

pub type DbResult<T> = Result<T, DbError>;

/// Failures while opening or upgrading a study database.
#[derive(Debug)]
pub enum DbError {
    Sqlite(rusqlite::Error),
    /// The file was written by a newer build.
    UnsupportedSchemaVersion { found: u32, supported: u32 },
    /// One schema step failed; nothing from the run was committed.
    MigrationFailed {
        version: u32,
        step: &'static str,
        source: rusqlite::Error,
    },
    /// `user_version` claims a current schema but hierarchy tables are absent.
    MissingTables {
        version: u32,
        tables: Vec<&'static str>,
    },
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "study database error: {err}"),
            Self::UnsupportedSchemaVersion { found, supported } => write!(
                f,
                "study database schema version {found} is newer than supported {supported}"
            ),
            Self::MigrationFailed {
                version,
                step,
                source,
            } => write!(f, "schema step {version} ({step}) failed: {source}"),
            Self::MissingTables { version, tables } => write!(
                f,
                "study database at schema version {version} lacks tables: {}",
                tables.join(", ")
            ),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) | Self::MigrationFailed { source: err, .. } => Some(err),
            Self::UnsupportedSchemaVersion { .. } | Self::MissingTables { .. } => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}
