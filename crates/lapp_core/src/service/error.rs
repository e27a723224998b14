//! Error taxonomy of the mastery core.

use crate::config::ConfigError;
use crate::model::kind::EntityKind;
use crate::repo::study_repo::RepoError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type MasteryResult<T> = Result<T, MasteryError>;

/// Errors surfaced by mastery use-cases.
///
/// Dangling exercise associations are never an error; they are pruned.
#[derive(Debug)]
pub enum MasteryError {
    /// A language, unit or item id does not resolve.
    NotFound { kind: &'static str, id: String },
    /// A record's owner is missing, so the rollup has no parent to update.
    InvalidScope {
        kind: EntityKind,
        id: String,
        parent_id: String,
    },
    /// Every allocation attempt hit an existing id.
    AllocationCollision {
        kind: EntityKind,
        attempts: u32,
        last_id: String,
    },
    /// The highest suffix of this kind is `u64::MAX`; no further id exists.
    IdSpaceExhausted { kind: EntityKind },
    /// Caller input is inconsistent with the stored record.
    InvalidInput(String),
    /// Engine configuration was rejected.
    Config(ConfigError),
    /// Persistence gateway failure.
    Repo(RepoError),
}

impl MasteryError {
    pub(crate) fn not_found(kind: &'static str, id: &str) -> Self {
        Self::NotFound {
            kind,
            id: id.to_string(),
        }
    }
}

impl Display for MasteryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound { kind, id } => write!(f, "{kind} not found: {id}"),
            Self::InvalidScope {
                kind,
                id,
                parent_id,
            } => write!(f, "{kind} `{id}` refers to missing parent `{parent_id}`"),
            Self::AllocationCollision {
                kind,
                attempts,
                last_id,
            } => write!(
                f,
                "could not allocate a unique {kind} id after {attempts} attempts (last `{last_id}`)"
            ),
            Self::IdSpaceExhausted { kind } => {
                write!(f, "no {kind} id left after suffix {}", u64::MAX)
            }
            Self::InvalidInput(message) => write!(f, "invalid input: {message}"),
            Self::Config(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for MasteryError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Config(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for MasteryError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

impl From<ConfigError> for MasteryError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}
