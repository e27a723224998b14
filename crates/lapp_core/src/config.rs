//! Runtime configuration loaded from TOML.
//!
//! # Responsibility
//! - Carry the scoring constants deployments disagree on (`time_weight_k`).
//! - Locate the study database and the log directory.
//!
//! # Invariants
//! - `time_weight_k` has no default; it must be configured explicitly.
//! - Every value is validated before a config is handed out.
//!
//! ```toml
//! [engine]
//! time_weight_k = 2.0
//! position_threshold = 0.75
//!
//! [storage]
//! database_path = "/var/lib/lapp/study.sqlite3"
//!
//! [logging]
//! level = "info"
//! log_dir = "/var/log/lapp"
//! ```

use crate::db::{open_db, open_db_in_memory, DbResult};
use crate::logging::{default_log_level, init_logging};
use crate::service::position::{is_valid_threshold, DEFAULT_POSITION_THRESHOLD};
use rusqlite::Connection;
use serde::Deserialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

const DEFAULT_ALLOCATION_ATTEMPTS: u32 = 3;

#[derive(Debug)]
pub enum ConfigError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse(toml::de::Error),
    Invalid {
        field: &'static str,
        reason: String,
    },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "failed to read config `{}`: {source}", path.display())
            }
            Self::Parse(err) => write!(f, "failed to parse config: {err}"),
            Self::Invalid { field, reason } => write!(f, "invalid config `{field}`: {reason}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse(err) => Some(err),
            Self::Invalid { .. } => None,
        }
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(value: toml::de::Error) -> Self {
        Self::Parse(value)
    }
}

/// Scoring and allocation parameters.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    /// Multiplier of the `ln(days + 2)` time weight.
    pub time_weight_k: f64,
    #[serde(default = "default_position_threshold")]
    pub position_threshold: f64,
    /// Insert attempts per created record before giving up on collisions.
    #[serde(default = "default_allocation_attempts")]
    pub allocation_attempts: u32,
}

impl EngineConfig {
    /// Builds a validated config with default threshold and attempts.
    pub fn new(time_weight_k: f64) -> Result<Self, ConfigError> {
        let config = Self {
            time_weight_k,
            position_threshold: DEFAULT_POSITION_THRESHOLD,
            allocation_attempts: DEFAULT_ALLOCATION_ATTEMPTS,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.time_weight_k.is_finite() || self.time_weight_k <= 0.0 {
            return Err(ConfigError::Invalid {
                field: "engine.time_weight_k",
                reason: format!("expected a finite value > 0, got {}", self.time_weight_k),
            });
        }
        if !is_valid_threshold(self.position_threshold) {
            return Err(ConfigError::Invalid {
                field: "engine.position_threshold",
                reason: format!("expected a value in (0, 1], got {}", self.position_threshold),
            });
        }
        if self.allocation_attempts == 0 {
            return Err(ConfigError::Invalid {
                field: "engine.allocation_attempts",
                reason: "expected at least 1".to_string(),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// SQLite file. `None` keeps the store in memory.
    pub database_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    pub level: Option<String>,
    /// Absolute directory for rolling log files. `None` disables file logs.
    pub log_dir: Option<PathBuf>,
}

impl LoggingConfig {
    pub fn level(&self) -> &str {
        self.level.as_deref().unwrap_or(default_log_level())
    }
}

/// Top-level configuration document.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LappConfig {
    pub engine: EngineConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl LappConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.engine.validate()?;
        if let Some(log_dir) = &config.logging.log_dir {
            if !log_dir.is_absolute() {
                return Err(ConfigError::Invalid {
                    field: "logging.log_dir",
                    reason: format!("must be an absolute path, got `{}`", log_dir.display()),
                });
            }
        }
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Opens the configured database, or an in-memory one.
    pub fn open_database(&self) -> DbResult<Connection> {
        match &self.storage.database_path {
            Some(path) => open_db(path),
            None => open_db_in_memory(),
        }
    }

    /// Starts file logging when `logging.log_dir` is set. Returns whether
    /// logging is active afterwards.
    pub fn init_logging(&self) -> Result<bool, String> {
        let Some(log_dir) = &self.logging.log_dir else {
            return Ok(false);
        };
        let log_dir = log_dir
            .to_str()
            .ok_or_else(|| format!("log_dir `{}` is not valid UTF-8", log_dir.display()))?;
        init_logging(self.logging.level(), log_dir)?;
        Ok(true)
    }
}

fn default_position_threshold() -> f64 {
    DEFAULT_POSITION_THRESHOLD
}

fn default_allocation_attempts() -> u32 {
    DEFAULT_ALLOCATION_ATTEMPTS
}
