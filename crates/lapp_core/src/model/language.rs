//! Language: the top-level container of the hierarchy.
//!
//! # Invariants
//! - `score` is the mean of the owned Units' scores, or `0` with no Units.
//! - `current_unit`, when set, names a Unit of this Language. A stale value
//!   is tolerated in storage and healed on the next snapshot read.

use super::validation::{validate_id, validate_required, validate_score, ModelValidationError};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Stable, human-readable language identifier (`lang_L{n}`).
pub type LanguageId = String;

/// Default CEFR-like level assigned to new languages and units.
pub const DEFAULT_LEVEL: &str = "A1";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Language {
    pub id: LanguageId,
    pub name: String,
    pub native_name: Option<String>,
    pub level: String,
    pub description: String,
    /// Flag emoji or short code shown next to the name.
    pub flag: String,
    pub score: f64,
    pub last_practiced: NaiveDate,
    pub current_unit: Option<String>,
}

impl Language {
    /// Creates a language with zero score and no current unit.
    pub fn new(id: impl Into<LanguageId>, name: impl Into<String>, today: NaiveDate) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            native_name: None,
            level: DEFAULT_LEVEL.to_string(),
            description: String::new(),
            flag: String::new(),
            score: 0.0,
            last_practiced: today,
            current_unit: None,
        }
    }

    pub fn validate(&self) -> Result<(), ModelValidationError> {
        validate_id(&self.id)?;
        validate_required(&self.id, "name", &self.name)?;
        validate_score(&self.id, self.score)
    }
}

/// Caller-editable language fields. Never carries score state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguageDetails {
    pub name: String,
    pub native_name: Option<String>,
    pub level: Option<String>,
    pub description: Option<String>,
    pub flag: Option<String>,
}

impl LanguageDetails {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub(crate) fn apply_to(&self, language: &mut Language) {
        language.name = self.name.trim().to_string();
        if let Some(native_name) = &self.native_name {
            language.native_name = Some(native_name.clone());
        }
        if let Some(level) = &self.level {
            language.level = level.clone();
        }
        if let Some(description) = &self.description {
            language.description = description.clone();
        }
        if let Some(flag) = &self.flag {
            language.flag = flag.clone();
        }
    }
}
