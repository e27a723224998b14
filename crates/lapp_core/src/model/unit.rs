//! Unit: a lesson-sized grouping of items inside one Language.

use super::language::DEFAULT_LEVEL;
use super::validation::{validate_id, validate_required, validate_score, ModelValidationError};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Human-readable unit identifier (`unit_U{n}`), sequenced per language.
pub type UnitId = String;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Unit {
    pub id: UnitId,
    /// Owning language. Deleting it deletes this unit.
    pub language_id: String,
    pub title: String,
    pub description: String,
    pub level: String,
    /// Mean of the owned items' scores, `0` while empty.
    pub score: f64,
    pub last_practiced: NaiveDate,
}

impl Unit {
    pub fn new(
        id: impl Into<UnitId>,
        language_id: impl Into<String>,
        title: impl Into<String>,
        today: NaiveDate,
    ) -> Self {
        Self {
            id: id.into(),
            language_id: language_id.into(),
            title: title.into(),
            description: String::new(),
            level: DEFAULT_LEVEL.to_string(),
            score: 0.0,
            last_practiced: today,
        }
    }

    pub fn validate(&self) -> Result<(), ModelValidationError> {
        validate_id(&self.id)?;
        validate_id(&self.language_id)?;
        validate_required(&self.id, "title", &self.title)?;
        validate_score(&self.id, self.score)
    }
}

/// Caller-editable unit fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitDetails {
    pub title: String,
    pub description: Option<String>,
    pub level: Option<String>,
}

impl UnitDetails {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    pub(crate) fn apply_to(&self, unit: &mut Unit) {
        unit.title = self.title.trim().to_string();
        if let Some(description) = &self.description {
            unit.description = description.clone();
        }
        if let Some(level) = &self.level {
            unit.level = level.clone();
        }
    }
}
