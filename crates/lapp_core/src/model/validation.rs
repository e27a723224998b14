//! Shared validation rules for hierarchy records.

use std::error::Error;
use std::fmt::{Display, Formatter};

/// Lowest representable mastery score.
pub const MIN_SCORE: f64 = 0.0;
/// Highest representable mastery score.
pub const MAX_SCORE: f64 = 100.0;

/// Validation failures raised before a record reaches storage.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelValidationError {
    /// Score is NaN, infinite, or outside `[0, 100]`.
    ScoreOutOfRange { id: String, score: f64 },
    /// Identifier is empty after trim.
    BlankId,
    /// A required text field is empty after trim.
    BlankField { id: String, field: &'static str },
    /// An exercise lists an association id of the wrong kind.
    MismatchedAssociation { exercise_id: String, target_id: String },
}

impl Display for ModelValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ScoreOutOfRange { id, score } => {
                write!(f, "score {score} of `{id}` is outside [0, 100]")
            }
            Self::BlankId => write!(f, "record id must not be blank"),
            Self::BlankField { id, field } => {
                write!(f, "field `{field}` of `{id}` must not be blank")
            }
            Self::MismatchedAssociation {
                exercise_id,
                target_id,
            } => write!(
                f,
                "exercise `{exercise_id}` lists `{target_id}` under the wrong association kind"
            ),
        }
    }
}

impl Error for ModelValidationError {}

/// Clamps any float into the score range. NaN collapses to the minimum.
pub fn clamp_score(value: f64) -> f64 {
    if value.is_nan() {
        return MIN_SCORE;
    }
    value.clamp(MIN_SCORE, MAX_SCORE)
}

pub(crate) fn validate_score(id: &str, score: f64) -> Result<(), ModelValidationError> {
    if score.is_finite() && (MIN_SCORE..=MAX_SCORE).contains(&score) {
        return Ok(());
    }
    Err(ModelValidationError::ScoreOutOfRange {
        id: id.to_string(),
        score,
    })
}

pub(crate) fn validate_id(id: &str) -> Result<(), ModelValidationError> {
    if id.trim().is_empty() {
        return Err(ModelValidationError::BlankId);
    }
    Ok(())
}

pub(crate) fn validate_required(
    id: &str,
    field: &'static str,
    value: &str,
) -> Result<(), ModelValidationError> {
    if value.trim().is_empty() {
        return Err(ModelValidationError::BlankField {
            id: id.to_string(),
            field,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{clamp_score, validate_score};

    #[test]
    fn clamp_score_handles_out_of_range_and_nan() {
        assert_eq!(clamp_score(-3.0), 0.0);
        assert_eq!(clamp_score(140.0), 100.0);
        assert_eq!(clamp_score(f64::NAN), 0.0);
        assert_eq!(clamp_score(f64::INFINITY), 100.0);
        assert_eq!(clamp_score(42.5), 42.5);
    }

    #[test]
    fn validate_score_rejects_non_finite_values() {
        assert!(validate_score("voc_V1", 100.0).is_ok());
        assert!(validate_score("voc_V1", 100.01).is_err());
        assert!(validate_score("voc_V1", f64::NAN).is_err());
    }
}
