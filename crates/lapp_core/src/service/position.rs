//! Derivation of a language's "current unit" pointer.
//!
//! The pointer is re-derived by a linear scan over units in creation order;
//! it is never trusted as a cache.

use crate::model::language::Language;
use crate::model::unit::Unit;
use crate::model::validation::MAX_SCORE;
use crate::repo::study_repo::StudyRepository;
use crate::service::error::{MasteryError, MasteryResult};
use log::info;

/// Fraction of the maximum score a unit needs before the learner moves on.
pub const DEFAULT_POSITION_THRESHOLD: f64 = 0.75;

/// Thresholds live in `(0, 1]`; NaN is rejected.
pub fn is_valid_threshold(threshold: f64) -> bool {
    threshold > 0.0 && threshold <= 1.0
}

/// First unit scoring strictly below `threshold * 100`; otherwise the last
/// unit; `None` without units.
pub fn select_current_unit(units: &[Unit], threshold: f64) -> Option<String> {
    let cutoff = threshold * MAX_SCORE;
    units
        .iter()
        .find(|unit| unit.score < cutoff)
        .or_else(|| units.last())
        .map(|unit| unit.id.clone())
}

/// Selects the current unit of a stored language.
pub fn find_current_unit<R: StudyRepository>(
    repo: &R,
    language_id: &str,
    threshold: f64,
) -> MasteryResult<Option<String>> {
    if !is_valid_threshold(threshold) {
        return Err(MasteryError::InvalidInput(format!(
            "position threshold must be in (0, 1], got {threshold}"
        )));
    }
    if repo.get_language(language_id)?.is_none() {
        return Err(MasteryError::not_found("language", language_id));
    }
    let units = repo.list_units(language_id)?;
    Ok(select_current_unit(&units, threshold))
}

/// Re-derives `current_unit` when it is missing or no longer names a unit of
/// this language, persisting the healed value.
pub fn heal_current_unit<R: StudyRepository>(
    repo: &R,
    mut language: Language,
    threshold: f64,
) -> MasteryResult<Language> {
    if let Some(unit_id) = &language.current_unit {
        let still_owned = repo
            .get_unit(unit_id)?
            .is_some_and(|unit| unit.language_id == language.id);
        if still_owned {
            return Ok(language);
        }
    }

    let units = repo.list_units(&language.id)?;
    let selected = select_current_unit(&units, threshold);
    if selected != language.current_unit {
        info!(
            "event=current_unit_healed module=position status=ok language_id={} previous={} selected={}",
            language.id,
            language.current_unit.as_deref().unwrap_or("none"),
            selected.as_deref().unwrap_or("none")
        );
        language.current_unit = selected;
        repo.put_language(&language)?;
    }
    Ok(language)
}

#[cfg(test)]
mod tests {
    use super::select_current_unit;
    use crate::model::unit::Unit;
    use chrono::NaiveDate;

    fn unit(id: &str, score: f64) -> Unit {
        let mut unit = Unit::new(
            id,
            "lang_L1",
            "Lesson",
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        );
        unit.score = score;
        unit
    }

    #[test]
    fn picks_first_unit_below_cutoff() {
        let units = [unit("unit_U1", 90.0), unit("unit_U2", 74.9), unit("unit_U3", 10.0)];
        assert_eq!(select_current_unit(&units, 0.75).as_deref(), Some("unit_U2"));
    }

    #[test]
    fn cutoff_is_strict_and_falls_back_to_last_unit() {
        let units = [unit("unit_U1", 75.0), unit("unit_U2", 100.0)];
        assert_eq!(select_current_unit(&units, 0.75).as_deref(), Some("unit_U2"));
    }

    #[test]
    fn no_units_selects_nothing() {
        assert_eq!(select_current_unit(&[], 0.75), None);
    }
}
