//! Rollup of item scores into units and unit scores into languages.
//!
//! # Invariants
//! - A unit's score is the mean of all items it owns (every kind), `0` when
//!   empty. A language's score is the mean of its units, `0` when empty.
//! - Recomputation re-reads and re-averages; it never applies deltas, so
//!   repeating it is idempotent.
//! - A unit recompute always propagates to its language, even when the
//!   unit's score did not change.
//! - The read-average-write cycle is not atomic across callers: concurrent
//!   recomputes of one unit are last-writer-wins.

use crate::model::kind::EntityKind;
use crate::model::language::Language;
use crate::model::unit::Unit;
use crate::model::validation::clamp_score;
use crate::repo::study_repo::StudyRepository;
use crate::service::error::{MasteryError, MasteryResult};
use crate::service::position::select_current_unit;
use chrono::NaiveDate;
use log::debug;

/// Arithmetic mean clamped to the score range; `0` for an empty input.
pub fn mean_score(scores: impl IntoIterator<Item = f64>) -> f64 {
    let (sum, count) = scores
        .into_iter()
        .fold((0.0_f64, 0_usize), |(sum, count), score| (sum + score, count + 1));
    if count == 0 {
        return 0.0;
    }
    clamp_score(sum / count as f64)
}

/// Recomputes one unit, then its language. Returns both updated records.
pub fn recompute_unit_chain<R: StudyRepository>(
    repo: &R,
    unit_id: &str,
    now: NaiveDate,
    threshold: f64,
) -> MasteryResult<(Unit, Language)> {
    let mut unit = repo
        .get_unit(unit_id)?
        .ok_or_else(|| MasteryError::not_found("unit", unit_id))?;

    if repo.get_language(&unit.language_id)?.is_none() {
        return Err(MasteryError::InvalidScope {
            kind: EntityKind::Unit,
            id: unit.id,
            parent_id: unit.language_id,
        });
    }

    let items = repo.list_items(&unit.id, None)?;
    unit.score = mean_score(items.iter().map(|item| item.score));
    unit.last_practiced = now;
    repo.put_unit(&unit)?;
    debug!(
        "event=unit_recomputed module=aggregation status=ok unit_id={} items={} score={:.2}",
        unit.id,
        items.len(),
        unit.score
    );

    let language = recompute_language(repo, &unit.language_id, now, threshold)?;
    Ok((unit, language))
}

/// Recomputes one unit from its items and propagates to the owning language.
pub fn recompute_unit<R: StudyRepository>(
    repo: &R,
    unit_id: &str,
    now: NaiveDate,
    threshold: f64,
) -> MasteryResult<Unit> {
    recompute_unit_chain(repo, unit_id, now, threshold).map(|(unit, _)| unit)
}

/// Recomputes a language from its units and re-selects its current unit.
pub fn recompute_language<R: StudyRepository>(
    repo: &R,
    language_id: &str,
    now: NaiveDate,
    threshold: f64,
) -> MasteryResult<Language> {
    let mut language = repo
        .get_language(language_id)?
        .ok_or_else(|| MasteryError::not_found("language", language_id))?;

    let units = repo.list_units(language_id)?;
    language.score = mean_score(units.iter().map(|unit| unit.score));
    language.last_practiced = now;
    language.current_unit = select_current_unit(&units, threshold);
    repo.put_language(&language)?;
    debug!(
        "event=language_recomputed module=aggregation status=ok language_id={} units={} score={:.2} current_unit={}",
        language.id,
        units.len(),
        language.score,
        language.current_unit.as_deref().unwrap_or("none")
    );

    Ok(language)
}
