//! Scoped, human-readable sequential ids.
//!
//! Languages are numbered globally, units per language and items per unit:
//! the next id is `prefix + (max existing suffix + 1)`.
//!
//! # Invariants
//! - Allocation is scan-then-increment and is not atomic. Two concurrent
//!   allocations in one scope can produce the same id; the storage unique
//!   constraint turns that into `RepoError::DuplicateKey`, which the service
//!   retries.
//! - Ids whose suffix does not parse are ignored by the scan.
//! - A scope whose highest suffix is `u64::MAX` has no next id; allocation
//!   fails with `MasteryError::IdSpaceExhausted` instead of wrapping.

use crate::model::kind::EntityKind;
use crate::repo::study_repo::StudyRepository;
use crate::service::error::{MasteryError, MasteryResult};

/// Parses the numeric suffix of an allocated id (`voc_V42` -> `42`).
pub fn parse_sequence(id: &str) -> Option<u64> {
    let last_segment = id.rsplit('_').next()?;
    let mut chars = last_segment.chars();
    chars.next()?;
    let digits = chars.as_str();
    if digits.is_empty() || !digits.bytes().all(|byte| byte.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Next id after the highest suffix in `existing`, starting at 1.
///
/// `None` when the highest suffix is already `u64::MAX`.
pub fn next_sequential_id<'a>(
    kind: EntityKind,
    existing: impl IntoIterator<Item = &'a str>,
) -> Option<String> {
    next_id_after(kind, existing, 0)
}

/// Like [`next_sequential_id`] but never returns a suffix `<= floor`.
pub fn next_id_after<'a>(
    kind: EntityKind,
    existing: impl IntoIterator<Item = &'a str>,
    floor: u64,
) -> Option<String> {
    let highest = existing
        .into_iter()
        .filter_map(parse_sequence)
        .max()
        .unwrap_or(0)
        .max(floor);
    let next = highest.checked_add(1)?;
    Some(format!("{}{}", kind.id_prefix(), next))
}

/// Allocates the next id of `kind` within `scope`.
///
/// Units need their language id as scope, items their unit id. Language ids
/// are global and reject a scope.
pub fn allocate_id<R: StudyRepository>(
    repo: &R,
    kind: EntityKind,
    scope: Option<&str>,
) -> MasteryResult<String> {
    match (kind, scope) {
        (EntityKind::Language, Some(scope)) => {
            return Err(MasteryError::InvalidInput(format!(
                "language ids are global, got scope `{scope}`"
            )));
        }
        (EntityKind::Unit, None) => {
            return Err(MasteryError::InvalidInput(
                "unit ids are scoped to a language".to_string(),
            ));
        }
        (EntityKind::Item(item_kind), None) => {
            return Err(MasteryError::InvalidInput(format!(
                "{item_kind} ids are scoped to a unit"
            )));
        }
        _ => {}
    }

    let existing = repo.list_ids(kind, scope)?;
    next_sequential_id(kind, existing.iter().map(String::as_str))
        .ok_or(MasteryError::IdSpaceExhausted { kind })
}
