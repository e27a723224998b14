//! Exercise association resolution with self-healing pruning.
//!
//! # Invariants
//! - Resolution re-validates every id against storage on each call.
//! - An id that no longer resolves, or resolves to another kind, is dropped
//!   silently and the exercise's stored lists are rewritten without it.
//! - Surviving ids keep their relative order.

use crate::model::item::{Associations, Item, ItemBody};
use crate::model::kind::ItemKind;
use crate::repo::study_repo::StudyRepository;
use crate::service::error::MasteryResult;
use log::info;
use serde::Serialize;

/// Items an exercise currently references, grouped by kind.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResolvedAssociations {
    pub vocabulary: Vec<Item>,
    pub character: Vec<Item>,
    pub grammar: Vec<Item>,
}

impl ResolvedAssociations {
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn len(&self) -> usize {
        self.vocabulary.len() + self.character.len() + self.grammar.len()
    }

    /// Flattens into vocabulary, character, grammar order.
    pub fn into_items(self) -> Vec<Item> {
        let mut items = self.vocabulary;
        items.extend(self.character);
        items.extend(self.grammar);
        items
    }

    fn push(&mut self, item: Item) {
        match item.kind() {
            ItemKind::Vocabulary => self.vocabulary.push(item),
            ItemKind::Character => self.character.push(item),
            ItemKind::Grammar => self.grammar.push(item),
            ItemKind::Exercise => {}
        }
    }
}

/// Looks up every listed id and keeps only live items of the listed kind.
///
/// Returns the pruned id lists alongside the loaded items. Does not write.
pub fn prune_associations<R: StudyRepository>(
    repo: &R,
    associations: &Associations,
) -> MasteryResult<(Associations, ResolvedAssociations)> {
    let mut kept = Associations::default();
    let mut resolved = ResolvedAssociations::default();
    let mut candidates = associations.clone();
    candidates.dedup();

    for kind in [ItemKind::Vocabulary, ItemKind::Character, ItemKind::Grammar] {
        let mut kept_ids = Vec::new();
        for id in candidates.ids(kind) {
            match repo.get_item(id)? {
                Some(item) if item.kind() == kind => {
                    kept_ids.push(item.id.clone());
                    resolved.push(item);
                }
                _ => {}
            }
        }
        kept.set_ids(kind, kept_ids);
    }

    Ok((kept, resolved))
}

/// Resolves an exercise's associations and persists the pruned lists.
///
/// Non-exercise items have no associations and resolve to an empty set.
pub fn resolve_associations<R: StudyRepository>(
    repo: &R,
    exercise: &mut Item,
) -> MasteryResult<ResolvedAssociations> {
    let ItemBody::Exercise { associations, .. } = &mut exercise.body else {
        return Ok(ResolvedAssociations::default());
    };

    let (kept, resolved) = prune_associations(repo, associations)?;
    if kept != *associations {
        let dropped = associations.len() - kept.len();
        *associations = kept;
        repo.put_item(exercise)?;
        info!(
            "event=associations_pruned module=associations status=ok exercise_id={} dropped={}",
            exercise.id, dropped
        );
    }

    Ok(resolved)
}
