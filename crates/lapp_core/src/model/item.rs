//! Leaf learning items and exercise associations.
//!
//! # Invariants
//! - An item belongs to exactly one Unit (`unit_id`).
//! - Only `ItemBody::Exercise` carries associations, and only to
//!   vocabulary/grammar/character items.
//! - Association lists hold no duplicates; order is insertion order.

use super::kind::{EntityKind, ItemKind};
use super::validation::{validate_id, validate_required, validate_score, ModelValidationError};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Human-readable item identifier (`voc_V{n}`, `gram_G{n}`, ...).
pub type ItemId = String;

/// Weak, non-owning references from an Exercise to the items it practices.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Associations {
    pub vocabulary: Vec<ItemId>,
    pub character: Vec<ItemId>,
    pub grammar: Vec<ItemId>,
}

impl Associations {
    pub fn is_empty(&self) -> bool {
        self.vocabulary.is_empty() && self.character.is_empty() && self.grammar.is_empty()
    }

    pub fn len(&self) -> usize {
        self.vocabulary.len() + self.character.len() + self.grammar.len()
    }

    /// Returns the id list for one associable kind. Exercises yield nothing.
    pub fn ids(&self, kind: ItemKind) -> &[ItemId] {
        match kind {
            ItemKind::Vocabulary => &self.vocabulary,
            ItemKind::Grammar => &self.grammar,
            ItemKind::Character => &self.character,
            ItemKind::Exercise => &[],
        }
    }

    pub(crate) fn set_ids(&mut self, kind: ItemKind, ids: Vec<ItemId>) {
        match kind {
            ItemKind::Vocabulary => self.vocabulary = ids,
            ItemKind::Grammar => self.grammar = ids,
            ItemKind::Character => self.character = ids,
            ItemKind::Exercise => {}
        }
    }

    /// Iterates `(kind, id)` pairs: vocabulary, then character, then grammar.
    pub fn iter(&self) -> impl Iterator<Item = (ItemKind, &str)> + '_ {
        let vocabulary = self
            .vocabulary
            .iter()
            .map(|id| (ItemKind::Vocabulary, id.as_str()));
        let character = self
            .character
            .iter()
            .map(|id| (ItemKind::Character, id.as_str()));
        let grammar = self
            .grammar
            .iter()
            .map(|id| (ItemKind::Grammar, id.as_str()));
        vocabulary.chain(character).chain(grammar)
    }

    /// Drops repeated ids within each list, keeping first occurrences.
    pub(crate) fn dedup(&mut self) {
        for kind in [ItemKind::Vocabulary, ItemKind::Character, ItemKind::Grammar] {
            let mut seen = std::collections::HashSet::new();
            let ids = self
                .ids(kind)
                .iter()
                .filter(|id| seen.insert(id.as_str()))
                .cloned()
                .collect();
            self.set_ids(kind, ids);
        }
    }
}

/// Kind-specific content of an item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ItemBody {
    Vocabulary {
        word: String,
        translation: String,
    },
    Grammar {
        title: String,
        explanation: String,
    },
    Character {
        glyph: String,
        meaning: String,
    },
    Exercise {
        /// Free-form format tag such as `multiple_choice` or `fill`.
        exercise_type: String,
        question: String,
        answer: String,
        associations: Associations,
    },
}

impl ItemBody {
    pub fn kind(&self) -> ItemKind {
        match self {
            Self::Vocabulary { .. } => ItemKind::Vocabulary,
            Self::Grammar { .. } => ItemKind::Grammar,
            Self::Character { .. } => ItemKind::Character,
            Self::Exercise { .. } => ItemKind::Exercise,
        }
    }

    /// Primary text: word, rule title, glyph or question.
    pub fn headline(&self) -> &str {
        match self {
            Self::Vocabulary { word, .. } => word,
            Self::Grammar { title, .. } => title,
            Self::Character { glyph, .. } => glyph,
            Self::Exercise { question, .. } => question,
        }
    }

    /// Secondary text: translation, explanation, meaning or answer.
    pub fn detail(&self) -> &str {
        match self {
            Self::Vocabulary { translation, .. } => translation,
            Self::Grammar { explanation, .. } => explanation,
            Self::Character { meaning, .. } => meaning,
            Self::Exercise { answer, .. } => answer,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub unit_id: String,
    pub body: ItemBody,
    pub score: f64,
    pub last_practiced: NaiveDate,
}

impl Item {
    /// Creates an unpracticed item (score `0`, practiced `today`).
    pub fn new(
        id: impl Into<ItemId>,
        unit_id: impl Into<String>,
        body: ItemBody,
        today: NaiveDate,
    ) -> Self {
        Self {
            id: id.into(),
            unit_id: unit_id.into(),
            body,
            score: 0.0,
            last_practiced: today,
        }
    }

    pub fn kind(&self) -> ItemKind {
        self.body.kind()
    }

    pub fn associations(&self) -> Option<&Associations> {
        match &self.body {
            ItemBody::Exercise { associations, .. } => Some(associations),
            _ => None,
        }
    }

    pub fn associations_mut(&mut self) -> Option<&mut Associations> {
        match &mut self.body {
            ItemBody::Exercise { associations, .. } => Some(associations),
            _ => None,
        }
    }

    pub fn validate(&self) -> Result<(), ModelValidationError> {
        validate_id(&self.id)?;
        validate_id(&self.unit_id)?;
        validate_required(&self.id, "headline", self.body.headline())?;
        validate_score(&self.id, self.score)?;

        if let Some(associations) = self.associations() {
            for (kind, target_id) in associations.iter() {
                validate_id(target_id)?;
                // Ids with an unknown prefix are accepted; a known prefix must agree.
                if let Some(target_kind) = EntityKind::from_id(target_id) {
                    if target_kind != EntityKind::Item(kind) {
                        return Err(ModelValidationError::MismatchedAssociation {
                            exercise_id: self.id.clone(),
                            target_id: target_id.to_string(),
                        });
                    }
                }
            }
        }
        Ok(())
    }
}
