//! Record kinds and their identifier prefixes.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Leaf item variants owned by a Unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    Vocabulary,
    Grammar,
    Character,
    Exercise,
}

impl ItemKind {
    /// All variants, in the order units aggregate and list them.
    pub const ALL: [ItemKind; 4] = [
        ItemKind::Vocabulary,
        ItemKind::Grammar,
        ItemKind::Character,
        ItemKind::Exercise,
    ];

    pub(crate) fn as_db_str(self) -> &'static str {
        match self {
            Self::Vocabulary => "vocabulary",
            Self::Grammar => "grammar",
            Self::Character => "character",
            Self::Exercise => "exercise",
        }
    }

    pub(crate) fn from_db_str(value: &str) -> Option<Self> {
        match value {
            "vocabulary" => Some(Self::Vocabulary),
            "grammar" => Some(Self::Grammar),
            "character" => Some(Self::Character),
            "exercise" => Some(Self::Exercise),
            _ => None,
        }
    }

    /// Whether an Exercise may reference items of this kind.
    pub fn is_associable(self) -> bool {
        !matches!(self, Self::Exercise)
    }
}

impl Display for ItemKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_db_str())
    }
}

/// Every record kind the hierarchy stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Language,
    Unit,
    Item(ItemKind),
}

impl EntityKind {
    /// Human-readable id prefix, including the trailing sequence letter.
    ///
    /// `lang_L`, `unit_U`, `voc_V`, `gram_G`, `char_C`, `ex_E`.
    pub fn id_prefix(self) -> &'static str {
        match self {
            Self::Language => "lang_L",
            Self::Unit => "unit_U",
            Self::Item(ItemKind::Vocabulary) => "voc_V",
            Self::Item(ItemKind::Grammar) => "gram_G",
            Self::Item(ItemKind::Character) => "char_C",
            Self::Item(ItemKind::Exercise) => "ex_E",
        }
    }

    /// Infers the kind from an allocated id such as `gram_G12`.
    pub fn from_id(id: &str) -> Option<Self> {
        [
            Self::Language,
            Self::Unit,
            Self::Item(ItemKind::Vocabulary),
            Self::Item(ItemKind::Grammar),
            Self::Item(ItemKind::Character),
            Self::Item(ItemKind::Exercise),
        ]
        .into_iter()
        .find(|kind| id.starts_with(kind.id_prefix()))
    }
}

impl From<ItemKind> for EntityKind {
    fn from(value: ItemKind) -> Self {
        Self::Item(value)
    }
}

impl Display for EntityKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Language => f.write_str("language"),
            Self::Unit => f.write_str("unit"),
            Self::Item(kind) => Display::fmt(kind, f),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{EntityKind, ItemKind};

    #[test]
    fn from_id_recognizes_every_prefix() {
        assert_eq!(EntityKind::from_id("lang_L3"), Some(EntityKind::Language));
        assert_eq!(EntityKind::from_id("unit_U1"), Some(EntityKind::Unit));
        assert_eq!(
            EntityKind::from_id("char_C7"),
            Some(EntityKind::Item(ItemKind::Character))
        );
        assert_eq!(
            EntityKind::from_id("ex_E2"),
            Some(EntityKind::Item(ItemKind::Exercise))
        );
        assert_eq!(EntityKind::from_id("word_W1"), None);
    }
}
