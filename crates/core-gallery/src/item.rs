use core_events::Side;
use std::fmt;
use std::path::{Path, PathBuf};

/// Stable identifier for an item, shared by both halves of a pair.
///
/// Ids are the zero-padded digit runs from the filename convention
/// (`00384_1.jpg` → `00384`). Ordering is lexical, which matches numeric
/// order for the uniformly padded ids the server hands out and keeps the
/// pre-shuffle sort deterministic either way.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemId(String);

impl ItemId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Server ids are numeric; filenames pad them to five digits.
    pub fn from_number(n: u32) -> Self {
        Self(format!("{n:05}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One navigable unit: a lone image or a left/right pair under one id.
/// Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Item {
    Single { id: ItemId, path: PathBuf },
    Pair { id: ItemId, left: PathBuf, right: PathBuf },
}

impl Item {
    pub fn id(&self) -> &ItemId {
        match self {
            Item::Single { id, .. } | Item::Pair { id, .. } => id,
        }
    }

    pub fn is_pair(&self) -> bool {
        matches!(self, Item::Pair { .. })
    }

    /// Every asset path the item references, left before right.
    pub fn asset_paths(&self) -> Vec<&Path> {
        match self {
            Item::Single { path, .. } => vec![path.as_path()],
            Item::Pair { left, right, .. } => vec![left.as_path(), right.as_path()],
        }
    }

    /// Path for one half of a pair; `None` for single items.
    pub fn side_path(&self, side: Side) -> Option<&Path> {
        match (self, side) {
            (Item::Pair { left, .. }, Side::Left) => Some(left.as_path()),
            (Item::Pair { right, .. }, Side::Right) => Some(right.as_path()),
            (Item::Single { .. }, _) => None,
        }
    }
}
