//! Item identifiers and per-item processing state.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{PokembedError, Result};

/// Numeric item identifier (e.g. a National Pokédex number).
pub type ItemId = i64;

/// A single unit of work: one id and the artwork it resolves to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub source_path: PathBuf,
}

impl Item {
    pub fn new<P: Into<PathBuf>>(id: ItemId, source_path: P) -> Self {
        Self {
            id,
            source_path: source_path.into(),
        }
    }

    /// The conventional artwork file name for an id: 4-digit zero padded PNG.
    pub fn artwork_file_name(id: ItemId) -> String {
        format!("{id:04}.png")
    }
}

/// Lifecycle of an item inside a pipeline run.
///
/// `Pending -> Loaded -> Embedded -> Written`, with `Failed` reachable from
/// any non-terminal state. `Written` and `Failed` are terminal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum ItemState {
    Pending,
    Loaded,
    Embedded,
    Written,
    Failed(String),
}

impl ItemState {
    /// Whether no further transition is allowed.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ItemState::Written | ItemState::Failed(_))
    }

    /// Move to `next`, rejecting transitions the lifecycle does not allow.
    pub fn advance(&mut self, next: ItemState) -> Result<()> {
        let allowed = match (&*self, &next) {
            (ItemState::Pending, ItemState::Loaded)
            | (ItemState::Loaded, ItemState::Embedded)
            | (ItemState::Embedded, ItemState::Written) => true,
            (current, ItemState::Failed(_)) => !current.is_terminal(),
            _ => false,
        };

        if !allowed {
            return Err(PokembedError::InvalidState(format!(
                "cannot move item from {self} to {next}"
            )));
        }
        *self = next;
        Ok(())
    }

    /// Mark the item failed with the given reason.
    pub fn fail<S: Into<String>>(&mut self, reason: S) -> Result<()> {
        self.advance(ItemState::Failed(reason.into()))
    }
}

impl fmt::Display for ItemState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemState::Pending => write!(f, "pending"),
            ItemState::Loaded => write!(f, "loaded"),
            ItemState::Embedded => write!(f, "embedded"),
            ItemState::Written => write!(f, "written"),
            ItemState::Failed(reason) => write!(f, "failed ({reason})"),
        }
    }
}
