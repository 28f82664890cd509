//! Building the ordered item list for a run.
//!
//! Items come from one of three places:
//!
//! - a directory scan for `NNNN.png` artwork ([`Catalog::scan_directory`]);
//! - a dense id range `1..=count` resolved under a directory
//!   ([`Catalog::dense_range`]); ids whose file is missing still become items
//!   and fail individually at load time;
//! - a JSON manifest mapping ids to paths ([`Catalog::from_manifest`]).

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use log::debug;
use regex::Regex;

use crate::dataset::item::{Item, ItemId};
use crate::error::{PokembedError, Result};

/// An ordered, duplicate-free list of items.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Catalog {
    items: Vec<Item>,
}

impl Catalog {
    /// Build a catalog from items, rejecting duplicate ids.
    pub fn new(items: Vec<Item>) -> Result<Self> {
        let mut seen = HashSet::with_capacity(items.len());
        for item in &items {
            if !seen.insert(item.id) {
                return Err(PokembedError::invalid_argument(format!(
                    "duplicate item id {}",
                    item.id
                )));
            }
        }
        Ok(Self { items })
    }

    /// Items `1..=count` with conventional artwork paths under `dir`.
    pub fn dense_range<P: AsRef<Path>>(dir: P, count: usize) -> Self {
        let dir = dir.as_ref();
        let items = (1..=count as ItemId)
            .map(|id| Item::new(id, dir.join(Item::artwork_file_name(id))))
            .collect();
        Self { items }
    }

    /// Every `NNNN.png` file directly inside `dir`, ordered by id.
    pub fn scan_directory<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            return Err(PokembedError::not_found(dir));
        }

        let pattern = artwork_pattern()?;
        let mut found = BTreeMap::new();

        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let file_name = entry.file_name();
            let Some(name) = file_name.to_str() else {
                continue;
            };
            let Some(captures) = pattern.captures(name) else {
                debug!("Skipping {name}: not an artwork file name");
                continue;
            };
            let id: ItemId = captures[1]
                .parse()
                .map_err(|e| PokembedError::other(format!("bad id in {name}: {e}")))?;
            found.insert(id, entry.path());
        }

        debug!("Found {} artwork files in {}", found.len(), dir.display());

        let items = found
            .into_iter()
            .map(|(id, path)| Item::new(id, path))
            .collect();
        Ok(Self { items })
    }

    /// Load a JSON manifest of the form `{"1": "art/0001.png", ...}`.
    ///
    /// Relative paths are resolved against the manifest's directory.
    pub fn from_manifest<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                PokembedError::not_found(path)
            } else {
                PokembedError::Io(e)
            }
        })?;
        let entries: BTreeMap<ItemId, PathBuf> = serde_json::from_str(&text)?;
        let base = path.parent().unwrap_or_else(|| Path::new(""));

        let items = entries
            .into_iter()
            .map(|(id, source)| {
                let resolved = if source.is_absolute() {
                    source
                } else {
                    base.join(source)
                };
                Item::new(id, resolved)
            })
            .collect();
        Ok(Self { items })
    }

    /// Keep at most the first `limit` items.
    pub fn truncate(mut self, limit: usize) -> Self {
        self.items.truncate(limit);
        self
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn into_items(self) -> Vec<Item> {
        self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// The contiguous id range `min..=max` covered by this catalog, if any.
    pub fn id_bounds(&self) -> Option<(ItemId, ItemId)> {
        let min = self.items.iter().map(|item| item.id).min()?;
        let max = self.items.iter().map(|item| item.id).max()?;
        Some((min, max))
    }
}

fn artwork_pattern() -> Result<Regex> {
    Regex::new(r"^(\d{4})\.png$")
        .map_err(|e| PokembedError::other(format!("artwork pattern: {e}")))
}
