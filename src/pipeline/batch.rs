//! Partitioning items into batches and processing one batch.

use std::time::{Duration, Instant};

use image::RgbImage;
use log::{debug, warn};

use crate::artwork::ImageSource;
use crate::dataset::{Item, ItemId, ItemState};
use crate::embedding::{Embedder, Embedding};
use crate::error::{PokembedError, Result};

/// A consecutive slice of the item list, processed with one model call.
#[derive(Debug, Clone, Copy)]
pub struct Batch<'a> {
    /// Position of this batch in the run, starting at 0.
    pub index: usize,
    pub items: &'a [Item],
}

impl Batch<'_> {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Number of batches needed for `items` items: `ceil(items / batch_size)`.
pub fn batch_count(items: usize, batch_size: usize) -> usize {
    if batch_size == 0 {
        return 0;
    }
    items.div_ceil(batch_size)
}

/// Split `items` into consecutive batches of at most `batch_size`.
///
/// Every item lands in exactly one batch; only the last batch may be short.
pub fn partition(items: &[Item], batch_size: usize) -> Result<Vec<Batch<'_>>> {
    if batch_size == 0 {
        return Err(PokembedError::invalid_argument("batch size must be at least 1"));
    }
    Ok(items
        .chunks(batch_size)
        .enumerate()
        .map(|(index, items)| Batch { index, items })
        .collect())
}

/// Everything a worker learned about one batch.
#[derive(Debug)]
pub struct BatchOutcome {
    pub index: usize,
    /// Successful items, in batch order.
    pub embedded: Vec<(ItemId, Embedding)>,
    /// Final state of every item of the batch, in batch order.
    pub states: Vec<(ItemId, ItemState)>,
    /// Set when the whole batch failed.
    pub batch_error: Option<String>,
    pub elapsed: Duration,
}

impl BatchOutcome {
    pub fn processed(&self) -> usize {
        self.states.len()
    }

    pub fn failed(&self) -> impl Iterator<Item = (ItemId, &str)> {
        self.states.iter().filter_map(|(id, state)| match state {
            ItemState::Failed(reason) => Some((*id, reason.as_str())),
            _ => None,
        })
    }
}

fn mark_failed(id: ItemId, state: &mut ItemState, reason: String) {
    if let Err(e) = state.fail(reason) {
        warn!("Item {id}: {e}");
    }
}

fn mark(id: ItemId, state: &mut ItemState, next: ItemState) {
    if let Err(e) = state.advance(next) {
        warn!("Item {id}: {e}");
    }
}

/// Load, embed, and re-join one batch.
///
/// Load and degenerate-vector failures drop single items. A model failure
/// fails every item that reached the model and sets
/// [`BatchOutcome::batch_error`]. Never panics on bad input.
pub fn process_batch(batch: &Batch<'_>, source: &dyn ImageSource, embedder: &Embedder) -> BatchOutcome {
    let started = Instant::now();
    let mut states: Vec<ItemState> = vec![ItemState::Pending; batch.len()];

    let mut positions = Vec::with_capacity(batch.len());
    let mut images: Vec<RgbImage> = Vec::with_capacity(batch.len());
    for (position, item) in batch.items.iter().enumerate() {
        match source.load(item) {
            Ok(image) => {
                mark(item.id, &mut states[position], ItemState::Loaded);
                positions.push(position);
                images.push(image);
            }
            Err(e) => {
                warn!("Skipping item {}: {e}", item.id);
                mark_failed(item.id, &mut states[position], e.to_string());
            }
        }
    }

    let mut embedded = Vec::with_capacity(images.len());
    let mut batch_error = None;

    if !images.is_empty() {
        match embedder.embed_batch(&images) {
            Ok(results) => {
                for (position, result) in positions.into_iter().zip(results) {
                    let id = batch.items[position].id;
                    match result {
                        Ok(embedding) => {
                            mark(id, &mut states[position], ItemState::Embedded);
                            embedded.push((id, embedding));
                        }
                        Err(e) => {
                            warn!("Skipping item {id}: {e}");
                            mark_failed(id, &mut states[position], e.to_string());
                        }
                    }
                }
            }
            Err(e) => {
                warn!("Batch {} failed: {e}", batch.index);
                let reason = e.to_string();
                for position in positions {
                    mark_failed(batch.items[position].id, &mut states[position], reason.clone());
                }
                batch_error = Some(reason);
            }
        }
    }

    let elapsed = started.elapsed();
    debug!(
        "Batch {}: {}/{} embedded in {:?}",
        batch.index,
        embedded.len(),
        batch.len(),
        elapsed
    );

    BatchOutcome {
        index: batch.index,
        embedded,
        states: batch.items.iter().map(|item| item.id).zip(states).collect(),
        batch_error,
        elapsed,
    }
}
