//! Summary of a pipeline run.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::dataset::{ItemId, ItemState};
use crate::error::{PokembedError, Result};
use crate::store::atomic;

/// An item that did not produce an embedding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedItem {
    pub id: ItemId,
    pub reason: String,
}

/// A batch whose model call failed as a whole.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchFailure {
    pub index: usize,
    pub ids: Vec<ItemId>,
    pub reason: String,
}

/// Outcome of [`BatchPipeline::run`](super::BatchPipeline::run).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    /// Items considered by the run.
    pub total: usize,
    /// Batches the items were split into.
    pub batches: usize,
    /// Embedded ids, in item order.
    pub succeeded: Vec<ItemId>,
    /// Failed items with reasons, in item order.
    pub failed: Vec<FailedItem>,
    pub failed_batches: Vec<BatchFailure>,
    /// Final lifecycle state of every item.
    pub states: BTreeMap<ItemId, ItemState>,
    pub elapsed_ms: u64,
}

impl RunReport {
    /// Whether there was work and none of it succeeded at batch level.
    pub fn all_batches_failed(&self) -> bool {
        self.batches > 0 && self.failed_batches.len() == self.batches
    }

    /// Whether every item was embedded.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty() && self.succeeded.len() == self.total
    }

    /// Move the given embedded items to `Written` once their output has
    /// been persisted.
    pub fn mark_written(&mut self, ids: &[ItemId]) -> Result<()> {
        for id in ids {
            let state = self
                .states
                .get_mut(id)
                .ok_or_else(|| PokembedError::unknown_item(*id))?;
            state.advance(ItemState::Written)?;
        }
        Ok(())
    }

    /// Number of items currently in `state`'s variant.
    pub fn count_in(&self, state: &ItemState) -> usize {
        self.states
            .values()
            .filter(|s| std::mem::discriminant(*s) == std::mem::discriminant(state))
            .count()
    }

    /// Atomically save the report as pretty JSON.
    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(self)?;
        atomic::write_atomic(path.as_ref(), &bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample() -> RunReport {
        let mut states = BTreeMap::new();
        states.insert(1, ItemState::Embedded);
        states.insert(2, ItemState::Failed("Decode error".into()));
        RunReport {
            total: 2,
            batches: 1,
            succeeded: vec![1],
            failed: vec![FailedItem {
                id: 2,
                reason: "Decode error".into(),
            }],
            states,
            ..Default::default()
        }
    }

    #[test]
    fn test_mark_written() {
        let mut report = sample();
        report.mark_written(&[1]).unwrap();
        assert_eq!(report.states[&1], ItemState::Written);
        assert_eq!(report.count_in(&ItemState::Written), 1);

        // failed items cannot be written, unknown ids are rejected
        assert!(report.mark_written(&[2]).is_err());
        assert!(report.mark_written(&[99]).is_err());
    }

    #[test]
    fn test_all_batches_failed() {
        let mut report = sample();
        assert!(!report.all_batches_failed());
        report.failed_batches.push(BatchFailure {
            index: 0,
            ids: vec![1, 2],
            reason: "boom".into(),
        });
        assert!(report.all_batches_failed());
        assert!(!RunReport::default().all_batches_failed());
    }

    #[test]
    fn test_save_json() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("report.json");
        sample().save_json(&path).unwrap();

        let value: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(value["succeeded"], serde_json::json!([1]));
        assert_eq!(value["failed"][0]["id"], 2);
        assert_eq!(value["states"]["2"]["state"], "failed");
    }
}
