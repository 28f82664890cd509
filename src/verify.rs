//! Post-hoc checks of a persisted embedding dataset.
//!
//! The [`Verifier`] never mutates its input; it only reports. Three things
//! are checked:
//!
//! 1. the id array and the embedding matrix have the same number of rows;
//! 2. every row has unit L2 norm within a tolerance;
//! 3. the id set matches an expected contiguous range (optional), with
//!    missing and unexpected ids reported separately, plus duplicates.

use std::collections::{BTreeMap, BTreeSet};
use std::ops::RangeInclusive;

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::dataset::ItemId;
use crate::embedding::vector::{EmbeddingMatrix, UNIT_NORM_TOLERANCE};
use crate::error::{PokembedError, Result};

/// Row norm statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormSummary {
    pub min: f32,
    pub max: f32,
    pub tolerance: f32,
    /// Row indices whose norm is off by more than `tolerance`.
    pub offending_rows: Vec<usize>,
}

impl NormSummary {
    pub fn all_unit(&self) -> bool {
        self.offending_rows.is_empty()
    }
}

/// Everything a [`Verifier`] found.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationReport {
    pub id_count: usize,
    pub embedding_rows: usize,
    pub dimension: usize,
    /// Smallest and largest id present.
    pub id_range: Option<(ItemId, ItemId)>,
    pub norms: NormSummary,
    /// Expected ids that are absent.
    pub missing_ids: BTreeSet<ItemId>,
    /// Present ids outside the expected range.
    pub unexpected_ids: BTreeSet<ItemId>,
    /// Ids appearing more than once.
    pub duplicate_ids: BTreeSet<ItemId>,
}

impl VerificationReport {
    pub fn row_counts_match(&self) -> bool {
        self.id_count == self.embedding_rows
    }

    /// Whether every check succeeded.
    pub fn passed(&self) -> bool {
        self.row_counts_match()
            && self.norms.all_unit()
            && self.missing_ids.is_empty()
            && self.unexpected_ids.is_empty()
            && self.duplicate_ids.is_empty()
    }
}

/// Checks ids and embeddings against shape, norm and completeness rules.
#[derive(Debug, Clone)]
pub struct Verifier {
    tolerance: f32,
    expected: Option<RangeInclusive<ItemId>>,
}

impl Default for Verifier {
    fn default() -> Self {
        Self {
            tolerance: UNIT_NORM_TOLERANCE,
            expected: None,
        }
    }
}

impl Verifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Norm tolerance; must be positive and finite.
    pub fn with_tolerance(mut self, tolerance: f32) -> Result<Self> {
        if !(tolerance.is_finite() && tolerance > 0.0) {
            return Err(PokembedError::invalid_argument(format!(
                "tolerance must be a positive number, got {tolerance}"
            )));
        }
        self.tolerance = tolerance;
        Ok(self)
    }

    /// Expect exactly the ids in `range`.
    pub fn with_expected_range(mut self, range: RangeInclusive<ItemId>) -> Self {
        self.expected = Some(range);
        self
    }

    /// Expect ids `1..=count`.
    pub fn with_expected_count(self, count: usize) -> Self {
        self.with_expected_range(1..=count as ItemId)
    }

    pub fn tolerance(&self) -> f32 {
        self.tolerance
    }

    pub fn verify(&self, ids: &[ItemId], embeddings: &EmbeddingMatrix) -> VerificationReport {
        let norms = self.check_norms(embeddings);

        let mut counts: BTreeMap<ItemId, usize> = BTreeMap::new();
        for id in ids {
            *counts.entry(*id).or_default() += 1;
        }
        let duplicate_ids: BTreeSet<ItemId> = counts
            .iter()
            .filter(|(_, count)| **count > 1)
            .map(|(id, _)| *id)
            .collect();

        let (missing_ids, unexpected_ids) = match &self.expected {
            Some(range) => {
                let missing = range.clone().filter(|id| !counts.contains_key(id)).collect();
                let unexpected = counts
                    .keys()
                    .filter(|id| !range.contains(*id))
                    .copied()
                    .collect();
                (missing, unexpected)
            }
            None => (BTreeSet::new(), BTreeSet::new()),
        };

        let id_range = match (counts.keys().next(), counts.keys().next_back()) {
            (Some(min), Some(max)) => Some((*min, *max)),
            _ => None,
        };

        let report = VerificationReport {
            id_count: ids.len(),
            embedding_rows: embeddings.rows(),
            dimension: embeddings.dimension(),
            id_range,
            norms,
            missing_ids,
            unexpected_ids,
            duplicate_ids,
        };

        if report.passed() {
            debug!("Verified {} embeddings", report.id_count);
        } else {
            warn!(
                "Verification failed: {} ids / {} rows, {} non-unit rows, {} missing, {} unexpected, {} duplicate",
                report.id_count,
                report.embedding_rows,
                report.norms.offending_rows.len(),
                report.missing_ids.len(),
                report.unexpected_ids.len(),
                report.duplicate_ids.len()
            );
        }
        report
    }

    fn check_norms(&self, embeddings: &EmbeddingMatrix) -> NormSummary {
        let norms = embeddings.row_norms();
        let offending_rows = norms
            .iter()
            .enumerate()
            .filter(|(_, norm)| !((**norm - 1.0).abs() <= self.tolerance))
            .map(|(row, _)| row)
            .collect();

        let (min, max) = if norms.is_empty() {
            (0.0, 0.0)
        } else {
            norms
                .iter()
                .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), n| {
                    (lo.min(*n), hi.max(*n))
                })
        };

        NormSummary {
            min,
            max,
            tolerance: self.tolerance,
            offending_rows,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_rows(n: usize) -> EmbeddingMatrix {
        let mut data = Vec::new();
        for i in 0..n {
            let mut row = vec![0.0; 4];
            row[i % 4] = 1.0;
            data.extend(row);
        }
        EmbeddingMatrix::from_flat(4, data).unwrap()
    }

    #[test]
    fn test_clean_dataset_passes() {
        let report = Verifier::new()
            .with_expected_count(5)
            .verify(&[1, 2, 3, 4, 5], &unit_rows(5));
        assert!(report.passed());
        assert_eq!(report.id_range, Some((1, 5)));
        assert_eq!(report.norms.min, 1.0);
        assert_eq!(report.norms.max, 1.0);
    }

    #[test]
    fn test_row_count_mismatch() {
        let report = Verifier::new().verify(&[1, 2, 3], &unit_rows(2));
        assert!(!report.row_counts_match());
        assert!(!report.passed());
    }

    #[test]
    fn test_missing_and_unexpected_are_disjoint() {
        let report = Verifier::new()
            .with_expected_count(4)
            .verify(&[1, 2, 4, 9], &unit_rows(4));
        assert_eq!(report.missing_ids, BTreeSet::from([3]));
        assert_eq!(report.unexpected_ids, BTreeSet::from([9]));
        assert!(report.missing_ids.is_disjoint(&report.unexpected_ids));
        assert!(!report.passed());
    }

    #[test]
    fn test_duplicates_detected() {
        let report = Verifier::new().verify(&[1, 2, 2], &unit_rows(3));
        assert_eq!(report.duplicate_ids, BTreeSet::from([2]));
        assert!(!report.passed());
    }

    #[test]
    fn test_non_unit_rows_reported() {
        let matrix = EmbeddingMatrix::from_flat(2, vec![1.0, 0.0, 0.5, 0.0, f32::NAN, 0.0]).unwrap();
        let report = Verifier::new().verify(&[1, 2, 3], &matrix);
        assert_eq!(report.norms.offending_rows, vec![1, 2]);
        assert!(!report.passed());
    }

    #[test]
    fn test_tolerance_is_respected() {
        let matrix = EmbeddingMatrix::from_flat(1, vec![1.001]).unwrap();
        assert!(!Verifier::new().verify(&[1], &matrix).passed());
        let loose = Verifier::new().with_tolerance(0.01).unwrap();
        assert!(loose.verify(&[1], &matrix).passed());
        assert!(Verifier::new().with_tolerance(0.0).is_err());
    }

    #[test]
    fn test_does_not_mutate_input() {
        let ids = vec![2, 1];
        let matrix = unit_rows(2);
        let before = matrix.clone();
        Verifier::new().verify(&ids, &matrix);
        assert_eq!(ids, vec![2, 1]);
        assert_eq!(matrix, before);
    }
}
