//! Nearest-neighbour lookup over normalized embeddings.
//!
//! Rows are assumed to be unit length, so the dot product is the cosine
//! similarity.

use std::cmp::Ordering;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::dataset::ItemId;
use crate::embedding::vector::EmbeddingMatrix;
use crate::error::{PokembedError, Result};
use crate::util::simd;

/// Rows above which scoring runs in parallel.
const PARALLEL_THRESHOLD: usize = 4096;

/// One search hit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Neighbor {
    pub id: ItemId,
    pub score: f32,
}

fn row_of(ids: &[ItemId], matrix: &EmbeddingMatrix, id: ItemId) -> Result<usize> {
    if ids.len() != matrix.rows() {
        return Err(PokembedError::invalid_argument(format!(
            "{} ids but {} embedding rows",
            ids.len(),
            matrix.rows()
        )));
    }
    ids.iter()
        .position(|candidate| *candidate == id)
        .ok_or_else(|| PokembedError::unknown_item(id))
}

/// Highest-first ordering; ties go to the smaller id.
fn rank(a: &Neighbor, b: &Neighbor) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| a.id.cmp(&b.id))
}

/// The `k` rows most similar to `query_id`, excluding the query itself.
pub fn top_k(ids: &[ItemId], matrix: &EmbeddingMatrix, query_id: ItemId, k: usize) -> Result<Vec<Neighbor>> {
    let query_row = row_of(ids, matrix, query_id)?;
    let query = matrix.row(query_row).unwrap_or_default();

    let score = |(row, (id, embedding)): (usize, (&ItemId, &[f32]))| {
        (row != query_row).then(|| Neighbor {
            id: *id,
            score: simd::dot(query, embedding),
        })
    };

    let mut neighbors: Vec<Neighbor> = if ids.len() > PARALLEL_THRESHOLD {
        ids.par_iter()
            .zip(matrix.as_flat().par_chunks_exact(matrix.dimension().max(1)))
            .enumerate()
            .filter_map(score)
            .collect()
    } else {
        ids.iter()
            .zip(matrix.iter_rows())
            .enumerate()
            .filter_map(score)
            .collect()
    };

    neighbors.sort_by(rank);
    neighbors.truncate(k);
    Ok(neighbors)
}

/// Similarity between two items.
pub fn similarity(ids: &[ItemId], matrix: &EmbeddingMatrix, a: ItemId, b: ItemId) -> Result<f32> {
    let a = row_of(ids, matrix, a)?;
    let b = row_of(ids, matrix, b)?;
    match (matrix.row(a), matrix.row(b)) {
        (Some(a), Some(b)) => Ok(simd::dot(a, b)),
        _ => Err(PokembedError::other("row index out of bounds")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> (Vec<ItemId>, EmbeddingMatrix) {
        let ids = vec![1, 2, 3, 4];
        let matrix = EmbeddingMatrix::from_flat(
            2,
            vec![
                1.0, 0.0, //
                0.8, 0.6, //
                0.0, 1.0, //
                0.8, -0.6,
            ],
        )
        .unwrap();
        (ids, matrix)
    }

    #[test]
    fn test_top_k_excludes_self_and_orders() {
        let (ids, matrix) = fixture();
        let neighbors = top_k(&ids, &matrix, 1, 3).unwrap();
        let ids: Vec<ItemId> = neighbors.iter().map(|n| n.id).collect();
        // 2 and 4 tie at 0.8; smaller id first
        assert_eq!(ids, vec![2, 4, 3]);
        assert!((neighbors[0].score - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_top_k_truncates() {
        let (ids, matrix) = fixture();
        assert_eq!(top_k(&ids, &matrix, 3, 1).unwrap().len(), 1);
        assert_eq!(top_k(&ids, &matrix, 3, 10).unwrap().len(), 3);
        assert!(top_k(&ids, &matrix, 3, 0).unwrap().is_empty());
    }

    #[test]
    fn test_unknown_query() {
        let (ids, matrix) = fixture();
        assert!(top_k(&ids, &matrix, 42, 3).is_err());
        assert!(similarity(&ids, &matrix, 1, 42).is_err());
    }

    #[test]
    fn test_similarity() {
        let (ids, matrix) = fixture();
        assert!((similarity(&ids, &matrix, 1, 1).unwrap() - 1.0).abs() < 1e-6);
        assert!(similarity(&ids, &matrix, 1, 3).unwrap().abs() < 1e-6);
    }
}
