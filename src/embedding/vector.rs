//! Dense embedding vectors and row-major embedding matrices.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{PokembedError, Result};
use crate::util::simd;

/// Default tolerance when checking that a vector has unit length.
pub const UNIT_NORM_TOLERANCE: f32 = 1e-5;

/// A fixed-length embedding vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Embedding {
    /// The vector components.
    pub data: Vec<f32>,
}

impl Embedding {
    /// Create a new embedding from raw components.
    pub fn new(data: Vec<f32>) -> Self {
        Self { data }
    }

    /// Get the dimensionality of this embedding.
    pub fn dimension(&self) -> usize {
        self.data.len()
    }

    /// Calculate the L2 norm (magnitude) of this embedding.
    pub fn norm(&self) -> f32 {
        simd::l2_norm(&self.data)
    }

    /// Check if this embedding contains any NaN or infinite values.
    pub fn is_valid(&self) -> bool {
        self.data.iter().all(|x| x.is_finite())
    }

    /// Whether the norm is within `tolerance` of 1.0.
    pub fn is_unit(&self, tolerance: f32) -> bool {
        (self.norm() - 1.0).abs() < tolerance
    }

    /// Normalize this embedding to unit length in place.
    ///
    /// A zero-norm or non-finite vector is left untouched and reported as
    /// [`PokembedError::DegenerateVector`].
    pub fn normalize(&mut self) -> Result<()> {
        if !self.is_valid() {
            return Err(PokembedError::degenerate("vector contains non-finite values"));
        }

        let norm = simd::l2_norm_f64(&self.data);
        if norm == 0.0 {
            return Err(PokembedError::degenerate("vector norm is 0, cannot normalize"));
        }

        for value in &mut self.data {
            *value = (f64::from(*value) / norm) as f32;
        }
        Ok(())
    }

    /// Validate that this embedding has the expected dimension.
    pub fn validate_dimension(&self, expected_dim: usize) -> Result<()> {
        if self.data.len() != expected_dim {
            return Err(PokembedError::InvalidArgument(format!(
                "Embedding dimension mismatch: expected {}, got {}",
                expected_dim,
                self.data.len()
            )));
        }
        Ok(())
    }

    /// Dot product with another embedding of the same dimension.
    pub fn dot(&self, other: &Embedding) -> Result<f32> {
        other.validate_dimension(self.dimension())?;
        Ok(simd::dot(&self.data, &other.data))
    }

    /// Get the components as a slice.
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }
}

impl From<Vec<f32>> for Embedding {
    fn from(data: Vec<f32>) -> Self {
        Self::new(data)
    }
}

/// A row-major `rows x dimension` matrix of embeddings.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingMatrix {
    dimension: usize,
    data: Vec<f32>,
}

impl EmbeddingMatrix {
    /// Build a matrix from a flat row-major buffer.
    pub fn from_flat(dimension: usize, data: Vec<f32>) -> Result<Self> {
        if dimension == 0 {
            if !data.is_empty() {
                return Err(PokembedError::format(
                    "zero-width matrix cannot hold values",
                ));
            }
        } else if data.len() % dimension != 0 {
            return Err(PokembedError::format(format!(
                "buffer of {} values is not a multiple of width {}",
                data.len(),
                dimension
            )));
        }
        Ok(Self { dimension, data })
    }

    pub(crate) fn from_validated(dimension: usize, data: Vec<f32>) -> Self {
        debug_assert!(dimension == 0 || data.len() % dimension == 0);
        Self { dimension, data }
    }

    /// Build a matrix by copying a sequence of equally sized embeddings.
    pub fn from_rows<'a, I>(dimension: usize, rows: I) -> Result<Self>
    where
        I: IntoIterator<Item = &'a Embedding>,
    {
        let mut data = Vec::new();
        for row in rows {
            row.validate_dimension(dimension)?;
            data.extend_from_slice(&row.data);
        }
        Ok(Self { dimension, data })
    }

    /// Width of each row.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Number of rows.
    pub fn rows(&self) -> usize {
        if self.dimension == 0 {
            0
        } else {
            self.data.len() / self.dimension
        }
    }

    /// Borrow row `index`.
    pub fn row(&self, index: usize) -> Option<&[f32]> {
        if index >= self.rows() {
            return None;
        }
        let start = index * self.dimension;
        Some(&self.data[start..start + self.dimension])
    }

    /// Iterate over rows in order.
    pub fn iter_rows(&self) -> impl Iterator<Item = &[f32]> {
        // chunks_exact panics on zero; an empty matrix yields no rows anyway
        self.data.chunks_exact(self.dimension.max(1))
    }

    /// The underlying row-major buffer.
    pub fn as_flat(&self) -> &[f32] {
        &self.data
    }

    /// Consume the matrix into its row-major buffer.
    pub fn into_flat(self) -> Vec<f32> {
        self.data
    }

    /// L2 norm of every row, computed in parallel for large matrices.
    pub fn row_norms(&self) -> Vec<f32> {
        if self.rows() > 1024 {
            self.data
                .par_chunks_exact(self.dimension.max(1))
                .map(simd::l2_norm)
                .collect()
        } else {
            self.iter_rows().map(simd::l2_norm).collect()
        }
    }
}
