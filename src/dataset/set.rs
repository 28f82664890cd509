//! Ordered collection of `(id, embedding)` pairs.

use std::collections::HashMap;

use crate::dataset::item::ItemId;
use crate::embedding::vector::{Embedding, EmbeddingMatrix};
use crate::error::{PokembedError, Result};

/// The embeddings produced by one pipeline run, in item order.
///
/// Every embedding has the same dimension. Ids are unique.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingSet {
    dimension: usize,
    ids: Vec<ItemId>,
    embeddings: Vec<Embedding>,
    /// Row of each id.
    rows: HashMap<ItemId, usize>,
}

impl EmbeddingSet {
    /// Create an empty set for embeddings of the given width.
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            ids: Vec::new(),
            embeddings: Vec::new(),
            rows: HashMap::new(),
        }
    }

    /// Rebuild a set from an id column and a matching matrix.
    pub fn from_parts(ids: Vec<ItemId>, matrix: EmbeddingMatrix) -> Result<Self> {
        if ids.len() != matrix.rows() {
            return Err(PokembedError::format(format!(
                "{} ids but {} embedding rows",
                ids.len(),
                matrix.rows()
            )));
        }

        let dimension = matrix.dimension();
        let mut set = Self::new(dimension);
        for (id, row) in ids.into_iter().zip(matrix.iter_rows()) {
            set.push(id, Embedding::new(row.to_vec()))?;
        }
        Ok(set)
    }

    /// Append a pair, checking width and id uniqueness.
    pub fn push(&mut self, id: ItemId, embedding: Embedding) -> Result<()> {
        embedding.validate_dimension(self.dimension)?;
        if self.rows.contains_key(&id) {
            return Err(PokembedError::invalid_argument(format!(
                "item {id} already has an embedding"
            )));
        }
        self.rows.insert(id, self.ids.len());
        self.ids.push(id);
        self.embeddings.push(embedding);
        Ok(())
    }

    /// Append every pair of `other`, preserving its order.
    pub fn extend(&mut self, other: EmbeddingSet) -> Result<()> {
        for (id, embedding) in other.ids.into_iter().zip(other.embeddings) {
            self.push(id, embedding)?;
        }
        Ok(())
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn ids(&self) -> &[ItemId] {
        &self.ids
    }

    pub fn embeddings(&self) -> &[Embedding] {
        &self.embeddings
    }

    /// Look up the embedding of one item.
    pub fn get(&self, id: ItemId) -> Option<&Embedding> {
        self.rows.get(&id).map(|row| &self.embeddings[*row])
    }

    /// Iterate over `(id, embedding)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (ItemId, &Embedding)> {
        self.ids.iter().copied().zip(self.embeddings.iter())
    }

    /// Copy the embeddings into a row-major matrix.
    pub fn to_matrix(&self) -> EmbeddingMatrix {
        let mut data = Vec::with_capacity(self.len() * self.dimension);
        for embedding in &self.embeddings {
            data.extend_from_slice(&embedding.data);
        }
        // widths were validated on push
        EmbeddingMatrix::from_validated(self.dimension, data)
    }

    /// Map from id to row index.
    pub fn index(&self) -> HashMap<ItemId, usize> {
        self.rows.clone()
    }
}
