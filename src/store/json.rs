//! JSON record export: `[{"id": 1, "embedding": [...]}, ...]`.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::dataset::{EmbeddingSet, ItemId};
use crate::embedding::vector::{Embedding, EmbeddingMatrix};
use crate::error::{PokembedError, Result};

#[derive(Debug, Serialize, Deserialize)]
struct Record {
    id: ItemId,
    embedding: Embedding,
}

#[derive(Serialize)]
struct RecordRef<'a> {
    id: ItemId,
    embedding: &'a Embedding,
}

/// Encode a set as a JSON array of records.
pub fn encode(set: &EmbeddingSet) -> Result<Vec<u8>> {
    let records: Vec<RecordRef<'_>> = set
        .iter()
        .map(|(id, embedding)| RecordRef { id, embedding })
        .collect();
    Ok(serde_json::to_vec(&records)?)
}

/// Decode a JSON record array into its raw columns, keeping duplicate ids.
///
/// `dimension` is taken from the first record; every other record must match.
pub fn decode_raw(bytes: &[u8]) -> Result<(Vec<ItemId>, EmbeddingMatrix)> {
    let records: Vec<Record> = serde_json::from_slice(bytes)?;
    let dimension = records.first().map(|r| r.embedding.dimension()).unwrap_or(0);

    let ids = records.iter().map(|r| r.id).collect();
    let matrix = EmbeddingMatrix::from_rows(dimension, records.iter().map(|r| &r.embedding))?;
    Ok((ids, matrix))
}

/// Decode a JSON record array into a set.
pub fn decode(bytes: &[u8]) -> Result<EmbeddingSet> {
    let (ids, matrix) = decode_raw(bytes)?;
    EmbeddingSet::from_parts(ids, matrix)
}

fn read_bytes(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => PokembedError::not_found(path),
        _ => PokembedError::Io(e),
    })
}

pub fn read_raw<P: AsRef<Path>>(path: P) -> Result<(Vec<ItemId>, EmbeddingMatrix)> {
    decode_raw(&read_bytes(path.as_ref())?)
}

pub fn read<P: AsRef<Path>>(path: P) -> Result<EmbeddingSet> {
    decode(&read_bytes(path.as_ref())?)
}
