//! Persisting and reloading embedding sets.
//!
//! Three sink formats are supported:
//!
//! - [`OutputFormat::Npy`]: a NumPy array pair, `<dest>_ids.npy` (N int64
//!   ids) and `<dest>_embeddings.npy` (N x D float32 rows);
//! - [`OutputFormat::Parquet`]: one table with `id` and fixed-width
//!   `embedding` columns;
//! - [`OutputFormat::Json`]: an array of `{"id", "embedding"}` records.
//!
//! Every write is buffered in memory and lands atomically; see [`atomic`].
//!
//! # Example
//!
//! ```no_run
//! use pokembed::dataset::EmbeddingSet;
//! use pokembed::store::{EmbeddingWriter, OutputFormat, read};
//!
//! # fn main() -> pokembed::error::Result<()> {
//! let set = EmbeddingSet::new(512);
//! let written = EmbeddingWriter::new(OutputFormat::Npy).write(&set, "out/pokemon")?;
//! assert_eq!(written.len(), 2);
//!
//! let reloaded = read("out/pokemon", OutputFormat::Npy)?;
//! assert_eq!(reloaded.len(), set.len());
//! # Ok(())
//! # }
//! ```

pub mod atomic;
pub mod json;
pub mod npy;
pub mod table;

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use clap::ValueEnum;
use log::info;
use serde::{Deserialize, Serialize};

use crate::dataset::{EmbeddingSet, ItemId};
use crate::embedding::vector::EmbeddingMatrix;
use crate::error::{PokembedError, Result};

/// On-disk format of an embedding set.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// NumPy array pair
    #[default]
    Npy,
    /// Parquet table
    Parquet,
    /// JSON records
    Json,
}

impl OutputFormat {
    /// Files this format produces for `destination`.
    pub fn paths<P: AsRef<Path>>(self, destination: P) -> Vec<PathBuf> {
        let destination = destination.as_ref();
        match self {
            OutputFormat::Npy => {
                let (ids, embeddings) = npy_pair_paths(destination);
                vec![ids, embeddings]
            }
            OutputFormat::Parquet | OutputFormat::Json => vec![destination.to_path_buf()],
        }
    }
}

/// `<dest>_ids.npy` and `<dest>_embeddings.npy`.
pub fn npy_pair_paths(destination: &Path) -> (PathBuf, PathBuf) {
    let with_suffix = |suffix: &str| {
        let mut name: OsString = destination
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(suffix);
        destination.with_file_name(name)
    };
    (with_suffix("_ids.npy"), with_suffix("_embeddings.npy"))
}

/// Writes embedding sets in one format.
#[derive(Debug, Clone, Copy)]
pub struct EmbeddingWriter {
    format: OutputFormat,
}

impl EmbeddingWriter {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    /// Encode `set` and atomically write it to `destination`.
    ///
    /// Returns the paths written. On failure any previous output is left in place.
    pub fn write<P: AsRef<Path>>(&self, set: &EmbeddingSet, destination: P) -> Result<Vec<PathBuf>> {
        let destination = destination.as_ref();
        let files = match self.format {
            OutputFormat::Npy => {
                let (ids_path, embeddings_path) = npy_pair_paths(destination);
                let matrix = set.to_matrix();
                vec![
                    (ids_path, npy::encode_ids(set.ids())?),
                    (
                        embeddings_path,
                        npy::encode_matrix(matrix.rows(), matrix.dimension(), matrix.as_flat())?,
                    ),
                ]
            }
            OutputFormat::Parquet => vec![(destination.to_path_buf(), table::encode(set)?)],
            OutputFormat::Json => vec![(destination.to_path_buf(), json::encode(set)?)],
        };

        atomic::write_all_atomic(&files)?;

        for (path, bytes) in &files {
            info!("Saved {} ({} bytes)", path.display(), bytes.len());
        }
        Ok(files.into_iter().map(|(path, _)| path).collect())
    }
}

/// Read an id array and an embedding matrix from an arbitrary npy pair.
pub fn read_npy_pair<P: AsRef<Path>, Q: AsRef<Path>>(
    ids_path: P,
    embeddings_path: Q,
) -> Result<(Vec<ItemId>, EmbeddingMatrix)> {
    let ids_array = npy::read(ids_path)?;
    if ids_array.shape.len() != 1 {
        return Err(PokembedError::format(format!(
            "ids array must be 1-D, found shape {:?}",
            ids_array.shape
        )));
    }
    let ids = ids_array.into_ints()?;

    let embeddings_array = npy::read(embeddings_path)?;
    let dimension = match embeddings_array.shape.as_slice() {
        [_, dimension] => *dimension,
        other => {
            return Err(PokembedError::format(format!(
                "embeddings array must be 2-D, found shape {other:?}"
            )));
        }
    };
    let matrix = EmbeddingMatrix::from_flat(dimension, embeddings_array.into_floats()?)?;
    Ok((ids, matrix))
}

/// Read a set previously written with [`EmbeddingWriter`].
pub fn read<P: AsRef<Path>>(destination: P, format: OutputFormat) -> Result<EmbeddingSet> {
    let destination = destination.as_ref();
    match format {
        OutputFormat::Npy => {
            let (ids, matrix) = read_raw(destination, format)?;
            EmbeddingSet::from_parts(ids, matrix)
        }
        OutputFormat::Parquet => table::read(destination),
        OutputFormat::Json => json::read(destination),
    }
}

/// Read the raw id column and embedding matrix of a dataset.
///
/// Unlike [`read`], duplicate ids are kept, so a [`Verifier`] can report
/// them.
///
/// [`Verifier`]: crate::verify::Verifier
pub fn read_raw<P: AsRef<Path>>(
    destination: P,
    format: OutputFormat,
) -> Result<(Vec<ItemId>, EmbeddingMatrix)> {
    let destination = destination.as_ref();
    match format {
        OutputFormat::Npy => {
            let (ids_path, embeddings_path) = npy_pair_paths(destination);
            read_npy_pair(ids_path, embeddings_path)
        }
        OutputFormat::Parquet => table::read_raw(destination),
        OutputFormat::Json => json::read_raw(destination),
    }
}

/// Guess a table format from a file extension.
pub fn format_from_extension<P: AsRef<Path>>(path: P) -> Option<OutputFormat> {
    match path.as_ref().extension()?.to_str()?.to_ascii_lowercase().as_str() {
        "parquet" | "pq" => Some(OutputFormat::Parquet),
        "json" => Some(OutputFormat::Json),
        "npy" => Some(OutputFormat::Npy),
        _ => None,
    }
}
