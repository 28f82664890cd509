//! Error types for the Pokembed library.
//!
//! All fallible operations return [`PokembedError`] through the [`Result`]
//! alias. Errors fall into three groups that the batch pipeline treats
//! differently:
//!
//! - per-item errors ([`PokembedError::NotFound`], [`PokembedError::Decode`],
//!   [`PokembedError::DegenerateVector`]) drop a single item from a batch;
//! - per-batch errors ([`PokembedError::BatchCompute`],
//!   [`PokembedError::ModelInit`]) fail one batch and let the run continue;
//! - everything else (notably [`PokembedError::Io`] while writing) is fatal.
//!
//! # Examples
//!
//! ```
//! use pokembed::error::{PokembedError, Result};
//!
//! fn example_operation() -> Result<()> {
//!     Err(PokembedError::invalid_argument("batch size must be positive"))
//! }
//!
//! match example_operation() {
//!     Ok(_) => println!("Success"),
//!     Err(e) => eprintln!("Error: {}", e),
//! }
//! ```

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::dataset::ItemId;

/// The main error type for Pokembed operations.
#[derive(Error, Debug)]
pub enum PokembedError {
    /// I/O errors (file operations, unwritable destinations, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// An image source path did not resolve to a file.
    #[error("Not found: {}", .path.display())]
    NotFound { path: PathBuf },

    /// Bytes could not be parsed as an image.
    #[error("Decode error in {}: {message}", .path.display())]
    Decode { path: PathBuf, message: String },

    /// The model produced a vector that cannot be normalized.
    #[error("Degenerate vector: {0}")]
    DegenerateVector(String),

    /// The opaque model call failed for an entire batch.
    #[error("Batch compute error: {0}")]
    BatchCompute(String),

    /// The model could not be constructed.
    #[error("Model initialization error: {0}")]
    ModelInit(String),

    /// Invalid argument or configuration value.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Illegal item state transition.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Malformed on-disk array or table.
    #[error("Format error: {0}")]
    Format(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Arrow array construction errors
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// Parquet encoding/decoding errors
    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    /// Generic error for other cases
    #[error("Error: {0}")]
    Other(String),

    /// Generic anyhow error
    #[error("Anyhow error: {0}")]
    Anyhow(#[from] anyhow::Error),
}

/// Result type alias for operations that may fail with PokembedError.
pub type Result<T> = std::result::Result<T, PokembedError>;

impl PokembedError {
    /// Create a new not found error.
    pub fn not_found<P: AsRef<Path>>(path: P) -> Self {
        PokembedError::NotFound {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Create a new decode error.
    pub fn decode<P: AsRef<Path>, S: Into<String>>(path: P, msg: S) -> Self {
        PokembedError::Decode {
            path: path.as_ref().to_path_buf(),
            message: msg.into(),
        }
    }

    /// Create a new degenerate vector error for the given item.
    pub fn degenerate<S: Into<String>>(msg: S) -> Self {
        PokembedError::DegenerateVector(msg.into())
    }

    /// Create a new batch compute error.
    pub fn batch_compute<S: Into<String>>(msg: S) -> Self {
        PokembedError::BatchCompute(msg.into())
    }

    /// Create a new model initialization error.
    pub fn model_init<S: Into<String>>(msg: S) -> Self {
        PokembedError::ModelInit(msg.into())
    }

    /// Create a new invalid argument error.
    pub fn invalid_argument<S: Into<String>>(msg: S) -> Self {
        PokembedError::InvalidArgument(msg.into())
    }

    /// Create a new invalid config error.
    pub fn invalid_config<S: Into<String>>(msg: S) -> Self {
        PokembedError::InvalidArgument(format!("Invalid configuration: {}", msg.into()))
    }

    /// Create a new format error.
    pub fn format<S: Into<String>>(msg: S) -> Self {
        PokembedError::Format(msg.into())
    }

    /// Create a new generic error.
    pub fn other<S: Into<String>>(msg: S) -> Self {
        PokembedError::Other(msg.into())
    }

    /// Create an error for an item id the dataset does not contain.
    pub fn unknown_item(id: ItemId) -> Self {
        PokembedError::InvalidArgument(format!("Unknown item id: {id}"))
    }

    /// Whether this error only invalidates the single item it occurred on.
    pub fn is_item_error(&self) -> bool {
        matches!(
            self,
            PokembedError::NotFound { .. }
                | PokembedError::Decode { .. }
                | PokembedError::DegenerateVector(_)
        )
    }

    /// Whether this error invalidates a whole batch but not the run.
    pub fn is_batch_error(&self) -> bool {
        matches!(
            self,
            PokembedError::BatchCompute(_) | PokembedError::ModelInit(_)
        )
    }
}
