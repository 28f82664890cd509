//! # Pokembed
//!
//! Builds Pokémon image-embedding datasets.
//!
//! ## Features
//!
//! - RGBA artwork flattened onto white, identically at conversion and load time
//! - Batched, parallel embedding with per-item and per-batch failure isolation
//! - Lazily constructed, shared vision model (CLIP behind the `clip` feature)
//! - NumPy `.npy` pair, Parquet and JSON outputs, all written atomically
//! - Verification of norms and id completeness, and nearest-neighbour lookup

pub mod artwork;
pub mod cli;
pub mod dataset;
pub mod embedding;
pub mod error;
pub mod pipeline;
pub mod similarity;
pub mod store;
pub mod util;
pub mod verify;

pub mod prelude {
    pub use crate::artwork::{FileImageSource, ImageSource, flatten_on_white};
    pub use crate::dataset::{Catalog, EmbeddingSet, Item, ItemId, ItemState};
    pub use crate::embedding::{Embedder, Embedding, EmbeddingMatrix, ModelPool, VisionModel};
    pub use crate::error::{PokembedError, Result};
    pub use crate::pipeline::{BatchPipeline, PipelineConfig, RunReport};
    pub use crate::store::{EmbeddingWriter, OutputFormat};
    pub use crate::verify::{VerificationReport, Verifier};
}

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
