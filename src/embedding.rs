//! Image embedding: opaque vision models, lazy model construction, and the
//! normalizing [`Embedder`] front-end.
//!
//! # Feature Flags
//!
//! - `clip` - CLIP ViT-B/32 image tower via HuggingFace Candle
//!   ([`ClipModel`]). Without it only the built-in [`ColorGridModel`] is
//!   available.
//!
//! # Usage
//!
//! ```
//! use std::sync::Arc;
//!
//! use pokembed::embedding::{Embedder, ModelKind, ModelPool, model_factory};
//!
//! # fn main() -> pokembed::error::Result<()> {
//! // Nothing is loaded until the first batch is embedded.
//! let pool = Arc::new(ModelPool::new(model_factory(ModelKind::ColorGrid)));
//! let embedder = Embedder::new(pool);
//! assert_eq!(embedder.dimension()?, 192);
//! # Ok(())
//! # }
//! ```

pub mod embedder;
pub mod model;
pub mod pool;
pub mod vector;

#[cfg(feature = "clip")]
pub mod clip;

use std::sync::Arc;

pub use embedder::Embedder;
pub use model::{ColorGridModel, ModelKind, VisionModel};
pub use pool::ModelPool;
pub use vector::{Embedding, EmbeddingMatrix, UNIT_NORM_TOLERANCE};

#[cfg(feature = "clip")]
pub use clip::ClipModel;

use crate::error::Result;

/// Factory building the model selected by `kind`, for use with
/// [`ModelPool::new`].
pub fn model_factory(kind: ModelKind) -> impl Fn() -> Result<Arc<dyn VisionModel>> + Send + Sync + 'static {
    move || build_model(kind)
}

fn build_model(kind: ModelKind) -> Result<Arc<dyn VisionModel>> {
    match kind {
        ModelKind::ColorGrid => Ok(Arc::new(ColorGridModel::default())),
        #[cfg(feature = "clip")]
        ModelKind::Clip => Ok(Arc::new(ClipModel::default_model()?)),
        #[cfg(not(feature = "clip"))]
        ModelKind::Clip => Err(crate::error::PokembedError::model_init(
            "the clip model requires building with the `clip` feature",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PokembedError;

    #[test]
    fn test_color_grid_factory() {
        let model = model_factory(ModelKind::ColorGrid)().unwrap();
        assert_eq!(model.dimension(), 192);
    }

    #[cfg(not(feature = "clip"))]
    #[test]
    fn test_clip_requires_feature() {
        let err = model_factory(ModelKind::Clip)().unwrap_err();
        assert!(matches!(err, PokembedError::ModelInit(_)));
    }
}
