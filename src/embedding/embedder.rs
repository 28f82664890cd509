//! Batched, normalizing front-end over a [`VisionModel`].

use std::sync::Arc;

use image::RgbImage;
use log::{debug, warn};

use crate::embedding::model::VisionModel;
use crate::embedding::pool::ModelPool;
use crate::embedding::vector::Embedding;
use crate::error::{PokembedError, Result};

/// Turns images into unit-length embeddings.
///
/// The underlying model is constructed lazily by a shared [`ModelPool`].
/// Each batch is exactly one model call; every output row is then
/// L2-normalized independently.
///
/// # Examples
///
/// ```
/// use image::{Rgb, RgbImage};
/// use pokembed::embedding::{ColorGridModel, Embedder, UNIT_NORM_TOLERANCE};
///
/// # fn main() -> pokembed::error::Result<()> {
/// let embedder = Embedder::from_model(ColorGridModel::default());
/// let image = RgbImage::from_fn(16, 16, |x, y| Rgb([x as u8 * 16, y as u8 * 16, 0]));
///
/// let embedding = embedder.embed(&image)?;
/// assert_eq!(embedding.dimension(), 192);
/// assert!(embedding.is_unit(UNIT_NORM_TOLERANCE));
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Embedder {
    pool: Arc<ModelPool>,
}

impl Embedder {
    pub fn new(pool: Arc<ModelPool>) -> Self {
        Self { pool }
    }

    /// Wrap an already constructed model.
    pub fn from_model<M: VisionModel + 'static>(model: M) -> Self {
        Self::new(Arc::new(ModelPool::with_model(Arc::new(model))))
    }

    pub fn pool(&self) -> &Arc<ModelPool> {
        &self.pool
    }

    /// Embed a batch of images with one model call.
    ///
    /// The outer `Result` fails the whole batch ([`PokembedError::ModelInit`]
    /// or [`PokembedError::BatchCompute`]). The inner results are per image,
    /// in input order; a vector that cannot be normalized becomes a
    /// [`PokembedError::DegenerateVector`] for that image only.
    pub fn embed_batch(&self, images: &[RgbImage]) -> Result<Vec<Result<Embedding>>> {
        if images.is_empty() {
            return Ok(Vec::new());
        }

        let model = self.pool.get()?;
        let dimension = model.dimension();

        let raw = model.encode_batch(images).map_err(|e| match e {
            PokembedError::BatchCompute(_) => e,
            other => PokembedError::batch_compute(other.to_string()),
        })?;

        if raw.len() != images.len() {
            return Err(PokembedError::batch_compute(format!(
                "model returned {} vectors for {} images",
                raw.len(),
                images.len()
            )));
        }
        if let Some(bad) = raw.iter().find(|row| row.len() != dimension) {
            return Err(PokembedError::batch_compute(format!(
                "model returned a vector of width {}, expected {dimension}",
                bad.len()
            )));
        }

        debug!("Encoded batch of {} images with {}", images.len(), model.name());

        Ok(raw
            .into_iter()
            .enumerate()
            .map(|(position, row)| {
                let mut embedding = Embedding::new(row);
                embedding.normalize().inspect_err(|e| {
                    warn!("Batch position {position}: {e}");
                })?;
                Ok(embedding)
            })
            .collect())
    }

    /// Embed a single image.
    pub fn embed(&self, image: &RgbImage) -> Result<Embedding> {
        self.embed_batch(std::slice::from_ref(image))?
            .pop()
            .unwrap_or_else(|| Err(PokembedError::batch_compute("model returned no vector")))
    }

    /// Output dimension; constructs the model if necessary.
    pub fn dimension(&self) -> Result<usize> {
        Ok(self.pool.get()?.dimension())
    }

    /// Model name; constructs the model if necessary.
    pub fn model_name(&self) -> Result<String> {
        Ok(self.pool.get()?.name().to_string())
    }
}
