//! Opaque vision models: a batch of RGB images in, raw vectors out.

use std::fmt::Debug;
use std::str::FromStr;

use clap::ValueEnum;
use image::RgbImage;
use image::imageops::{self, FilterType};
use serde::{Deserialize, Serialize};

use crate::error::{PokembedError, Result};

/// Trait for the pretrained model behind an [`Embedder`](super::Embedder).
///
/// One call to [`encode_batch`](VisionModel::encode_batch) is one forward
/// pass. Outputs are raw: callers normalize them. Implementations must be
/// shareable across worker threads.
pub trait VisionModel: Send + Sync + Debug {
    /// Encode a batch of images into one raw vector per image, in order.
    fn encode_batch(&self, images: &[RgbImage]) -> Result<Vec<Vec<f32>>>;

    /// Width of the vectors this model produces.
    fn dimension(&self) -> usize;

    /// Get the name/identifier of this model.
    fn name(&self) -> &str {
        "unknown"
    }
}

/// Models the CLI can construct.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ModelKind {
    /// Built-in downsampled colour grid (no weights needed)
    #[default]
    ColorGrid,
    /// CLIP ViT-B/32 image tower (requires the `clip` feature)
    Clip,
}

impl FromStr for ModelKind {
    type Err = PokembedError;

    fn from_str(s: &str) -> Result<Self> {
        <ModelKind as ValueEnum>::from_str(s, true)
            .map_err(|_| PokembedError::invalid_argument(format!("unknown model {s:?}")))
    }
}

/// Default grid side for [`ColorGridModel`].
pub const DEFAULT_GRID: u32 = 8;

/// Deterministic baseline model: the image shrunk to a `grid x grid`
/// thumbnail, each channel centred around zero.
///
/// Produces `3 * grid * grid` components (192 for the default grid). Each
/// component is `channel / 255 - 0.5`, so no integer channel value maps to
/// exactly zero and the output is never degenerate.
#[derive(Debug, Clone)]
pub struct ColorGridModel {
    grid: u32,
    name: String,
}

impl ColorGridModel {
    pub fn new(grid: u32) -> Result<Self> {
        if grid == 0 {
            return Err(PokembedError::invalid_config("colour grid size must be positive"));
        }
        Ok(Self {
            grid,
            name: format!("color-grid-{grid}x{grid}"),
        })
    }

    fn encode_one(&self, image: &RgbImage) -> Vec<f32> {
        let thumbnail = imageops::resize(image, self.grid, self.grid, FilterType::Triangle);
        thumbnail
            .pixels()
            .flat_map(|pixel| pixel.0)
            .map(|channel| channel as f32 / 255.0 - 0.5)
            .collect()
    }
}

impl Default for ColorGridModel {
    fn default() -> Self {
        Self {
            grid: DEFAULT_GRID,
            name: format!("color-grid-{DEFAULT_GRID}x{DEFAULT_GRID}"),
        }
    }
}

impl VisionModel for ColorGridModel {
    fn encode_batch(&self, images: &[RgbImage]) -> Result<Vec<Vec<f32>>> {
        let mut outputs = Vec::with_capacity(images.len());
        for image in images {
            if image.width() == 0 || image.height() == 0 {
                return Err(PokembedError::batch_compute("cannot encode an empty image"));
            }
            outputs.push(self.encode_one(image));
        }
        Ok(outputs)
    }

    fn dimension(&self) -> usize {
        (3 * self.grid * self.grid) as usize
    }

    fn name(&self) -> &str {
        &self.name
    }
}
