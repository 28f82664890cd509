//! CLIP image tower running locally on Candle.
//!
//! Only the vision transformer and its projection are loaded; there is no
//! text side. Weights come from the HuggingFace hub and are cached under
//! `HF_HOME` (or `~/.cache/huggingface`).

use std::fmt::Display;

use candle_core::{DType, Device, Module, Tensor};
use candle_nn::{Linear, VarBuilder};
use candle_transformers::models::clip;
use hf_hub::api::sync::ApiBuilder;
use image::RgbImage;
use image::imageops::{self, FilterType};
use log::info;

use crate::embedding::model::VisionModel;
use crate::error::{PokembedError, Result};

/// HuggingFace repository loaded by [`ClipModel::default_model`].
pub const DEFAULT_CLIP_MODEL: &str = "openai/clip-vit-base-patch32";

const CLIP_MEAN: [f32; 3] = [0.48145466, 0.4578275, 0.40821073];
const CLIP_STD: [f32; 3] = [0.2686295, 0.2613026, 0.2757771];

fn init_error<E: Display>(stage: &str) -> impl FnOnce(E) -> PokembedError + '_ {
    move |e| PokembedError::model_init(format!("{stage}: {e}"))
}

fn compute_error<E: Display>(e: E) -> PokembedError {
    PokembedError::batch_compute(e.to_string())
}

/// CLIP ViT image encoder producing `projection_dim` (512) raw features.
pub struct ClipModel {
    vision_model: clip::vision_model::ClipVisionTransformer,
    vision_projection: Linear,
    device: Device,
    dimension: usize,
    image_size: usize,
    model_name: String,
}

impl std::fmt::Debug for ClipModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClipModel")
            .field("model_name", &self.model_name)
            .field("dimension", &self.dimension)
            .field("image_size", &self.image_size)
            .finish()
    }
}

impl ClipModel {
    /// Load [`DEFAULT_CLIP_MODEL`].
    pub fn default_model() -> Result<Self> {
        Self::new(DEFAULT_CLIP_MODEL)
    }

    /// Download (if not cached) and load a ViT-B/32 CLIP checkpoint.
    pub fn new(model_name: &str) -> Result<Self> {
        let device = Device::cuda_if_available(0).map_err(init_error("device setup failed"))?;

        let cache_dir = std::env::var("HF_HOME")
            .or_else(|_| std::env::var("HOME").map(|home| format!("{home}/.cache/huggingface")))
            .unwrap_or_else(|_| "/tmp/huggingface".to_string());

        let api = ApiBuilder::new()
            .with_cache_dir(cache_dir.into())
            .build()
            .map_err(init_error("HF API initialization failed"))?;
        let repo = api.model(model_name.to_string());

        let config = clip::ClipConfig::vit_base_patch32();

        let weights = repo
            .get("model.safetensors")
            .or_else(|_| repo.get("pytorch_model.bin"))
            .map_err(init_error("weights download failed"))?;
        info!("Loading CLIP weights from {}", weights.display());

        let vb = if weights.to_string_lossy().ends_with(".safetensors") {
            // SAFETY: the cached weights file is not modified while mapped.
            unsafe {
                VarBuilder::from_mmaped_safetensors(&[weights], DType::F32, &device)
                    .map_err(init_error("VarBuilder creation failed"))?
            }
        } else {
            VarBuilder::from_pth(&weights, DType::F32, &device)
                .map_err(init_error("VarBuilder creation failed"))?
        };

        let vision_model = clip::vision_model::ClipVisionTransformer::new(
            vb.pp("vision_model"),
            &config.vision_config,
        )
        .map_err(init_error("vision model load failed"))?;

        let dimension = config.vision_config.projection_dim;
        let vision_projection = candle_nn::linear_no_bias(
            config.vision_config.embed_dim,
            dimension,
            vb.pp("visual_projection"),
        )
        .map_err(init_error("vision projection load failed"))?;

        Ok(Self {
            vision_model,
            vision_projection,
            device,
            dimension,
            image_size: config.vision_config.image_size,
            model_name: model_name.to_string(),
        })
    }

    /// Resize, scale, and normalize a batch into a `[B, 3, H, W]` tensor.
    fn preprocess(&self, images: &[RgbImage]) -> Result<Tensor> {
        let side = self.image_size as u32;
        let mut pixels = Vec::with_capacity(images.len() * self.image_size * self.image_size * 3);
        for image in images {
            let resized = imageops::resize(image, side, side, FilterType::Triangle);
            pixels.extend_from_slice(resized.as_raw());
        }

        let batch = Tensor::from_vec(
            pixels,
            (images.len(), self.image_size, self.image_size, 3),
            &self.device,
        )
        .map_err(compute_error)?;

        let mean = Tensor::new(&CLIP_MEAN, &self.device)
            .and_then(|t| t.reshape((1, 1, 1, 3)))
            .map_err(compute_error)?;
        let std = Tensor::new(&CLIP_STD, &self.device)
            .and_then(|t| t.reshape((1, 1, 1, 3)))
            .map_err(compute_error)?;

        batch
            .to_dtype(DType::F32)
            .and_then(|t| t.affine(1.0 / 255.0, 0.0))
            .and_then(|t| t.broadcast_sub(&mean))
            .and_then(|t| t.broadcast_div(&std))
            .and_then(|t| t.permute((0, 3, 1, 2)))
            .and_then(|t| t.contiguous())
            .map_err(compute_error)
    }
}

impl VisionModel for ClipModel {
    fn encode_batch(&self, images: &[RgbImage]) -> Result<Vec<Vec<f32>>> {
        if images.is_empty() {
            return Ok(Vec::new());
        }
        let input = self.preprocess(images)?;
        let features = self.vision_model.forward(&input).map_err(compute_error)?;
        self.vision_projection
            .forward(&features)
            .and_then(|projected| projected.to_vec2::<f32>())
            .map_err(compute_error)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        &self.model_name
    }
}
