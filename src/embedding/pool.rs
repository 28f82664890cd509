//! Lazily constructed, process-wide model instance.
//!
//! Model weights are expensive to load, so a [`ModelPool`] builds its model
//! on first use and hands the same `Arc` to every worker afterwards.
//! Construction uses double-checked locking: read the cache, take the init
//! lock, re-check, construct, publish. Concurrent first calls therefore
//! construct exactly once. A failed construction publishes nothing, so a
//! later call may retry.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use log::{debug, info};
use parking_lot::{Mutex, RwLock};

use crate::embedding::model::VisionModel;
use crate::error::{PokembedError, Result};

/// Factory invoked (at most once on success) to build the model.
pub type ModelFactory = Box<dyn Fn() -> Result<Arc<dyn VisionModel>> + Send + Sync>;

pub struct ModelPool {
    cache: RwLock<Option<Arc<dyn VisionModel>>>,
    init_lock: Mutex<()>,
    factory: ModelFactory,
    constructions: AtomicUsize,
}

impl ModelPool {
    /// Create a pool that builds its model with `factory` on first use.
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn() -> Result<Arc<dyn VisionModel>> + Send + Sync + 'static,
    {
        Self {
            cache: RwLock::new(None),
            init_lock: Mutex::new(()),
            factory: Box::new(factory),
            constructions: AtomicUsize::new(0),
        }
    }

    /// Create a pool around an already constructed model.
    pub fn with_model(model: Arc<dyn VisionModel>) -> Self {
        let cached = Arc::clone(&model);
        let pool = Self::new(move || Ok(Arc::clone(&model)));
        *pool.cache.write() = Some(cached);
        pool
    }

    /// Get the shared model, constructing it if this is the first call.
    pub fn get(&self) -> Result<Arc<dyn VisionModel>> {
        if let Some(model) = self.cache.read().as_ref() {
            return Ok(Arc::clone(model));
        }

        let _guard = self.init_lock.lock();

        // another thread may have finished construction while we waited
        if let Some(model) = self.cache.read().as_ref() {
            return Ok(Arc::clone(model));
        }

        debug!("Constructing vision model");
        let model = (self.factory)().map_err(|e| match e {
            PokembedError::ModelInit(_) => e,
            other => PokembedError::model_init(other.to_string()),
        })?;
        self.constructions.fetch_add(1, Ordering::SeqCst);
        info!(
            "Loaded model {} ({} dimensions)",
            model.name(),
            model.dimension()
        );

        *self.cache.write() = Some(Arc::clone(&model));
        Ok(model)
    }

    /// Whether the model has been constructed.
    pub fn is_loaded(&self) -> bool {
        self.cache.read().is_some()
    }

    /// Number of successful factory calls so far.
    pub fn constructions(&self) -> usize {
        self.constructions.load(Ordering::SeqCst)
    }
}

impl fmt::Debug for ModelPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelPool")
            .field("loaded", &self.is_loaded())
            .field("constructions", &self.constructions())
            .finish()
    }
}
