//! Resolving items to normalized RGB pixels.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use image::{ImageReader, RgbImage};
use log::trace;

use crate::artwork::normalize::flatten_on_white;
use crate::dataset::Item;
use crate::error::{PokembedError, Result};

/// Trait for anything that can turn an item into pixels.
///
/// Implementations must apply [`flatten_on_white`] so callers only ever see
/// RGB images. Sources are shared by every pipeline worker.
pub trait ImageSource: Send + Sync {
    /// Load and normalize the artwork of `item`.
    fn load(&self, item: &Item) -> Result<RgbImage>;

    /// Get the name of this source for logging.
    fn name(&self) -> &str {
        "unknown"
    }
}

/// Image source backed by the local filesystem.
#[derive(Debug, Clone, Default)]
pub struct FileImageSource {
    /// Directory relative item paths are resolved against.
    root: Option<PathBuf>,
}

impl FileImageSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve relative item paths against `root`.
    pub fn with_root<P: Into<PathBuf>>(root: P) -> Self {
        Self {
            root: Some(root.into()),
        }
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        match &self.root {
            Some(root) if path.is_relative() => root.join(path),
            _ => path.to_path_buf(),
        }
    }

    /// Load and normalize the image at `path`.
    pub fn load_path<P: AsRef<Path>>(&self, path: P) -> Result<RgbImage> {
        let path = self.resolve(path.as_ref());
        trace!("Loading {}", path.display());

        let reader = ImageReader::open(&path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => PokembedError::not_found(&path),
            _ => PokembedError::Io(e),
        })?;

        let reader = reader
            .with_guessed_format()
            .map_err(|e| PokembedError::decode(&path, format!("format guess failed: {e}")))?;

        let decoded = reader
            .decode()
            .map_err(|e| PokembedError::decode(&path, e.to_string()))?;

        Ok(flatten_on_white(&decoded))
    }
}

impl ImageSource for FileImageSource {
    fn load(&self, item: &Item) -> Result<RgbImage> {
        self.load_path(&item.source_path)
    }

    fn name(&self) -> &str {
        "file"
    }
}
