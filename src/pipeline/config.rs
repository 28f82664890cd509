//! Configuration for pipeline runs.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{PokembedError, Result};

/// Default number of items per model call.
pub const DEFAULT_BATCH_SIZE: usize = 32;

/// Configuration for [`BatchPipeline`](super::BatchPipeline).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Items per batch (one model call per batch).
    pub batch_size: usize,

    /// Worker threads processing batches. 1 runs inline on the caller.
    pub workers: usize,

    /// Process at most this many items, in catalog order.
    pub limit: Option<usize>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            workers: num_cpus::get(),
            limit: None,
        }
    }
}

impl PipelineConfig {
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit;
        self
    }

    /// Load a configuration from a JSON file. Missing fields keep their
    /// defaults.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => PokembedError::not_found(path),
            _ => PokembedError::Io(e),
        })?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(PokembedError::invalid_config("batch_size must be at least 1"));
        }
        if self.workers == 0 {
            return Err(PokembedError::invalid_config("workers must be at least 1"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.batch_size, 32);
        assert!(config.workers >= 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation() {
        assert!(PipelineConfig::default().with_batch_size(0).validate().is_err());
        assert!(PipelineConfig::default().with_workers(0).validate().is_err());
    }

    #[test]
    fn test_from_json_file_keeps_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"batch_size": 8, "limit": 100}}"#).unwrap();

        let config = PipelineConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.batch_size, 8);
        assert_eq!(config.limit, Some(100));
        assert_eq!(config.workers, num_cpus::get());
    }

    #[test]
    fn test_from_json_file_rejects_invalid() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"workers": 0}}"#).unwrap();
        assert!(PipelineConfig::from_json_file(file.path()).is_err());
        assert!(PipelineConfig::from_json_file("/nonexistent/pipeline.json").is_err());
    }
}
