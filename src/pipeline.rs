//! Batched embedding pipeline.
//!
//! Items are split into consecutive batches; each batch is loaded through
//! an [`ImageSource`](crate::artwork::ImageSource), embedded with one model
//! call, and re-joined with its ids. Failures are isolated: a bad file only
//! drops that item, a failed model call only drops that batch.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use pokembed::artwork::FileImageSource;
//! use pokembed::dataset::Catalog;
//! use pokembed::embedding::{ColorGridModel, Embedder};
//! use pokembed::pipeline::{BatchPipeline, LogProgress, PipelineConfig};
//!
//! # fn main() -> pokembed::error::Result<()> {
//! let catalog = Catalog::scan_directory("artwork_rgb")?;
//! let pipeline = BatchPipeline::new(
//!     PipelineConfig::default().with_batch_size(16),
//!     Arc::new(FileImageSource::new()),
//!     Embedder::from_model(ColorGridModel::default()),
//! )?
//! .with_progress(LogProgress);
//!
//! let outcome = pipeline.run(catalog.items())?;
//! println!("{} embedded, {} failed", outcome.set.len(), outcome.report.failed.len());
//! # Ok(())
//! # }
//! ```

pub mod batch;
pub mod config;
pub mod progress;
pub mod report;
pub mod runner;

pub use batch::{Batch, BatchOutcome, batch_count, partition, process_batch};
pub use config::{DEFAULT_BATCH_SIZE, PipelineConfig};
pub use progress::{BarProgress, LogProgress, NoProgress, ProgressReporter};
pub use report::{BatchFailure, FailedItem, RunReport};
pub use runner::{BatchPipeline, PipelineOutcome};
