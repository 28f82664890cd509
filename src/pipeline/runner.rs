//! The batch pipeline engine.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use crossbeam_channel::bounded;
use log::{debug, info, warn};
use rayon::ThreadPoolBuilder;

use crate::artwork::ImageSource;
use crate::dataset::{EmbeddingSet, Item};
use crate::embedding::Embedder;
use crate::error::{PokembedError, Result};
use crate::pipeline::batch::{Batch, BatchOutcome, partition, process_batch};
use crate::pipeline::config::PipelineConfig;
use crate::pipeline::progress::{NoProgress, ProgressReporter};
use crate::pipeline::report::{BatchFailure, FailedItem, RunReport};

/// Result of a pipeline run: the embeddings plus what happened to every
/// item.
#[derive(Debug)]
pub struct PipelineOutcome {
    pub set: EmbeddingSet,
    pub report: RunReport,
}

/// Drives items through `ImageSource -> Embedder` in fixed-size batches.
///
/// Batches run on a dedicated pool of `workers` threads (inline when
/// `workers == 1`). Output order always follows input order, whatever
/// order batches finish in.
pub struct BatchPipeline {
    config: PipelineConfig,
    source: Arc<dyn ImageSource>,
    embedder: Embedder,
    progress: Box<dyn ProgressReporter>,
}

impl BatchPipeline {
    pub fn new(config: PipelineConfig, source: Arc<dyn ImageSource>, embedder: Embedder) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            source,
            embedder,
            progress: Box::new(NoProgress),
        })
    }

    pub fn with_progress<R: ProgressReporter + 'static>(mut self, progress: R) -> Self {
        self.progress = Box::new(progress);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Process `items` and collect the embeddings of those that succeed.
    ///
    /// Item and batch failures are recorded in the report, not returned as
    /// errors. An `Err` means the run could not start (bad configuration,
    /// worker pool creation).
    pub fn run(&self, items: &[Item]) -> Result<PipelineOutcome> {
        let started_at = Utc::now();
        let timer = Instant::now();

        let items = match self.config.limit {
            Some(limit) if limit < items.len() => &items[..limit],
            _ => items,
        };
        let total = items.len();
        let batches = partition(items, self.config.batch_size)?;
        info!(
            "Embedding {total} items in {} batches of up to {} ({} workers)",
            batches.len(),
            self.config.batch_size,
            self.config.workers
        );

        self.progress.start(total);
        let mut slots: Vec<Option<BatchOutcome>> = Vec::with_capacity(batches.len());
        slots.resize_with(batches.len(), || None);
        let mut processed = 0;

        let mut collect = |outcome: BatchOutcome| {
            processed += outcome.processed();
            self.progress.update(processed, total, timer.elapsed());
            let index = outcome.index;
            slots[index] = Some(outcome);
        };

        if self.config.workers == 1 || batches.len() <= 1 {
            for batch in &batches {
                collect(process_batch(batch, self.source.as_ref(), &self.embedder));
            }
        } else {
            self.run_parallel(&batches, &mut collect)?;
        }

        let outcomes: Vec<BatchOutcome> = slots.into_iter().flatten().collect();
        if outcomes.len() != batches.len() {
            return Err(PokembedError::other(format!(
                "{} of {} batches never reported back",
                batches.len() - outcomes.len(),
                batches.len()
            )));
        }

        let outcome = self.assemble(outcomes, total, started_at, timer)?;
        self.progress.finish(&outcome.report);
        Ok(outcome)
    }

    fn run_parallel<F>(&self, batches: &[Batch<'_>], collect: &mut F) -> Result<()>
    where
        F: FnMut(BatchOutcome),
    {
        let pool = ThreadPoolBuilder::new()
            .num_threads(self.config.workers)
            .thread_name(|i| format!("pokembed-worker-{i}"))
            .build()
            .map_err(|e| PokembedError::other(format!("Failed to create thread pool: {e}")))?;

        let source = self.source.as_ref();
        let embedder = &self.embedder;
        let (tx, rx) = bounded::<BatchOutcome>(self.config.workers);

        pool.in_place_scope(|scope| {
            for batch in batches {
                let tx = tx.clone();
                scope.spawn(move |_| {
                    let outcome = process_batch(batch, source, embedder);
                    if tx.send(outcome).is_err() {
                        warn!("Batch {} finished after the coordinator stopped", batch.index);
                    }
                });
            }
            drop(tx);

            // completion order; reassembled by index later
            for outcome in rx.iter() {
                debug!("Batch {} reported back", outcome.index);
                collect(outcome);
            }
        });
        Ok(())
    }

    fn assemble(
        &self,
        outcomes: Vec<BatchOutcome>,
        total: usize,
        started_at: chrono::DateTime<Utc>,
        timer: Instant,
    ) -> Result<PipelineOutcome> {
        let dimension = outcomes
            .iter()
            .flat_map(|o| o.embedded.first())
            .map(|(_, embedding)| embedding.dimension())
            .next()
            .unwrap_or(0);

        let mut set = EmbeddingSet::new(dimension);
        let mut report = RunReport {
            started_at,
            total,
            batches: outcomes.len(),
            ..Default::default()
        };

        for outcome in outcomes {
            if let Some(reason) = &outcome.batch_error {
                report.failed_batches.push(BatchFailure {
                    index: outcome.index,
                    ids: outcome.states.iter().map(|(id, _)| *id).collect(),
                    reason: reason.clone(),
                });
            }
            for (id, reason) in outcome.failed() {
                report.failed.push(FailedItem {
                    id,
                    reason: reason.to_string(),
                });
            }
            for (id, embedding) in outcome.embedded {
                report.succeeded.push(id);
                set.push(id, embedding)?;
            }
            report.states.extend(outcome.states);
        }

        report.elapsed_ms = timer.elapsed().as_millis() as u64;
        info!(
            "Run finished: {} embedded, {} failed, {} of {} batches failed",
            report.succeeded.len(),
            report.failed.len(),
            report.failed_batches.len(),
            report.batches
        );

        Ok(PipelineOutcome { set, report })
    }
}
