//! Command implementations for the pokembed CLI.

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use log::{info, warn};

use crate::artwork::{FileImageSource, convert_directory};
use crate::cli::args::*;
use crate::cli::output::*;
use crate::dataset::{Catalog, ItemId};
use crate::embedding::vector::EmbeddingMatrix;
use crate::embedding::{Embedder, ModelPool, model_factory};
use crate::error::{PokembedError, Result};
use crate::pipeline::{BarProgress, BatchPipeline, LogProgress, PipelineConfig};
use crate::similarity;
use crate::store::{self, EmbeddingWriter, OutputFormat};
use crate::verify::Verifier;

/// Execute a CLI command.
pub fn execute_command(args: PokembedArgs) -> Result<()> {
    match &args.command {
        Command::Convert(convert_args) => convert(convert_args, &args),
        Command::Embed(embed_args) => embed(embed_args, &args),
        Command::Verify(verify_args) => verify(verify_args, &args),
        Command::Similar(similar_args) => similar(similar_args, &args),
    }
}

/// Convert RGBA artwork to RGB.
fn convert(args: &ConvertArgs, cli_args: &PokembedArgs) -> Result<()> {
    let summary = convert_directory(&args.input_dir, &args.output_dir)?;
    output_result("Artwork converted", &summary, cli_args)
}

/// Build the item list for an embed run.
fn load_catalog(args: &EmbedArgs) -> Result<Catalog> {
    let catalog = match (&args.manifest, args.count) {
        (Some(manifest), _) => Catalog::from_manifest(manifest)?,
        (None, Some(count)) => Catalog::dense_range(&args.input_dir, count),
        (None, None) => Catalog::scan_directory(&args.input_dir)?,
    };
    if catalog.is_empty() {
        return Err(PokembedError::invalid_argument(format!(
            "no artwork to embed in {}",
            args.input_dir.display()
        )));
    }
    Ok(catalog)
}

/// Merge the config file (if any) with command line overrides.
fn pipeline_config(args: &EmbedArgs) -> Result<PipelineConfig> {
    let mut config = match &args.config {
        Some(path) => PipelineConfig::from_json_file(path)?,
        None => PipelineConfig::default(),
    };
    if let Some(batch_size) = args.batch_size {
        config.batch_size = batch_size;
    }
    if let Some(workers) = args.workers {
        config.workers = workers;
    }
    if args.limit.is_some() {
        config.limit = args.limit;
    }
    config.validate()?;
    Ok(config)
}

/// Compute and persist embeddings.
fn embed(args: &EmbedArgs, cli_args: &PokembedArgs) -> Result<()> {
    let start = Instant::now();
    let catalog = load_catalog(args)?;
    let config = pipeline_config(args)?;
    info!(
        "Embedding {} items from {} with {:?}",
        catalog.len(),
        args.input_dir.display(),
        args.model
    );

    let embedder = Embedder::new(Arc::new(ModelPool::new(model_factory(args.model))));
    let source = Arc::new(FileImageSource::with_root(&args.input_dir));
    let pipeline = BatchPipeline::new(config, source, embedder.clone())?;
    let pipeline = if args.progress && cli_args.verbosity() > 0 {
        pipeline.with_progress(BarProgress::new())
    } else {
        pipeline.with_progress(LogProgress)
    };

    let mut outcome = pipeline.run(catalog.items())?;

    if outcome.report.all_batches_failed() || outcome.set.is_empty() {
        if let Some(path) = &args.report {
            outcome.report.save_json(path)?;
        }
        let reason = outcome
            .report
            .failed_batches
            .first()
            .map(|batch| batch.reason.clone())
            .or_else(|| outcome.report.failed.first().map(|item| item.reason.clone()))
            .unwrap_or_else(|| "no item produced an embedding".to_string());
        return Err(PokembedError::other(format!(
            "embedding failed for every item: {reason}"
        )));
    }

    let written = EmbeddingWriter::new(args.output_format).write(&outcome.set, &args.destination)?;
    outcome.report.mark_written(outcome.set.ids())?;

    if let Some(path) = &args.report {
        outcome.report.save_json(path)?;
    }
    if !outcome.report.failed.is_empty() {
        warn!("{} items failed; see the summary", outcome.report.failed.len());
    }

    let output_bytes = written
        .iter()
        .filter_map(|path| fs::metadata(path).ok())
        .map(|meta| meta.len())
        .sum();

    let report = outcome.report;
    let summary = EmbedSummary {
        model: embedder.model_name()?,
        dimension: outcome.set.dimension(),
        total_items: report.total,
        embedded: report.succeeded.len(),
        failed: report.failed.len(),
        batches: report.batches,
        failed_batches: report.failed_batches,
        failures: report.failed,
        output_files: written.iter().map(|p| p.display().to_string()).collect(),
        output_bytes,
        duration_ms: start.elapsed().as_millis() as u64,
    };
    output_result("Embeddings saved", &summary, cli_args)
}

/// Load ids and embeddings from whichever source the arguments name.
fn load_dataset(args: &DatasetArgs) -> Result<(Vec<ItemId>, EmbeddingMatrix)> {
    match (&args.ids, &args.embeddings, &args.table) {
        (Some(ids), Some(embeddings), None) => store::read_npy_pair(ids, embeddings),
        (None, None, Some(table)) => store::read_raw(table, table_format(table)?),
        _ => Err(PokembedError::invalid_argument(
            "pass either --ids and --embeddings, or --table",
        )),
    }
}

fn table_format(path: &Path) -> Result<OutputFormat> {
    match store::format_from_extension(path) {
        Some(format @ (OutputFormat::Parquet | OutputFormat::Json)) => Ok(format),
        _ => Err(PokembedError::invalid_argument(format!(
            "cannot tell the table format of {}; use a .parquet or .json file",
            path.display()
        ))),
    }
}

/// Verify a saved dataset. Fails when any check fails.
fn verify(args: &VerifyArgs, cli_args: &PokembedArgs) -> Result<()> {
    let (ids, matrix) = load_dataset(&args.dataset)?;

    let mut verifier = Verifier::new().with_tolerance(args.tolerance)?;
    if let Some(count) = args.expected_count {
        verifier = verifier.with_expected_count(count);
    }
    let report = verifier.verify(&ids, &matrix);
    let passed = report.passed();

    output_result(
        "Verification complete",
        &VerificationSummary { passed, report },
        cli_args,
    )?;

    if passed {
        Ok(())
    } else {
        Err(PokembedError::other("verification failed"))
    }
}

/// Print the nearest neighbours of one item.
fn similar(args: &SimilarArgs, cli_args: &PokembedArgs) -> Result<()> {
    let (ids, matrix) = load_dataset(&args.dataset)?;
    let neighbors = similarity::top_k(&ids, &matrix, args.id, args.top_k)?;

    output_result(
        "Similarity search complete",
        &SimilarityResults {
            query: args.id,
            neighbors,
        },
        cli_args,
    )
}
