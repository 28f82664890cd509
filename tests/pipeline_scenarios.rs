//! End-to-end scenarios for the batch pipeline.

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use image::{Rgb, RgbImage, Rgba, RgbaImage};
use parking_lot::Mutex;
use tempfile::TempDir;

use pokembed::artwork::{FileImageSource, ImageSource};
use pokembed::dataset::{Catalog, Item, ItemState};
use pokembed::embedding::{ColorGridModel, Embedder, ModelPool, UNIT_NORM_TOLERANCE, VisionModel};
use pokembed::error::{PokembedError, Result};
use pokembed::pipeline::{BatchPipeline, PipelineConfig, ProgressReporter};

/// Colour marking an image the failing model refuses to encode.
const POISON: Rgb<u8> = Rgb([1, 2, 3]);

/// Wraps the colour grid model, records batch sizes, and fails any batch
/// containing a poisoned image.
#[derive(Debug, Default)]
struct RecordingModel {
    inner: ColorGridModel,
    batch_sizes: Mutex<Vec<usize>>,
}

impl VisionModel for RecordingModel {
    fn encode_batch(&self, images: &[RgbImage]) -> Result<Vec<Vec<f32>>> {
        self.batch_sizes.lock().push(images.len());
        if images.iter().any(|image| *image.get_pixel(0, 0) == POISON) {
            return Err(PokembedError::batch_compute("poisoned batch"));
        }
        self.inner.encode_batch(images)
    }

    fn dimension(&self) -> usize {
        self.inner.dimension()
    }
}

/// Synthetic images; ids in `poisoned` carry the poison pixel.
struct SyntheticSource {
    poisoned: Vec<i64>,
}

impl ImageSource for SyntheticSource {
    fn load(&self, item: &Item) -> Result<RgbImage> {
        let mut image = RgbImage::from_fn(8, 8, |x, y| {
            Rgb([(item.id * 40 % 256) as u8, (x * 30) as u8, (y * 30) as u8])
        });
        if self.poisoned.contains(&item.id) {
            image.put_pixel(0, 0, POISON);
        }
        Ok(image)
    }
}

#[derive(Clone, Default)]
struct RecordingProgress {
    updates: Arc<Mutex<Vec<(usize, usize)>>>,
}

impl ProgressReporter for RecordingProgress {
    fn update(&self, processed: usize, total: usize, _elapsed: Duration) {
        self.updates.lock().push((processed, total));
    }
}

fn write_artwork(dir: &Path, ids: &[i64]) {
    for id in ids {
        RgbaImage::from_fn(16, 16, |x, y| {
            Rgba([(*id * 40 % 256) as u8, (x * 15) as u8, (y * 15) as u8, 255])
        })
        .save(dir.join(Item::artwork_file_name(*id)))
        .unwrap();
    }
}

fn items(n: i64) -> Vec<Item> {
    (1..=n).map(|id| Item::new(id, Item::artwork_file_name(id))).collect()
}

#[test]
fn test_five_items_batch_of_two() -> Result<()> {
    let model = Arc::new(RecordingModel::default());
    let pipeline = BatchPipeline::new(
        PipelineConfig::default().with_batch_size(2).with_workers(1),
        Arc::new(SyntheticSource { poisoned: vec![] }),
        Embedder::new(Arc::new(ModelPool::with_model(model.clone()))),
    )?;

    let outcome = pipeline.run(&items(5))?;

    assert_eq!(*model.batch_sizes.lock(), vec![2, 2, 1]);
    assert_eq!(outcome.report.batches, 3);
    assert_eq!(outcome.set.ids(), &[1, 2, 3, 4, 5]);
    assert!(
        outcome
            .set
            .embeddings()
            .iter()
            .all(|e| e.is_unit(UNIT_NORM_TOLERANCE))
    );

    Ok(())
}

#[test]
fn test_corrupt_file_is_isolated() -> Result<()> {
    let art = TempDir::new()?;
    write_artwork(art.path(), &[1, 2, 4, 5]);
    fs::write(art.path().join("0003.png"), b"definitely not a png")?;

    let catalog = Catalog::scan_directory(art.path())?;
    assert_eq!(catalog.len(), 5);

    let pipeline = BatchPipeline::new(
        PipelineConfig::default().with_batch_size(2).with_workers(1),
        Arc::new(FileImageSource::new()),
        Embedder::from_model(ColorGridModel::default()),
    )?;
    let outcome = pipeline.run(catalog.items())?;

    assert_eq!(outcome.report.succeeded, vec![1, 2, 4, 5]);
    assert_eq!(outcome.report.failed.len(), 1);
    assert_eq!(outcome.report.failed[0].id, 3);
    assert!(outcome.report.failed_batches.is_empty());
    assert_eq!(outcome.set.ids(), &[1, 2, 4, 5]);
    assert!(matches!(outcome.report.states[&3], ItemState::Failed(_)));
    assert_eq!(outcome.report.states[&4], ItemState::Embedded);

    Ok(())
}

#[test]
fn test_missing_file_in_dense_range() -> Result<()> {
    let art = TempDir::new()?;
    write_artwork(art.path(), &[1, 2, 3]);

    let catalog = Catalog::dense_range(art.path(), 4);
    let pipeline = BatchPipeline::new(
        PipelineConfig::default().with_batch_size(3).with_workers(2),
        Arc::new(FileImageSource::new()),
        Embedder::from_model(ColorGridModel::default()),
    )?;
    let outcome = pipeline.run(catalog.items())?;

    assert_eq!(outcome.report.succeeded, vec![1, 2, 3]);
    assert_eq!(outcome.report.failed[0].id, 4);
    assert!(outcome.report.failed[0].reason.contains("Not found"));

    Ok(())
}

#[test]
fn test_batch_failure_is_isolated() -> Result<()> {
    let pipeline = BatchPipeline::new(
        PipelineConfig::default().with_batch_size(2).with_workers(1),
        Arc::new(SyntheticSource { poisoned: vec![3] }),
        Embedder::from_model(RecordingModel::default()),
    )?;

    let outcome = pipeline.run(&items(6))?;

    assert_eq!(outcome.report.succeeded, vec![1, 2, 5, 6]);
    assert_eq!(outcome.report.failed_batches.len(), 1);
    assert_eq!(outcome.report.failed_batches[0].index, 1);
    assert_eq!(outcome.report.failed_batches[0].ids, vec![3, 4]);
    let failed: Vec<i64> = outcome.report.failed.iter().map(|f| f.id).collect();
    assert_eq!(failed, vec![3, 4]);
    assert!(!outcome.report.all_batches_failed());

    Ok(())
}

#[test]
fn test_model_init_failure_fails_every_batch() -> Result<()> {
    let pool = ModelPool::new(|| Err(PokembedError::other("weights unavailable")));
    let pipeline = BatchPipeline::new(
        PipelineConfig::default().with_batch_size(2).with_workers(1),
        Arc::new(SyntheticSource { poisoned: vec![] }),
        Embedder::new(Arc::new(pool)),
    )?;

    let outcome = pipeline.run(&items(3))?;

    assert!(outcome.set.is_empty());
    assert!(outcome.report.all_batches_failed());
    assert!(outcome.report.failed_batches[0].reason.contains("weights unavailable"));

    Ok(())
}

#[test]
fn test_parallel_run_preserves_order() -> Result<()> {
    let items = items(50);
    let sequential = BatchPipeline::new(
        PipelineConfig::default().with_batch_size(3).with_workers(1),
        Arc::new(SyntheticSource { poisoned: vec![] }),
        Embedder::from_model(ColorGridModel::default()),
    )?
    .run(&items)?;

    for workers in [2, 4, 8] {
        let parallel = BatchPipeline::new(
            PipelineConfig::default().with_batch_size(3).with_workers(workers),
            Arc::new(SyntheticSource { poisoned: vec![] }),
            Embedder::from_model(ColorGridModel::default()),
        )?
        .run(&items)?;

        assert_eq!(parallel.set.ids(), (1..=50).collect::<Vec<_>>().as_slice());
        assert_eq!(parallel.set, sequential.set);
    }

    Ok(())
}

#[test]
fn test_model_constructed_once_across_workers() -> Result<()> {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let pool = Arc::new(ModelPool::new(move || {
        counter.fetch_add(1, Ordering::SeqCst);
        std::thread::sleep(Duration::from_millis(10));
        Ok(Arc::new(ColorGridModel::default()) as Arc<dyn VisionModel>)
    }));

    let pipeline = BatchPipeline::new(
        PipelineConfig::default().with_batch_size(2).with_workers(4),
        Arc::new(SyntheticSource { poisoned: vec![] }),
        Embedder::new(Arc::clone(&pool)),
    )?;
    let outcome = pipeline.run(&items(20))?;

    assert_eq!(outcome.set.len(), 20);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(pool.constructions(), 1);

    Ok(())
}

#[test]
fn test_progress_reported_after_each_batch() -> Result<()> {
    let progress = RecordingProgress::default();
    let pipeline = BatchPipeline::new(
        PipelineConfig::default().with_batch_size(4).with_workers(3),
        Arc::new(SyntheticSource { poisoned: vec![] }),
        Embedder::from_model(ColorGridModel::default()),
    )?
    .with_progress(progress.clone());

    pipeline.run(&items(10))?;

    let updates = progress.updates.lock().clone();
    assert_eq!(updates.len(), 3);
    assert!(updates.windows(2).all(|w| w[0].0 < w[1].0));
    assert_eq!(updates.last(), Some(&(10, 10)));

    Ok(())
}

#[test]
fn test_mark_written_after_persisting() -> Result<()> {
    let pipeline = BatchPipeline::new(
        PipelineConfig::default().with_batch_size(2).with_workers(1),
        Arc::new(SyntheticSource { poisoned: vec![] }),
        Embedder::from_model(ColorGridModel::default()),
    )?;
    let mut outcome = pipeline.run(&items(3))?;

    outcome.report.mark_written(outcome.set.ids())?;
    assert_eq!(outcome.report.count_in(&ItemState::Written), 3);

    Ok(())
}
