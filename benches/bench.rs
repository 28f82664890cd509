//! Criterion benchmarks for Pokembed.
//!
//! Covers the hot paths of an embedding run and of dataset inspection:
//! - Artwork normalization (alpha compositing)
//! - Batch embedding with the built-in colour grid model
//! - Vector kernels and normalization
//! - Nearest-neighbour lookup
//! - Dataset encoding

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use image::{DynamicImage, Rgb, RgbImage, Rgba, RgbaImage};
use pokembed::artwork::flatten_on_white;
use pokembed::dataset::EmbeddingSet;
use pokembed::embedding::{ColorGridModel, Embedder, Embedding, EmbeddingMatrix};
use pokembed::similarity;
use pokembed::store::{json, npy, table};
use pokembed::util::simd;

/// Generate test vectors for benchmarking.
fn generate_test_vectors(count: usize, dimension: usize) -> Vec<Vec<f32>> {
    (0..count)
        .map(|i| {
            (0..dimension)
                .map(|j| ((i as f32 * 0.1 + j as f32 * 0.01).sin() * 0.5 + 0.5) * 2.0 - 1.0)
                .collect()
        })
        .collect()
}

/// Unit-length embeddings for ids `1..=count`.
fn generate_test_set(count: usize, dimension: usize) -> EmbeddingSet {
    let mut set = EmbeddingSet::new(dimension);
    for (i, data) in generate_test_vectors(count, dimension).into_iter().enumerate() {
        let mut embedding = Embedding::new(data);
        embedding.normalize().unwrap();
        set.push(i as i64 + 1, embedding).unwrap();
    }
    set
}

/// Official artwork is 475x475 RGBA with a transparent background.
fn generate_artwork(size: u32) -> DynamicImage {
    DynamicImage::ImageRgba8(RgbaImage::from_fn(size, size, |x, y| {
        let alpha = if (x + y) % 3 == 0 { 0 } else { ((x * y) % 256) as u8 };
        Rgba([(x % 256) as u8, (y % 256) as u8, 128, alpha])
    }))
}

/// Benchmark artwork normalization.
fn bench_artwork(c: &mut Criterion) {
    let mut group = c.benchmark_group("artwork");

    for size in [128u32, 475] {
        let artwork = generate_artwork(size);
        group.throughput(Throughput::Elements(u64::from(size * size)));
        group.bench_with_input(BenchmarkId::new("flatten_on_white", size), &artwork, |b, image| {
            b.iter(|| black_box(flatten_on_white(black_box(image))))
        });
    }

    group.finish();
}

/// Benchmark batch embedding.
fn bench_embedding(c: &mut Criterion) {
    let mut group = c.benchmark_group("embedding");
    group.sample_size(20);

    let embedder = Embedder::from_model(ColorGridModel::default());
    for batch_size in [1usize, 32] {
        let images: Vec<RgbImage> = (0..batch_size)
            .map(|i| RgbImage::from_fn(224, 224, |x, y| Rgb([(i * 7) as u8, x as u8, y as u8])))
            .collect();
        group.throughput(Throughput::Elements(batch_size as u64));
        group.bench_with_input(BenchmarkId::new("color_grid_batch", batch_size), &images, |b, images| {
            b.iter(|| black_box(embedder.embed_batch(black_box(images)).unwrap()))
        });
    }

    group.finish();
}

/// Benchmark vector kernels.
fn bench_vectors(c: &mut Criterion) {
    let mut group = c.benchmark_group("vectors");

    let vectors = generate_test_vectors(2, 512);
    group.bench_function("dot_512", |b| {
        b.iter(|| black_box(simd::dot(black_box(&vectors[0]), black_box(&vectors[1]))))
    });

    group.throughput(Throughput::Elements(100));
    group.bench_function("normalize_batch", |b| {
        b.iter_with_setup(
            || {
                generate_test_vectors(100, 512)
                    .into_iter()
                    .map(Embedding::new)
                    .collect::<Vec<_>>()
            },
            |mut embeddings| {
                for embedding in &mut embeddings {
                    embedding.normalize().unwrap();
                }
                black_box(embeddings);
            },
        )
    });

    group.finish();
}

/// Benchmark nearest-neighbour lookup.
fn bench_similarity(c: &mut Criterion) {
    let mut group = c.benchmark_group("similarity");
    group.sample_size(20);

    for count in [1025usize, 10_000] {
        let set = generate_test_set(count, 512);
        let matrix: EmbeddingMatrix = set.to_matrix();
        group.bench_with_input(BenchmarkId::new("top_k", count), &matrix, |b, matrix| {
            b.iter(|| black_box(similarity::top_k(set.ids(), matrix, 25, 6).unwrap()))
        });
    }

    group.finish();
}

/// Benchmark dataset encoding.
fn bench_store(c: &mut Criterion) {
    let mut group = c.benchmark_group("store");
    group.sample_size(20);

    let set = generate_test_set(1025, 512);
    let matrix = set.to_matrix();
    group.throughput(Throughput::Elements(set.len() as u64));

    group.bench_function("encode_npy", |b| {
        b.iter(|| black_box(npy::encode_matrix(matrix.rows(), matrix.dimension(), matrix.as_flat()).unwrap()))
    });
    group.bench_function("encode_parquet", |b| {
        b.iter(|| black_box(table::encode(black_box(&set)).unwrap()))
    });
    group.bench_function("encode_json", |b| {
        b.iter(|| black_box(json::encode(black_box(&set)).unwrap()))
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_artwork,
    bench_embedding,
    bench_vectors,
    bench_similarity,
    bench_store
);

criterion_main!(benches);
