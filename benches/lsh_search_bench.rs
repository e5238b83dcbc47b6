//! LSH search latency across corpus sizes.
//!
//! Query cost should track bucket occupancy, so with a hash width large
//! enough to keep buckets small the per-query time stays roughly flat as
//! the corpus grows. The flat backend is measured alongside for contrast.

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use o1search::config::{LshConfig, TreeConfig};
use o1search::vector::{BackendKind, LshIndex, VectorSearchAdapter};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::{Value, json};
use std::hint::black_box;

const DIMENSION: usize = 128;
const CORPUS_SIZES: [usize; 4] = [1_000, 5_000, 10_000, 50_000];

fn random_vectors(count: usize, seed: u64) -> Vec<Vec<f32>> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count)
        .map(|_| (0..DIMENSION).map(|_| rng.random::<f32>() * 2.0 - 1.0).collect())
        .collect()
}

fn build_index(vectors: &[Vec<f32>], config: &LshConfig) -> LshIndex {
    let mut index = LshIndex::with_config(DIMENSION, config).expect("valid config");
    for (i, v) in vectors.iter().enumerate() {
        index.add(v.clone(), json!(i)).expect("matching dimension");
    }
    index
}

/// Benchmark search latency as the corpus grows
fn bench_lsh_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("lsh_search");
    let queries = random_vectors(32, 7);
    let config = LshConfig::seeded(10, 16, 42);

    for size in CORPUS_SIZES {
        let index = build_index(&random_vectors(size, 1), &config);
        group.throughput(Throughput::Elements(queries.len() as u64));

        group.bench_with_input(BenchmarkId::new("search_k10", size), &index, |b, index| {
            b.iter(|| {
                for query in &queries {
                    black_box(index.search(black_box(query), 10).expect("search"));
                }
            });
        });
    }

    group.finish();
}

/// Benchmark insertion cost, which does not depend on corpus size
fn bench_lsh_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("lsh_insert");
    let vectors = random_vectors(1_000, 3);

    for hash_size in [8, 16, 32] {
        let config = LshConfig::seeded(10, hash_size, 42);
        group.throughput(Throughput::Elements(vectors.len() as u64));
        group.bench_with_input(
            BenchmarkId::new("insert_1000", hash_size),
            &config,
            |b, config| {
                b.iter(|| black_box(build_index(&vectors, config)));
            },
        );
    }

    group.finish();
}

/// Benchmark the flat backend for comparison
fn bench_flat_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("flat_search");
    let queries = random_vectors(32, 7);

    for size in CORPUS_SIZES {
        let Ok(mut adapter) = VectorSearchAdapter::<Value>::with_backend(
            DIMENSION,
            BackendKind::Flat,
            &LshConfig::default(),
            &TreeConfig::default(),
        ) else {
            return;
        };
        for (i, v) in random_vectors(size, 1).into_iter().enumerate() {
            adapter.add(v, json!(i)).expect("matching dimension");
        }

        group.throughput(Throughput::Elements(queries.len() as u64));
        group.bench_function(BenchmarkId::new("search_k10", size), |b| {
            b.iter(|| {
                for query in &queries {
                    black_box(adapter.search(black_box(query), 10).expect("search"));
                }
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_lsh_search, bench_lsh_insert, bench_flat_search);
criterion_main!(benches);
