//! # Sonance Performance Benchmarks
//!
//! Benchmarks for the hot paths of the recommendation engine.
//!
//! ## Benchmark Categories
//!
//! - **Scoring**: hybrid blend, normalization and top-k selection
//! - **Similarity**: weighted cosine scan over the training vectors
//! - **Training**: scaler fit and k-means with restarts
//! - **Queries**: end-to-end recommendation against a trained snapshot
//!
//! ## Running Benchmarks
//!
//! ```bash
//! cargo bench
//! cargo bench scoring
//! cargo bench training
//! ```

use criterion::{criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sonance::algorithm::{normalize, select_top, Candidate, HybridQuery, HybridScorer};
use sonance::catalog::Catalog;
use sonance::cluster::{ClusterModel, KMeansConfig};
use sonance::engine::{EngineConfig, TrainedSnapshot};
use sonance::scaler::FeatureScaler;
use sonance::similarity::SimilarityEngine;
use sonance::track::{AudioFeatures, FeatureWeights, Track};
use std::collections::HashMap;
use std::hint::black_box;

const GENRES: [&str; 6] = ["pop", "rock", "jazz", "classical", "metal", "hip-hop"];

/// Random but seeded catalog of `size` tracks.
fn create_test_tracks(size: usize) -> Vec<Track> {
    let mut rng = StdRng::seed_from_u64(7);
    (0..size)
        .map(|i| Track {
            id: format!("track{i:06}"),
            name: format!("Song {i}"),
            artists: format!("Artist {}", i % 97),
            album: format!("Album {}", i % 211),
            genre: GENRES[i % GENRES.len()].to_string(),
            popularity: rng.gen_range(0..=100),
            duration_ms: rng.gen_range(90_000..400_000),
            explicit: rng.gen_bool(0.1),
            audio: AudioFeatures {
                danceability: rng.gen(),
                energy: rng.gen(),
                key: rng.gen_range(0..12),
                loudness: rng.gen_range(-30.0..0.0),
                mode: rng.gen_range(0..=1),
                speechiness: rng.gen(),
                acousticness: rng.gen(),
                instrumentalness: rng.gen(),
                liveness: rng.gen(),
                valence: rng.gen(),
                tempo: rng.gen_range(60.0..200.0),
                time_signature: 4,
            },
        })
        .collect()
}

fn scaled_vectors(tracks: &[Track]) -> Vec<Vec<f64>> {
    let weights = FeatureWeights::default();
    let raw: Vec<Vec<f64>> = tracks.iter().map(|t| t.feature_vector(&weights)).collect();
    let mut scaler = FeatureScaler::new();
    scaler.fit(&raw).expect("scaler fit");
    scaler.transform_all(&raw).expect("transform")
}

/// Benchmark hybrid scoring over precomputed similarities
fn benchmark_scoring(c: &mut Criterion) {
    let mut group = c.benchmark_group("scoring");
    let scorer = HybridScorer::default();

    for size in [1_000, 10_000, 100_000] {
        let tracks = create_test_tracks(size);
        let mut rng = StdRng::seed_from_u64(11);
        let similarities: Vec<f64> = (0..size).map(|_| rng.gen_range(-1.0..1.0)).collect();
        let labels: Vec<usize> = (0..size).map(|i| i % 8).collect();
        let candidates: Vec<Candidate<'_>> = tracks
            .iter()
            .zip(&labels)
            .map(|(t, &label)| Candidate {
                id: &t.id,
                genre: &t.genre,
                label,
            })
            .collect();
        let exclude = [tracks[0].id.as_str()];
        let query = HybridQuery {
            cluster: 3,
            similarities: &similarities,
            genre: Some("jazz"),
            exclude: &exclude,
        };

        group.bench_with_input(BenchmarkId::new("rank_top_10", size), &candidates, |b, candidates| {
            b.iter(|| scorer.rank(black_box(&query), black_box(candidates), 10))
        });
    }

    let scores: Vec<f64> = {
        let mut rng = StdRng::seed_from_u64(5);
        (0..100_000).map(|_| rng.gen::<f64>()).collect()
    };
    group.bench_function("normalize_100000", |b| {
        b.iter_batched(
            || scores.clone(),
            |mut s| normalize(black_box(&mut s), 1e-6),
            BatchSize::LargeInput,
        )
    });
    group.bench_function("select_top_100000", |b| {
        b.iter(|| select_top(black_box(&scores), 10, 0.1))
    });

    group.finish();
}

/// Benchmark the weighted similarity scan
fn benchmark_similarity(c: &mut Criterion) {
    let mut group = c.benchmark_group("similarity");
    let engine = SimilarityEngine::new(FeatureWeights::default().weights());

    for size in [1_000, 10_000, 100_000] {
        let vectors = scaled_vectors(&create_test_tracks(size));
        let query = vectors[0].clone();
        group.bench_with_input(BenchmarkId::new("scan", size), &vectors, |b, vectors| {
            b.iter(|| engine.similarities(black_box(&query), black_box(vectors)))
        });
    }

    group.finish();
}

/// Benchmark model fitting
fn benchmark_training(c: &mut Criterion) {
    let mut group = c.benchmark_group("training");
    group.sample_size(10);

    let vectors = scaled_vectors(&create_test_tracks(5_000));
    for k in [4, 8, 16] {
        let config = KMeansConfig { k, ..KMeansConfig::default() };
        group.bench_with_input(BenchmarkId::new("kmeans_5000", k), &config, |b, config| {
            b.iter(|| ClusterModel::fit(black_box(&vectors), config).expect("fit"))
        });
    }

    let tracks = create_test_tracks(5_000);
    group.bench_function("snapshot_5000", |b| {
        b.iter_batched(
            || Catalog::new(tracks.clone()).expect("unique ids"),
            |catalog| TrainedSnapshot::train(catalog, &EngineConfig::default()).expect("train"),
            BatchSize::LargeInput,
        )
    });

    group.finish();
}

/// Benchmark end-to-end queries against a trained snapshot
fn benchmark_queries(c: &mut Criterion) {
    let mut group = c.benchmark_group("queries");

    let catalog = Catalog::new(create_test_tracks(20_000)).expect("unique ids");
    let snapshot = TrainedSnapshot::train(catalog, &EngineConfig::default()).expect("train");
    let query_id = snapshot
        .train_tracks()
        .next()
        .map(|t| t.id.clone())
        .expect("non-empty training set");

    group.bench_function("recommend_by_id_20000", |b| {
        b.iter(|| snapshot.recommend_by_id(black_box(&query_id), 10))
    });

    let profile: HashMap<String, f64> = FeatureWeights::default()
        .features()
        .iter()
        .map(|f| (f.name().to_string(), 0.5))
        .collect();
    group.bench_function("recommend_by_features_20000", |b| {
        b.iter(|| snapshot.recommend_by_features(black_box(&profile), 10, None))
    });

    group.bench_function("search_20000", |b| {
        b.iter(|| snapshot.search(black_box("artist 42"), 10))
    });

    group.finish();
}

criterion_group!(
    benches,
    benchmark_scoring,
    benchmark_similarity,
    benchmark_training,
    benchmark_queries
);

criterion_main!(benches);
