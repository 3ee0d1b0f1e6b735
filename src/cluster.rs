//! # Cluster Model
//!
//! K-means over standardized feature vectors: k-means++ seeding, Lloyd
//! refinement, several seeded restarts run in parallel, lowest inertia wins
//! (first restart wins ties).
//!
//! After [`ClusterModel::fit`] the centroids and training labels are frozen.
//! Every training label is the index of the nearest centroid under the final
//! centroids, and [`ClusterModel::predict`] uses the same rule, so a training
//! vector always predicts to its own label.

use crate::error::{RecommendError, Result};
use log::{debug, info};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// K-means hyperparameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KMeansConfig {
    pub k: usize,
    /// Independent seeded restarts.
    pub n_init: usize,
    pub max_iter: usize,
    /// Stop when no centroid moves more than this (squared distance).
    pub tolerance: f64,
    pub seed: u64,
}

impl Default for KMeansConfig {
    fn default() -> Self {
        Self {
            k: 8,
            n_init: 10,
            max_iter: 300,
            tolerance: 1e-4,
            seed: 42,
        }
    }
}

/// Frozen result of a k-means fit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterModel {
    centroids: Vec<Vec<f64>>,
    labels: Vec<usize>,
    inertia: f64,
    n_iter: usize,
}

impl ClusterModel {
    /// Fit `config.k` clusters to `data`.
    ///
    /// # Errors
    ///
    /// - `InvalidConfig` if `k` or `n_init` is zero
    /// - `InsufficientData` if there are fewer rows than `k`
    /// - `InvalidFeatures` if rows differ in width
    pub fn fit(data: &[Vec<f64>], config: &KMeansConfig) -> Result<Self> {
        if config.k == 0 {
            return Err(RecommendError::InvalidConfig("k must be at least 1".into()));
        }
        if config.n_init == 0 {
            return Err(RecommendError::InvalidConfig("n_init must be at least 1".into()));
        }
        if data.len() < config.k {
            return Err(RecommendError::InsufficientData {
                rows: data.len(),
                k: config.k,
            });
        }
        let width = data[0].len();
        if data.iter().any(|row| row.len() != width) {
            return Err(RecommendError::InvalidFeatures(
                "cluster input rows differ in width".into(),
            ));
        }

        // collect keeps restart order, so the strict `<` below keeps the first best
        let runs: Vec<ClusterModel> = (0..config.n_init)
            .into_par_iter()
            .map(|run| lloyd(data, config, config.seed.wrapping_add(run as u64)))
            .collect();

        let mut best: Option<ClusterModel> = None;
        for (run, model) in runs.into_iter().enumerate() {
            debug!(
                "k-means restart {run}: inertia {:.4} after {} iterations",
                model.inertia, model.n_iter
            );
            if best.as_ref().map_or(true, |b| model.inertia < b.inertia) {
                best = Some(model);
            }
        }

        let best = best.ok_or_else(|| RecommendError::EmptyInput("no k-means restart ran".into()))?;
        info!(
            "Fitted {} clusters on {} vectors (inertia {:.4})",
            config.k,
            data.len(),
            best.inertia
        );
        Ok(best)
    }

    /// Index of the nearest centroid (lowest index on ties).
    #[must_use]
    pub fn predict(&self, point: &[f64]) -> usize {
        nearest(&self.centroids, point).0
    }

    #[must_use]
    pub fn predict_all(&self, points: &[Vec<f64>]) -> Vec<usize> {
        points.iter().map(|p| self.predict(p)).collect()
    }

    #[must_use]
    pub fn k(&self) -> usize {
        self.centroids.len()
    }

    #[must_use]
    pub fn centroids(&self) -> &[Vec<f64>] {
        &self.centroids
    }

    /// One label per training vector, in training order.
    #[must_use]
    pub fn labels(&self) -> &[usize] {
        &self.labels
    }

    /// Within-cluster sum of squared distances.
    #[must_use]
    pub fn inertia(&self) -> f64 {
        self.inertia
    }

    #[must_use]
    pub fn n_iter(&self) -> usize {
        self.n_iter
    }

    /// Training vectors per cluster.
    #[must_use]
    pub fn cluster_sizes(&self) -> Vec<usize> {
        let mut sizes = vec![0; self.k()];
        for &label in &self.labels {
            sizes[label] += 1;
        }
        sizes
    }
}

pub(crate) fn squared_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y).powi(2)).sum()
}

fn nearest(centroids: &[Vec<f64>], point: &[f64]) -> (usize, f64) {
    centroids
        .iter()
        .enumerate()
        .map(|(i, c)| (i, squared_distance(c, point)))
        .fold((0, f64::INFINITY), |best, cur| if cur.1 < best.1 { cur } else { best })
}

/// k-means++: first centroid uniform, the rest sampled proportional to D(x)².
fn init_centroids(data: &[Vec<f64>], k: usize, rng: &mut StdRng) -> Vec<Vec<f64>> {
    let n = data.len();
    let mut centroids = Vec::with_capacity(k);
    centroids.push(data[rng.gen_range(0..n)].clone());

    let mut distances: Vec<f64> = data.iter().map(|p| squared_distance(p, &centroids[0])).collect();

    while centroids.len() < k {
        let total: f64 = distances.iter().sum();
        let selected = if total <= 0.0 {
            rng.gen_range(0..n)
        } else {
            let threshold = rng.gen::<f64>() * total;
            let mut cumulative = 0.0;
            distances
                .iter()
                .position(|&d| {
                    cumulative += d;
                    cumulative > threshold
                })
                .unwrap_or(n - 1)
        };

        let centroid = data[selected].clone();
        for (d, p) in distances.iter_mut().zip(data) {
            *d = d.min(squared_distance(p, &centroid));
        }
        centroids.push(centroid);
    }

    centroids
}

/// One seeded Lloyd run.
fn lloyd(data: &[Vec<f64>], config: &KMeansConfig, seed: u64) -> ClusterModel {
    let mut rng = StdRng::seed_from_u64(seed);
    let width = data[0].len();
    let mut centroids = init_centroids(data, config.k, &mut rng);
    let mut labels = vec![0; data.len()];
    let mut n_iter = 0;

    for _ in 0..config.max_iter {
        n_iter += 1;
        for (label, point) in labels.iter_mut().zip(data) {
            *label = nearest(&centroids, point).0;
        }

        let mut sums = vec![vec![0.0; width]; config.k];
        let mut counts = vec![0usize; config.k];
        for (&label, point) in labels.iter().zip(data) {
            counts[label] += 1;
            for (s, x) in sums[label].iter_mut().zip(point) {
                *s += x;
            }
        }

        let mut shift: f64 = 0.0;
        for (c, (sum, &count)) in sums.into_iter().zip(&counts).enumerate() {
            // empty cluster keeps its previous centroid
            if count == 0 {
                continue;
            }
            #[allow(clippy::cast_precision_loss)]
            let updated: Vec<f64> = sum.into_iter().map(|s| s / count as f64).collect();
            shift = shift.max(squared_distance(&updated, &centroids[c]));
            centroids[c] = updated;
        }

        if shift <= config.tolerance {
            break;
        }
    }

    let mut inertia = 0.0;
    for (label, point) in labels.iter_mut().zip(data) {
        let (index, distance) = nearest(&centroids, point);
        *label = index;
        inertia += distance;
    }

    ClusterModel {
        centroids,
        labels,
        inertia,
        n_iter,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blobs() -> Vec<Vec<f64>> {
        vec![
            vec![0.0, 0.0],
            vec![0.1, 0.2],
            vec![0.2, 0.1],
            vec![5.0, 5.0],
            vec![5.1, 4.9],
            vec![4.9, 5.2],
        ]
    }

    fn config(k: usize) -> KMeansConfig {
        KMeansConfig { k, ..KMeansConfig::default() }
    }

    #[test]
    fn test_separates_obvious_blobs() {
        let model = ClusterModel::fit(&blobs(), &config(2)).unwrap();
        let labels = model.labels();
        assert_eq!(labels[0], labels[1]);
        assert_eq!(labels[1], labels[2]);
        assert_eq!(labels[3], labels[4]);
        assert_eq!(labels[4], labels[5]);
        assert_ne!(labels[0], labels[3]);
        assert_eq!(model.cluster_sizes().iter().sum::<usize>(), 6);
    }

    #[test]
    fn test_training_labels_match_predict() {
        let data = blobs();
        let model = ClusterModel::fit(&data, &config(3)).unwrap();
        for (point, &label) in data.iter().zip(model.labels()) {
            assert_eq!(model.predict(point), label);
            assert_eq!(model.predict(point), model.predict(point));
        }
    }

    #[test]
    fn test_fit_is_reproducible_for_a_seed() {
        let a = ClusterModel::fit(&blobs(), &config(2)).unwrap();
        let b = ClusterModel::fit(&blobs(), &config(2)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_fewer_rows_than_k_fails() {
        let err = ClusterModel::fit(&blobs()[..2], &config(3)).unwrap_err();
        assert!(matches!(err, RecommendError::InsufficientData { rows: 2, k: 3 }));
    }

    #[test]
    fn test_zero_k_is_invalid() {
        assert!(matches!(
            ClusterModel::fit(&blobs(), &config(0)),
            Err(RecommendError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_k_equal_to_rows_gives_zero_inertia() {
        let data = blobs();
        let model = ClusterModel::fit(&data, &config(data.len())).unwrap();
        assert!(model.inertia() < 1e-12);
    }

    #[test]
    fn test_identical_points_do_not_break_seeding() {
        let data = vec![vec![1.0, 1.0]; 5];
        let model = ClusterModel::fit(&data, &config(2)).unwrap();
        assert_eq!(model.k(), 2);
        assert!(model.inertia().abs() < 1e-12);
    }

    #[test]
    fn test_more_restarts_never_increase_inertia() {
        let data: Vec<Vec<f64>> = (0..40)
            .map(|i| vec![f64::from(i % 7), f64::from((i * 3) % 11)])
            .collect();
        let single = ClusterModel::fit(&data, &KMeansConfig { n_init: 1, ..config(4) }).unwrap();
        let many = ClusterModel::fit(&data, &KMeansConfig { n_init: 10, ..config(4) }).unwrap();
        assert!(many.inertia() <= single.inertia());
    }
}
