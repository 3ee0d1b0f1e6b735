//! # Evaluator
//!
//! Read-only diagnostics over a [`TrainedSnapshot`]: held-out silhouette,
//! intra-cluster cohesion, per-feature importance, cluster sizes and the
//! feature correlation matrix. Nothing here touches the training or query
//! path.

use crate::cluster::{squared_distance, ClusterModel};
use crate::engine::TrainedSnapshot;
use crate::similarity::SimilarityEngine;
use crate::track::FeatureWeights;
use log::debug;
use serde::Serialize;

/// How strongly one feature separates the learned centroids.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureImportance {
    pub feature: String,
    /// Share of the total; all importances sum to 1.
    pub importance: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationReport {
    /// Silhouette of the test partition under predicted clusters.
    pub silhouette: f64,
    /// `None` when no predicted cluster holds two or more test tracks.
    pub mean_intra_cluster_similarity: Option<f64>,
    /// Sorted by importance, highest first.
    pub feature_importance: Vec<FeatureImportance>,
    /// Training tracks per cluster.
    pub cluster_sizes: Vec<usize>,
    pub train_size: usize,
    pub test_size: usize,
}

/// Assign the test partition to clusters and score the result.
#[must_use]
pub fn evaluate(snapshot: &TrainedSnapshot) -> EvaluationReport {
    let test = snapshot.scaled_test();
    let labels = snapshot.model().predict_all(test);

    let silhouette = silhouette_score(test, &labels);
    let cohesion = mean_intra_cluster_similarity(test, &labels, snapshot.similarity());
    debug!(
        "Evaluated {} held-out tracks: silhouette {silhouette:.4}, cohesion {cohesion:?}",
        test.len()
    );

    let mut feature_importance = feature_importance(snapshot.model(), snapshot.features());
    feature_importance.sort_by(|a, b| {
        b.importance
            .partial_cmp(&a.importance)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    EvaluationReport {
        silhouette,
        mean_intra_cluster_similarity: cohesion,
        feature_importance,
        cluster_sizes: snapshot.model().cluster_sizes(),
        train_size: snapshot.partition().train.len(),
        test_size: snapshot.partition().test.len(),
    }
}

/// Mean silhouette coefficient under Euclidean distance.
///
/// 0.0 for fewer than two samples or fewer than two distinct labels. A
/// sample alone in its cluster scores 0.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn silhouette_score(data: &[Vec<f64>], labels: &[usize]) -> f64 {
    let n = data.len();
    if n < 2 {
        return 0.0;
    }
    let n_clusters = labels.iter().max().map_or(0, |&m| m + 1);
    let mut sizes = vec![0usize; n_clusters];
    for &label in labels {
        sizes[label] += 1;
    }
    if sizes.iter().filter(|&&s| s > 0).count() < 2 {
        return 0.0;
    }

    let total: f64 = (0..n)
        .map(|i| {
            let own = labels[i];
            if sizes[own] <= 1 {
                return 0.0;
            }
            let mut sums = vec![0.0; n_clusters];
            for (j, point) in data.iter().enumerate() {
                if j != i {
                    sums[labels[j]] += squared_distance(&data[i], point).sqrt();
                }
            }
            let a = sums[own] / (sizes[own] - 1) as f64;
            let b = (0..n_clusters)
                .filter(|&c| c != own && sizes[c] > 0)
                .map(|c| sums[c] / sizes[c] as f64)
                .fold(f64::INFINITY, f64::min);
            let denom = a.max(b);
            if denom > 0.0 {
                (b - a) / denom
            } else {
                0.0
            }
        })
        .sum();

    total / n as f64
}

/// Average over clusters of the mean weighted cosine between distinct
/// members. Clusters with fewer than two members are skipped.
#[must_use]
pub fn mean_intra_cluster_similarity(
    data: &[Vec<f64>],
    labels: &[usize],
    similarity: &SimilarityEngine,
) -> Option<f64> {
    let n_clusters = labels.iter().max().map_or(0, |&m| m + 1);
    let mut members: Vec<Vec<&[f64]>> = vec![Vec::new(); n_clusters];
    for (point, &label) in data.iter().zip(labels) {
        members[label].push(point);
    }

    let per_cluster: Vec<f64> = members
        .iter()
        .filter(|m| m.len() > 1)
        .map(|m| {
            let mut sum = 0.0;
            let mut pairs = 0usize;
            for (i, a) in m.iter().enumerate() {
                for b in &m[i + 1..] {
                    sum += similarity.similarity(a, b);
                    pairs += 1;
                }
            }
            #[allow(clippy::cast_precision_loss)]
            let mean = sum / pairs as f64;
            mean
        })
        .collect();

    if per_cluster.is_empty() {
        return None;
    }
    #[allow(clippy::cast_precision_loss)]
    let mean = per_cluster.iter().sum::<f64>() / per_cluster.len() as f64;
    Some(mean)
}

/// Population standard deviation of each feature across the centroids,
/// normalized to sum to 1, in feature order. Equal shares when the
/// centroids do not differ at all.
#[must_use]
pub fn feature_importance(model: &ClusterModel, features: &FeatureWeights) -> Vec<FeatureImportance> {
    let centroids = model.centroids();
    let width = features.len();
    #[allow(clippy::cast_precision_loss)]
    let k = centroids.len() as f64;

    let spread: Vec<f64> = (0..width)
        .map(|j| {
            let mean = centroids.iter().map(|c| c[j]).sum::<f64>() / k;
            (centroids.iter().map(|c| (c[j] - mean).powi(2)).sum::<f64>() / k).sqrt()
        })
        .collect();
    let total: f64 = spread.iter().sum();
    #[allow(clippy::cast_precision_loss)]
    let uniform = 1.0 / width as f64;

    features
        .features()
        .iter()
        .zip(spread)
        .map(|(feature, s)| FeatureImportance {
            feature: feature.name().to_string(),
            importance: if total > 0.0 { s / total } else { uniform },
        })
        .collect()
}

/// Training tracks per cluster.
#[must_use]
pub fn cluster_sizes(snapshot: &TrainedSnapshot) -> Vec<usize> {
    snapshot.model().cluster_sizes()
}

/// Pearson correlation matrix of the standardized training features.
///
/// A zero-variance column correlates 0 with every other column and 1 with
/// itself.
#[must_use]
pub fn feature_correlations(snapshot: &TrainedSnapshot) -> Vec<Vec<f64>> {
    correlation_matrix(snapshot.scaled_train(), snapshot.features().len())
}

fn correlation_matrix(rows: &[Vec<f64>], width: usize) -> Vec<Vec<f64>> {
    if rows.is_empty() {
        return identity(width);
    }
    #[allow(clippy::cast_precision_loss)]
    let n = rows.len() as f64;
    let means: Vec<f64> = (0..width)
        .map(|j| rows.iter().map(|r| r[j]).sum::<f64>() / n)
        .collect();
    let deviations: Vec<f64> = (0..width)
        .map(|j| rows.iter().map(|r| (r[j] - means[j]).powi(2)).sum::<f64>().sqrt())
        .collect();

    let mut matrix = identity(width);
    for a in 0..width {
        for b in (a + 1)..width {
            let denom = deviations[a] * deviations[b];
            let r = if denom > 0.0 {
                let cov: f64 = rows.iter().map(|r| (r[a] - means[a]) * (r[b] - means[b])).sum();
                (cov / denom).clamp(-1.0, 1.0)
            } else {
                0.0
            };
            matrix[a][b] = r;
            matrix[b][a] = r;
        }
    }
    matrix
}

fn identity(width: usize) -> Vec<Vec<f64>> {
    (0..width)
        .map(|i| (0..width).map(|j| if i == j { 1.0 } else { 0.0 }).collect())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::KMeansConfig;
    use crate::track::AudioFeature;

    fn two_blobs() -> (Vec<Vec<f64>>, Vec<usize>) {
        (
            vec![vec![0.0, 0.0], vec![0.1, 0.1], vec![5.0, 5.0], vec![5.1, 5.1]],
            vec![0, 0, 1, 1],
        )
    }

    #[test]
    fn test_silhouette_of_separated_clusters_is_high() {
        let (data, labels) = two_blobs();
        assert!(silhouette_score(&data, &labels) > 0.9);
    }

    #[test]
    fn test_silhouette_degenerate_inputs_are_zero() {
        assert_eq!(silhouette_score(&[vec![1.0]], &[0]), 0.0);
        assert_eq!(silhouette_score(&[vec![1.0], vec![2.0]], &[0, 0]), 0.0);
        assert_eq!(silhouette_score(&[], &[]), 0.0);
    }

    #[test]
    fn test_silhouette_singletons_score_zero() {
        let data = vec![vec![0.0], vec![10.0]];
        assert_eq!(silhouette_score(&data, &[0, 1]), 0.0);
    }

    #[test]
    fn test_cohesion_skips_small_clusters() {
        let engine = SimilarityEngine::new(&[1.0, 1.0]);
        let data = vec![vec![1.0, 0.0], vec![2.0, 0.0], vec![0.0, 1.0]];
        let cohesion = mean_intra_cluster_similarity(&data, &[0, 0, 1], &engine).unwrap();
        assert!((cohesion - 1.0).abs() < 1e-12);

        assert!(mean_intra_cluster_similarity(&data, &[0, 1, 2], &engine).is_none());
    }

    #[test]
    fn test_importance_sums_to_one_and_ranks_the_separating_feature() {
        let data = vec![
            vec![0.0, 0.0],
            vec![0.0, 0.1],
            vec![10.0, 0.0],
            vec![10.0, 0.1],
        ];
        let model = ClusterModel::fit(&data, &KMeansConfig { k: 2, ..KMeansConfig::default() }).unwrap();
        let features = FeatureWeights::new(vec![
            (AudioFeature::Energy, 1.0),
            (AudioFeature::Valence, 1.0),
        ])
        .unwrap();

        let importance = feature_importance(&model, &features);
        let total: f64 = importance.iter().map(|f| f.importance).sum();
        assert!((total - 1.0).abs() < 1e-9);
        assert_eq!(importance[0].feature, "energy");
        assert!(importance[0].importance > importance[1].importance);
    }

    #[test]
    fn test_importance_with_one_cluster_is_uniform() {
        let data = vec![vec![0.0, 1.0], vec![1.0, 0.0]];
        let model = ClusterModel::fit(&data, &KMeansConfig { k: 1, ..KMeansConfig::default() }).unwrap();
        let features = FeatureWeights::new(vec![
            (AudioFeature::Energy, 1.0),
            (AudioFeature::Valence, 1.0),
        ])
        .unwrap();
        for f in feature_importance(&model, &features) {
            assert!((f.importance - 0.5).abs() < 1e-12);
        }
    }

    #[test]
    fn test_correlations_handle_constant_columns() {
        let rows = vec![vec![1.0, 2.0, 0.0], vec![2.0, 4.0, 0.0], vec![3.0, 6.0, 0.0]];
        let m = correlation_matrix(&rows, 3);
        assert!((m[0][1] - 1.0).abs() < 1e-12);
        assert_eq!(m[0][2], 0.0);
        assert_eq!(m[2][2], 1.0);
        assert_eq!(m[1][0], m[0][1]);
    }
}
