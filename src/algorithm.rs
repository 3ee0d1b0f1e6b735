//! Hybrid scoring: cluster membership + weighted content similarity.
//!
//! For one query against the training candidates:
//!
//! ```text
//! raw(i)   = cluster_weight * [label(i) == query_cluster]
//!          + content_weight * similarity(i)
//!          + genre_boost    * [genre(i) == query_genre]
//! score(i) = (raw(i) - min) / (max - min + epsilon)
//! ```
//!
//! Excluded ids are then zeroed, and the survivors above the significance
//! threshold are returned best-first, at most `n`, ties kept in candidate
//! order.

use crate::error::{RecommendError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Blend weights and cut-offs for one scoring pass.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringContext {
    pub cluster_weight: f64,
    pub content_weight: f64,
    /// Added to candidates sharing the query track's genre.
    pub genre_boost: f64,
    /// Minimum normalized score to be returned.
    pub significance_threshold: f64,
    /// Guards the min-max denominator.
    pub epsilon: f64,
}

impl Default for ScoringContext {
    fn default() -> Self {
        Self {
            cluster_weight: 0.4,
            content_weight: 0.6,
            genre_boost: 0.2,
            significance_threshold: 0.1,
            epsilon: 1e-6,
        }
    }
}

impl ScoringContext {
    /// Same context with different blend weights.
    #[must_use]
    pub fn with_blend(self, cluster_weight: f64, content_weight: f64) -> Self {
        Self {
            cluster_weight,
            content_weight,
            ..self
        }
    }

    /// # Errors
    ///
    /// `InvalidConfig` for negative or non-finite weights, boost or
    /// threshold, or a non-positive epsilon.
    pub fn validate(&self) -> Result<()> {
        let non_negative = [
            ("cluster_weight", self.cluster_weight),
            ("content_weight", self.content_weight),
            ("genre_boost", self.genre_boost),
            ("significance_threshold", self.significance_threshold),
        ];
        for (name, value) in non_negative {
            if !value.is_finite() || value < 0.0 {
                return Err(RecommendError::InvalidConfig(format!(
                    "{name} must be finite and non-negative, got {value}"
                )));
            }
        }
        if !self.epsilon.is_finite() || self.epsilon <= 0.0 {
            return Err(RecommendError::InvalidConfig(format!(
                "epsilon must be positive, got {}",
                self.epsilon
            )));
        }
        Ok(())
    }
}

/// A training track as the scorer sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Candidate<'a> {
    pub id: &'a str,
    pub genre: &'a str,
    pub label: usize,
}

/// What is known about the query.
#[derive(Debug, Clone, Copy)]
pub struct HybridQuery<'a> {
    /// Cluster the query vector was assigned to.
    pub cluster: usize,
    /// Content similarity to each candidate, same order as the candidates.
    pub similarities: &'a [f64],
    /// Present only when the query is a known track.
    pub genre: Option<&'a str>,
    pub exclude: &'a [&'a str],
}

/// Per-signal contributions to a candidate's raw score.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub cluster: f64,
    pub content: f64,
    pub genre_boost: f64,
}

impl ScoreBreakdown {
    #[must_use]
    pub fn raw(&self) -> f64 {
        self.cluster + self.content + self.genre_boost
    }
}

/// A selected candidate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankedCandidate {
    /// Position in the candidate slice.
    pub index: usize,
    /// Normalized score in [0, 1].
    pub score: f64,
    pub raw_score: f64,
    pub breakdown: ScoreBreakdown,
}

/// 1.0 for candidates in `cluster`, 0.0 otherwise.
#[must_use]
pub fn cluster_scores(labels: impl IntoIterator<Item = usize>, cluster: usize) -> Vec<f64> {
    labels
        .into_iter()
        .map(|label| if label == cluster { 1.0 } else { 0.0 })
        .collect()
}

/// In-place min-max rescale to [0, 1).
pub fn normalize(scores: &mut [f64], epsilon: f64) {
    let Some(min) = scores.iter().copied().reduce(f64::min) else {
        return;
    };
    let max = scores.iter().copied().fold(min, f64::max);
    let range = max - min + epsilon;
    for score in scores.iter_mut() {
        *score = (*score - min) / range;
    }
}

/// Indices of the best `n` scores strictly above `threshold`.
///
/// Stable: equal scores keep their original order.
#[must_use]
pub fn select_top(scores: &[f64], n: usize, threshold: f64) -> Vec<usize> {
    let mut order: Vec<usize> = (0..scores.len())
        .filter(|&i| scores[i] > threshold)
        .collect();
    order.sort_by(|&a, &b| {
        scores[b]
            .partial_cmp(&scores[a])
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    order.truncate(n);
    order
}

/// Stateless hybrid scorer over a [`ScoringContext`].
#[derive(Debug, Clone, Copy, Default)]
pub struct HybridScorer {
    context: ScoringContext,
}

impl HybridScorer {
    #[must_use]
    pub fn new(context: ScoringContext) -> Self {
        Self { context }
    }

    #[must_use]
    pub fn context(&self) -> &ScoringContext {
        &self.context
    }

    /// Pre-normalization contributions for every candidate.
    #[must_use]
    pub fn breakdowns(&self, query: &HybridQuery<'_>, candidates: &[Candidate<'_>]) -> Vec<ScoreBreakdown> {
        let membership = cluster_scores(candidates.iter().map(|c| c.label), query.cluster);
        candidates
            .iter()
            .zip(membership)
            .zip(query.similarities)
            .map(|((candidate, in_cluster), &similarity)| ScoreBreakdown {
                cluster: self.context.cluster_weight * in_cluster,
                content: self.context.content_weight * similarity,
                genre_boost: match query.genre {
                    Some(genre) if candidate.genre == genre => self.context.genre_boost,
                    _ => 0.0,
                },
            })
            .collect()
    }

    /// Full pipeline: blend, boost, normalize, exclude, select.
    ///
    /// `query.similarities` must have one entry per candidate.
    #[must_use]
    pub fn rank(&self, query: &HybridQuery<'_>, candidates: &[Candidate<'_>], n: usize) -> Vec<RankedCandidate> {
        debug_assert_eq!(query.similarities.len(), candidates.len());

        let breakdowns = self.breakdowns(query, candidates);
        let raw: Vec<f64> = breakdowns.iter().map(ScoreBreakdown::raw).collect();

        let mut scores = raw.clone();
        normalize(&mut scores, self.context.epsilon);

        let excluded: HashSet<&str> = query.exclude.iter().copied().collect();
        for (score, candidate) in scores.iter_mut().zip(candidates) {
            if excluded.contains(candidate.id) {
                *score = 0.0;
            }
        }

        select_top(&scores, n, self.context.significance_threshold)
            .into_iter()
            .filter(|&i| !excluded.contains(candidates[i].id))
            .map(|index| RankedCandidate {
                index,
                score: scores[index],
                raw_score: raw[index],
                breakdown: breakdowns[index],
            })
            .collect()
    }
}

/// Summary statistics over raw score arrays, for logging and tuning.
pub mod statistics {
    use serde::Serialize;

    #[derive(Debug, Clone, Copy, PartialEq, Serialize)]
    pub struct ScoreStatistics {
        pub mean: f64,
        pub std_deviation: f64,
        pub min: f64,
        pub max: f64,
        pub count: usize,
    }

    /// `None` for an empty slice.
    #[must_use]
    pub fn analyze(scores: &[f64]) -> Option<ScoreStatistics> {
        if scores.is_empty() {
            return None;
        }
        #[allow(clippy::cast_precision_loss)]
        let n = scores.len() as f64;
        let mean = scores.iter().sum::<f64>() / n;
        let variance = scores.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / n;
        Some(ScoreStatistics {
            mean,
            std_deviation: variance.sqrt(),
            min: scores.iter().copied().fold(f64::INFINITY, f64::min),
            max: scores.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            count: scores.len(),
        })
    }
}
