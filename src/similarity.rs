//! Feature-weighted cosine similarity between a query and every catalog vector.
//!
//! Weights multiply both sides before the cosine, so a feature with weight
//! 1.2 pulls the angle harder than one with 0.6. Catalog vectors are never
//! modified; weighting happens on temporaries.

use rayon::prelude::*;

/// Cosine similarity; 0 when either vector has zero norm.
#[must_use]
pub fn cosine_similarity(a: &[f64], b: &[f64]) -> f64 {
    let dot: f64 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f64>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f64>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    (dot / (norm_a * norm_b)).clamp(-1.0, 1.0)
}

/// Weighted content similarity over a fixed weight vector.
#[derive(Debug, Clone, PartialEq)]
pub struct SimilarityEngine {
    weights: Vec<f64>,
}

impl SimilarityEngine {
    #[must_use]
    pub fn new(weights: &[f64]) -> Self {
        Self { weights: weights.to_vec() }
    }

    #[must_use]
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    fn weighted(&self, v: &[f64]) -> Vec<f64> {
        v.iter().zip(&self.weights).map(|(x, w)| x * w).collect()
    }

    /// Weighted cosine between two vectors.
    #[must_use]
    pub fn similarity(&self, a: &[f64], b: &[f64]) -> f64 {
        cosine_similarity(&self.weighted(a), &self.weighted(b))
    }

    /// One similarity per catalog row, in catalog order.
    #[must_use]
    pub fn similarities(&self, query: &[f64], catalog: &[Vec<f64>]) -> Vec<f64> {
        let query = self.weighted(query);
        catalog
            .par_iter()
            .map(|row| cosine_similarity(&query, &self.weighted(row)))
            .collect()
    }
}
