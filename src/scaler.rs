//! Feature standardization.
//!
//! `z = (x - mean) / scale`, with statistics learned from the training
//! partition only. Zero-variance features get a scale of 1 and always map
//! to exactly 0.

use crate::error::{RecommendError, Result};
use log::debug;
use serde::{Deserialize, Serialize};

/// Standard deviations at or below this are treated as zero variance.
const VARIANCE_FLOOR: f64 = 1e-12;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct ScalerStats {
    mean: Vec<f64>,
    scale: Vec<f64>,
    constant: Vec<bool>,
}

/// Per-feature standard scaler.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureScaler {
    stats: Option<ScalerStats>,
}

impl FeatureScaler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Learn per-feature mean and population standard deviation.
    ///
    /// # Errors
    ///
    /// `EmptyInput` for zero rows or zero columns, `InvalidFeatures` when
    /// rows differ in width.
    pub fn fit(&mut self, rows: &[Vec<f64>]) -> Result<()> {
        let first = rows
            .first()
            .ok_or_else(|| RecommendError::EmptyInput("cannot fit scaler on zero rows".into()))?;
        let width = first.len();
        if width == 0 {
            return Err(RecommendError::EmptyInput("cannot fit scaler on zero features".into()));
        }
        if let Some(bad) = rows.iter().find(|r| r.len() != width) {
            return Err(RecommendError::InvalidFeatures(format!(
                "row has {} features, expected {width}",
                bad.len()
            )));
        }

        #[allow(clippy::cast_precision_loss)]
        let n = rows.len() as f64;
        let mut mean = vec![0.0; width];
        let mut scale = vec![1.0; width];
        let mut constant = vec![false; width];

        for j in 0..width {
            let column = rows.iter().map(|r| r[j]);
            let m = column.clone().sum::<f64>() / n;
            let variance = column.clone().map(|x| (x - m).powi(2)).sum::<f64>() / n;
            let std = variance.sqrt();
            let all_equal = column.clone().all(|x| x == first[j]);

            if all_equal || std <= VARIANCE_FLOOR {
                // exact value keeps inverse_transform lossless on the train domain
                mean[j] = if all_equal { first[j] } else { m };
                constant[j] = true;
            } else {
                mean[j] = m;
                scale[j] = std;
            }
        }

        debug!(
            "Fitted scaler on {} rows x {width} features ({} constant)",
            rows.len(),
            constant.iter().filter(|c| **c).count()
        );
        self.stats = Some(ScalerStats { mean, scale, constant });
        Ok(())
    }

    #[must_use]
    pub fn is_fitted(&self) -> bool {
        self.stats.is_some()
    }

    #[must_use]
    pub fn mean(&self) -> Option<&[f64]> {
        self.stats.as_ref().map(|s| s.mean.as_slice())
    }

    #[must_use]
    pub fn scale(&self) -> Option<&[f64]> {
        self.stats.as_ref().map(|s| s.scale.as_slice())
    }

    /// Standardize one vector.
    ///
    /// # Errors
    ///
    /// `NotFitted` before `fit`; `InvalidFeatures` on a width mismatch.
    pub fn transform(&self, row: &[f64]) -> Result<Vec<f64>> {
        let stats = self.checked(row)?;
        Ok(row
            .iter()
            .enumerate()
            .map(|(j, &x)| {
                if stats.constant[j] {
                    0.0
                } else {
                    (x - stats.mean[j]) / stats.scale[j]
                }
            })
            .collect())
    }

    /// Standardize every row.
    ///
    /// # Errors
    ///
    /// Same as [`FeatureScaler::transform`].
    pub fn transform_all(&self, rows: &[Vec<f64>]) -> Result<Vec<Vec<f64>>> {
        rows.iter().map(|r| self.transform(r)).collect()
    }

    /// Map a standardized vector back to original units.
    ///
    /// # Errors
    ///
    /// `NotFitted` before `fit`; `InvalidFeatures` on a width mismatch.
    pub fn inverse_transform(&self, row: &[f64]) -> Result<Vec<f64>> {
        let stats = self.checked(row)?;
        Ok(row
            .iter()
            .enumerate()
            .map(|(j, &z)| z * stats.scale[j] + stats.mean[j])
            .collect())
    }

    fn checked(&self, row: &[f64]) -> Result<&ScalerStats> {
        let stats = self.stats.as_ref().ok_or(RecommendError::NotFitted)?;
        if row.len() != stats.mean.len() {
            return Err(RecommendError::InvalidFeatures(format!(
                "vector has {} features, scaler was fitted on {}",
                row.len(),
                stats.mean.len()
            )));
        }
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<Vec<f64>> {
        vec![
            vec![0.9, 0.8, -5.0],
            vec![0.85, 0.75, -7.5],
            vec![0.1, 0.2, -20.0],
            vec![0.4, 0.5, -11.0],
        ]
    }

    #[test]
    fn test_fit_on_empty_input_fails() {
        let mut scaler = FeatureScaler::new();
        assert!(matches!(scaler.fit(&[]), Err(RecommendError::EmptyInput(_))));
        assert!(!scaler.is_fitted());
    }

    #[test]
    fn test_transform_before_fit_fails() {
        let scaler = FeatureScaler::new();
        assert!(matches!(scaler.transform(&[1.0]), Err(RecommendError::NotFitted)));
        assert!(matches!(scaler.inverse_transform(&[1.0]), Err(RecommendError::NotFitted)));
    }

    #[test]
    fn test_standardized_columns_have_zero_mean_unit_variance() {
        let mut scaler = FeatureScaler::new();
        scaler.fit(&sample()).unwrap();
        let scaled = scaler.transform_all(&sample()).unwrap();

        for j in 0..3 {
            let mean: f64 = scaled.iter().map(|r| r[j]).sum::<f64>() / 4.0;
            let var: f64 = scaled.iter().map(|r| (r[j] - mean).powi(2)).sum::<f64>() / 4.0;
            assert!(mean.abs() < 1e-12, "column {j} mean {mean}");
            assert!((var - 1.0).abs() < 1e-9, "column {j} variance {var}");
        }
    }

    #[test]
    fn test_inverse_transform_round_trips() {
        let mut scaler = FeatureScaler::new();
        scaler.fit(&sample()).unwrap();

        for row in [vec![0.33, 0.12, -3.0], vec![1.0, 0.0, -60.0], sample()[2].clone()] {
            let back = scaler.inverse_transform(&scaler.transform(&row).unwrap()).unwrap();
            for (a, b) in row.iter().zip(&back) {
                assert!((a - b).abs() < 1e-9, "{a} vs {b}");
            }
        }
    }

    #[test]
    fn test_zero_variance_feature_contributes_exactly_zero() {
        let rows = vec![vec![0.1, 0.3], vec![0.5, 0.3], vec![0.9, 0.3]];
        let mut scaler = FeatureScaler::new();
        scaler.fit(&rows).unwrap();

        assert_eq!(scaler.scale().unwrap()[1], 1.0);
        for row in &rows {
            let z = scaler.transform(row).unwrap();
            assert_eq!(z[1], 0.0);
            assert!(z.iter().all(|v| v.is_finite()));
        }
        assert_eq!(scaler.transform(&[0.5, 0.9]).unwrap()[1], 0.0);
        assert_eq!(scaler.inverse_transform(&[0.0, 0.0]).unwrap()[1], 0.3);
    }

    #[test]
    fn test_width_mismatch_is_rejected() {
        let mut scaler = FeatureScaler::new();
        assert!(scaler.fit(&[vec![1.0, 2.0], vec![1.0]]).is_err());

        scaler.fit(&sample()).unwrap();
        assert!(matches!(scaler.transform(&[1.0]), Err(RecommendError::InvalidFeatures(_))));
    }
}
