//! # Track Data Model
//!
//! A [`Track`] is one catalog row: identity, free-text descriptors and the
//! twelve audio features. The recommender only ever looks at a declared
//! subset of those features, described by [`FeatureWeights`], which fixes
//! both the feature order and the importance weight of each feature.

use crate::error::{RecommendError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

/// The audio features a track carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioFeature {
    Danceability,
    Energy,
    Key,
    Loudness,
    Mode,
    Speechiness,
    Acousticness,
    Instrumentalness,
    Liveness,
    Valence,
    Tempo,
    TimeSignature,
}

impl AudioFeature {
    pub const ALL: [AudioFeature; 12] = [
        Self::Danceability,
        Self::Energy,
        Self::Key,
        Self::Loudness,
        Self::Mode,
        Self::Speechiness,
        Self::Acousticness,
        Self::Instrumentalness,
        Self::Liveness,
        Self::Valence,
        Self::Tempo,
        Self::TimeSignature,
    ];

    /// Column / config name of the feature.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Danceability => "danceability",
            Self::Energy => "energy",
            Self::Key => "key",
            Self::Loudness => "loudness",
            Self::Mode => "mode",
            Self::Speechiness => "speechiness",
            Self::Acousticness => "acousticness",
            Self::Instrumentalness => "instrumentalness",
            Self::Liveness => "liveness",
            Self::Valence => "valence",
            Self::Tempo => "tempo",
            Self::TimeSignature => "time_signature",
        }
    }
}

impl fmt::Display for AudioFeature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for AudioFeature {
    type Err = RecommendError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|feature| feature.name() == wanted)
            .ok_or_else(|| RecommendError::InvalidFeatures(format!("unknown audio feature `{s}`")))
    }
}

/// Raw audio analysis values, in their original units.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct AudioFeatures {
    pub danceability: f64,
    pub energy: f64,
    pub key: i32,
    /// Decibels, usually negative.
    pub loudness: f64,
    pub mode: i32,
    pub speechiness: f64,
    pub acousticness: f64,
    pub instrumentalness: f64,
    pub liveness: f64,
    pub valence: f64,
    /// Beats per minute.
    pub tempo: f64,
    pub time_signature: i32,
}

impl AudioFeatures {
    #[must_use]
    pub fn get(&self, feature: AudioFeature) -> f64 {
        match feature {
            AudioFeature::Danceability => self.danceability,
            AudioFeature::Energy => self.energy,
            AudioFeature::Key => f64::from(self.key),
            AudioFeature::Loudness => self.loudness,
            AudioFeature::Mode => f64::from(self.mode),
            AudioFeature::Speechiness => self.speechiness,
            AudioFeature::Acousticness => self.acousticness,
            AudioFeature::Instrumentalness => self.instrumentalness,
            AudioFeature::Liveness => self.liveness,
            AudioFeature::Valence => self.valence,
            AudioFeature::Tempo => self.tempo,
            AudioFeature::TimeSignature => f64::from(self.time_signature),
        }
    }
}

/// One catalog entry. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub id: String,
    pub name: String,
    pub artists: String,
    pub album: String,
    pub genre: String,
    pub popularity: u32,
    pub duration_ms: u64,
    pub explicit: bool,
    pub audio: AudioFeatures,
}

impl Track {
    /// Feature vector in the order declared by `weights`.
    #[must_use]
    pub fn feature_vector(&self, weights: &FeatureWeights) -> Vec<f64> {
        weights.features().iter().map(|&f| self.audio.get(f)).collect()
    }

    /// True when name, artists or album contain `needle`.
    ///
    /// `needle` must already be lowercase.
    #[must_use]
    pub fn matches(&self, needle: &str) -> bool {
        [&self.name, &self.artists, &self.album]
            .iter()
            .any(|field| field.to_lowercase().contains(needle))
    }
}

/// A feature and its importance in content similarity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureWeight {
    pub feature: AudioFeature,
    pub weight: f64,
}

/// Fixed-order feature set with one weight per feature.
///
/// Validated at construction: non-empty, no duplicates, finite non-negative
/// weights. Every vector the engine handles uses this order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<FeatureWeight>", into = "Vec<FeatureWeight>")]
pub struct FeatureWeights {
    features: Vec<AudioFeature>,
    weights: Vec<f64>,
}

impl FeatureWeights {
    /// Build from `(feature, weight)` pairs in the desired order.
    ///
    /// # Errors
    ///
    /// `InvalidFeatures` for an empty list, a repeated feature, or a
    /// negative/non-finite weight.
    pub fn new(pairs: Vec<(AudioFeature, f64)>) -> Result<Self> {
        if pairs.is_empty() {
            return Err(RecommendError::InvalidFeatures("feature set is empty".into()));
        }

        let mut seen = HashSet::new();
        for (feature, weight) in &pairs {
            if !seen.insert(*feature) {
                return Err(RecommendError::InvalidFeatures(format!(
                    "feature `{feature}` declared twice"
                )));
            }
            if !weight.is_finite() || *weight < 0.0 {
                return Err(RecommendError::InvalidFeatures(format!(
                    "weight for `{feature}` must be finite and non-negative, got {weight}"
                )));
            }
        }

        let (features, weights) = pairs.into_iter().unzip();
        Ok(Self { features, weights })
    }

    /// Build from a name-keyed map, requiring exactly the features in `order`.
    ///
    /// # Errors
    ///
    /// `InvalidFeatures` when the map has a missing or an extra key.
    pub fn from_map(order: &[AudioFeature], map: &HashMap<String, f64>) -> Result<Self> {
        let values = exact_feature_values(order, map)?;
        Self::new(order.iter().copied().zip(values).collect())
    }

    #[must_use]
    pub fn features(&self) -> &[AudioFeature] {
        &self.features
    }

    #[must_use]
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.features.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Pair each feature name with the matching value of `vector`.
    #[must_use]
    pub fn label(&self, vector: &[f64]) -> BTreeMap<String, f64> {
        self.features
            .iter()
            .zip(vector)
            .map(|(f, &v)| (f.name().to_string(), v))
            .collect()
    }

    /// Order a name-keyed raw feature map into a vector.
    ///
    /// # Errors
    ///
    /// `InvalidFeatures` on a missing, unknown or non-finite value.
    pub fn vector_from_map(&self, map: &HashMap<String, f64>) -> Result<Vec<f64>> {
        let values = exact_feature_values(&self.features, map)?;
        if let Some((feature, value)) = self
            .features
            .iter()
            .zip(&values)
            .find(|(_, v)| !v.is_finite())
        {
            return Err(RecommendError::InvalidFeatures(format!(
                "value for `{feature}` is not finite: {value}"
            )));
        }
        Ok(values)
    }
}

/// The six features and weights the recommender was tuned with.
impl Default for FeatureWeights {
    fn default() -> Self {
        Self {
            features: vec![
                AudioFeature::Danceability,
                AudioFeature::Energy,
                AudioFeature::Valence,
                AudioFeature::Acousticness,
                AudioFeature::Instrumentalness,
                AudioFeature::Liveness,
            ],
            weights: vec![1.2, 1.2, 1.0, 0.8, 0.8, 0.6],
        }
    }
}

impl TryFrom<Vec<FeatureWeight>> for FeatureWeights {
    type Error = RecommendError;

    fn try_from(list: Vec<FeatureWeight>) -> Result<Self> {
        Self::new(list.into_iter().map(|fw| (fw.feature, fw.weight)).collect())
    }
}

impl From<FeatureWeights> for Vec<FeatureWeight> {
    fn from(fw: FeatureWeights) -> Self {
        fw.features
            .into_iter()
            .zip(fw.weights)
            .map(|(feature, weight)| FeatureWeight { feature, weight })
            .collect()
    }
}

fn exact_feature_values(order: &[AudioFeature], map: &HashMap<String, f64>) -> Result<Vec<f64>> {
    let mut keyed = HashMap::with_capacity(map.len());
    for (name, &value) in map {
        let feature: AudioFeature = name.parse()?;
        if !order.contains(&feature) {
            return Err(RecommendError::InvalidFeatures(format!(
                "feature `{feature}` is not part of the declared feature set"
            )));
        }
        if keyed.insert(feature, value).is_some() {
            return Err(RecommendError::InvalidFeatures(format!(
                "feature `{feature}` given twice"
            )));
        }
    }

    order
        .iter()
        .map(|feature| {
            keyed.get(feature).copied().ok_or_else(|| {
                RecommendError::InvalidFeatures(format!("missing value for feature `{feature}`"))
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(pairs: &[(&str, f64)]) -> HashMap<String, f64> {
        pairs.iter().map(|(k, v)| ((*k).to_string(), *v)).collect()
    }

    #[test]
    fn test_feature_names_round_trip_through_from_str() {
        for feature in AudioFeature::ALL {
            assert_eq!(feature.name().parse::<AudioFeature>().unwrap(), feature);
        }
        assert!("Energy".parse::<AudioFeature>().is_ok());
        assert!("bogus".parse::<AudioFeature>().is_err());
    }

    #[test]
    fn test_default_weights_favour_rhythm_over_liveness() {
        let weights = FeatureWeights::default();
        assert_eq!(weights.len(), 6);
        assert_eq!(weights.features()[0], AudioFeature::Danceability);
        let liveness = weights.weights()[5];
        assert!(weights.weights()[0] > liveness);
        assert!(weights.weights()[1] > liveness);
    }

    #[test]
    fn test_from_map_requires_exact_feature_set() {
        let order = [AudioFeature::Energy, AudioFeature::Valence];

        let ok = FeatureWeights::from_map(&order, &raw(&[("valence", 0.5), ("energy", 2.0)])).unwrap();
        assert_eq!(ok.weights(), &[2.0, 0.5]);

        let missing = FeatureWeights::from_map(&order, &raw(&[("energy", 1.0)]));
        assert!(matches!(missing, Err(RecommendError::InvalidFeatures(_))));

        let extra = FeatureWeights::from_map(
            &order,
            &raw(&[("energy", 1.0), ("valence", 1.0), ("tempo", 1.0)]),
        );
        assert!(matches!(extra, Err(RecommendError::InvalidFeatures(_))));
    }

    #[test]
    fn test_new_rejects_duplicates_and_bad_weights() {
        let dup = FeatureWeights::new(vec![(AudioFeature::Energy, 1.0), (AudioFeature::Energy, 1.0)]);
        assert!(dup.is_err());

        let negative = FeatureWeights::new(vec![(AudioFeature::Energy, -1.0)]);
        assert!(negative.is_err());

        assert!(FeatureWeights::new(Vec::new()).is_err());
    }

    #[test]
    fn test_vector_from_map_rejects_non_finite() {
        let weights = FeatureWeights::new(vec![(AudioFeature::Energy, 1.0)]).unwrap();
        assert!(weights.vector_from_map(&raw(&[("energy", f64::NAN)])).is_err());
        assert_eq!(weights.vector_from_map(&raw(&[("energy", 0.3)])).unwrap(), vec![0.3]);
    }

    #[test]
    fn test_weights_serialize_as_ordered_list() {
        let weights = FeatureWeights::default();
        let json = serde_json::to_string(&weights).unwrap();
        assert!(json.starts_with("[{\"feature\":\"danceability\""));

        let back: FeatureWeights = serde_json::from_str(&json).unwrap();
        assert_eq!(back, weights);

        let bad: std::result::Result<FeatureWeights, _> = serde_json::from_str("[]");
        assert!(bad.is_err());
    }

    #[test]
    fn test_track_search_matching() {
        let track = Track {
            id: "1".into(),
            name: "Blue Monday".into(),
            artists: "New Order".into(),
            album: "Power, Corruption & Lies".into(),
            genre: "synth-pop".into(),
            popularity: 70,
            duration_ms: 443_000,
            explicit: false,
            audio: AudioFeatures::default(),
        };
        assert!(track.matches("monday"));
        assert!(track.matches("new ord"));
        assert!(track.matches("corruption"));
        assert!(!track.matches("joy division"));
    }
}
