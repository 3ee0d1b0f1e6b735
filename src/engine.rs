//! # Recommendation Engine
//!
//! [`TrainedSnapshot`] is the immutable result of one training pass: the
//! catalog, its train/test partition, the fitted scaler, the cluster model
//! and the standardized vectors. Every query is a read-only computation over
//! one snapshot, so snapshots can be shared across threads freely.
//!
//! [`RecommendationEngine`] owns the current snapshot and the lifecycle
//! `Uninitialized -> Loading -> Training -> Ready`. Retraining builds a new
//! snapshot off to the side and swaps the `Arc` in one step; queries that
//! already hold the old snapshot finish against it.
//!
//! ## Example
//!
//! ```no_run
//! use sonance::catalog::Catalog;
//! use sonance::engine::{EngineConfig, RecommendationEngine};
//! use std::path::Path;
//!
//! let engine = RecommendationEngine::new(EngineConfig::default());
//! engine.initialize(|| Catalog::from_csv_path(Path::new("tracks.csv")))?;
//!
//! for rec in engine.recommend_by_id("3GZD6HmiNUhxXYf8Gch723", 5)? {
//!     println!("{:.3}  {} - {}", rec.score, rec.track.artists, rec.track.name);
//! }
//! # Ok::<(), sonance::error::RecommendError>(())
//! ```

use crate::algorithm::{statistics, Candidate, HybridQuery, HybridScorer, ScoreBreakdown, ScoringContext};
use crate::catalog::{Catalog, Partition};
use crate::cluster::{ClusterModel, KMeansConfig};
use crate::error::{RecommendError, Result};
use crate::evaluate::{self, EvaluationReport, FeatureImportance};
use crate::scaler::FeatureScaler;
use crate::similarity::SimilarityEngine;
use crate::track::{FeatureWeights, Track};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Instant;

/// Everything training and scoring can be tuned with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Features used, in order, with their similarity weights.
    pub features: FeatureWeights,
    pub clustering: KMeansConfig,
    /// Share of the catalog held out for evaluation, in [0, 1).
    pub test_fraction: f64,
    pub split_seed: u64,
    pub scoring: ScoringContext,
    /// Report an empty result as `NoRecommendation` instead of `Ok(vec![])`.
    pub strict: bool,
    /// Above this many tracks a full similarity scan is logged as too slow.
    pub max_scan_size: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            features: FeatureWeights::default(),
            clustering: KMeansConfig::default(),
            test_fraction: 0.2,
            split_seed: 42,
            scoring: ScoringContext::default(),
            strict: false,
            max_scan_size: 500_000,
        }
    }
}

impl EngineConfig {
    /// # Errors
    ///
    /// `InvalidConfig` for any out-of-range setting.
    pub fn validate(&self) -> Result<()> {
        if self.clustering.k == 0 {
            return Err(RecommendError::InvalidConfig("clustering.k must be at least 1".into()));
        }
        if self.clustering.n_init == 0 {
            return Err(RecommendError::InvalidConfig("clustering.n_init must be at least 1".into()));
        }
        if self.clustering.max_iter == 0 {
            return Err(RecommendError::InvalidConfig("clustering.max_iter must be at least 1".into()));
        }
        if !self.clustering.tolerance.is_finite() || self.clustering.tolerance < 0.0 {
            return Err(RecommendError::InvalidConfig("clustering.tolerance must be non-negative".into()));
        }
        if !(0.0..1.0).contains(&self.test_fraction) {
            return Err(RecommendError::InvalidConfig(format!(
                "test_fraction must be within [0, 1), got {}",
                self.test_fraction
            )));
        }
        self.scoring.validate()
    }
}

/// Lifecycle of a [`RecommendationEngine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Uninitialized,
    Loading,
    Training,
    Ready,
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Uninitialized => "uninitialized",
            Self::Loading => "loading",
            Self::Training => "training",
            Self::Ready => "ready",
        })
    }
}

/// One ranked result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendation {
    pub track: Track,
    /// Normalized hybrid score in [0, 1].
    pub score: f64,
    /// Blended score before normalization.
    pub raw_score: f64,
    pub breakdown: ScoreBreakdown,
    /// The engine's feature values for this track, in original units.
    pub features: BTreeMap<String, f64>,
}

/// Result of a query by raw feature values.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureRecommendation {
    pub recommendations: Vec<Recommendation>,
    /// Best candidate's standardized vector mapped back to original units.
    pub recommended_features: Option<BTreeMap<String, f64>>,
}

/// Immutable trained state. Every query method takes `&self`.
#[derive(Debug, Clone)]
pub struct TrainedSnapshot {
    catalog: Catalog,
    partition: Partition,
    features: FeatureWeights,
    scaler: FeatureScaler,
    model: ClusterModel,
    scaled_train: Vec<Vec<f64>>,
    scaled_test: Vec<Vec<f64>>,
    similarity: SimilarityEngine,
    scoring: ScoringContext,
    strict: bool,
}

impl TrainedSnapshot {
    /// Split, fit the scaler on the train side, fit the cluster model.
    ///
    /// # Errors
    ///
    /// `InvalidConfig`, `EmptyInput` (empty train partition) or
    /// `InsufficientData` (fewer train rows than clusters).
    pub fn train(catalog: Catalog, config: &EngineConfig) -> Result<Self> {
        config.validate()?;
        let started = Instant::now();

        if catalog.len() > config.max_scan_size {
            warn!(
                "Catalog has {} tracks, above the full-scan limit of {}; queries scan every training vector",
                catalog.len(),
                config.max_scan_size
            );
        }

        let partition = catalog.split(config.test_fraction, config.split_seed);
        info!(
            "Split {} tracks into {} train / {} test",
            catalog.len(),
            partition.train.len(),
            partition.test.len()
        );

        let vectors = |indices: &[usize]| -> Vec<Vec<f64>> {
            indices
                .iter()
                .map(|&i| catalog.tracks()[i].feature_vector(&config.features))
                .collect()
        };
        let raw_train = vectors(&partition.train);
        let raw_test = vectors(&partition.test);

        let mut scaler = FeatureScaler::new();
        scaler.fit(&raw_train)?;
        let scaled_train = scaler.transform_all(&raw_train)?;
        let scaled_test = scaler.transform_all(&raw_test)?;

        let model = ClusterModel::fit(&scaled_train, &config.clustering)?;
        for (cluster, size) in model.cluster_sizes().iter().enumerate() {
            info!("Cluster {cluster} size: {size} tracks");
        }
        info!("Training completed in {:.2?}", started.elapsed());

        Ok(Self {
            similarity: SimilarityEngine::new(config.features.weights()),
            features: config.features.clone(),
            scoring: config.scoring,
            strict: config.strict,
            catalog,
            partition,
            scaler,
            model,
            scaled_train,
            scaled_test,
        })
    }

    #[must_use]
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    #[must_use]
    pub fn partition(&self) -> &Partition {
        &self.partition
    }

    #[must_use]
    pub fn features(&self) -> &FeatureWeights {
        &self.features
    }

    #[must_use]
    pub fn scaler(&self) -> &FeatureScaler {
        &self.scaler
    }

    #[must_use]
    pub fn model(&self) -> &ClusterModel {
        &self.model
    }

    #[must_use]
    pub fn similarity(&self) -> &SimilarityEngine {
        &self.similarity
    }

    #[must_use]
    pub fn scoring(&self) -> &ScoringContext {
        &self.scoring
    }

    /// Standardized train vectors, in train-partition order.
    #[must_use]
    pub fn scaled_train(&self) -> &[Vec<f64>] {
        &self.scaled_train
    }

    /// Standardized test vectors, in test-partition order.
    #[must_use]
    pub fn scaled_test(&self) -> &[Vec<f64>] {
        &self.scaled_test
    }

    pub fn train_tracks(&self) -> impl Iterator<Item = &Track> + '_ {
        self.partition.train.iter().map(|&i| &self.catalog.tracks()[i])
    }

    pub fn test_tracks(&self) -> impl Iterator<Item = &Track> + '_ {
        self.partition.test.iter().map(|&i| &self.catalog.tracks()[i])
    }

    /// # Errors
    ///
    /// `NotFound` for an unknown id.
    pub fn get_track(&self, id: &str) -> Result<&Track> {
        self.catalog.get_track(id)
    }

    #[must_use]
    pub fn search(&self, query: &str, limit: usize) -> Vec<&Track> {
        self.catalog.search(query, limit)
    }

    /// Recommend training tracks similar to a known track, with the
    /// snapshot's own scoring context.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown id; `NoRecommendation` in strict mode.
    pub fn recommend_by_id(&self, track_id: &str, n: usize) -> Result<Vec<Recommendation>> {
        self.recommend_by_id_with(track_id, n, &self.scoring)
    }

    /// [`TrainedSnapshot::recommend_by_id`] with an explicit scoring context.
    ///
    /// The query track may come from either partition; candidates are
    /// always training tracks and never the query itself.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown id; `NoRecommendation` in strict mode.
    pub fn recommend_by_id_with(
        &self,
        track_id: &str,
        n: usize,
        scoring: &ScoringContext,
    ) -> Result<Vec<Recommendation>> {
        let track = self.catalog.get_track(track_id)?;
        debug!("Recommending for track {track_id} ({} - {})", track.artists, track.name);

        let scaled = self.scaler.transform(&track.feature_vector(&self.features))?;
        let ranked = self.rank(&scaled, Some(&track.genre), &[track_id], n, scoring)?;
        Ok(ranked.into_iter().map(|(rec, _)| rec).collect())
    }

    /// Recommend training tracks for an ad-hoc feature set.
    ///
    /// `raw` must name exactly the engine's features. `scoring` overrides
    /// the snapshot's context (for example a 0.6/0.4 blend).
    ///
    /// # Errors
    ///
    /// `InvalidFeatures` for a bad feature map; `InvalidConfig` for a bad
    /// override; `NoRecommendation` in strict mode.
    pub fn recommend_by_features(
        &self,
        raw: &HashMap<String, f64>,
        n: usize,
        scoring: Option<&ScoringContext>,
    ) -> Result<FeatureRecommendation> {
        let scoring = scoring.unwrap_or(&self.scoring);
        let vector = self.features.vector_from_map(raw)?;
        let scaled = self.scaler.transform(&vector)?;

        let ranked = self.rank(&scaled, None, &[], n, scoring)?;
        let recommended_features = match ranked.first() {
            Some(&(_, train_index)) => {
                let original = self.scaler.inverse_transform(&self.scaled_train[train_index])?;
                Some(self.features.label(&original))
            }
            None => None,
        };

        Ok(FeatureRecommendation {
            recommendations: ranked.into_iter().map(|(rec, _)| rec).collect(),
            recommended_features,
        })
    }

    /// Score every training track against a standardized query vector.
    /// Returns each recommendation with its train-partition index.
    fn rank(
        &self,
        scaled_query: &[f64],
        genre: Option<&str>,
        exclude: &[&str],
        n: usize,
        scoring: &ScoringContext,
    ) -> Result<Vec<(Recommendation, usize)>> {
        scoring.validate()?;

        let cluster = self.model.predict(scaled_query);
        let similarities = self.similarity.similarities(scaled_query, &self.scaled_train);

        let candidates: Vec<Candidate<'_>> = self
            .train_tracks()
            .zip(self.model.labels())
            .map(|(track, &label)| Candidate {
                id: &track.id,
                genre: &track.genre,
                label,
            })
            .collect();

        let query = HybridQuery {
            cluster,
            similarities: &similarities,
            genre,
            exclude,
        };
        let scorer = HybridScorer::new(*scoring);
        if log::log_enabled!(log::Level::Trace) {
            let raw: Vec<f64> = scorer.breakdowns(&query, &candidates).iter().map(ScoreBreakdown::raw).collect();
            log::trace!("Raw score distribution: {:?}", statistics::analyze(&raw));
        }
        let ranked = scorer.rank(&query, &candidates, n);
        debug!("Query assigned to cluster {cluster}; {} candidates selected", ranked.len());

        if ranked.is_empty() && self.strict {
            return Err(RecommendError::NoRecommendation {
                threshold: scoring.significance_threshold,
            });
        }

        Ok(ranked
            .into_iter()
            .map(|r| {
                let track = &self.catalog.tracks()[self.partition.train[r.index]];
                let recommendation = Recommendation {
                    track: track.clone(),
                    score: r.score,
                    raw_score: r.raw_score,
                    breakdown: r.breakdown,
                    features: self.features.label(&track.feature_vector(&self.features)),
                };
                (recommendation, r.index)
            })
            .collect())
    }

    /// Held-out cluster quality for this snapshot.
    #[must_use]
    pub fn evaluate(&self) -> EvaluationReport {
        evaluate::evaluate(self)
    }

    #[must_use]
    pub fn feature_importance(&self) -> Vec<FeatureImportance> {
        evaluate::feature_importance(&self.model, &self.features)
    }
}

struct Slot {
    state: EngineState,
    snapshot: Option<Arc<TrainedSnapshot>>,
}

/// Owns the current [`TrainedSnapshot`] and the engine lifecycle.
pub struct RecommendationEngine {
    config: EngineConfig,
    slot: RwLock<Slot>,
}

impl RecommendationEngine {
    #[must_use]
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            slot: RwLock::new(Slot {
                state: EngineState::Uninitialized,
                snapshot: None,
            }),
        }
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[must_use]
    pub fn state(&self) -> EngineState {
        self.slot.read().unwrap_or_else(PoisonError::into_inner).state
    }

    fn set_state(&self, state: EngineState) {
        self.slot.write().unwrap_or_else(PoisonError::into_inner).state = state;
    }

    /// Load the catalog and train the first snapshot.
    ///
    /// Any failure returns the engine to `Uninitialized`; there is no
    /// degraded serving mode.
    ///
    /// # Errors
    ///
    /// `InvalidConfig` if called twice, otherwise whatever loading or
    /// training reports.
    pub fn initialize<F>(&self, load: F) -> Result<()>
    where
        F: FnOnce() -> Result<Catalog>,
    {
        {
            let mut slot = self.slot.write().unwrap_or_else(PoisonError::into_inner);
            if slot.state != EngineState::Uninitialized {
                return Err(RecommendError::InvalidConfig(format!(
                    "engine already {}; use retrain to replace the model",
                    slot.state
                )));
            }
            slot.state = EngineState::Loading;
        }

        let outcome = load().and_then(|catalog| {
            info!("Catalog loaded: {} tracks", catalog.len());
            self.set_state(EngineState::Training);
            TrainedSnapshot::train(catalog, &self.config)
        });

        let mut slot = self.slot.write().unwrap_or_else(PoisonError::into_inner);
        match outcome {
            Ok(snapshot) => {
                slot.snapshot = Some(Arc::new(snapshot));
                slot.state = EngineState::Ready;
                info!("Recommendation engine ready");
                Ok(())
            }
            Err(e) => {
                slot.state = EngineState::Uninitialized;
                Err(e)
            }
        }
    }

    /// Train a replacement snapshot and publish it atomically.
    ///
    /// The current snapshot keeps serving while the new one trains and stays
    /// in place if training fails.
    ///
    /// # Errors
    ///
    /// `NotReady` before the first successful `initialize`; any training error.
    pub fn retrain(&self, catalog: Catalog) -> Result<()> {
        self.snapshot()?;
        let fresh = Arc::new(TrainedSnapshot::train(catalog, &self.config)?);
        let mut slot = self.slot.write().unwrap_or_else(PoisonError::into_inner);
        slot.snapshot = Some(fresh);
        info!("Published retrained snapshot");
        Ok(())
    }

    /// The snapshot queries should run against.
    ///
    /// # Errors
    ///
    /// `NotReady` unless the engine is `Ready`.
    pub fn snapshot(&self) -> Result<Arc<TrainedSnapshot>> {
        let slot = self.slot.read().unwrap_or_else(PoisonError::into_inner);
        match (&slot.snapshot, slot.state) {
            (Some(snapshot), EngineState::Ready) => Ok(Arc::clone(snapshot)),
            (_, state) => Err(RecommendError::NotReady(state)),
        }
    }

    /// # Errors
    ///
    /// `NotReady`, `NotFound`, or `NoRecommendation` in strict mode.
    pub fn recommend_by_id(&self, track_id: &str, n: usize) -> Result<Vec<Recommendation>> {
        self.snapshot()?.recommend_by_id(track_id, n)
    }

    /// # Errors
    ///
    /// `NotReady`, `InvalidFeatures`, or `NoRecommendation` in strict mode.
    pub fn recommend_by_features(
        &self,
        raw: &HashMap<String, f64>,
        n: usize,
        scoring: Option<&ScoringContext>,
    ) -> Result<FeatureRecommendation> {
        self.snapshot()?.recommend_by_features(raw, n, scoring)
    }

    /// # Errors
    ///
    /// `NotReady`.
    pub fn search(&self, query: &str, limit: usize) -> Result<Vec<Track>> {
        Ok(self.snapshot()?.search(query, limit).into_iter().cloned().collect())
    }

    /// # Errors
    ///
    /// `NotReady` or `NotFound`.
    pub fn get_track(&self, id: &str) -> Result<Track> {
        self.snapshot()?.get_track(id).cloned()
    }

    /// # Errors
    ///
    /// `NotReady`.
    pub fn evaluate(&self) -> Result<EvaluationReport> {
        Ok(self.snapshot()?.evaluate())
    }

    /// # Errors
    ///
    /// `NotReady`.
    pub fn feature_importance(&self) -> Result<Vec<FeatureImportance>> {
        Ok(self.snapshot()?.feature_importance())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::track::AudioFeatures;

    fn track(id: &str, genre: &str, d: f64, e: f64, v: f64) -> Track {
        Track {
            id: id.to_string(),
            name: format!("Song {id}"),
            artists: format!("Artist {id}"),
            album: "Album".to_string(),
            genre: genre.to_string(),
            popularity: 50,
            duration_ms: 200_000,
            explicit: false,
            audio: AudioFeatures {
                danceability: d,
                energy: e,
                valence: v,
                tempo: 120.0,
                loudness: -6.0,
                time_signature: 4,
                ..AudioFeatures::default()
            },
        }
    }

    fn three_feature_config(k: usize) -> EngineConfig {
        use crate::track::AudioFeature;
        EngineConfig {
            features: FeatureWeights::new(vec![
                (AudioFeature::Danceability, 1.2),
                (AudioFeature::Energy, 1.2),
                (AudioFeature::Valence, 1.0),
            ])
            .unwrap(),
            clustering: KMeansConfig { k, ..KMeansConfig::default() },
            test_fraction: 0.0,
            ..EngineConfig::default()
        }
    }

    fn abc() -> Catalog {
        Catalog::new(vec![
            track("A", "pop", 0.9, 0.8, 0.7),
            track("B", "pop", 0.85, 0.75, 0.65),
            track("C", "classical", 0.1, 0.2, 0.3),
        ])
        .unwrap()
    }

    #[test]
    fn test_queries_before_ready_fail() {
        let engine = RecommendationEngine::new(EngineConfig::default());
        assert_eq!(engine.state(), EngineState::Uninitialized);
        assert!(matches!(
            engine.recommend_by_id("A", 1),
            Err(RecommendError::NotReady(EngineState::Uninitialized))
        ));
        assert!(matches!(engine.evaluate(), Err(RecommendError::NotReady(_))));
    }

    #[test]
    fn test_initialize_reaches_ready_and_rejects_second_call() {
        let engine = RecommendationEngine::new(three_feature_config(2));
        engine.initialize(|| Ok(abc())).unwrap();
        assert_eq!(engine.state(), EngineState::Ready);
        assert!(engine.initialize(|| Ok(abc())).is_err());
        assert_eq!(engine.state(), EngineState::Ready);
    }

    #[test]
    fn test_failed_training_returns_to_uninitialized() {
        let engine = RecommendationEngine::new(three_feature_config(8));
        let err = engine.initialize(|| Ok(abc())).unwrap_err();
        assert!(matches!(err, RecommendError::InsufficientData { rows: 3, k: 8 }));
        assert_eq!(engine.state(), EngineState::Uninitialized);
    }

    #[test]
    fn test_similar_track_ranks_first_and_self_is_excluded() {
        let snapshot = TrainedSnapshot::train(abc(), &three_feature_config(2)).unwrap();
        let recs = snapshot.recommend_by_id("A", 2).unwrap();
        assert_eq!(recs[0].track.id, "B");
        assert!(recs.iter().all(|r| r.track.id != "A"));
        assert!(recs.iter().all(|r| r.track.id != "C"));
        assert!(recs.iter().all(|r| (0.0..=1.0).contains(&r.score)));
    }

    #[test]
    fn test_unknown_id_is_not_found() {
        let snapshot = TrainedSnapshot::train(abc(), &three_feature_config(2)).unwrap();
        assert!(matches!(
            snapshot.recommend_by_id("nope", 3),
            Err(RecommendError::NotFound(_))
        ));
    }

    #[test]
    fn test_strict_mode_reports_empty_result() {
        let mut config = three_feature_config(2);
        config.scoring.significance_threshold = 0.999_999_9;
        let lenient = TrainedSnapshot::train(abc(), &config).unwrap();
        assert!(lenient.recommend_by_id("C", 5).unwrap().is_empty());

        config.strict = true;
        let strict = TrainedSnapshot::train(abc(), &config).unwrap();
        assert!(matches!(
            strict.recommend_by_id("C", 5),
            Err(RecommendError::NoRecommendation { .. })
        ));
    }

    #[test]
    fn test_recommend_by_features_returns_original_units() {
        let snapshot = TrainedSnapshot::train(abc(), &three_feature_config(2)).unwrap();
        let raw: HashMap<String, f64> = [("danceability", 0.88), ("energy", 0.78), ("valence", 0.68)]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();

        let result = snapshot.recommend_by_features(&raw, 3, None).unwrap();
        let top = &result.recommendations[0];
        assert!(top.track.id == "A" || top.track.id == "B");

        let features = result.recommended_features.unwrap();
        assert!((features["danceability"] - top.track.audio.danceability).abs() < 1e-9);
    }

    #[test]
    fn test_recommend_by_features_validates_names() {
        let snapshot = TrainedSnapshot::train(abc(), &three_feature_config(2)).unwrap();
        let raw: HashMap<String, f64> = [("danceability".to_string(), 0.5)].into_iter().collect();
        assert!(matches!(
            snapshot.recommend_by_features(&raw, 3, None),
            Err(RecommendError::InvalidFeatures(_))
        ));
    }

    #[test]
    fn test_retrain_swaps_snapshot_without_disturbing_holders() {
        let engine = RecommendationEngine::new(three_feature_config(2));
        assert!(matches!(engine.retrain(abc()), Err(RecommendError::NotReady(_))));

        engine.initialize(|| Ok(abc())).unwrap();
        let before = engine.snapshot().unwrap();

        let mut tracks = abc().tracks().to_vec();
        tracks.push(track("D", "pop", 0.8, 0.7, 0.6));
        engine.retrain(Catalog::new(tracks).unwrap()).unwrap();

        let after = engine.snapshot().unwrap();
        assert_eq!(before.catalog().len(), 3);
        assert_eq!(after.catalog().len(), 4);
        assert!(before.recommend_by_id("A", 3).is_ok());
        assert!(engine.get_track("D").is_ok());
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = EngineConfig {
            test_fraction: 1.0,
            ..EngineConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
