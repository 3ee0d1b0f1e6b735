//! Hybrid music recommendations from audio features.
//!
//! Two signals are blended for every candidate track: coarse cluster
//! co-membership from k-means over standardized features, and fine-grained
//! weighted cosine similarity. Tracks sharing the query's genre get a boost,
//! scores are min-max normalized and only significant candidates are
//! returned.
//!
//! Core modules:
//! - [`scaler`] - Per-feature standardization
//! - [`cluster`] - K-means model (k-means++ seeding, parallel restarts)
//! - [`similarity`] - Feature-weighted cosine similarity
//! - [`algorithm`] - Hybrid scorer: blend, boost, normalize, exclude, select
//! - [`engine`] - Training snapshots, lifecycle and queries
//! - [`evaluate`] - Held-out silhouette, cohesion, feature importance
//!
//! ### Supporting Modules
//!
//! - [`track`] - Track and audio feature model
//! - [`catalog`] - CSV ingestion, lookup, search and train/test split
//! - [`error`] - Typed error taxonomy
//! - [`config`] - Configuration files and data directory management
//! - [`cli`] - Command-line interface definitions with clap integration
//! - [`completion`] - Shell completion generation
//!
//! ## Quick Start Example
//!
//! ```no_run
//! use sonance::catalog::Catalog;
//! use sonance::engine::{EngineConfig, RecommendationEngine};
//! use std::collections::HashMap;
//! use std::path::Path;
//!
//! let engine = RecommendationEngine::new(EngineConfig::default());
//! engine.initialize(|| Catalog::from_csv_path(Path::new("dataset.csv")))?;
//!
//! // Similar tracks to a known one
//! let similar = engine.recommend_by_id("5SuOikwiRyPMVoIQDJUgSV", 5)?;
//!
//! // Tracks for a feature profile
//! let profile: HashMap<String, f64> = [
//!     ("danceability", 0.8),
//!     ("energy", 0.7),
//!     ("valence", 0.6),
//!     ("acousticness", 0.1),
//!     ("instrumentalness", 0.0),
//!     ("liveness", 0.1),
//! ]
//! .into_iter()
//! .map(|(k, v)| (k.to_string(), v))
//! .collect();
//! let result = engine.recommend_by_features(&profile, 5, None)?;
//! println!("{} similar, {} by profile", similar.len(), result.recommendations.len());
//!
//! // Diagnostics
//! let report = engine.evaluate()?;
//! println!("silhouette {:.3}", report.silhouette);
//! # Ok::<(), sonance::error::RecommendError>(())
//! ```
//!
//! ## Determinism
//!
//! The train/test split and every k-means restart use seeded `StdRng`s.
//! Restarts run in parallel but are compared in restart order, so the same
//! catalog and configuration always produce the same model.

pub mod algorithm;
pub mod catalog;
pub mod cli;
pub mod cluster;
pub mod completion;
pub mod config;
pub mod engine;
pub mod error;
pub mod evaluate;
pub mod scaler;
pub mod similarity;
pub mod track;
