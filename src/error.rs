//! Error types for the recommendation core.
//!
//! Training-phase errors (`EmptyInput`, `InsufficientData`, `InvalidConfig`,
//! `Catalog`) are fatal for startup. Query-phase errors (`NotFound`,
//! `NoRecommendation`, `InvalidFeatures`) are recovered at the query boundary.

use crate::engine::EngineState;
use thiserror::Error;

/// Every failure the library can report.
#[derive(Debug, Error)]
pub enum RecommendError {
    /// Unknown track id.
    #[error("track `{0}` not found")]
    NotFound(String),

    /// A query or diagnostic ran before the engine reached `Ready`.
    #[error("recommendation engine is not ready (state: {0})")]
    NotReady(EngineState),

    /// Zero rows where at least one was required.
    #[error("empty input: {0}")]
    EmptyInput(String),

    /// Fewer training rows than requested clusters.
    #[error("insufficient data: {rows} training rows for {k} clusters")]
    InsufficientData { rows: usize, k: usize },

    /// Scaler used before `fit`.
    #[error("feature scaler used before fit")]
    NotFitted,

    /// Every candidate fell below the significance threshold (strict mode only).
    #[error("no candidate scored above the significance threshold {threshold}")]
    NoRecommendation { threshold: f64 },

    /// Feature names or vector widths do not match the declared feature set.
    #[error("invalid features: {0}")]
    InvalidFeatures(String),

    /// Engine configuration failed validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Catalog ingestion failed; `line` is 1-based and counts the header.
    #[error("catalog load failed at line {line}: {message}")]
    Catalog { line: u64, message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl RecommendError {
    /// True for failures a serving loop should report and move past.
    #[must_use]
    pub fn is_query_error(&self) -> bool {
        matches!(
            self,
            Self::NotFound(_) | Self::NoRecommendation { .. } | Self::InvalidFeatures(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, RecommendError>;
