//! # Catalog
//!
//! Ordered, id-unique collection of [`Track`]s plus the CSV ingestion that
//! builds it, the lookup/search queries served straight from it, and the
//! one-time seeded train/test split.
//!
//! ## CSV format
//!
//! One row per track with a header naming at least [`REQUIRED_COLUMNS`].
//! Extra columns are ignored. Any malformed, missing or out-of-range value
//! fails the whole load with the offending line number; nothing is coerced
//! to a default.

use crate::error::{RecommendError, Result};
use crate::track::{AudioFeatures, Track};
use log::{debug, info};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Deserializer};
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Queries shorter than this (after trimming) return nothing.
pub const MIN_SEARCH_LEN: usize = 2;

pub const REQUIRED_COLUMNS: [&str; 20] = [
    "track_id",
    "artists",
    "album_name",
    "track_name",
    "popularity",
    "duration_ms",
    "explicit",
    "danceability",
    "energy",
    "key",
    "loudness",
    "mode",
    "speechiness",
    "acousticness",
    "instrumentalness",
    "liveness",
    "valence",
    "tempo",
    "time_signature",
    "track_genre",
];

/// Row layout of the source CSV.
#[derive(Debug, Deserialize)]
struct CsvRow {
    track_id: String,
    artists: String,
    album_name: String,
    track_name: String,
    popularity: u32,
    duration_ms: u64,
    #[serde(deserialize_with = "deserialize_flag")]
    explicit: bool,
    danceability: f64,
    energy: f64,
    key: i32,
    loudness: f64,
    mode: i32,
    speechiness: f64,
    acousticness: f64,
    instrumentalness: f64,
    liveness: f64,
    valence: f64,
    tempo: f64,
    time_signature: i32,
    track_genre: String,
}

fn deserialize_flag<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<bool, D::Error> {
    let raw = String::deserialize(deserializer)?;
    match raw.trim() {
        "True" | "true" | "TRUE" | "1" => Ok(true),
        "False" | "false" | "FALSE" | "0" => Ok(false),
        other => Err(serde::de::Error::custom(format!("invalid boolean `{other}`"))),
    }
}

impl CsvRow {
    fn into_track(self) -> std::result::Result<Track, String> {
        if self.track_id.trim().is_empty() {
            return Err("track_id is empty".to_string());
        }

        let unit_range = [
            ("danceability", self.danceability),
            ("energy", self.energy),
            ("speechiness", self.speechiness),
            ("acousticness", self.acousticness),
            ("instrumentalness", self.instrumentalness),
            ("liveness", self.liveness),
            ("valence", self.valence),
        ];
        for (name, value) in unit_range {
            if !(0.0..=1.0).contains(&value) {
                return Err(format!("{name} must be within [0, 1], got {value}"));
            }
        }
        if !self.tempo.is_finite() || self.tempo < 0.0 {
            return Err(format!("tempo must be a non-negative BPM value, got {}", self.tempo));
        }
        if !self.loudness.is_finite() {
            return Err(format!("loudness must be finite, got {}", self.loudness));
        }
        if !(-1..=11).contains(&self.key) {
            return Err(format!("key must be within -1..=11, got {}", self.key));
        }
        if !(0..=1).contains(&self.mode) {
            return Err(format!("mode must be 0 or 1, got {}", self.mode));
        }
        if self.popularity > 100 {
            return Err(format!("popularity must be within 0..=100, got {}", self.popularity));
        }

        Ok(Track {
            id: self.track_id,
            name: self.track_name,
            artists: self.artists,
            album: self.album_name,
            genre: self.track_genre,
            popularity: self.popularity,
            duration_ms: self.duration_ms,
            explicit: self.explicit,
            audio: AudioFeatures {
                danceability: self.danceability,
                energy: self.energy,
                key: self.key,
                loudness: self.loudness,
                mode: self.mode,
                speechiness: self.speechiness,
                acousticness: self.acousticness,
                instrumentalness: self.instrumentalness,
                liveness: self.liveness,
                valence: self.valence,
                tempo: self.tempo,
                time_signature: self.time_signature,
            },
        })
    }
}

/// Disjoint train/test assignment by catalog index.
///
/// Both lists are ascending, so each partition keeps catalog order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Ordered, id-unique track collection.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    tracks: Vec<Track>,
    index: HashMap<String, usize>,
}

impl Catalog {
    /// # Errors
    ///
    /// `Catalog` error when two tracks share an id.
    pub fn new(tracks: Vec<Track>) -> Result<Self> {
        let mut index = HashMap::with_capacity(tracks.len());
        for (position, track) in tracks.iter().enumerate() {
            if index.insert(track.id.clone(), position).is_some() {
                return Err(RecommendError::Catalog {
                    // header + 1-based row
                    line: position as u64 + 2,
                    message: format!("duplicate track id `{}`", track.id),
                });
            }
        }
        Ok(Self { tracks, index })
    }

    /// Load a catalog CSV from disk.
    ///
    /// # Errors
    ///
    /// `Io` if the file cannot be opened, `Catalog` for any bad row.
    pub fn from_csv_path(path: &Path) -> Result<Self> {
        info!("Loading catalog from {}", path.display());
        let file = File::open(path)?;
        Self::from_csv_reader(file)
    }

    /// Parse catalog CSV from any reader.
    ///
    /// # Errors
    ///
    /// `Catalog` for a missing column, an unparsable or out-of-range value,
    /// or a duplicate id.
    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers = reader
            .headers()
            .map_err(|e| RecommendError::Catalog {
                line: 1,
                message: format!("failed to read header: {e}"),
            })?
            .clone();

        if let Some(missing) = REQUIRED_COLUMNS
            .iter()
            .find(|column| !headers.iter().any(|h| h == **column))
        {
            return Err(RecommendError::Catalog {
                line: 1,
                message: format!("missing required column `{missing}`"),
            });
        }

        let mut tracks = Vec::new();
        for record in reader.records() {
            let record = record.map_err(|e| RecommendError::Catalog {
                line: e.position().map_or(0, csv::Position::line),
                message: e.to_string(),
            })?;
            let line = record.position().map_or(0, csv::Position::line);

            let row: CsvRow = record
                .deserialize(Some(&headers))
                .map_err(|e| RecommendError::Catalog { line, message: e.to_string() })?;
            let track = row
                .into_track()
                .map_err(|message| RecommendError::Catalog { line, message })?;
            tracks.push(track);
        }

        debug!("Parsed {} catalog rows", tracks.len());
        Self::new(tracks)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    #[must_use]
    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    #[must_use]
    pub fn track(&self, position: usize) -> Option<&Track> {
        self.tracks.get(position)
    }

    /// Catalog position of `id`.
    #[must_use]
    pub fn position(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    /// # Errors
    ///
    /// `NotFound` for an unknown id.
    pub fn get_track(&self, id: &str) -> Result<&Track> {
        self.position(id)
            .map(|p| &self.tracks[p])
            .ok_or_else(|| RecommendError::NotFound(id.to_string()))
    }

    /// Case-insensitive substring search over name, artists and album.
    ///
    /// Returns at most `limit` tracks in catalog order. Queries shorter than
    /// [`MIN_SEARCH_LEN`] yield nothing.
    #[must_use]
    pub fn search(&self, query: &str, limit: usize) -> Vec<&Track> {
        let needle = query.trim().to_lowercase();
        if needle.chars().count() < MIN_SEARCH_LEN {
            return Vec::new();
        }
        self.tracks
            .iter()
            .filter(|track| track.matches(&needle))
            .take(limit)
            .collect()
    }

    /// Seeded split: `ceil(len * test_fraction)` tracks go to the test side.
    #[must_use]
    pub fn split(&self, test_fraction: f64, seed: u64) -> Partition {
        let n = self.tracks.len();
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
        let n_test = ((n as f64) * test_fraction.clamp(0.0, 1.0)).ceil() as usize;

        let mut order: Vec<usize> = (0..n).collect();
        let mut rng = StdRng::seed_from_u64(seed);
        order.shuffle(&mut rng);

        let mut test = order[..n_test.min(n)].to_vec();
        let mut train = order[n_test.min(n)..].to_vec();
        test.sort_unstable();
        train.sort_unstable();

        Partition { train, test }
    }
}
