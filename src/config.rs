//! # Configuration Module
//!
//! Runtime configuration for Sonance: where the track catalog lives and how
//! the engine is tuned. Configuration is a JSON file; a missing file means
//! defaults.
//!
//! ## Locations
//!
//! Sonance follows platform conventions via `dirs`:
//! - Catalog: `<data_dir>/sonance/catalog.csv`
//!   (Linux `~/.local/share/sonance/`, macOS `~/Library/Application Support/sonance/`)
//! - Config: `<config_dir>/sonance/config.json`
//!   (Linux `~/.config/sonance/`, macOS `~/Library/Application Support/sonance/`)
//!
//! Both can be overridden from the command line or with the
//! `SONANCE_CATALOG` and `SONANCE_CONFIG` environment variables.

use crate::engine::EngineConfig;
use anyhow::{Context, Result};
use log::{debug, info};
use path_absolutize::Absolutize;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const APP_DIR: &str = "sonance";

/// Returns the platform-appropriate data directory for Sonance, creating it
/// if needed.
///
/// # Errors
///
/// Fails if the system data directory cannot be determined or the
/// `sonance` subdirectory cannot be created.
pub fn get_data_dir() -> Result<PathBuf> {
    let data_dir = dirs::data_dir().ok_or_else(|| {
        anyhow::anyhow!(
            "Could not determine system data directory. Please ensure your platform supports standard data directories."
        )
    })?;

    let sonance_dir = data_dir.join(APP_DIR);
    fs::create_dir_all(&sonance_dir).with_context(|| {
        format!(
            "Failed to create Sonance data directory at {}. Please check file permissions.",
            sonance_dir.display()
        )
    })?;

    Ok(sonance_dir)
}

/// Default catalog location: `<data_dir>/sonance/catalog.csv`.
///
/// # Errors
///
/// Same as [`get_data_dir`].
pub fn default_catalog_path() -> Result<PathBuf> {
    Ok(get_data_dir()?.join("catalog.csv"))
}

/// Default config location: `<config_dir>/sonance/config.json`.
///
/// The directory is not created; a missing config file is not an error.
///
/// # Errors
///
/// Fails if the system config directory cannot be determined.
pub fn default_config_path() -> Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .ok_or_else(|| anyhow::anyhow!("Could not determine system config directory"))?;
    Ok(config_dir.join(APP_DIR).join("config.json"))
}

/// Make a path absolute against the current directory without touching the
/// filesystem.
///
/// # Errors
///
/// Fails if the current directory cannot be read.
pub fn absolute_path(path: &Path) -> Result<PathBuf> {
    Ok(path
        .absolutize()
        .with_context(|| format!("Failed to resolve path {}", path.display()))?
        .into_owned())
}

/// Configuration for one run of Sonance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// CSV track catalog to train on
    pub catalog_path: PathBuf,
    /// Training and scoring parameters
    pub engine: EngineConfig,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            catalog_path: default_catalog_path().unwrap_or_else(|_| PathBuf::from("catalog.csv")),
            engine: EngineConfig::default(),
        }
    }
}

impl RuntimeConfig {
    /// Load configuration from a JSON file.
    ///
    /// A missing file yields the defaults. The catalog path is made absolute
    /// and the engine settings are validated.
    ///
    /// # Errors
    ///
    /// Fails on unreadable or malformed JSON, or invalid engine settings.
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let text = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            let config: Self = serde_json::from_str(&text)
                .with_context(|| format!("Invalid config file {}", path.display()))?;
            info!("Loaded configuration from {}", path.display());
            config
        } else {
            debug!("No config file at {}, using defaults", path.display());
            Self::default()
        };

        config.catalog_path = absolute_path(&config.catalog_path)?;
        config.engine.validate()?;
        Ok(config)
    }

    /// Write configuration as pretty JSON, creating parent directories.
    ///
    /// # Errors
    ///
    /// Fails if the directory or file cannot be written.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).with_context(|| format!("Failed to write config file {}", path.display()))?;
        Ok(())
    }

    /// Same configuration reading a different catalog.
    ///
    /// # Errors
    ///
    /// Fails if the path cannot be made absolute.
    pub fn with_catalog_path(self, catalog_path: &Path) -> Result<Self> {
        Ok(Self {
            catalog_path: absolute_path(catalog_path)?,
            ..self
        })
    }
}
