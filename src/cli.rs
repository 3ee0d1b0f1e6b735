//! # Command-Line Interface Module
//!
//! This module defines the command-line interface for Sonance using Clap
//! derive macros. Every command trains the engine from the configured
//! catalog, runs one query and prints the result.
//!
//! ## Commands
//!
//! - `search`: Find tracks by name, artist or album
//! - `show`: Display one track and its audio features
//! - `recommend`: Recommend tracks similar to a known track
//! - `like`: Recommend tracks for a hand-written feature profile
//! - `evaluate`: Report held-out cluster quality and feature importance
//!
//! ## Examples
//!
//! ```bash
//! sonance search "daft punk"
//! sonance recommend 0a0OvvNBtGX2yDK7aGxFMJ --limit 10 --verbose
//! sonance like danceability=0.8 energy=0.7 valence=0.6 acousticness=0.1 \
//!     instrumentalness=0.0 liveness=0.1
//! sonance --json evaluate
//! ```

use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Shell types supported for completion generation
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug)]
#[allow(clippy::enum_variant_names)]
pub enum Shell {
    /// Bash shell
    Bash,
    /// Zsh shell
    Zsh,
    /// Fish shell
    Fish,
    /// PowerShell
    PowerShell,
    /// Elvish shell
    Elvish,
}

/// Main application arguments structure.
#[derive(Parser, Debug)]
#[command(name = "sonance")]
#[command(about = "Sonance: hybrid music recommendations from audio features")]
#[command(version)]
pub struct Args {
    /// Track catalog CSV (overrides the config file)
    #[arg(long, global = true, env = "SONANCE_CATALOG", value_hint = clap::ValueHint::FilePath)]
    pub catalog: Option<PathBuf>,

    /// Configuration file
    #[arg(long, global = true, env = "SONANCE_CONFIG", value_hint = clap::ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    /// Print machine-readable JSON instead of a table
    #[arg(long, global = true)]
    pub json: bool,

    /// The subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Blend weight overrides shared by the recommendation commands.
#[derive(ClapArgs, Debug, Clone, Copy, Default)]
pub struct BlendArgs {
    /// Weight of shared cluster membership
    #[arg(long)]
    pub cluster_weight: Option<f64>,

    /// Weight of weighted feature similarity
    #[arg(long)]
    pub content_weight: Option<f64>,
}

/// Enumeration of all available subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Search the catalog by track name, artist or album
    ///
    /// Case-insensitive substring match; queries shorter than two
    /// characters return nothing.
    Search {
        /// Text to look for
        query: String,

        /// Maximum number of results
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },

    /// Show one track and its audio features
    Show {
        /// Track id
        #[arg(value_hint = clap::ValueHint::Other)]
        id: String,
    },

    /// Recommend tracks similar to a known track
    ///
    /// Candidates are scored by cluster co-membership, weighted feature
    /// similarity and a same-genre boost, then normalized; only tracks
    /// above the significance threshold are listed.
    Recommend {
        /// Track id to start from
        #[arg(value_hint = clap::ValueHint::Other)]
        id: String,

        /// Maximum number of recommendations
        #[arg(short, long, default_value = "5")]
        limit: usize,

        #[command(flatten)]
        blend: BlendArgs,

        /// Fail when nothing clears the significance threshold
        #[arg(long)]
        strict: bool,

        /// Show the per-signal score breakdown
        #[arg(short, long)]
        verbose: bool,
    },

    /// Recommend tracks for a feature profile
    ///
    /// Every configured feature must be given exactly once as name=value,
    /// in original units (e.g. danceability=0.8 tempo=120).
    Like {
        /// Feature values as name=value
        #[arg(required = true, value_parser = parse_feature_pair)]
        features: Vec<(String, f64)>,

        /// Maximum number of recommendations
        #[arg(short, long, default_value = "5")]
        limit: usize,

        #[command(flatten)]
        blend: BlendArgs,
    },

    /// Evaluate cluster quality on the held-out tracks
    Evaluate,

    /// Generate shell completions
    ///
    /// Usage: sonance completion bash > ~/.local/share/bash-completion/completions/sonance
    Completion {
        /// Shell to generate completions for
        shell: Shell,
    },

    /// Generate enhanced completion with track id completion
    ///
    /// Usage: sonance completion-enhanced bash > ~/.local/share/bash-completion/completions/sonance
    /// Usage: sonance completion-enhanced fish > ~/.config/fish/completions/sonance.fish
    CompletionEnhanced {
        /// Shell to generate enhanced completions for (bash and fish)
        shell: Shell,
    },

    /// List track ids for completion (hidden command)
    #[command(hide = true)]
    CompleteTracks {
        /// Print "id<TAB>description" for fish
        #[arg(long)]
        fish: bool,
    },
}

/// Parse one `name=value` feature argument.
///
/// # Errors
///
/// Returns a message when the `=` is missing or the value is not a finite
/// number.
pub fn parse_feature_pair(s: &str) -> Result<(String, f64), String> {
    let (name, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected name=value, got '{s}'"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("missing feature name in '{s}'"));
    }
    let value: f64 = value
        .trim()
        .parse()
        .map_err(|_| format!("'{}' is not a number", value.trim()))?;
    if !value.is_finite() {
        return Err(format!("{name} must be finite"));
    }
    Ok((name.to_string(), value))
}
