//! # Sonance - Hybrid Music Recommender
//!
//! Command-line front end: loads the configured catalog, trains the
//! recommendation engine and answers one query per invocation.
//!
//! ## Usage
//!
//! ```bash
//! # Find a track id
//! sonance search "bohemian"
//!
//! # Tracks like it
//! sonance recommend 7tFiyTwD0nx5a1eklYtX2J --limit 10
//!
//! # Tracks matching a feature profile, leaning on clusters
//! sonance like danceability=0.8 energy=0.9 valence=0.7 acousticness=0.05 \
//!     instrumentalness=0.0 liveness=0.1 --cluster-weight 0.6 --content-weight 0.4
//!
//! # Model diagnostics as JSON
//! sonance --json evaluate
//! ```
//!
//! Logging is controlled via `RUST_LOG`:
//! - `RUST_LOG=info sonance evaluate` - training progress and cluster sizes
//! - `RUST_LOG=sonance::algorithm=trace sonance recommend <id>` - score distributions

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use log::{debug, info, warn};
use serde::Serialize;
use sonance::algorithm::ScoringContext;
use sonance::catalog::Catalog;
use sonance::cli::{self, BlendArgs};
use sonance::completion;
use sonance::config::{self, RuntimeConfig};
use sonance::engine::{Recommendation, RecommendationEngine};
use sonance::error::RecommendError;
use sonance::evaluate::EvaluationReport;
use sonance::track::{AudioFeature, Track};
use std::collections::HashMap;

/// Resolve configuration from `--config`/`SONANCE_CONFIG` (or the default
/// location), then apply `--catalog`/`SONANCE_CATALOG`.
fn resolve_config(args: &cli::Args) -> Result<RuntimeConfig> {
    let config_path = match &args.config {
        Some(path) => path.clone(),
        None => config::default_config_path()?,
    };
    let config = RuntimeConfig::load(&config_path)?;
    match &args.catalog {
        Some(catalog) => config.with_catalog_path(catalog),
        None => Ok(config),
    }
}

/// Load the catalog and train; any failure aborts before serving.
fn train(config: &RuntimeConfig) -> Result<RecommendationEngine> {
    let engine = RecommendationEngine::new(config.engine.clone());
    engine
        .initialize(|| Catalog::from_csv_path(&config.catalog_path))
        .with_context(|| {
            format!(
                "Failed to build recommendation engine from {}",
                config.catalog_path.display()
            )
        })?;
    Ok(engine)
}

fn blended(base: ScoringContext, blend: BlendArgs) -> ScoringContext {
    base.with_blend(
        blend.cluster_weight.unwrap_or(base.cluster_weight),
        blend.content_weight.unwrap_or(base.content_weight),
    )
}

/// Log query failures before handing them to anyhow.
fn query<T>(result: Result<T, RecommendError>) -> Result<T> {
    result.map_err(|e| {
        if e.is_query_error() {
            warn!("Query failed: {e}");
        }
        e.into()
    })
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_tracks(tracks: &[Track]) {
    if tracks.is_empty() {
        println!("No tracks found");
        return;
    }
    println!("{:<24} {:<30} {:<30} {:<12}", "ID", "Artists", "Track", "Genre");
    println!("{}", "-".repeat(99));
    for track in tracks {
        println!(
            "{:<24} {:<30} {:<30} {:<12}",
            track.id,
            truncate(&track.artists, 30),
            truncate(&track.name, 30),
            truncate(&track.genre, 12)
        );
    }
}

fn print_track(track: &Track) {
    println!("{} - {}", track.artists, track.name);
    println!("  id:         {}", track.id);
    println!("  album:      {}", track.album);
    println!("  genre:      {}", track.genre);
    println!("  popularity: {}", track.popularity);
    println!("  duration:   {}s", track.duration_ms / 1000);
    println!("  explicit:   {}", track.explicit);
    println!();
    for feature in AudioFeature::ALL {
        println!("  {:<17} {:>9.3}", feature.name(), track.audio.get(feature));
    }
}

fn print_recommendations(recommendations: &[Recommendation], verbose: bool) {
    if recommendations.is_empty() {
        println!("No recommendations above the significance threshold");
        return;
    }
    println!("{:>3} {:>6} {:<24} {:<30} {:<30}", "#", "Score", "ID", "Artists", "Track");
    println!("{}", "-".repeat(97));
    for (rank, rec) in recommendations.iter().enumerate() {
        println!(
            "{:>3} {:>6.3} {:<24} {:<30} {:<30}",
            rank + 1,
            rec.score,
            rec.track.id,
            truncate(&rec.track.artists, 30),
            truncate(&rec.track.name, 30)
        );
        if verbose {
            println!(
                "           raw {:.3} = cluster {:.3} + content {:.3} + genre {:.3} [{}]",
                rec.raw_score,
                rec.breakdown.cluster,
                rec.breakdown.content,
                rec.breakdown.genre_boost,
                rec.track.genre
            );
        }
    }
}

fn print_evaluation(report: &EvaluationReport) {
    println!("Training tracks:  {}", report.train_size);
    println!("Held-out tracks:  {}", report.test_size);
    println!("Silhouette score: {:.4}", report.silhouette);
    match report.mean_intra_cluster_similarity {
        Some(similarity) => println!("Intra-cluster similarity: {similarity:.4}"),
        None => println!("Intra-cluster similarity: n/a"),
    }
    println!();
    println!("Cluster sizes:");
    for (cluster, size) in report.cluster_sizes.iter().enumerate() {
        println!("  {cluster:>3}: {size}");
    }
    println!();
    println!("Feature importance:");
    for entry in &report.feature_importance {
        println!("  {:<17} {:.4}", entry.feature, entry.importance);
    }
}

fn truncate(s: &str, width: usize) -> String {
    if s.chars().count() <= width {
        s.to_string()
    } else {
        let mut out: String = s.chars().take(width.saturating_sub(1)).collect();
        out.push('…');
        out
    }
}

/// Main entry point for the Sonance application.
///
/// Initializes logging, parses command-line arguments and routes commands.
/// Completion commands never train the engine.
fn main() -> Result<()> {
    env_logger::init();

    let args = cli::Args::parse();

    match &args.command {
        cli::Command::Completion { shell } => {
            let mut cmd = cli::Args::command();
            completion::generate_completions(completion::shell_to_completion_shell(shell), &mut cmd);
            return Ok(());
        }
        cli::Command::CompletionEnhanced { shell } => {
            match shell {
                cli::Shell::Bash => print!("{}", completion::enhanced_bash_completion()),
                cli::Shell::Fish => print!("{}", completion::enhanced_fish_completion()),
                _ => return Err(anyhow::anyhow!("Enhanced completions only supported for bash and fish")),
            }
            return Ok(());
        }
        cli::Command::CompleteTracks { fish } => {
            // completion must stay silent on a broken setup
            if let Ok(config) = resolve_config(&args) {
                completion::print_track_completions(&config.catalog_path, *fish)?;
            }
            return Ok(());
        }
        _ => {}
    }

    let mut config = resolve_config(&args)?;
    if let cli::Command::Recommend { strict: true, .. } = &args.command {
        config.engine.strict = true;
    }
    debug!("Using catalog {}", config.catalog_path.display());

    let engine = train(&config)?;

    match args.command {
        cli::Command::Search { query: text, limit } => {
            info!("Searching catalog for: {text}");
            let tracks = query(engine.search(&text, limit))?;
            if args.json {
                print_json(&tracks)?;
            } else {
                print_tracks(&tracks);
            }
        }
        cli::Command::Show { id } => {
            let track = query(engine.get_track(&id))?;
            if args.json {
                print_json(&track)?;
            } else {
                print_track(&track);
            }
        }
        cli::Command::Recommend { id, limit, blend, verbose, .. } => {
            info!("Recommending {limit} tracks similar to: {id}");
            let scoring = blended(config.engine.scoring, blend);
            let snapshot = query(engine.snapshot())?;
            let recommendations = query(snapshot.recommend_by_id_with(&id, limit, &scoring))?;
            if args.json {
                print_json(&recommendations)?;
            } else {
                print_recommendations(&recommendations, verbose);
            }
        }
        cli::Command::Like { features, limit, blend } => {
            let raw: HashMap<String, f64> = features.into_iter().collect();
            let scoring = blended(config.engine.scoring, blend);
            let result = query(engine.recommend_by_features(&raw, limit, Some(&scoring)))?;
            if args.json {
                print_json(&result)?;
            } else {
                print_recommendations(&result.recommendations, false);
                if let Some(profile) = &result.recommended_features {
                    println!();
                    println!("Closest feature profile:");
                    for (name, value) in profile {
                        println!("  {name:<17} {value:>9.3}");
                    }
                }
            }
        }
        cli::Command::Evaluate => {
            let report = query(engine.evaluate())?;
            if args.json {
                print_json(&report)?;
            } else {
                print_evaluation(&report);
            }
        }
        cli::Command::Completion { .. }
        | cli::Command::CompletionEnhanced { .. }
        | cli::Command::CompleteTracks { .. } => {}
    }

    Ok(())
}
