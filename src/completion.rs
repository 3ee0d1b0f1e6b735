//! # Shell Completion Module
//!
//! Shell completion for Sonance:
//! - Static completion scripts generated by `clap_complete`
//! - Enhanced bash and fish scripts that complete track ids from the catalog
//!   through the hidden `complete-tracks` command
//!
//! ## Usage
//!
//! ```bash
//! # Generate bash completions
//! sonance completion bash > ~/.local/share/bash-completion/completions/sonance
//!
//! # Track id completion for fish
//! sonance completion-enhanced fish > ~/.config/fish/completions/sonance.fish
//! ```

use crate::catalog::Catalog;
use crate::cli::Shell;
use clap::Command;
use clap_complete::{generate, Generator, Shell as CompletionShell};
use std::io::{self, Write};
use std::path::Path;

/// Generate shell completions for the given shell
pub fn generate_completions<G: Generator>(gen: G, cmd: &mut Command) {
    generate(gen, cmd, cmd.get_name().to_string(), &mut io::stdout());
}

/// Enhanced fish completion script with track id completion
#[must_use]
pub fn enhanced_fish_completion() -> &'static str {
    r#"# Enhanced Sonance completion script for Fish shell with track id completion
# Install with: sonance completion-enhanced fish > ~/.config/fish/completions/sonance.fish

function __sonance_complete_tracks
    if command -sq sonance
        sonance complete-tracks --fish 2>/dev/null
    end
end

complete -c sonance -e

# Global options
complete -c sonance -s h -l help -d 'Print help information'
complete -c sonance -s V -l version -d 'Print version information'
complete -c sonance -l catalog -r -F -d 'Track catalog CSV'
complete -c sonance -l config -r -F -d 'Configuration file'
complete -c sonance -l json -d 'Print machine-readable JSON'

# Main commands
complete -c sonance -f -n '__fish_use_subcommand' -a 'search' -d 'Search the catalog by track name, artist or album'
complete -c sonance -f -n '__fish_use_subcommand' -a 'show' -d 'Show one track and its audio features'
complete -c sonance -f -n '__fish_use_subcommand' -a 'recommend' -d 'Recommend tracks similar to a known track'
complete -c sonance -f -n '__fish_use_subcommand' -a 'like' -d 'Recommend tracks for a feature profile'
complete -c sonance -f -n '__fish_use_subcommand' -a 'evaluate' -d 'Evaluate cluster quality on the held-out tracks'
complete -c sonance -f -n '__fish_use_subcommand' -a 'completion' -d 'Generate shell completions'
complete -c sonance -f -n '__fish_use_subcommand' -a 'completion-enhanced' -d 'Generate enhanced shell completions'

# Track ids
complete -c sonance -f -n '__fish_seen_subcommand_from show recommend' -a '(__sonance_complete_tracks)'

complete -c sonance -f -n '__fish_seen_subcommand_from search recommend like' -s l -l limit -r -d 'Maximum number of results'
complete -c sonance -f -n '__fish_seen_subcommand_from recommend like' -l cluster-weight -r -d 'Weight of shared cluster membership'
complete -c sonance -f -n '__fish_seen_subcommand_from recommend like' -l content-weight -r -d 'Weight of feature similarity'
complete -c sonance -f -n '__fish_seen_subcommand_from recommend' -l strict -d 'Fail when nothing clears the threshold'
complete -c sonance -f -n '__fish_seen_subcommand_from recommend' -s v -l verbose -d 'Show the score breakdown'

# Feature names for like
complete -c sonance -f -n '__fish_seen_subcommand_from like' -a 'danceability= energy= key= loudness= mode= speechiness= acousticness= instrumentalness= liveness= valence= tempo= time_signature='

complete -c sonance -f -n '__fish_seen_subcommand_from completion' -a 'bash zsh fish power-shell elvish'
complete -c sonance -f -n '__fish_seen_subcommand_from completion-enhanced' -a 'bash fish'
"#
}

/// Enhanced bash completion script with track id completion
#[must_use]
pub fn enhanced_bash_completion() -> &'static str {
    r#"#!/bin/bash
# Enhanced Sonance completion script with track id completion
# Install with: sonance completion-enhanced bash > ~/.local/share/bash-completion/completions/sonance

_sonance_complete_tracks() {
    if command -v sonance >/dev/null 2>&1; then
        sonance complete-tracks 2>/dev/null
    fi
}

_sonance() {
    local cur prev words cword
    _init_completion || return

    case "${prev}" in
        show|recommend)
            mapfile -t COMPREPLY < <(_sonance_complete_tracks | grep "^${cur}")
            return 0
            ;;
        completion)
            COMPREPLY=($(compgen -W "bash zsh fish power-shell elvish" -- "${cur}"))
            return 0
            ;;
        completion-enhanced)
            COMPREPLY=($(compgen -W "bash fish" -- "${cur}"))
            return 0
            ;;
        --catalog|--config)
            _filedir
            return 0
            ;;
        --limit|-l)
            COMPREPLY=($(compgen -W "3 5 10 20" -- "${cur}"))
            return 0
            ;;
    esac

    local subcommands="search show recommend like evaluate completion completion-enhanced help"
    local features="danceability= energy= key= loudness= mode= speechiness= acousticness= instrumentalness= liveness= valence= tempo= time_signature="

    if [[ $cword -eq 1 ]]; then
        COMPREPLY=($(compgen -W "$subcommands --catalog --config --json --help --version" -- "${cur}"))
    else
        case "${words[1]}" in
            search)
                COMPREPLY=($(compgen -W "--limit --help" -- "${cur}"))
                ;;
            recommend)
                COMPREPLY=($(compgen -W "--limit --cluster-weight --content-weight --strict --verbose --help" -- "${cur}"))
                ;;
            like)
                compopt -o nospace
                COMPREPLY=($(compgen -W "$features --limit --cluster-weight --content-weight" -- "${cur}"))
                ;;
            *)
                COMPREPLY=($(compgen -W "--json --help" -- "${cur}"))
                ;;
        esac
    fi
} &&
complete -F _sonance sonance

# ex: filetype=sh
"#
}

/// Convert our Shell enum to clap_complete's Shell enum
#[must_use]
pub fn shell_to_completion_shell(shell: &Shell) -> CompletionShell {
    match shell {
        Shell::Bash => CompletionShell::Bash,
        Shell::Zsh => CompletionShell::Zsh,
        Shell::Fish => CompletionShell::Fish,
        Shell::PowerShell => CompletionShell::PowerShell,
        Shell::Elvish => CompletionShell::Elvish,
    }
}

/// Track id completions for a catalog, in catalog order.
///
/// With `fish` each line carries a tab-separated "artist - name"
/// description. An unreadable catalog yields no completions.
#[must_use]
pub fn track_completions(catalog_path: &Path, fish: bool) -> Vec<String> {
    let Ok(catalog) = Catalog::from_csv_path(catalog_path) else {
        return Vec::new();
    };
    catalog
        .tracks()
        .iter()
        .map(|t| {
            if fish {
                format!("{}\t{} - {}", t.id, t.artists, t.name)
            } else {
                t.id.clone()
            }
        })
        .collect()
}

/// Print track id completions, one per line.
///
/// # Errors
///
/// Fails only if stdout cannot be written.
pub fn print_track_completions(catalog_path: &Path, fish: bool) -> io::Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    for line in track_completions(catalog_path, fish) {
        writeln!(out, "{line}")?;
    }
    Ok(())
}
