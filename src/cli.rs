//! Command-line interface for asrcore
//!
//! Provides argument parsing using clap derive macros.

use crate::defaults;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

/// Pluggable speech recognition pipeline
#[derive(Parser, Debug)]
#[command(name = "asrcore", version, about = "Pluggable speech recognition pipeline")]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Verbose output (-v: info, -vv: debug, -vvv: trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Transcribe a 16-bit PCM WAV file
    Transcribe {
        /// WAV file to transcribe
        file: PathBuf,

        /// Engine to use (default: service.default_engine)
        #[arg(long, value_name = "NAME")]
        engine: Option<String>,

        /// Comma separated stage names (default: service.default_stages, "" for none)
        #[arg(long, value_name = "STAGES")]
        stages: Option<String>,

        /// Feed the file as a chunk stream and print results as they arrive
        #[arg(long)]
        stream: bool,

        /// Chunk duration in milliseconds for --stream
        #[arg(long, value_name = "MS", default_value_t = defaults::CHUNK_MS)]
        chunk_ms: u32,

        /// Language hint passed to the engine
        #[arg(long, value_name = "LANG")]
        language: Option<String>,

        /// Engine call timeout. Examples: 30s, 500ms, 2m
        #[arg(long, value_name = "DURATION", value_parser = parse_timeout)]
        timeout: Option<Duration>,

        /// Print results as JSON lines
        #[arg(long)]
        json: bool,
    },

    /// List registered stages and engines
    List {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show how a request would be resolved, without running it
    Plan {
        /// Engine to use (default: service.default_engine)
        #[arg(long, value_name = "NAME")]
        engine: Option<String>,

        /// Comma separated stage names
        #[arg(long, value_name = "STAGES")]
        stages: Option<String>,
    },

    /// View configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Configuration actions
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print the effective configuration as TOML
    Show,
    /// Print the configuration file path
    Path,
}

/// Parse a timeout string.
///
/// Supports any duration format accepted by `humantime`; bare numbers are
/// seconds.
fn parse_timeout(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    // Bare number → seconds
    if let Ok(secs) = s.parse::<u64>() {
        return Ok(Duration::from_secs(secs));
    }
    humantime::parse_duration(s).map_err(|e| e.to_string())
}
