//! Command-line interface definition and argument parsing

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Command-line arguments for Conclave
#[derive(Parser, Debug)]
#[command(
    name = "conclave",
    about = "AI-driven multi-participant meeting simulator",
    version,
    long_about = "Conclave generates a meeting scenario, then lets AI participants \
                  talk it through turn by turn, with deterministic response caching \
                  so a rerun replays the same conversation."
)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Subcommands for Conclave
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate a setup.json scenario for a topic
    GenerateSetup {
        /// Meeting topic; prompted for interactively when omitted
        #[arg(long)]
        topic: Option<String>,

        /// Seed for response caching
        #[arg(long, default_value_t = crate::cache::DEFAULT_CACHE_SEED)]
        cache_seed: u64,
    },

    /// Run a conversation from an existing setup file
    Run {
        /// Path to the setup.json file
        setup: PathBuf,

        /// Model that picks speakers and judges termination; random when omitted
        #[arg(long)]
        manager_model: Option<String>,

        /// End the conversation once the dialogue reaches this many words
        #[arg(long, default_value_t = crate::conversation::DEFAULT_MAX_WORDS)]
        max_words: usize,

        /// End the conversation once reading it would take this many minutes
        #[arg(long, default_value_t = crate::conversation::DEFAULT_MAX_READ_MINUTES)]
        max_read_minutes: f64,

        /// Hard per-call timeout in seconds
        #[arg(long)]
        call_timeout: Option<u64>,

        /// Seed for response caching
        #[arg(long, default_value_t = crate::cache::DEFAULT_CACHE_SEED)]
        cache_seed: u64,
    },

    /// Delete all cached responses
    ClearCache,
}
