//! CLI module for sleuth
//!
//! Provides command-line interface parsing and handling for the sleuth binary.
//! Uses clap for argument parsing and owo-colors for colored terminal output.

pub mod init;
pub mod output;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// sleuth - dependency-driven research engine
///
/// Runs a research plan of dependent subquestions as a concurrent task graph
/// over a shared, deduplicating content store.
#[derive(Parser, Debug)]
#[command(
    name = "sleuth",
    author = "Dirmacs <build@dirmacs.com>",
    version,
    about = "sleuth - dependency-driven research engine",
    long_about = "Runs a research plan of dependent subquestions as a concurrent task graph.\n\
                  Independent questions are researched in parallel; dependent ones build on\n\
                  the content their dependencies selected.\n\n\
                  Use 'init' to scaffold a configuration and an example plan.",
    after_help = "EXAMPLES:\n    \
                  sleuth init                         # Scaffold sleuth.toml and plan.example.json\n    \
                  sleuth plan plan.json               # Validate a plan and show its waves\n    \
                  sleuth run plan.json                # Research a plan, write a JSON report\n    \
                  sleuth run plan.json -w 8 -o out.json\n    \
                  sleuth store get --url https://...  # Inspect a stored document"
)]
pub struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "sleuth.toml", global = true)]
    pub config: PathBuf,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Research every question of a plan and write a JSON report
    Run {
        /// Research plan (JSON)
        plan: PathBuf,

        /// Report path (defaults to research_<timestamp>.json)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Maximum number of questions researched at once
        #[arg(short, long)]
        workers: Option<usize>,
    },

    /// Validate a plan's dependency graph and print its execution waves
    Plan {
        /// Research plan (JSON)
        plan: PathBuf,
    },

    /// Inspect or maintain the content store
    #[command(subcommand)]
    Store(StoreCommands),

    /// Show configuration information
    Config {
        /// Only validate the configuration file
        #[arg(long)]
        validate: bool,
    },

    /// Scaffold sleuth.toml, .env.example and an example plan
    Init {
        /// Directory to initialize (defaults to current directory)
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Overwrite existing files
        #[arg(short, long)]
        force: bool,

        /// LLM provider to configure (ollama or openai)
        #[arg(long, default_value = "ollama")]
        provider: String,
    },
}

/// Content store subcommands
#[derive(Subcommand, Debug)]
pub enum StoreCommands {
    /// Show a stored document
    Get {
        /// Content id
        #[arg(long, conflicts_with = "url", required_unless_present = "url")]
        id: Option<String>,

        /// Source URL
        #[arg(long)]
        url: Option<String>,
    },

    /// Delete a stored document by id
    Delete {
        /// Content id
        id: String,
    },
}

impl Cli {
    /// Parse CLI arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
