//! Command-line argument parsing.
//!
//! Defines the CLI structure using clap derive macros. Every run
//! configuration value can also be supplied via environment variable,
//! with an optional TOML file (`--config`) providing defaults that the
//! environment and flags override.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Staged BSI Grundschutz audit orchestration pipeline.
#[derive(Parser, Debug)]
#[command(name = "grundschutz-auditor")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to a TOML configuration file providing defaults.
    #[arg(long, env = "GRUNDSCHUTZ_CONFIG_PATH")]
    pub config: Option<PathBuf>,

    /// Object store connection URL (e.g. `file:///data`, `s3://bucket`).
    #[arg(long, env = "GRUNDSCHUTZ_OBJECT_STORE_URL")]
    pub object_store_url: Option<String>,

    /// Prefix under which source documents are found.
    #[arg(long, env = "GRUNDSCHUTZ_SOURCE_PREFIX")]
    pub source_prefix: Option<String>,

    /// Prefix under which pipeline artifacts are written.
    #[arg(long, env = "GRUNDSCHUTZ_OUTPUT_PREFIX")]
    pub output_prefix: Option<String>,

    /// Audit type: `cert`, `surveillance1`, or `surveillance2`.
    #[arg(long, env = "GRUNDSCHUTZ_AUDIT_TYPE")]
    pub audit_type: Option<String>,

    /// Process a reduced document/item subset for fast, reproducible runs.
    #[arg(long, env = "GRUNDSCHUTZ_TEST_MODE")]
    pub test_mode: bool,

    /// Maximum number of concurrent LLM calls.
    #[arg(long, env = "GRUNDSCHUTZ_MAX_CONCURRENT_AI_REQUESTS")]
    pub max_concurrent_ai_requests: Option<usize>,

    /// Language narrative report content is produced in.
    #[arg(long, env = "GRUNDSCHUTZ_OUTPUT_LANGUAGE")]
    pub output_language: Option<String>,

    /// Use the deterministic mock LLM client instead of a live provider
    /// (implied by `test_mode`, also settable independently for CI).
    #[arg(long, env = "GRUNDSCHUTZ_MOCK_LLM")]
    pub mock_llm: bool,

    /// Output format for the run summary (text, json).
    #[arg(long, default_value = "text", global = true)]
    pub format: String,

    /// Enable verbose (debug-level) logging.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// The run mode to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// The three mutually exclusive ways a run can be invoked.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run every stage not already complete, in topological order.
    RunAll {
        /// Re-run every stage even if its artifact already exists.
        #[arg(long)]
        force: bool,
    },

    /// Run exactly one named stage.
    RunStage {
        /// Stage name, matching its artifact stem (e.g. `ground-truth-map`,
        /// `chapter-1`, `chapter-4-cert`).
        name: String,

        /// Re-run even if the stage's artifact already exists.
        #[arg(long)]
        force: bool,
    },

    /// Run only the report assembler, merging existing stage artifacts
    /// and the finding ledger into the final report.
    GenerateReport,
}
