//! CLI layer for the Grundschutz Auditor.
//!
//! Provides the command-line interface using clap: `run-all`, `run-stage`,
//! and `generate-report`, each translated into an [`crate::controller::AuditController`] run.

pub mod commands;
pub mod output;
pub mod parser;

pub use commands::execute;
pub use output::OutputFormat;
pub use parser::{Cli, Commands};
