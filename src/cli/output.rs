//! Output formatting for CLI run results: text and JSON renderings of a
//! [`RunSummary`], and exit-code selection per spec §6's four-way split.

use std::fmt::Write as _;

use serde::Serialize;

use crate::controller::{RunSummary, StageStatus};
use crate::error::{Error, StageError};

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable text output.
    Text,
    /// JSON output.
    Json,
}

impl OutputFormat {
    /// Parses format from string, defaulting to text for anything
    /// unrecognized.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => Self::Json,
            _ => Self::Text,
        }
    }
}

#[derive(Serialize)]
struct StageStatusJson {
    stage: String,
    status: String,
    reason: Option<String>,
}

#[derive(Serialize)]
struct RunSummaryJson {
    stages: Vec<StageStatusJson>,
    finding_count: usize,
    exit_code: u8,
}

fn status_label(status: &StageStatus) -> (&'static str, Option<String>) {
    match status {
        StageStatus::Ran => ("ran", None),
        StageStatus::SkippedAlreadyComplete => ("skipped-already-complete", None),
        StageStatus::SkippedPrerequisiteFailed => ("skipped-prerequisite-failed", None),
        StageStatus::Failed { reason } => ("failed", Some(reason.clone())),
    }
}

/// Returns the exit code spec §6 assigns to a completed run: `4` if any
/// stage failed, `0` otherwise. Config and missing-prerequisite failures
/// never reach this path — they short-circuit as `Err` before a
/// `RunSummary` exists.
#[must_use]
pub fn exit_code_for_summary(summary: &RunSummary) -> u8 {
    let any_failed = summary
        .stage_statuses
        .iter()
        .any(|(_, status)| matches!(status, StageStatus::Failed { .. }));
    if any_failed { 4 } else { 0 }
}

/// Maps a top-level run error to its spec §6 exit code: `2` for bad
/// configuration, `3` for a missing prerequisite, `4` for anything else.
#[must_use]
pub const fn exit_code_for_error(error: &Error) -> u8 {
    match error {
        Error::Config(_) => 2,
        Error::MissingPrerequisite { .. } => 3,
        Error::Stage(StageError::UnknownStage { .. }) => 2,
        _ => 4,
    }
}

/// Formats a run summary for display.
#[must_use]
pub fn format_summary(summary: &RunSummary, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => format_summary_text(summary),
        OutputFormat::Json => format_summary_json(summary),
    }
}

fn format_summary_text(summary: &RunSummary) -> String {
    let mut output = String::new();
    output.push_str("Audit run summary\n");
    output.push_str("==================\n\n");
    for (stage, status) in &summary.stage_statuses {
        let (label, reason) = status_label(status);
        match reason {
            Some(reason) => {
                let _ = writeln!(output, "  {stage:<24} {label} ({reason})");
            }
            None => {
                let _ = writeln!(output, "  {stage:<24} {label}");
            }
        }
    }
    let _ = writeln!(output, "\n  findings recorded: {}", summary.findings.len());
    output
}

fn format_summary_json(summary: &RunSummary) -> String {
    let stages = summary
        .stage_statuses
        .iter()
        .map(|(stage, status)| {
            let (label, reason) = status_label(status);
            StageStatusJson {
                stage: stage.to_string(),
                status: label.to_string(),
                reason,
            }
        })
        .collect();
    let json = RunSummaryJson {
        stages,
        finding_count: summary.findings.len(),
        exit_code: exit_code_for_summary(summary),
    };
    serde_json::to_string_pretty(&json).unwrap_or_else(|_| "{}".to_string())
}

/// Formats a top-level run error for display.
#[must_use]
pub fn format_error(error: &Error, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => error.to_string(),
        OutputFormat::Json => {
            let json = serde_json::json!({
                "success": false,
                "error": error.to_string(),
                "exit_code": exit_code_for_error(error),
            });
            serde_json::to_string_pretty(&json).unwrap_or_else(|_| "{}".to_string())
        }
    }
}
