//! Stage Runners: the eight pipeline stages the Audit Controller
//! orchestrates in topological order.

pub mod chapter1;
pub mod chapter3;
pub mod chapter4;
pub mod chapter5;
pub mod chapter7;
pub mod ground_truth_stage;
pub mod gs_check_stage;
pub mod previous_report;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::AuditConfig;
use crate::docfinder::DocumentFinder;
use crate::error::Result;
use crate::findings::Finding;
use crate::llm::LlmClient;
use crate::objectstore::ObjectStore;

/// Identifies one pipeline stage, used both as the controller's DAG node
/// ID and as the `results/<name>.json` artifact filename stem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StageName {
    /// Scans a previous audit report for findings to carry forward.
    PreviousReportScan,
    /// Builds the ground-truth system structure map.
    GroundTruthMap,
    /// Extracts and reconstructs Grundschutz-Check requirements.
    GsCheckExtraction,
    /// Chapter 1 of the report.
    Chapter1,
    /// Chapter 3 of the report.
    Chapter3,
    /// Chapter 4, certification variant.
    Chapter4Cert,
    /// Chapter 4, first surveillance variant.
    Chapter4Surv1,
    /// Chapter 4, second surveillance variant.
    Chapter4Surv2,
    /// Chapter 5 of the report.
    Chapter5,
    /// Chapter 7 of the report.
    Chapter7,
}

impl fmt::Display for StageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.artifact_stem())
    }
}

impl StageName {
    /// Filename stem for this stage's `results/<stem>.json` artifact.
    #[must_use]
    pub const fn artifact_stem(self) -> &'static str {
        match self {
            Self::PreviousReportScan => "previous-report-scan",
            Self::GroundTruthMap => "ground-truth-map",
            Self::GsCheckExtraction => "gs-check-extraction",
            Self::Chapter1 => "chapter-1",
            Self::Chapter3 => "chapter-3",
            Self::Chapter4Cert => "chapter-4-cert",
            Self::Chapter4Surv1 => "chapter-4-surv1",
            Self::Chapter4Surv2 => "chapter-4-surv2",
            Self::Chapter5 => "chapter-5",
            Self::Chapter7 => "chapter-7",
        }
    }

    /// Parses a stage name from its `--run-stage` CLI argument form
    /// (case-insensitive, matches the artifact stem).
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        let normalized = s.to_lowercase();
        [
            Self::PreviousReportScan,
            Self::GroundTruthMap,
            Self::GsCheckExtraction,
            Self::Chapter1,
            Self::Chapter3,
            Self::Chapter4Cert,
            Self::Chapter4Surv1,
            Self::Chapter4Surv2,
            Self::Chapter5,
            Self::Chapter7,
        ]
        .into_iter()
        .find(|stage| stage.artifact_stem() == normalized)
    }
}

/// Shared context every stage runs with: the capability handles and
/// configuration it may need, plus the previously completed stages'
/// outcomes for stages that consume another stage's output directly
/// (rather than re-reading it from the object store).
pub struct StageContext {
    /// Object store handle.
    pub store: Arc<dyn ObjectStore>,
    /// LLM client handle.
    pub llm: Arc<dyn LlmClient>,
    /// Document Finder handle.
    pub finder: Arc<DocumentFinder>,
    /// Run configuration.
    pub config: AuditConfig,
}

/// The JSON payload a stage contributes to the final assembled report,
/// keyed by the stage's own artifact stem when written to the object
/// store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChapterResult {
    /// The stage that produced this result.
    pub stage: StageName,
    /// Arbitrary structured content, merged into the report blueprint by
    /// the assembler using well-known key paths.
    pub content: serde_json::Value,
}

/// What a stage run produced: its chapter content plus any findings it
/// raised. Findings are not yet assigned IDs; the controller's
/// `FindingLedger` does that centrally.
pub struct StageOutcome {
    /// The stage's report content.
    pub result: ChapterResult,
    /// Findings raised while running, without IDs assigned.
    pub findings: Vec<Finding>,
}

/// One runnable pipeline stage.
#[async_trait]
pub trait StageRunner: Send + Sync {
    /// This stage's identity.
    fn name(&self) -> StageName;

    /// Stages whose output must exist before this stage may run.
    fn prerequisites(&self) -> &'static [StageName];

    /// Runs the stage to completion.
    async fn run(&self, ctx: &StageContext) -> Result<StageOutcome>;
}
