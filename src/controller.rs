//! Audit Controller: orchestrates every stage in topological order, owns
//! the single run-wide `FindingLedger`, and persists each stage's
//! artifact so a later run can resume past already-completed stages.

use std::collections::{HashMap, HashSet, VecDeque};

use tracing::{info, warn};

use crate::error::{Error, Result, StageError};
use crate::findings::{Finding, FindingLedger};
use crate::stages::chapter1::Chapter1Runner;
use crate::stages::chapter3::Chapter3Runner;
use crate::stages::chapter4::{Chapter4CertRunner, Chapter4Surv1Runner, Chapter4Surv2Runner};
use crate::stages::chapter5::Chapter5Runner;
use crate::stages::chapter7::Chapter7Runner;
use crate::stages::ground_truth_stage::GroundTruthMapRunner;
use crate::stages::gs_check_stage::GsCheckExtractionRunner;
use crate::stages::previous_report::PreviousReportScanRunner;
use crate::stages::{StageContext, StageName, StageOutcome, StageRunner};

/// The stage the controller selects for a Chapter 4 run, derived from the
/// context's `AuditType`.
fn chapter4_stage_for(config: &crate::config::AuditConfig) -> StageName {
    match config.audit_type {
        crate::config::AuditType::Cert => StageName::Chapter4Cert,
        crate::config::AuditType::Surveillance1 => StageName::Chapter4Surv1,
        crate::config::AuditType::Surveillance2 => StageName::Chapter4Surv2,
    }
}

fn static_prerequisites(name: StageName) -> &'static [StageName] {
    match name {
        StageName::PreviousReportScan | StageName::GroundTruthMap => &[],
        StageName::GsCheckExtraction => &[StageName::GroundTruthMap],
        StageName::Chapter1 => &[StageName::GroundTruthMap],
        StageName::Chapter3 => &[StageName::GroundTruthMap, StageName::GsCheckExtraction],
        StageName::Chapter4Cert | StageName::Chapter4Surv1 | StageName::Chapter4Surv2 => {
            &[StageName::GroundTruthMap]
        }
        StageName::Chapter5 => &[StageName::GsCheckExtraction],
        StageName::Chapter7 => &[StageName::Chapter1, StageName::Chapter3, StageName::Chapter5],
    }
}

fn build_runner(name: StageName, findings_so_far: &[Finding]) -> Box<dyn StageRunner> {
    match name {
        StageName::PreviousReportScan => Box::new(PreviousReportScanRunner),
        StageName::GroundTruthMap => Box::new(GroundTruthMapRunner),
        StageName::GsCheckExtraction => Box::new(GsCheckExtractionRunner),
        StageName::Chapter1 => Box::new(Chapter1Runner),
        StageName::Chapter3 => Box::new(Chapter3Runner),
        StageName::Chapter4Cert => Box::new(Chapter4CertRunner),
        StageName::Chapter4Surv1 => Box::new(Chapter4Surv1Runner),
        StageName::Chapter4Surv2 => Box::new(Chapter4Surv2Runner),
        StageName::Chapter5 => Box::new(Chapter5Runner),
        StageName::Chapter7 => Box::new(Chapter7Runner::new(findings_so_far.to_vec())),
    }
}

/// Returns every stage name reachable from the run's selected Chapter 4
/// variant, in a fixed topological order (Kahn's algorithm over the
/// static prerequisite graph).
fn ordered_stage_plan(chapter4: StageName) -> Result<Vec<StageName>> {
    let all_stages = [
        StageName::PreviousReportScan,
        StageName::GroundTruthMap,
        StageName::GsCheckExtraction,
        StageName::Chapter1,
        StageName::Chapter3,
        chapter4,
        StageName::Chapter5,
        StageName::Chapter7,
    ];

    let mut in_degree: HashMap<StageName, usize> = HashMap::new();
    let mut dependents: HashMap<StageName, Vec<StageName>> = HashMap::new();
    for &stage in &all_stages {
        in_degree.entry(stage).or_insert(0);
        for &prereq in static_prerequisites(stage) {
            if all_stages.contains(&prereq) {
                *in_degree.entry(stage).or_insert(0) += 1;
                dependents.entry(prereq).or_default().push(stage);
            }
        }
    }

    let mut queue: VecDeque<StageName> = in_degree
        .iter()
        .filter(|(_, &degree)| degree == 0)
        .map(|(&stage, _)| stage)
        .collect();
    let mut order = Vec::with_capacity(all_stages.len());
    let mut visited: HashSet<StageName> = HashSet::new();

    while let Some(stage) = queue.pop_front() {
        if !visited.insert(stage) {
            continue;
        }
        order.push(stage);
        if let Some(next) = dependents.get(&stage) {
            for &dependent in next {
                if let Some(entry) = in_degree.get_mut(&dependent) {
                    *entry -= 1;
                    if *entry == 0 {
                        queue.push_back(dependent);
                    }
                }
            }
        }
    }

    if order.len() != all_stages.len() {
        let stuck = all_stages.iter().find(|stage| !order.contains(stage));
        return Err(Error::Stage(StageError::Cycle {
            stage: stuck.map_or_else(|| "unknown".to_string(), |s| s.to_string()),
        }));
    }
    Ok(order)
}

/// How the controller should select which stages to run.
#[derive(Debug, Clone)]
pub enum RunMode {
    /// Run every stage not already completed, in topological order.
    RunAll {
        /// Re-run stages even if their artifact already exists.
        force: bool,
    },
    /// Run exactly one stage (and, if needed, nothing else — prerequisite
    /// artifacts must already exist unless `force` is also set on a
    /// prior `RunAll`).
    RunStage {
        /// The stage to run.
        name: StageName,
        /// Re-run even if the stage's artifact already exists.
        force: bool,
    },
    /// Run no stages; only (re)assemble the final report from existing
    /// artifacts.
    GenerateReportOnly,
}

/// Whether a given stage in a run was executed, skipped as already
/// complete, or failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageStatus {
    /// The stage ran to completion this invocation.
    Ran,
    /// The stage's artifact already existed and `force` was not set.
    SkippedAlreadyComplete,
    /// The stage failed; its remaining dependents were left unrun.
    Failed {
        /// Description of the failure.
        reason: String,
    },
    /// The stage was skipped because a prerequisite failed or never ran.
    SkippedPrerequisiteFailed,
}

/// Outcome of one controller invocation.
#[derive(Debug)]
pub struct RunSummary {
    /// Per-stage outcome, in the order stages were considered.
    pub stage_statuses: Vec<(StageName, StageStatus)>,
    /// Every finding recorded in the run's ledger so far, IDs assigned.
    pub findings: Vec<Finding>,
}

/// Orchestrates stage execution and owns the run's `FindingLedger`.
pub struct AuditController {
    ctx: StageContext,
}

impl AuditController {
    /// Creates a controller over the given stage context.
    #[must_use]
    pub fn new(ctx: StageContext) -> Self {
        Self { ctx }
    }

    /// Runs the pipeline according to `mode`, returning a summary of what
    /// ran and the accumulated finding ledger.
    ///
    /// A stage that fails does not abort the run: it is recorded as
    /// `Failed`, and any stage still in the plan whose prerequisites
    /// include it is recorded as `SkippedPrerequisiteFailed` rather than
    /// attempted, so independent branches of the DAG still complete.
    pub async fn run(&self, mode: RunMode) -> Result<RunSummary> {
        let chapter4 = chapter4_stage_for(&self.ctx.config);
        let all_findings_key = self.ctx.config.artifact_key("results/all_findings.json");
        let mut ledger = FindingLedger::new();
        if self.ctx.store.exists(&all_findings_key).await? {
            let existing: Vec<Finding> =
                crate::objectstore::read_json(&*self.ctx.store, &all_findings_key).await?;
            ledger.seed(existing);
        }
        let mut stage_statuses: Vec<(StageName, StageStatus)> = Vec::new();
        let mut unavailable: HashSet<StageName> = HashSet::new();

        let plan = match &mode {
            RunMode::RunAll { .. } => ordered_stage_plan(chapter4)?,
            RunMode::RunStage { name, .. } => {
                let full_plan = ordered_stage_plan(chapter4)?;
                full_plan.into_iter().filter(|s| s == name).collect()
            }
            RunMode::GenerateReportOnly => Vec::new(),
        };

        for stage in plan {
            // A requested `--run-stage` always overwrites its target's artifact
            // (force is implicit); only `--run-all` consults its own `force` flag.
            let force = matches!(mode, RunMode::RunAll { force: true } | RunMode::RunStage { .. });
            let artifact_key = self
                .ctx
                .config
                .artifact_key(&format!("results/{}.json", stage.artifact_stem()));

            let blocked_prereq = static_prerequisites(stage)
                .iter()
                .find(|prereq| unavailable.contains(prereq));
            if let Some(prereq) = blocked_prereq {
                warn!(stage = %stage, prerequisite = %prereq, "skipping stage, prerequisite failed");
                unavailable.insert(stage);
                stage_statuses.push((stage, StageStatus::SkippedPrerequisiteFailed));
                continue;
            }

            if !force && self.ctx.store.exists(&artifact_key).await? {
                info!(stage = %stage, "skipping stage, artifact already present");
                stage_statuses.push((stage, StageStatus::SkippedAlreadyComplete));
                continue;
            }

            if matches!(mode, RunMode::RunStage { .. }) {
                self.check_prerequisites_present(stage).await?;
            }

            let runner = build_runner(stage, ledger.all());
            info!(stage = %stage, "running stage");
            let outcome = runner.run(&self.ctx).await;

            let StageOutcome { result, findings } = match outcome {
                Ok(outcome) => outcome,
                Err(err) => {
                    warn!(stage = %stage, error = %err, "stage failed");
                    unavailable.insert(stage);
                    stage_statuses.push((stage, StageStatus::Failed { reason: err.to_string() }));
                    continue;
                }
            };

            if stage == StageName::PreviousReportScan {
                ledger.seed(findings);
            } else {
                for finding in findings {
                    ledger.append(
                        finding.category,
                        finding.description,
                        finding.status,
                        &finding.originating_stage,
                    );
                }
            }

            crate::objectstore::write_json(&*self.ctx.store, &artifact_key, &result).await?;
            stage_statuses.push((stage, StageStatus::Ran));
        }

        crate::objectstore::write_json(&*self.ctx.store, &all_findings_key, ledger.all()).await?;

        if matches!(mode, RunMode::GenerateReportOnly) {
            crate::assembler::run(&*self.ctx.store, &self.ctx.config).await?;
        }

        Ok(RunSummary {
            stage_statuses,
            findings: ledger.all().to_vec(),
        })
    }

    async fn check_prerequisites_present(&self, stage: StageName) -> Result<()> {
        for &prereq in static_prerequisites(stage) {
            let key = self
                .ctx
                .config
                .artifact_key(&format!("results/{}.json", prereq.artifact_stem()));
            if !self.ctx.store.exists(&key).await? {
                warn!(stage = %stage, prerequisite = %prereq, "prerequisite artifact missing");
                return Err(Error::MissingPrerequisite {
                    stage: stage.to_string(),
                    prerequisite: prereq.to_string(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_plan_orders_prerequisites_before_dependents() {
        let plan = ordered_stage_plan(StageName::Chapter4Cert).unwrap();
        let pos = |s: StageName| plan.iter().position(|&x| x == s).unwrap();
        assert!(pos(StageName::GroundTruthMap) < pos(StageName::GsCheckExtraction));
        assert!(pos(StageName::GsCheckExtraction) < pos(StageName::Chapter3));
        assert!(pos(StageName::Chapter1) < pos(StageName::Chapter7));
        assert!(pos(StageName::Chapter5) < pos(StageName::Chapter7));
    }

    #[test]
    fn stage_plan_includes_selected_chapter4_variant_only() {
        let plan = ordered_stage_plan(StageName::Chapter4Surv1).unwrap();
        assert!(plan.contains(&StageName::Chapter4Surv1));
        assert!(!plan.contains(&StageName::Chapter4Cert));
    }
}
