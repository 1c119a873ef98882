//! Grundschutz-Check extraction stage: wraps [`crate::extractor::run`].

use async_trait::async_trait;
use chrono::Utc;

use crate::error::{Error, Result};
use crate::extractor;

use super::{ChapterResult, StageContext, StageName, StageOutcome, StageRunner};

/// Runs the full Grundschutz-Check extraction/reconstruction pipeline and
/// persists the merged requirement set as an intermediate artifact.
pub struct GsCheckExtractionRunner;

#[async_trait]
impl StageRunner for GsCheckExtractionRunner {
    fn name(&self) -> StageName {
        StageName::GsCheckExtraction
    }

    fn prerequisites(&self) -> &'static [StageName] {
        &[StageName::GroundTruthMap]
    }

    async fn run(&self, ctx: &StageContext) -> Result<StageOutcome> {
        let structure_key = ctx.config.artifact_key("system_structure_map.json");
        let structure = crate::objectstore::read_json(&*ctx.store, &structure_key)
            .await
            .map_err(|_| Error::MissingPrerequisite {
                stage: self.name().to_string(),
                prerequisite: StageName::GroundTruthMap.to_string(),
            })?;

        let result = extractor::run(
            &ctx.store,
            &ctx.finder,
            &ctx.llm,
            &structure,
            Utc::now().date_naive(),
        )
        .await?;

        let merged_key =
            ctx.config.artifact_key("results/intermediate/extracted_grundschutz_check_merged.json");
        crate::objectstore::write_json(&*ctx.store, &merged_key, &result.requirements).await?;

        Ok(StageOutcome {
            result: ChapterResult {
                stage: self.name(),
                content: serde_json::to_value(&result.requirements)?,
            },
            findings: result.findings,
        })
    }
}
