//! Chapter 1 stage: audit introduction and scope summary.

use async_trait::async_trait;

use crate::error::Result;
use crate::llm::{GenerateRequest, LlmClient, Schema};

use super::{ChapterResult, StageContext, StageName, StageOutcome, StageRunner};

/// Writes the introductory chapter summarizing the audit's scope and
/// methodology, grounded in the ground-truth system structure map.
pub struct Chapter1Runner;

#[async_trait]
impl StageRunner for Chapter1Runner {
    fn name(&self) -> StageName {
        StageName::Chapter1
    }

    fn prerequisites(&self) -> &'static [StageName] {
        &[StageName::GroundTruthMap]
    }

    async fn run(&self, ctx: &StageContext) -> Result<StageOutcome> {
        let structure_key = ctx.config.artifact_key("system_structure_map.json");
        let structure: crate::groundtruth::SystemStructureMap =
            crate::objectstore::read_json(&*ctx.store, &structure_key).await?;

        let schema = Schema::from_value(serde_json::json!({
            "type": "object",
            "properties": { "introduction": {"type": "string"} },
            "required": ["introduction"]
        }))?;

        let request = GenerateRequest {
            system_prompt: "You write the introductory chapter of a BSI Grundschutz audit \
                report, describing the audit's scope and the Informationsverbund under review."
                .to_string(),
            user_prompt: format!(
                "Write an introduction covering {} Zielobjekt(e) in scope, audit type {:?}.",
                structure.zielobjekte.len(),
                ctx.config.audit_type
            ),
            documents: Vec::new(),
            schema,
        };

        let response = ctx.llm.generate_structured(request).await?;

        Ok(StageOutcome {
            result: ChapterResult {
                stage: self.name(),
                content: response,
            },
            findings: Vec::new(),
        })
    }
}
