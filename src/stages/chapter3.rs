//! Chapter 3 stage: per-subchapter assessment tasks, each scoped to a set
//! of Zielobjekt categories. Subchapter 3.6.1 is special-cased to reuse
//! the Grundschutz-Check extractor's consolidated Phase E analysis
//! finding rather than asking the model the same questions twice.

use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};
use serde::Serialize;

use crate::docfinder::BsiCategory;
use crate::error::{Error, Result};
use crate::extractor::types::Requirement;
use crate::findings::Finding;
use crate::llm::{AttachedDocument, GenerateRequest, Schema, prompts};

use super::{ChapterResult, StageContext, StageName, StageOutcome, StageRunner};

const MAX_CONCURRENT_SUBCHAPTER_TASKS: usize = 4;

/// One subchapter's scope: which questions it answers, and which
/// document categories the finder supplies as references for them.
struct Chapter3Task {
    key: &'static str,
    questions: &'static [&'static str],
    categories: &'static [BsiCategory],
}

const SUBCHAPTER_TASKS: &[Chapter3Task] = &[
    Chapter3Task {
        key: "3.1",
        questions: &["Summarize organizational security measures."],
        categories: &[BsiCategory::Sicherheitsleitlinie, BsiCategory::Strukturanalyse],
    },
    Chapter3Task {
        key: "3.2",
        questions: &["Summarize infrastructure and systems security measures."],
        categories: &[BsiCategory::Modellierung, BsiCategory::GrundschutzCheck],
    },
    Chapter3Task {
        key: "3.3",
        questions: &["Summarize network and communications security measures."],
        categories: &[BsiCategory::Netzplan],
    },
];

/// Subchapter 3.6.1 is computed deterministically from the merged
/// requirement set's Phase E analysis, not asked of the model again.
const ANALYSIS_SUBCHAPTER_KEY: &str = "3.6.1";

#[derive(Serialize)]
struct SubchapterResult {
    key: String,
    summary: String,
}

/// Writes every Chapter 3 subchapter, running independent subchapters
/// concurrently.
pub struct Chapter3Runner;

#[async_trait]
impl StageRunner for Chapter3Runner {
    fn name(&self) -> StageName {
        StageName::Chapter3
    }

    fn prerequisites(&self) -> &'static [StageName] {
        &[StageName::GroundTruthMap, StageName::GsCheckExtraction]
    }

    async fn run(&self, ctx: &StageContext) -> Result<StageOutcome> {
        let merged_key =
            ctx.config.artifact_key("results/intermediate/extracted_grundschutz_check_merged.json");
        let requirements: Vec<Requirement> = crate::objectstore::read_json(&*ctx.store, &merged_key)
            .await
            .map_err(|_| Error::MissingPrerequisite {
                stage: self.name().to_string(),
                prerequisite: StageName::GsCheckExtraction.to_string(),
            })?;

        ctx.finder.ensure_initialized().await?;
        let document_map: crate::docfinder::DocumentMap =
            crate::objectstore::read_json(&*ctx.store, ctx.finder.document_map_key()).await?;

        let mut subchapters: Vec<SubchapterResult> = stream::iter(SUBCHAPTER_TASKS.iter())
            .map(|task| run_subchapter(ctx, &document_map, task))
            .buffer_unordered(MAX_CONCURRENT_SUBCHAPTER_TASKS)
            .collect::<Vec<_>>()
            .await
            .into_iter()
            .collect::<Result<Vec<_>>>()?;

        let analysis_finding = analysis_subchapter_from(&requirements, ctx).await?;
        subchapters.push(SubchapterResult {
            key: ANALYSIS_SUBCHAPTER_KEY.to_string(),
            summary: analysis_finding.description.clone(),
        });
        subchapters.sort_by(|a, b| a.key.cmp(&b.key));

        Ok(StageOutcome {
            result: ChapterResult {
                stage: self.name(),
                content: serde_json::to_value(&subchapters)?,
            },
            findings: vec![analysis_finding],
        })
    }
}

async fn run_subchapter(
    ctx: &StageContext,
    document_map: &crate::docfinder::DocumentMap,
    task: &Chapter3Task,
) -> Result<SubchapterResult> {
    let bundle = prompts::chapter3_subchapter_bundle(task.key);
    let schema = Schema::from_value(serde_json::json!({
        "type": "object",
        "properties": { "summary": {"type": "string"} },
        "required": ["summary"]
    }))?;

    let mut documents = Vec::new();
    for category in task.categories {
        for key in document_map.documents_for(*category) {
            let bytes = ctx.store.read(key).await?;
            documents.push(AttachedDocument {
                source_key: key.clone(),
                bytes,
                mime_type: "application/pdf".to_string(),
            });
        }
    }

    let request = GenerateRequest {
        system_prompt: bundle.system,
        user_prompt: format!("{}\n\nQuestions: {}", bundle.user_template, task.questions.join(" ")),
        documents,
        schema,
    };

    let response = ctx.llm.generate_structured(request).await?;
    Ok(SubchapterResult {
        key: task.key.to_string(),
        summary: response
            .get("summary")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string(),
    })
}

/// Subchapter 3.6.1 reuses the Grundschutz-Check extractor's Phase E
/// consolidation directly rather than asking the model the same questions
/// twice; the finding ledger's dedup-by-description handles the case where
/// the extraction stage already produced the same finding in this run.
async fn analysis_subchapter_from(requirements: &[Requirement], ctx: &StageContext) -> Result<Finding> {
    let mut finding = crate::extractor::analysis::consolidate(
        &ctx.store,
        &ctx.finder,
        &ctx.llm,
        requirements,
        chrono::Utc::now().date_naive(),
    )
    .await;
    finding.originating_stage = "chapter-3".to_string();
    Ok(finding)
}
