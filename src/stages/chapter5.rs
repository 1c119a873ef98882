//! Chapter 5 stage: deterministic aggregation of unmet requirements by
//! Zielobjekt, with no LLM involvement. Pure summarization of data already
//! produced by the Grundschutz-Check extraction stage.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::{Error, Result};
use crate::extractor::types::{Requirement, Umsetzungsstatus};

use super::{ChapterResult, StageContext, StageName, StageOutcome, StageRunner};

#[derive(Debug, Serialize)]
struct ZielobjektSummary {
    kuerzel: String,
    total_requirements: usize,
    nein: usize,
    teilweise: usize,
    ja: usize,
    entbehrlich: usize,
}

/// Aggregates the merged Grundschutz-Check requirements into a
/// per-Zielobjekt implementation-status summary.
pub struct Chapter5Runner;

#[async_trait]
impl StageRunner for Chapter5Runner {
    fn name(&self) -> StageName {
        StageName::Chapter5
    }

    fn prerequisites(&self) -> &'static [StageName] {
        &[StageName::GsCheckExtraction]
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

        let summaries = summarize(&requirements);

        Ok(StageOutcome {
            result: ChapterResult {
                stage: self.name(),
                content: serde_json::to_value(&summaries)?,
            },
            findings: Vec::new(),
        })
    }
}

fn summarize(requirements: &[Requirement]) -> Vec<ZielobjektSummary> {
    let mut by_kuerzel: HashMap<&str, ZielobjektSummary> = HashMap::new();

    for requirement in requirements {
        let entry = by_kuerzel
            .entry(requirement.zielobjekt_kuerzel.as_str())
            .or_insert_with(|| ZielobjektSummary {
                kuerzel: requirement.zielobjekt_kuerzel.clone(),
                total_requirements: 0,
                nein: 0,
                teilweise: 0,
                ja: 0,
                entbehrlich: 0,
            });
        entry.total_requirements += 1;
        match requirement.umsetzungsstatus {
            Umsetzungsstatus::Nein => entry.nein += 1,
            Umsetzungsstatus::Teilweise => entry.teilweise += 1,
            Umsetzungsstatus::Ja => entry.ja += 1,
            Umsetzungsstatus::Entbehrlich => entry.entbehrlich += 1,
        }
    }

    let mut summaries: Vec<ZielobjektSummary> = by_kuerzel.into_values().collect();
    summaries.sort_by(|a, b| a.kuerzel.cmp(&b.kuerzel));
    summaries
}
