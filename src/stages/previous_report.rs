//! Previous-report scanner: extracts findings from a prior audit report so
//! their IDs and descriptions can be preserved across this run.

use async_trait::async_trait;

use crate::docfinder::BsiCategory;
use crate::error::Result;
use crate::findings::{Finding, FindingCategory};
use crate::llm::{AttachedDocument, GenerateRequest, LlmClient, Schema, prompts};

use super::{ChapterResult, StageContext, StageName, StageOutcome, StageRunner};

/// Scans the classified `Vorheriger-Auditbericht` document(s), if any, for
/// findings to carry forward into this run's finding ledger.
pub struct PreviousReportScanRunner;

#[async_trait]
impl StageRunner for PreviousReportScanRunner {
    fn name(&self) -> StageName {
        StageName::PreviousReportScan
    }

    fn prerequisites(&self) -> &'static [StageName] {
        &[]
    }

    async fn run(&self, ctx: &StageContext) -> Result<StageOutcome> {
        ctx.finder.ensure_initialized().await?;
        let document_map_key = ctx.config.artifact_key("document_map.json");
        let map = crate::objectstore::read_json::<crate::docfinder::DocumentMap>(
            &*ctx.store,
            &document_map_key,
        )
        .await?;
        let previous_report_keys = map.documents_for(BsiCategory::VorherigerAuditbericht);

        if previous_report_keys.is_empty() {
            return Ok(StageOutcome {
                result: ChapterResult {
                    stage: self.name(),
                    content: serde_json::json!({ "carried_forward_findings": [] }),
                },
                findings: Vec::new(),
            });
        }

        let mut carried_forward = Vec::new();
        for key in previous_report_keys {
            let bytes = ctx.store.read(key).await?;
            let bundle = scan_bundle();
            let schema = Schema::from_value(serde_json::json!({
                "type": "object",
                "properties": {
                    "findings": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {
                                "id": {"type": "string"},
                                "category": {"type": "string", "enum": ["AG", "AS", "E", "OK"]},
                                "description": {"type": "string"},
                                "status": {"type": ["string", "null"]}
                            },
                            "required": ["id", "category", "description"]
                        }
                    }
                },
                "required": ["findings"]
            }))?;

            let request = GenerateRequest {
                system_prompt: bundle.system,
                user_prompt: bundle.user_template,
                documents: vec![AttachedDocument {
                    source_key: key.clone(),
                    bytes,
                    mime_type: "application/pdf".to_string(),
                }],
                schema,
            };

            let response = ctx.llm.generate_structured(request).await?;
            carried_forward.extend(parse_findings(&response, key));
        }

        let content = serde_json::to_value(&carried_forward)?;
        Ok(StageOutcome {
            result: ChapterResult {
                stage: self.name(),
                content: serde_json::json!({ "carried_forward_findings": content }),
            },
            findings: carried_forward,
        })
    }
}

fn scan_bundle() -> crate::llm::prompts::PromptBundle {
    crate::llm::prompts::PromptBundle {
        system: "You extract every finding recorded in a prior BSI Grundschutz audit report, \
            preserving its original ID, category, description, and resolution status exactly."
            .to_string(),
        user_template: "List every finding in the attached previous audit report.".to_string(),
    }
}

fn parse_findings(response: &serde_json::Value, source_key: &str) -> Vec<Finding> {
    let Some(entries) = response.get("findings").and_then(|v| v.as_array()) else {
        return Vec::new();
    };
    entries
        .iter()
        .filter_map(|entry| {
            let id = entry.get("id")?.as_str()?.to_string();
            let category = parse_category(entry.get("category")?.as_str()?)?;
            let description = entry.get("description")?.as_str()?.to_string();
            let status = entry
                .get("status")
                .and_then(|v| v.as_str())
                .map(str::to_string);
            Some(Finding {
                id,
                category,
                description,
                status,
                originating_stage: format!("previous-report-scan:{source_key}"),
            })
        })
        .collect()
}

fn parse_category(s: &str) -> Option<FindingCategory> {
    match s {
        "AG" => Some(FindingCategory::MinorDeviation),
        "AS" => Some(FindingCategory::SevereDeviation),
        "E" => Some(FindingCategory::Recommendation),
        "OK" => Some(FindingCategory::Ok),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_findings_skips_unknown_category() {
        let response = serde_json::json!({
            "findings": [
                {"id": "AG-01", "category": "AG", "description": "d"},
                {"id": "ZZ-01", "category": "ZZ", "description": "bad"}
            ]
        });
        let findings = parse_findings(&response, "previous.pdf");
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].id, "AG-01");
    }
}
