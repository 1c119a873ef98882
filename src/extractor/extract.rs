//! Phase C: runs one structured-generation call per chunk, bounded by the
//! shared LLM concurrency limiter, degrading to an empty extraction plus a
//! structural warning finding on terminal per-chunk failure.

use std::sync::Arc;

use futures_util::stream::{self, StreamExt};
use tracing::warn;

use crate::error::Result;
use crate::findings::{Finding, FindingCategory};
use crate::llm::{AttachedDocument, GenerateRequest, LlmClient, Schema, prompts};

use super::types::{Chunk, Requirement};

const MAX_CONCURRENT_CHUNK_EXTRACTIONS: usize = 8;

fn requirement_schema() -> serde_json::Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "requirements": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "zielobjekt_kuerzel": {"type": "string"},
                        "anforderung_id": {"type": "string"},
                        "titel": {"type": "string"},
                        "umsetzungsstatus": {"type": "string", "enum": ["Ja", "Teilweise", "Nein", "Entbehrlich"]},
                        "umsetzungserlaeuterung": {"type": "string"},
                        "datum_letzte_pruefung": {"type": ["string", "null"]}
                    },
                    "required": [
                        "zielobjekt_kuerzel",
                        "anforderung_id",
                        "titel",
                        "umsetzungsstatus",
                        "umsetzungserlaeuterung"
                    ]
                }
            }
        },
        "required": ["requirements"]
    })
}

/// Extracts requirement rows from every chunk, running up to
/// `MAX_CONCURRENT_CHUNK_EXTRACTIONS` extractions concurrently (further
/// bounded by the LLM client's own semaphore). A chunk whose extraction
/// fails terminally degrades to an empty result plus a minor-deviation
/// finding rather than aborting the whole extraction.
pub async fn extract_all(
    llm: &Arc<dyn LlmClient>,
    chunks: &[Chunk],
    pages_text: impl Fn(&Chunk) -> String + Sync,
) -> (Vec<Requirement>, Vec<Finding>) {
    let results: Vec<(Vec<Requirement>, Option<Finding>)> = stream::iter(chunks.iter())
        .map(|chunk| {
            let llm = Arc::clone(llm);
            let chunk_text = pages_text(chunk);
            async move { extract_chunk(&llm, chunk, chunk_text).await }
        })
        .buffer_unordered(MAX_CONCURRENT_CHUNK_EXTRACTIONS)
        .collect()
        .await;

    let mut requirements = Vec::new();
    let mut findings = Vec::new();
    for (reqs, finding) in results {
        requirements.extend(reqs);
        if let Some(finding) = finding {
            findings.push(finding);
        }
    }
    (requirements, findings)
}

async fn extract_chunk(
    llm: &Arc<dyn LlmClient>,
    chunk: &Chunk,
    chunk_text: String,
) -> (Vec<Requirement>, Option<Finding>) {
    match extract_chunk_inner(llm, chunk, chunk_text).await {
        Ok(requirements) => (requirements, None),
        Err(err) => {
            warn!(
                kuerzel = %chunk.kuerzel,
                start_page = chunk.start_page,
                end_page = chunk.end_page,
                error = %err,
                "chunk extraction failed terminally, degrading to empty result"
            );
            let finding = Finding {
                id: String::new(),
                category: FindingCategory::MinorDeviation,
                description: format!(
                    "Grundschutz-Check extraction failed for {} pages {}-{}; reduced extraction \
                    confidence for this section",
                    chunk.kuerzel, chunk.start_page, chunk.end_page
                ),
                status: None,
                originating_stage: "gs-check-extraction".to_string(),
            };
            (Vec::new(), Some(finding))
        }
    }
}

async fn extract_chunk_inner(
    llm: &Arc<dyn LlmClient>,
    chunk: &Chunk,
    chunk_text: String,
) -> Result<Vec<Requirement>> {
    let bundle = prompts::gs_check_extraction_bundle();
    let schema = Schema::from_value(requirement_schema())?;

    let request = GenerateRequest {
        system_prompt: bundle.system,
        user_prompt: bundle
            .user_template
            .replace("{start_page}", &chunk.start_page.to_string())
            .replace("{end_page}", &chunk.end_page.to_string())
            .replace("{kuerzel}", &chunk.kuerzel),
        documents: vec![AttachedDocument {
            source_key: format!("{}:{}-{}", chunk.kuerzel, chunk.start_page, chunk.end_page),
            bytes: chunk_text.into_bytes(),
            mime_type: "text/plain".to_string(),
        }],
        schema,
    };

    let response = llm.generate_structured(request).await?;
    Ok(parse_requirements(&response))
}

fn parse_requirements(response: &serde_json::Value) -> Vec<Requirement> {
    let Some(entries) = response.get("requirements").and_then(|v| v.as_array()) else {
        return Vec::new();
    };
    entries
        .iter()
        .filter_map(|entry| serde_json::from_value(entry.clone()).ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockLlmClient;

    #[tokio::test]
    async fn degrades_to_empty_on_unseeded_mock() {
        let llm: Arc<dyn LlmClient> = Arc::new(MockLlmClient::new());
        let chunks = vec![Chunk {
            kuerzel: "SRV-01".into(),
            start_page: 1,
            end_page: 5,
        }];
        let (requirements, findings) = extract_all(&llm, &chunks, |_| String::new()).await;
        assert!(requirements.is_empty());
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].category, FindingCategory::MinorDeviation);
    }

    #[test]
    fn parse_requirements_skips_malformed_entries() {
        let response = serde_json::json!({
            "requirements": [
                {
                    "zielobjekt_kuerzel": "SRV-01",
                    "anforderung_id": "SYS.1.1.A3",
                    "titel": "t",
                    "umsetzungsstatus": "Ja",
                    "umsetzungserlaeuterung": "ok"
                },
                { "incomplete": true }
            ]
        });
        let requirements = parse_requirements(&response);
        assert_eq!(requirements.len(), 1);
    }
}
