//! Grundschutz-Check Extractor: ground-truth-driven semantic chunking,
//! parallel per-chunk extraction, merge-and-refine reconstruction, and the
//! five targeted Phase E analysis questions.

pub mod analysis;
pub mod chunking;
pub mod extract;
pub mod header_index;
pub mod merge;
pub mod types;

use std::sync::Arc;

use chrono::NaiveDate;

use crate::docfinder::{BsiCategory, DocumentFinder};
use crate::error::{Error, Result};
use crate::findings::Finding;
use crate::groundtruth::SystemStructureMap;
use crate::llm::LlmClient;
use crate::objectstore::ObjectStore;
use crate::pdf;

use types::Requirement;

/// Output of a full Grundschutz-Check extraction and reconstruction run.
pub struct GsCheckExtractionResult {
    /// Final merged, deduplicated requirement set.
    pub requirements: Vec<Requirement>,
    /// Findings raised during extraction (per-chunk degradation warnings)
    /// and analysis (the subchapter-3.6.1 consolidated finding).
    pub findings: Vec<Finding>,
}

/// Runs Phases A through E over the classified Grundschutz-Check
/// document(s), given the ground-truth system structure map.
pub async fn run(
    store: &Arc<dyn ObjectStore>,
    finder: &Arc<DocumentFinder>,
    llm: &Arc<dyn LlmClient>,
    structure: &SystemStructureMap,
    reference_date: NaiveDate,
) -> Result<GsCheckExtractionResult> {
    finder.ensure_initialized().await?;
    let document_keys = finder_documents(finder, store).await?;

    let mut all_pages = Vec::new();
    for key in &document_keys {
        let bytes = store.read(key).await?;
        all_pages.extend(pdf::extract_pages(&bytes)?);
    }
    all_pages.sort_by_key(|p| p.page_number);

    if all_pages.is_empty() {
        return Ok(GsCheckExtractionResult {
            requirements: Vec::new(),
            findings: Vec::new(),
        });
    }

    let sections = header_index::build_sections(&all_pages, structure)?;
    for section in &sections {
        chunking::validate_section(section)?;
    }
    let chunks = chunking::chunk_all(&sections);

    let page_text_by_number: std::collections::HashMap<u32, &str> = all_pages
        .iter()
        .map(|p| (p.page_number, p.text.as_str()))
        .collect();

    let (candidates, mut findings) = extract::extract_all(llm, &chunks, |chunk| {
        (chunk.start_page..=chunk.end_page)
            .filter_map(|page| page_text_by_number.get(&page).copied())
            .collect::<Vec<_>>()
            .join("\n")
    })
    .await;

    let requirements = merge::merge_requirements(candidates);
    let analysis_finding = analysis::consolidate(store, finder, llm, &requirements, reference_date).await;
    findings.push(analysis_finding);

    Ok(GsCheckExtractionResult {
        requirements,
        findings,
    })
}

async fn finder_documents(finder: &Arc<DocumentFinder>, store: &Arc<dyn ObjectStore>) -> Result<Vec<String>> {
    finder.ensure_initialized().await?;
    let map: crate::docfinder::DocumentMap =
        crate::objectstore::read_json(&**store, finder.document_map_key()).await.map_err(|e| match e {
            Error::ObjectStore(crate::error::ObjectStoreError::NotFound { .. }) => {
                Error::InvalidState {
                    message: "document map must exist before Grundschutz-Check extraction runs"
                        .to_string(),
                }
            }
            other => other,
        })?;
    Ok(map.documents_for(BsiCategory::GrundschutzCheck).to_vec())
}
