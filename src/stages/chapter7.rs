//! Chapter 7 stage: 7.1, deterministically listing every classified
//! source document by BSI category. 7.2's three finding tables are the
//! report assembler's responsibility, not this stage's — the assembler
//! is the only component that sees the controller's full `FindingLedger`
//! with final IDs assigned, so building those tables here would require
//! duplicating that ordering logic.

use async_trait::async_trait;
use serde::Serialize;

use crate::docfinder::DocumentMap;
use crate::error::Result;
use crate::findings::Finding;

use super::{ChapterResult, StageContext, StageName, StageOutcome, StageRunner};

#[derive(Debug, Serialize)]
struct SourceDocumentEntry {
    category: String,
    filename: String,
}

/// Writes 7.1's source-document listing, read straight from the
/// Document Finder's persisted `document_map.json` — no LLM call and no
/// dependency on finding IDs.
pub struct Chapter7Runner {
    findings_so_far: Vec<Finding>,
}

impl Chapter7Runner {
    /// Creates a runner. `findings_so_far` is accepted for the
    /// controller's uniform construction path but unused: Chapter 7's
    /// own content never reflects the finding ledger (see module docs).
    #[must_use]
    pub fn new(findings_so_far: Vec<Finding>) -> Self {
        Self { findings_so_far }
    }
}

#[async_trait]
impl StageRunner for Chapter7Runner {
    fn name(&self) -> StageName {
        StageName::Chapter7
    }

    fn prerequisites(&self) -> &'static [StageName] {
        &[StageName::Chapter1, StageName::Chapter3, StageName::Chapter5]
    }

    async fn run(&self, ctx: &StageContext) -> Result<StageOutcome> {
        let _ = &self.findings_so_far;
        let document_map_key = ctx.config.artifact_key("document_map.json");
        let map: DocumentMap =
            crate::objectstore::read_json(&*ctx.store, &document_map_key).await?;
        let entries = list_source_documents(&map);

        Ok(StageOutcome {
            result: ChapterResult {
                stage: self.name(),
                content: serde_json::json!({ "7.1": serde_json::to_value(&entries)? }),
            },
            findings: Vec::new(),
        })
    }
}

fn list_source_documents(map: &DocumentMap) -> Vec<SourceDocumentEntry> {
    let mut entries: Vec<SourceDocumentEntry> = map
        .by_category
        .iter()
        .flat_map(|(category, filenames)| {
            let category_label = serde_json::to_value(category)
                .ok()
                .and_then(|v| v.as_str().map(str::to_string))
                .unwrap_or_default();
            filenames.iter().map(move |filename| SourceDocumentEntry {
                category: category_label.clone(),
                filename: filename.clone(),
            })
        })
        .collect();
    entries.sort_by(|a, b| (a.category.as_str(), a.filename.as_str()).cmp(&(b.category.as_str(), b.filename.as_str())));
    entries
}
