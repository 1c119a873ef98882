//! Document Finder: classifies source PDFs into BSI document categories
//! and serves category-scoped lookups to every downstream stage.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;
use tracing::{info, warn};

use crate::error::{ObjectStoreError, Result};
use crate::findings::{Finding, FindingCategory};
use crate::llm::{GenerateRequest, LlmClient, Schema, prompts};
use crate::objectstore::ObjectStore;

const DOCUMENT_MAP_NAME: &str = "document_map.json";

/// The nine BSI document categories a source PDF may be classified into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BsiCategory {
    /// Strukturanalyse.
    Strukturanalyse,
    /// Modellierung.
    Modellierung,
    /// Netzplan.
    Netzplan,
    /// Sicherheitsleitlinie.
    Sicherheitsleitlinie,
    /// Grundschutz-Check.
    GrundschutzCheck,
    /// Risikoanalyse.
    Risikoanalyse,
    /// Realisierungsplan.
    Realisierungsplan,
    /// Vorheriger Auditbericht.
    VorherigerAuditbericht,
    /// Sonstiges — the fallback category for anything unclassifiable.
    #[serde(rename = "sonstiges")]
    Sonstiges,
}

impl Default for BsiCategory {
    fn default() -> Self {
        Self::Sonstiges
    }
}

/// Identifies one source document by its object-store key.
pub type DocumentId = String;

/// A stable mapping of BSI category to the source documents classified
/// into it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentMap {
    /// Classified documents, keyed by category.
    pub by_category: HashMap<BsiCategory, Vec<DocumentId>>,
}

impl DocumentMap {
    /// Returns the documents classified into `category`, or an empty slice
    /// if none were.
    #[must_use]
    pub fn documents_for(&self, category: BsiCategory) -> &[DocumentId] {
        self.by_category
            .get(&category)
            .map_or(&[], Vec::as_slice)
    }

    fn all_documents(&self) -> Vec<DocumentId> {
        self.by_category.values().flatten().cloned().collect()
    }
}

/// Classifies source documents and serves category-scoped lookups.
/// Concurrent callers within one process share a single in-flight
/// classification via an internal `OnceCell`; across processes, the
/// object store's atomic upload is the serialization point — a second
/// process that loses the race simply reloads the winner's map.
pub struct DocumentFinder {
    store: Arc<dyn ObjectStore>,
    llm: Arc<dyn LlmClient>,
    source_prefix: String,
    document_map_key: String,
    map: OnceCell<DocumentMap>,
}

impl DocumentFinder {
    /// Creates a finder over `store`, scanning `source_prefix` for
    /// documents to classify and persisting its map under `output_prefix`.
    #[must_use]
    pub fn new(
        store: Arc<dyn ObjectStore>,
        llm: Arc<dyn LlmClient>,
        source_prefix: impl Into<String>,
        output_prefix: impl AsRef<str>,
    ) -> Self {
        let output_prefix = output_prefix.as_ref();
        let document_map_key = if output_prefix.is_empty() {
            DOCUMENT_MAP_NAME.to_string()
        } else {
            format!("{}/{DOCUMENT_MAP_NAME}", output_prefix.trim_end_matches('/'))
        };
        Self {
            store,
            llm,
            source_prefix: source_prefix.into(),
            document_map_key,
            map: OnceCell::new(),
        }
    }

    /// The object store key this finder's document map is persisted under.
    #[must_use]
    pub fn document_map_key(&self) -> &str {
        &self.document_map_key
    }

    /// Loads the persisted document map if present, otherwise classifies
    /// the source prefix's documents and persists the result atomically.
    /// Returns any structural-warning findings raised during a fresh
    /// classification (empty if the map was already present).
    pub async fn ensure_initialized(&self) -> Result<Vec<Finding>> {
        let mut findings = Vec::new();
        self.map
            .get_or_try_init(|| async {
                if self.store.exists(&self.document_map_key).await? {
                    info!("loading existing document map");
                    return crate::objectstore::read_json(&*self.store, &self.document_map_key).await;
                }
                let (map, raised) = self.classify().await?;
                findings = raised;
                let bytes = serde_json::to_vec_pretty(&map)
                    .map_err(|e| ObjectStoreError::Serialization(e.to_string()))?;
                match self.store.atomic_upload(&self.document_map_key, &bytes).await {
                    Ok(()) => Ok(map),
                    Err(crate::error::Error::ObjectStore(ObjectStoreError::WriteConflict { .. })) => {
                        warn!("lost document map initialization race, reloading winner's map");
                        crate::objectstore::read_json(&*self.store, &self.document_map_key).await
                    }
                    Err(e) => Err(e),
                }
            })
            .await?;
        Ok(findings)
    }

    async fn classify(&self) -> Result<(DocumentMap, Vec<Finding>)> {
        let filenames = self.store.list(&self.source_prefix).await?;
        if filenames.is_empty() {
            return Ok((DocumentMap::default(), Vec::new()));
        }

        let bundle = prompts::classification_bundle();
        let schema = Schema::from_value(serde_json::json!({
            "type": "object",
            "properties": {
                "assignments": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "filename": {"type": "string"},
                            "category": {"type": "string"}
                        },
                        "required": ["filename", "category"]
                    }
                }
            },
            "required": ["assignments"]
        }))?;

        let request = GenerateRequest {
            system_prompt: bundle.system,
            user_prompt: bundle.user_template.replace("{filenames}", &filenames.join(", ")),
            documents: Vec::new(),
            schema,
        };

        match self.llm.generate_structured(request).await {
            Ok(response) => match parse_classification(&response, &filenames) {
                Some(map) => Ok((map, Vec::new())),
                None => Ok(fallback_classification(filenames)),
            },
            Err(err) => {
                warn!(error = %err, "classification failed, falling back to Sonstiges for all documents");
                Ok(fallback_classification(filenames))
            }
        }
    }
}

fn parse_classification(response: &serde_json::Value, filenames: &[String]) -> Option<DocumentMap> {
    let assignments = response.get("assignments")?.as_array()?;
    let mut map = DocumentMap::default();
    let mut classified = std::collections::HashSet::new();

    for entry in assignments {
        let filename = entry.get("filename")?.as_str()?.to_string();
        let category_str = entry.get("category")?.as_str()?;
        let category = parse_category(category_str).unwrap_or(BsiCategory::Sonstiges);
        map.by_category.entry(category).or_default().push(filename.clone());
        classified.insert(filename);
    }

    // Every filename must be covered; an incomplete response degrades to
    // the caller's full Sonstiges fallback rather than a partial map.
    if filenames.iter().all(|f| classified.contains(f)) {
        Some(map)
    } else {
        None
    }
}

fn parse_category(s: &str) -> Option<BsiCategory> {
    match s.to_lowercase().replace(' ', "-").as_str() {
        "strukturanalyse" => Some(BsiCategory::Strukturanalyse),
        "modellierung" => Some(BsiCategory::Modellierung),
        "netzplan" => Some(BsiCategory::Netzplan),
        "sicherheitsleitlinie" => Some(BsiCategory::Sicherheitsleitlinie),
        "grundschutz-check" => Some(BsiCategory::GrundschutzCheck),
        "risikoanalyse" => Some(BsiCategory::Risikoanalyse),
        "realisierungsplan" => Some(BsiCategory::Realisierungsplan),
        "vorheriger-auditbericht" => Some(BsiCategory::VorherigerAuditbericht),
        "sonstiges" => Some(BsiCategory::Sonstiges),
        _ => None,
    }
}

fn fallback_classification(filenames: Vec<String>) -> (DocumentMap, Vec<Finding>) {
    let mut map = DocumentMap::default();
    map.by_category.insert(BsiCategory::Sonstiges, filenames);
    let finding = Finding {
        id: String::new(),
        category: FindingCategory::MinorDeviation,
        description: "document classification failed or was incomplete; all source documents \
            were assigned to Sonstiges pending manual review"
            .to_string(),
        status: None,
        originating_stage: "document-finder".to_string(),
    };
    (map, vec![finding])
}
