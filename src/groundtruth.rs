//! Ground-Truth Mapper: builds the authoritative `SystemStructureMap` from
//! Strukturanalyse and Modellierung documents.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::docfinder::{BsiCategory, DocumentFinder};
use crate::error::Result;
use crate::findings::{Finding, FindingCategory};
use crate::llm::{AttachedDocument, GenerateRequest, LlmClient, Schema, prompts};
use crate::objectstore::ObjectStore;

/// Baustein ID prefixes that are always assigned to the synthetic
/// `Informationsverbund` Zielobjekt, regardless of what the source
/// documents say.
const FORCED_INFORMATIONSVERBUND_PREFIXES: [&str; 5] = ["ISMS", "ORP", "CON", "OPS", "DER"];

/// Name of the synthetic Zielobjekt every audit report always contains.
pub const INFORMATIONSVERBUND: &str = "Informationsverbund";

/// A single system object (asset, group of assets, or the whole
/// Informationsverbund) the audit is scoped over.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Zielobjekt {
    /// Short identifier, e.g. `"SRV-01"`.
    pub kuerzel: String,
    /// Human-readable name.
    pub name: String,
}

/// The reconstructed system structure: every Zielobjekt and which
/// Bausteine are assigned to each.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SystemStructureMap {
    /// Every Zielobjekt in scope, including the synthetic
    /// `Informationsverbund`.
    pub zielobjekte: Vec<Zielobjekt>,
    /// Baustein ID to the kuerzel of the Zielobjekt it is assigned to.
    pub baustein_assignments: HashMap<String, String>,
}

impl SystemStructureMap {
    /// Returns true if `kuerzel` names a known Zielobjekt.
    #[must_use]
    pub fn has_zielobjekt(&self, kuerzel: &str) -> bool {
        self.zielobjekte.iter().any(|z| z.kuerzel == kuerzel)
    }
}

/// Returns true if `baustein_id` matches one of the prefixes that force
/// assignment to the Informationsverbund regardless of source-document
/// content (ISMS, ORP, CON, OPS, DER).
#[must_use]
pub fn baustein_prefix_forces_informationsverbund(baustein_id: &str) -> bool {
    FORCED_INFORMATIONSVERBUND_PREFIXES
        .iter()
        .any(|prefix| baustein_id.starts_with(prefix))
}

fn informationsverbund_zielobjekt() -> Zielobjekt {
    Zielobjekt {
        kuerzel: INFORMATIONSVERBUND.to_string(),
        name: INFORMATIONSVERBUND.to_string(),
    }
}

fn zielobjekte_schema() -> Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "zielobjekte": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "kuerzel": {"type": "string"},
                        "name": {"type": "string"}
                    },
                    "required": ["kuerzel", "name"]
                }
            }
        },
        "required": ["zielobjekte"]
    })
}

fn baustein_assignments_schema() -> Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "baustein_assignments": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "baustein_id": {"type": "string"},
                        "kuerzel": {"type": "string"}
                    },
                    "required": ["baustein_id", "kuerzel"]
                }
            }
        },
        "required": ["baustein_assignments"]
    })
}

/// Builds the `SystemStructureMap` from the Document Finder's classified
/// Strukturanalyse and Modellierung documents.
pub struct GroundTruthMapper {
    store: Arc<dyn ObjectStore>,
    finder: Arc<DocumentFinder>,
    llm: Arc<dyn LlmClient>,
}

impl GroundTruthMapper {
    /// Creates a mapper over the given object store, Document Finder, and
    /// LLM client.
    #[must_use]
    pub fn new(store: Arc<dyn ObjectStore>, finder: Arc<DocumentFinder>, llm: Arc<dyn LlmClient>) -> Self {
        Self { store, finder, llm }
    }

    /// Builds the map: every Strukturanalyse document is attached and
    /// asked for Zielobjekte (merged by kuerzel, preferring the longer
    /// non-empty name on conflict), then every Modellierung document is
    /// attached and asked for Baustein assignments, applying the
    /// forced-prefix override and dropping assignments to unknown kuerzel
    /// with a structural warning finding.
    pub async fn build(&self) -> Result<(SystemStructureMap, Vec<Finding>)> {
        self.finder.ensure_initialized().await?;
        let document_map: crate::docfinder::DocumentMap =
            crate::objectstore::read_json(&*self.store, self.finder.document_map_key()).await?;

        let mut by_kuerzel: HashMap<String, Zielobjekt> = HashMap::new();
        let root = informationsverbund_zielobjekt();
        by_kuerzel.insert(root.kuerzel.clone(), root);

        for key in document_map.documents_for(BsiCategory::Strukturanalyse) {
            let response = self.generate_zielobjekte(key).await?;
            merge_zielobjekte(&mut by_kuerzel, &response);
        }

        let mut map = SystemStructureMap {
            zielobjekte: by_kuerzel.into_values().collect(),
            baustein_assignments: HashMap::new(),
        };
        map.zielobjekte.sort_by(|a, b| a.kuerzel.cmp(&b.kuerzel));

        let mut findings = Vec::new();
        for key in document_map.documents_for(BsiCategory::Modellierung) {
            let response = self.generate_baustein_assignments(key).await?;
            apply_baustein_assignments(&mut map, &response, &mut findings);
        }

        Ok((map, findings))
    }

    async fn generate_zielobjekte(&self, key: &str) -> Result<Value> {
        let bytes = self.store.read(key).await?;
        let bundle = prompts::ground_truth_bundle();
        let schema = Schema::from_value(zielobjekte_schema())?;
        let request = GenerateRequest {
            system_prompt: bundle.system,
            user_prompt: format!("{} Source document: {key}.", bundle.user_template),
            documents: vec![AttachedDocument {
                source_key: key.to_string(),
                bytes,
                mime_type: "application/pdf".to_string(),
            }],
            schema,
        };
        self.llm.generate_structured(request).await
    }

    async fn generate_baustein_assignments(&self, key: &str) -> Result<Value> {
        let bytes = self.store.read(key).await?;
        let bundle = prompts::ground_truth_bundle();
        let schema = Schema::from_value(baustein_assignments_schema())?;
        let request = GenerateRequest {
            system_prompt: bundle.system,
            user_prompt: format!("{} Source document: {key}.", bundle.user_template),
            documents: vec![AttachedDocument {
                source_key: key.to_string(),
                bytes,
                mime_type: "application/pdf".to_string(),
            }],
            schema,
        };
        self.llm.generate_structured(request).await
    }
}

fn merge_zielobjekte(by_kuerzel: &mut HashMap<String, Zielobjekt>, response: &Value) {
    let Some(entries) = response.get("zielobjekte").and_then(|v| v.as_array()) else {
        return;
    };
    for entry in entries {
        let (Some(kuerzel), Some(name)) = (
            entry.get("kuerzel").and_then(|v| v.as_str()),
            entry.get("name").and_then(|v| v.as_str()),
        ) else {
            continue;
        };
        by_kuerzel
            .entry(kuerzel.to_string())
            .and_modify(|existing| {
                if name.len() > existing.name.len() && !name.is_empty() {
                    existing.name = name.to_string();
                }
            })
            .or_insert_with(|| Zielobjekt {
                kuerzel: kuerzel.to_string(),
                name: name.to_string(),
            });
    }
}

fn apply_baustein_assignments(map: &mut SystemStructureMap, response: &Value, findings: &mut Vec<Finding>) {
    let Some(entries) = response.get("baustein_assignments").and_then(|v| v.as_array()) else {
        return;
    };
    for entry in entries {
        let (Some(baustein_id), Some(kuerzel)) = (
            entry.get("baustein_id").and_then(|v| v.as_str()),
            entry.get("kuerzel").and_then(|v| v.as_str()),
        ) else {
            continue;
        };

        let resolved_kuerzel = if baustein_prefix_forces_informationsverbund(baustein_id) {
            INFORMATIONSVERBUND.to_string()
        } else {
            kuerzel.to_string()
        };

        if !map.has_zielobjekt(&resolved_kuerzel) {
            findings.push(Finding {
                id: String::new(),
                category: FindingCategory::Ok,
                description: format!(
                    "Baustein {baustein_id} assigned to unknown Zielobjekt {resolved_kuerzel}; \
                    assignment dropped"
                ),
                status: None,
                originating_stage: "ground-truth-map".to_string(),
            });
            continue;
        }

        map.baustein_assignments
            .insert(baustein_id.to_string(), resolved_kuerzel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn forced_prefixes_override() {
        assert!(baustein_prefix_forces_informationsverbund("ISMS.1"));
        assert!(baustein_prefix_forces_informationsverbund("ORP.4"));
        assert!(baustein_prefix_forces_informationsverbund("CON.3"));
        assert!(baustein_prefix_forces_informationsverbund("OPS.1.1.3"));
        assert!(baustein_prefix_forces_informationsverbund("DER.1"));
        assert!(!baustein_prefix_forces_informationsverbund("SYS.1.1"));
    }

    #[test]
    fn merge_prefers_longer_non_empty_name() {
        let mut by_kuerzel = HashMap::new();
        merge_zielobjekte(
            &mut by_kuerzel,
            &json!({"zielobjekte": [{"kuerzel": "SRV-01", "name": "Server"}]}),
        );
        merge_zielobjekte(
            &mut by_kuerzel,
            &json!({"zielobjekte": [{"kuerzel": "SRV-01", "name": "Server 01 - Production Database Host"}]}),
        );
        assert_eq!(
            by_kuerzel.get("SRV-01").unwrap().name,
            "Server 01 - Production Database Host"
        );
    }

    #[test]
    fn unknown_kuerzel_assignment_dropped_with_warning() {
        let mut map = SystemStructureMap {
            zielobjekte: vec![Zielobjekt { kuerzel: "SRV-01".into(), name: "Server".into() }],
            baustein_assignments: HashMap::new(),
        };
        let mut findings = Vec::new();
        apply_baustein_assignments(
            &mut map,
            &json!({"baustein_assignments": [{"baustein_id": "SYS.1.1", "kuerzel": "SRV-99"}]}),
            &mut findings,
        );
        assert!(map.baustein_assignments.is_empty());
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].category, FindingCategory::Ok);
    }

    #[test]
    fn isms_baustein_forced_to_informationsverbund_even_if_kuerzel_given() {
        let mut map = SystemStructureMap {
            zielobjekte: vec![
                informationsverbund_zielobjekt(),
                Zielobjekt { kuerzel: "SRV-01".into(), name: "Server".into() },
            ],
            baustein_assignments: HashMap::new(),
        };
        let mut findings = Vec::new();
        apply_baustein_assignments(
            &mut map,
            &json!({"baustein_assignments": [{"baustein_id": "ISMS.1", "kuerzel": "SRV-01"}]}),
            &mut findings,
        );
        assert!(findings.is_empty());
        assert_eq!(
            map.baustein_assignments.get("ISMS.1").unwrap(),
            INFORMATIONSVERBUND
        );
    }

    #[test]
    fn informationsverbund_always_present() {
        let mut by_kuerzel = HashMap::new();
        let root = informationsverbund_zielobjekt();
        by_kuerzel.insert(root.kuerzel.clone(), root);
        let map = SystemStructureMap {
            zielobjekte: by_kuerzel.into_values().collect(),
            baustein_assignments: HashMap::new(),
        };
        assert!(map.has_zielobjekt(INFORMATIONSVERBUND));
    }
}
