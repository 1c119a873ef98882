//! Chapter 4 stage: Baustein-coverage assessment, varying by audit type.
//!
//! Spec §4.6 step 4 gives each audit type its own coverage rule: an
//! initial certification audit needs at least six Bausteine assigned to
//! the Informationsverbund; a surveillance audit (either variant) needs
//! `ISMS.1` plus at least two others, with no minimum-six requirement.
//! Only the validation threshold and the prompt bundle differ between the
//! three variants, so the three runners below are thin wrappers over one
//! shared base.

use async_trait::async_trait;

use crate::config::AuditType;
use crate::error::Result;
use crate::findings::{Finding, FindingCategory};
use crate::groundtruth::SystemStructureMap;
use crate::llm::{GenerateRequest, LlmClient, Schema, prompts};

use super::{ChapterResult, StageContext, StageName, StageOutcome, StageRunner};

/// Minimum number of Bausteine that must be assigned to the
/// Informationsverbund for Chapter 4 coverage to be considered adequate.
const MIN_INFORMATIONSVERBUND_BAUSTEINE: usize = 6;

async fn run_chapter4(
    ctx: &StageContext,
    stage_name: StageName,
    audit_type: AuditType,
) -> Result<StageOutcome> {
    let structure_key = ctx.config.artifact_key("system_structure_map.json");
    let structure: SystemStructureMap =
        crate::objectstore::read_json(&*ctx.store, &structure_key).await?;

    let coverage_finding = check_informationsverbund_coverage(&structure, audit_type);

    let bundle = prompts::chapter4_bundle(audit_type);
    let schema = Schema::from_value(serde_json::json!({
        "type": "object",
        "properties": {
            "assessment": {"type": "string"},
            "baustein_pairs": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "baustein_id": {"type": "string"},
                        "zielobjekt_kuerzel": {"type": "string"}
                    },
                    "required": ["baustein_id", "zielobjekt_kuerzel"]
                }
            }
        },
        "required": ["assessment", "baustein_pairs"]
    }))?;

    let request = GenerateRequest {
        system_prompt: bundle.system,
        user_prompt: format!(
            "{} The current system structure map, as JSON, is: {}",
            bundle.user_template,
            serde_json::to_string(&structure)?
        ),
        documents: Vec::new(),
        schema,
    };

    let response = ctx.llm.generate_structured(request).await?;
    let (validated_pairs, mut findings) = validate_baustein_pairs(&response, &structure);
    if let Some(finding) = coverage_finding {
        findings.push(finding);
    }

    let mut content = response;
    if let Some(obj) = content.as_object_mut() {
        obj.insert("baustein_pairs".to_string(), serde_json::Value::Array(validated_pairs));
    }

    Ok(StageOutcome {
        result: ChapterResult {
            stage: stage_name,
            content,
        },
        findings,
    })
}

/// Validates each `(baustein_id, zielobjekt_kuerzel)` pair the LLM
/// returned against the system structure map (spec §4.6 step 4): pairs
/// referencing an unknown Zielobjekt are dropped and raise a
/// [`FindingCategory::Recommendation`] finding rather than being carried
/// into the chapter's report content.
fn validate_baustein_pairs(
    response: &serde_json::Value,
    structure: &SystemStructureMap,
) -> (Vec<serde_json::Value>, Vec<Finding>) {
    let mut findings = Vec::new();
    let Some(entries) = response.get("baustein_pairs").and_then(|v| v.as_array()) else {
        return (Vec::new(), findings);
    };

    let mut validated = Vec::new();
    for entry in entries {
        let (Some(baustein_id), Some(kuerzel)) = (
            entry.get("baustein_id").and_then(|v| v.as_str()),
            entry.get("zielobjekt_kuerzel").and_then(|v| v.as_str()),
        ) else {
            continue;
        };

        if structure.has_zielobjekt(kuerzel) {
            validated.push(entry.clone());
        } else {
            findings.push(Finding {
                id: String::new(),
                category: FindingCategory::Recommendation,
                description: format!(
                    "Chapter 4 proposed Baustein {baustein_id} for unknown Zielobjekt {kuerzel}; \
                    pair dropped"
                ),
                status: None,
                originating_stage: "chapter-4".to_string(),
            });
        }
    }
    (validated, findings)
}

/// Checks spec §4.6 step 4's per-audit-type rule: a certification audit
/// needs at least six Bausteine assigned to the Informationsverbund; a
/// surveillance audit (either variant) needs `ISMS.1` plus at least two
/// others, with no minimum-six requirement. Returns a
/// [`FindingCategory::Recommendation`] finding if the applicable rule is
/// violated.
fn check_informationsverbund_coverage(
    structure: &SystemStructureMap,
    audit_type: AuditType,
) -> Option<Finding> {
    let assigned: Vec<&String> = structure
        .baustein_assignments
        .iter()
        .filter(|(_, kuerzel)| kuerzel.as_str() == crate::groundtruth::INFORMATIONSVERBUND)
        .map(|(baustein_id, _)| baustein_id)
        .collect();

    let has_isms1 = assigned.iter().any(|id| id.as_str() == "ISMS.1");
    let enough_besides_isms1 = assigned.iter().filter(|id| id.as_str() != "ISMS.1").count() >= 2;

    let ok = match audit_type {
        AuditType::Cert => assigned.len() >= MIN_INFORMATIONSVERBUND_BAUSTEINE,
        AuditType::Surveillance1 | AuditType::Surveillance2 => has_isms1 && enough_besides_isms1,
    };
    if ok {
        return None;
    }

    let description = match audit_type {
        AuditType::Cert => format!(
            "Informationsverbund Baustein coverage below the certification minimum: \
            {} Baustein(e) assigned, expected at least {}.",
            assigned.len(),
            MIN_INFORMATIONSVERBUND_BAUSTEINE
        ),
        AuditType::Surveillance1 | AuditType::Surveillance2 => format!(
            "Informationsverbund Baustein coverage does not meet the surveillance rule: \
            ISMS.1 {}present, {} other Baustein(e) assigned (need at least 2).",
            if has_isms1 { "" } else { "not " },
            assigned.len().saturating_sub(usize::from(has_isms1)),
        ),
    };

    Some(Finding {
        id: String::new(),
        category: FindingCategory::Recommendation,
        description,
        status: None,
        originating_stage: "chapter-4".to_string(),
    })
}

/// Chapter 4 for an initial certification audit.
pub struct Chapter4CertRunner;

#[async_trait]
impl StageRunner for Chapter4CertRunner {
    fn name(&self) -> StageName {
        StageName::Chapter4Cert
    }

    fn prerequisites(&self) -> &'static [StageName] {
        &[StageName::GroundTruthMap]
    }

    async fn run(&self, ctx: &StageContext) -> Result<StageOutcome> {
        run_chapter4(ctx, self.name(), AuditType::Cert).await
    }
}

/// Chapter 4 for the first surveillance audit.
pub struct Chapter4Surv1Runner;

#[async_trait]
impl StageRunner for Chapter4Surv1Runner {
    fn name(&self) -> StageName {
        StageName::Chapter4Surv1
    }

    fn prerequisites(&self) -> &'static [StageName] {
        &[StageName::GroundTruthMap]
    }

    async fn run(&self, ctx: &StageContext) -> Result<StageOutcome> {
        run_chapter4(ctx, self.name(), AuditType::Surveillance1).await
    }
}

/// Chapter 4 for the second surveillance audit.
pub struct Chapter4Surv2Runner;

#[async_trait]
impl StageRunner for Chapter4Surv2Runner {
    fn name(&self) -> StageName {
        StageName::Chapter4Surv2
    }

    fn prerequisites(&self) -> &'static [StageName] {
        &[StageName::GroundTruthMap]
    }

    async fn run(&self, ctx: &StageContext) -> Result<StageOutcome> {
        run_chapter4(ctx, self.name(), AuditType::Surveillance2).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn structure_with(count: usize, include_isms1: bool) -> SystemStructureMap {
        let mut assignments = HashMap::new();
        if include_isms1 {
            assignments.insert(
                "ISMS.1".to_string(),
                crate::groundtruth::INFORMATIONSVERBUND.to_string(),
            );
        }
        for i in 0..count {
            assignments.insert(
                format!("OPS.{i}"),
                crate::groundtruth::INFORMATIONSVERBUND.to_string(),
            );
        }
        SystemStructureMap {
            zielobjekte: Vec::new(),
            baustein_assignments: assignments,
        }
    }

    #[test]
    fn cert_ok_with_six_bausteine() {
        let structure = structure_with(6, false);
        assert!(check_informationsverbund_coverage(&structure, AuditType::Cert).is_none());
    }

    #[test]
    fn cert_flagged_below_six() {
        let structure = structure_with(5, false);
        let finding =
            check_informationsverbund_coverage(&structure, AuditType::Cert).unwrap();
        assert_eq!(finding.category, FindingCategory::Recommendation);
    }

    #[test]
    fn surveillance_ok_with_isms1_and_two_others_even_below_six() {
        let structure = structure_with(2, true);
        assert!(
            check_informationsverbund_coverage(&structure, AuditType::Surveillance1).is_none()
        );
    }

    #[test]
    fn surveillance_flagged_when_isms1_missing() {
        let structure = structure_with(6, false);
        let finding =
            check_informationsverbund_coverage(&structure, AuditType::Surveillance2).unwrap();
        assert_eq!(finding.category, FindingCategory::Recommendation);
    }

    #[test]
    fn surveillance_flagged_when_too_few_others() {
        let structure = structure_with(1, true);
        assert!(
            check_informationsverbund_coverage(&structure, AuditType::Surveillance1).is_some()
        );
    }

    #[test]
    fn validate_pairs_drops_unknown_kuerzel() {
        let structure = SystemStructureMap {
            zielobjekte: vec![crate::groundtruth::Zielobjekt {
                kuerzel: "SRV-01".into(),
                name: "Server".into(),
            }],
            baustein_assignments: HashMap::new(),
        };
        let response = serde_json::json!({
            "assessment": "a",
            "baustein_pairs": [
                {"baustein_id": "SYS.1.1", "zielobjekt_kuerzel": "SRV-01"},
                {"baustein_id": "SYS.1.2", "zielobjekt_kuerzel": "SRV-99"}
            ]
        });
        let (validated, findings) = validate_baustein_pairs(&response, &structure);
        assert_eq!(validated.len(), 1);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].category, FindingCategory::Recommendation);
    }
}
