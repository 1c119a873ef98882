//! Phase E: five targeted analysis questions over the merged requirement
//! set, consolidated into one subchapter-3.6.1 finding.

use std::sync::Arc;

use chrono::NaiveDate;
use tracing::warn;

use crate::docfinder::BsiCategory;
use crate::docfinder::DocumentFinder;
use crate::error::Result;
use crate::findings::{Finding, FindingCategory};
use crate::llm::{AttachedDocument, GenerateRequest, LlmClient, Schema};
use crate::objectstore::ObjectStore;

use super::types::{Requirement, Umsetzungsstatus};

const STALE_REVIEW_THRESHOLD_DAYS: i64 = 365;

/// Q1 — deterministic: every requirement must carry a recognized status.
/// Returns the count of requirements missing one (always zero given the
/// enum-constrained schema, retained as a defensive structural check).
fn q1_status_presence(requirements: &[Requirement]) -> usize {
    requirements
        .iter()
        .filter(|r| r.umsetzungserlaeuterung.trim().is_empty())
        .count()
}

/// Q3 (deterministic half) — counts `MUSS`-level (Anforderung ID ending in
/// a numeral without a following letter suffix is out of scope here; BSI
/// marks MUSS-level requirements in the title) Level-1 requirements not
/// marked `Ja`. A simple heuristic: level-1 Anforderung IDs end in a
/// single digit after the final dot.
fn q3_muss_level1_not_ja(requirements: &[Requirement]) -> Vec<&Requirement> {
    requirements
        .iter()
        .filter(|r| is_level1(&r.anforderung_id) && r.umsetzungsstatus != Umsetzungsstatus::Ja)
        .collect()
}

fn is_level1(anforderung_id: &str) -> bool {
    anforderung_id
        .rsplit('.')
        .next()
        .and_then(|suffix| suffix.strip_prefix('A'))
        .is_some_and(|rest| rest.parse::<u32>().is_ok_and(|n| (1..=6).contains(&n)))
}

/// Q5 — deterministic: flags requirements whose last review date is older
/// than the staleness threshold, using `reference_date` as "now" so the
/// check is reproducible in tests (and across retried stage runs on the
/// same day).
fn q5_stale_reviews<'a>(requirements: &'a [Requirement], reference_date: NaiveDate) -> Vec<&'a Requirement> {
    requirements
        .iter()
        .filter(|r| {
            r.datum_letzte_pruefung
                .as_deref()
                .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
                .is_some_and(|date| (reference_date - date).num_days() > STALE_REVIEW_THRESHOLD_DAYS)
        })
        .collect()
}

struct PlausibilityVerdict {
    plausible: bool,
}

struct CoverageVerdict {
    covered: bool,
}

fn q2_schema() -> serde_json::Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "verdicts": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "anforderung_id": {"type": "string"},
                        "plausible": {"type": "boolean"},
                        "rationale": {"type": "string"}
                    },
                    "required": ["anforderung_id", "plausible", "rationale"]
                }
            }
        },
        "required": ["verdicts"]
    })
}

fn q4_schema() -> serde_json::Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "verdicts": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "anforderung_id": {"type": "string"},
                        "covered": {"type": "boolean"},
                        "evidence_snippet": {"type": ["string", "null"]}
                    },
                    "required": ["anforderung_id", "covered"]
                }
            }
        },
        "required": ["verdicts"]
    })
}

/// Q2 — asks the model to judge the plausibility of every `Entbehrlich`
/// classification, sending only those items (no attached documents: the
/// judgment is over the requirement's own stated rationale). Returns an
/// empty result without calling the LLM when there is nothing to judge.
async fn q2_entbehrlich_plausibility(
    llm: &Arc<dyn LlmClient>,
    requirements: &[Requirement],
) -> Result<Vec<PlausibilityVerdict>> {
    let entbehrlich: Vec<&Requirement> = requirements
        .iter()
        .filter(|r| r.umsetzungsstatus == Umsetzungsstatus::Entbehrlich)
        .collect();
    if entbehrlich.is_empty() {
        return Ok(Vec::new());
    }

    let schema = Schema::from_value(q2_schema())?;
    let request = GenerateRequest {
        system_prompt: "You judge whether each Entbehrlich (not-applicable) Grundschutz-Check \
            classification below is plausible, given its stated implementation explanation. A \
            classification is implausible if the explanation does not actually justify treating \
            the requirement as not applicable."
            .to_string(),
        user_prompt: format!(
            "Assess the plausibility of each Entbehrlich classification below.\n\n{}",
            serde_json::to_string(&entbehrlich).unwrap_or_default()
        ),
        documents: Vec::new(),
        schema,
    };

    let response = llm.generate_structured(request).await?;
    Ok(parse_plausibility_verdicts(&response))
}

/// Q4 — attaches the classified Realisierungsplan document(s) and asks
/// whether each unmet (`Nein`/`Teilweise`) requirement is covered by a
/// planned remediation. Returns an empty result without calling the LLM
/// when there is nothing unmet, or no Realisierungsplan was classified.
async fn q4_realisierungsplan_coverage(
    store: &Arc<dyn ObjectStore>,
    finder: &Arc<DocumentFinder>,
    llm: &Arc<dyn LlmClient>,
    requirements: &[Requirement],
) -> Result<Vec<CoverageVerdict>> {
    let unmet: Vec<&Requirement> = requirements
        .iter()
        .filter(|r| matches!(r.umsetzungsstatus, Umsetzungsstatus::Nein | Umsetzungsstatus::Teilweise))
        .collect();
    if unmet.is_empty() {
        return Ok(Vec::new());
    }

    let document_map: crate::docfinder::DocumentMap =
        crate::objectstore::read_json(&**store, finder.document_map_key()).await?;
    let plan_keys = document_map.documents_for(BsiCategory::Realisierungsplan);
    if plan_keys.is_empty() {
        warn!("no Realisierungsplan classified; skipping Q4 coverage analysis");
        return Ok(Vec::new());
    }

    let mut documents = Vec::with_capacity(plan_keys.len());
    for key in plan_keys {
        let bytes = store.read(key).await?;
        documents.push(AttachedDocument {
            source_key: key.clone(),
            bytes,
            mime_type: "application/pdf".to_string(),
        });
    }

    let schema = Schema::from_value(q4_schema())?;
    let request = GenerateRequest {
        system_prompt: "You determine, from the attached Realisierungsplan, whether each unmet \
            Grundschutz-Check requirement below is covered by a planned remediation measure."
            .to_string(),
        user_prompt: format!(
            "For each unmet requirement below, determine whether the attached Realisierungsplan \
            covers it with a planned remediation.\n\n{}",
            serde_json::to_string(&unmet).unwrap_or_default()
        ),
        documents,
        schema,
    };

    let response = llm.generate_structured(request).await?;
    Ok(parse_coverage_verdicts(&response))
}

fn parse_plausibility_verdicts(response: &serde_json::Value) -> Vec<PlausibilityVerdict> {
    let Some(entries) = response.get("verdicts").and_then(|v| v.as_array()) else {
        return Vec::new();
    };
    entries
        .iter()
        .filter_map(|entry| {
            Some(PlausibilityVerdict {
                plausible: entry.get("plausible")?.as_bool()?,
            })
        })
        .collect()
}

fn parse_coverage_verdicts(response: &serde_json::Value) -> Vec<CoverageVerdict> {
    let Some(entries) = response.get("verdicts").and_then(|v| v.as_array()) else {
        return Vec::new();
    };
    entries
        .iter()
        .filter_map(|entry| {
            Some(CoverageVerdict {
                covered: entry.get("covered")?.as_bool()?,
            })
        })
        .collect()
}

/// Runs all five targeted questions and consolidates the results into the
/// single subchapter-3.6.1 finding. Q2 and Q4 degrade to zero findings
/// (rather than aborting the whole extraction) if the LLM call fails.
pub async fn consolidate(
    store: &Arc<dyn ObjectStore>,
    finder: &Arc<DocumentFinder>,
    llm: &Arc<dyn LlmClient>,
    requirements: &[Requirement],
    reference_date: NaiveDate,
) -> Finding {
    let missing_status = q1_status_presence(requirements);
    let level1_gaps = q3_muss_level1_not_ja(requirements);
    let stale = q5_stale_reviews(requirements, reference_date);

    let implausible_entbehrlich = q2_entbehrlich_plausibility(llm, requirements)
        .await
        .unwrap_or_default()
        .into_iter()
        .filter(|v| !v.plausible)
        .count();

    let uncovered = q4_realisierungsplan_coverage(store, finder, llm, requirements)
        .await
        .unwrap_or_default()
        .into_iter()
        .filter(|v| !v.covered)
        .count();

    let ok = level1_gaps.is_empty() && stale.is_empty() && implausible_entbehrlich == 0 && uncovered == 0;

    let description = format!(
        "Subchapter 3.6.1 analysis: {missing_status} requirement(s) missing a status narrative, \
        {level1_gaps} Level-1 MUSS requirement(s) not marked Ja, {stale} requirement(s) with a \
        review date older than {STALE_REVIEW_THRESHOLD_DAYS} days, {implausible_entbehrlich} \
        Entbehrlich classification(s) judged implausible, {uncovered} unmet requirement(s) not \
        covered by the Realisierungsplan.",
        level1_gaps = level1_gaps.len(),
        stale = stale.len(),
    );

    Finding {
        id: String::new(),
        category: if ok { FindingCategory::Ok } else { FindingCategory::Recommendation },
        description,
        status: None,
        originating_stage: "gs-check-analysis".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockLlmClient;
    use crate::objectstore::LocalObjectStore;

    fn req(id: &str, status: Umsetzungsstatus, date: Option<&str>) -> Requirement {
        Requirement {
            zielobjekt_kuerzel: "SRV-01".into(),
            anforderung_id: id.into(),
            titel: "t".into(),
            umsetzungsstatus: status,
            umsetzungserlaeuterung: "explained".into(),
            datum_letzte_pruefung: date.map(str::to_string),
        }
    }

    async fn harness() -> (Arc<dyn ObjectStore>, Arc<DocumentFinder>, Arc<dyn LlmClient>) {
        let dir = tempfile::tempdir().unwrap();
        let store: Arc<dyn ObjectStore> = Arc::new(LocalObjectStore::new(dir.path()).await.unwrap());
        let llm: Arc<dyn LlmClient> = Arc::new(MockLlmClient::new());
        let finder = Arc::new(DocumentFinder::new(store.clone(), llm.clone(), "source", "output"));
        (store, finder, llm)
    }

    #[test]
    fn level1_detection_matches_trailing_single_digit() {
        assert!(is_level1("SYS.1.1.A3"));
        assert!(!is_level1("SYS.1.1.A13"));
    }

    #[test]
    fn q5_flags_dates_older_than_threshold() {
        let reference = NaiveDate::from_ymd_opt(2026, 7, 28).unwrap();
        let requirements = vec![
            req("SYS.1.1.A1", Umsetzungsstatus::Ja, Some("2020-01-01")),
            req("SYS.1.1.A2", Umsetzungsstatus::Ja, Some("2026-06-01")),
        ];
        let stale = q5_stale_reviews(&requirements, reference);
        assert_eq!(stale.len(), 1);
        assert_eq!(stale[0].anforderung_id, "SYS.1.1.A1");
    }

    #[tokio::test]
    async fn consolidate_reports_ok_when_requirements_are_clean() {
        let (store, finder, llm) = harness().await;
        let requirements = vec![req("SYS.1.1.A1", Umsetzungsstatus::Ja, None)];
        let finding = consolidate(
            &store,
            &finder,
            &llm,
            &requirements,
            NaiveDate::from_ymd_opt(2026, 7, 28).unwrap(),
        )
        .await;
        assert_eq!(finding.category, FindingCategory::Ok);
    }

    #[tokio::test]
    async fn consolidate_degrades_gracefully_when_q2_call_fails() {
        let (store, finder, llm) = harness().await;
        // Entbehrlich present but unseeded on the mock client: Q2 fails,
        // consolidate must still return a finding rather than propagate.
        let requirements = vec![req("SYS.1.1.A1", Umsetzungsstatus::Entbehrlich, None)];
        let finding = consolidate(
            &store,
            &finder,
            &llm,
            &requirements,
            NaiveDate::from_ymd_opt(2026, 7, 28).unwrap(),
        )
        .await;
        assert!(finding.description.contains("Entbehrlich classification"));
    }

    #[tokio::test]
    async fn q4_skips_llm_call_when_no_requirements_are_unmet() {
        let (store, finder, llm) = harness().await;
        let requirements = vec![req("SYS.1.1.A1", Umsetzungsstatus::Ja, None)];
        let verdicts = q4_realisierungsplan_coverage(&store, &finder, &llm, &requirements)
            .await
            .unwrap();
        assert!(verdicts.is_empty());
    }

    #[tokio::test]
    async fn q4_skips_llm_call_when_no_realisierungsplan_classified() {
        let (store, finder, llm) = harness().await;
        finder.ensure_initialized().await.unwrap();
        let requirements = vec![req("SYS.1.1.A1", Umsetzungsstatus::Nein, None)];
        let verdicts = q4_realisierungsplan_coverage(&store, &finder, &llm, &requirements)
            .await
            .unwrap();
        assert!(verdicts.is_empty());
    }
}
