//! Report Assembler: deterministic merge of the report blueprint, every
//! stage's `ChapterResult`, and the run's finding ledger into the final
//! report document. This module never calls the LLM or the Document
//! Finder — everything it does is a pure lookup-and-merge over data
//! other components already produced.

use std::collections::HashMap;

use serde_json::Value;
use tracing::warn;

use crate::blueprint::{KeyPath, ReportBlueprint};
use crate::config::AuditConfig;
use crate::error::Result;
use crate::findings::{Finding, FindingCategory};
use crate::objectstore::ObjectStore;
use crate::stages::{ChapterResult, StageName};

/// Every blueprint slot the assembler fills from a stage's content,
/// outside of Chapter 7's 7.2 finding tables (populated separately,
/// directly from the finding ledger).
fn known_content_paths() -> Vec<KeyPath> {
    vec![
        KeyPath::new(["chapter1"]),
        KeyPath::new(["chapter3", "3.1"]),
        KeyPath::new(["chapter3", "3.2"]),
        KeyPath::new(["chapter3", "3.3"]),
        KeyPath::new(["chapter3", "3.6.1"]),
        KeyPath::new(["chapter4"]),
        KeyPath::new(["chapter5"]),
        KeyPath::new(["chapter7", "7.1"]),
    ]
}

/// Reads every stage result and the finding ledger from `store` and
/// writes the assembled final report back to `final_audit_report.json`,
/// all under `config`'s output prefix.
pub async fn run(store: &dyn ObjectStore, config: &AuditConfig) -> Result<Value> {
    let mut results = Vec::new();
    for stage in [
        StageName::Chapter1,
        StageName::Chapter3,
        StageName::Chapter4Cert,
        StageName::Chapter4Surv1,
        StageName::Chapter4Surv2,
        StageName::Chapter5,
        StageName::Chapter7,
    ] {
        let key = config.artifact_key(&format!("results/{}.json", stage.artifact_stem()));
        if store.exists(&key).await? {
            let result: ChapterResult = crate::objectstore::read_json(store, &key).await?;
            results.push(result);
        }
    }

    let all_findings_key = config.artifact_key("results/all_findings.json");
    let findings: Vec<Finding> = if store.exists(&all_findings_key).await? {
        crate::objectstore::read_json(store, &all_findings_key).await?
    } else {
        Vec::new()
    };

    let report = assemble(ReportBlueprint::default_template(), &results, &findings);
    let final_report_key = config.artifact_key("final_audit_report.json");
    crate::objectstore::write_json(store, &final_report_key, &report).await?;
    Ok(report)
}

/// Merges a blueprint, a run's stage results, and its finding ledger into
/// the final report document. Pure and deterministic: given the same
/// inputs, always produces the same output.
#[must_use]
pub fn assemble(blueprint: ReportBlueprint, results: &[ChapterResult], findings: &[Finding]) -> Value {
    let by_chapter = index_by_chapter_segment(results);
    let mut root = blueprint.clone().into_value();

    for path in known_content_paths() {
        if blueprint.get(&path).is_none() {
            warn!(path = %path, "blueprint has no slot for this key path, skipping");
            continue;
        }
        match resolve_from_content(&by_chapter, &path) {
            Some(value) => write_at(&mut root, &path, value),
            None => warn!(path = %path, "no stage content available for blueprint slot"),
        }
    }

    populate_finding_tables(&mut root, findings);
    root
}

fn index_by_chapter_segment(results: &[ChapterResult]) -> HashMap<&'static str, &Value> {
    let mut by_chapter = HashMap::new();
    for result in results {
        let segment = match result.stage {
            StageName::Chapter1 => "chapter1",
            StageName::Chapter3 => "chapter3",
            StageName::Chapter4Cert | StageName::Chapter4Surv1 | StageName::Chapter4Surv2 => "chapter4",
            StageName::Chapter5 => "chapter5",
            StageName::Chapter7 => "chapter7",
            StageName::PreviousReportScan | StageName::GroundTruthMap | StageName::GsCheckExtraction => continue,
        };
        by_chapter.insert(segment, &result.content);
    }
    by_chapter
}

fn resolve_from_content(by_chapter: &HashMap<&'static str, &Value>, path: &KeyPath) -> Option<Value> {
    let segments = path.segments();
    let top = segments.first()?;
    let content = *by_chapter.get(top.as_str())?;

    match segments.get(1) {
        None => Some(content.clone()),
        Some(sub) => match content {
            Value::Object(map) => map.get(sub).cloned(),
            Value::Array(items) => items.iter().find_map(|item| {
                let obj = item.as_object()?;
                if obj.get("key")?.as_str()? == sub {
                    Some(obj.get("summary").cloned().unwrap_or_else(|| item.clone()))
                } else {
                    None
                }
            }),
            _ => None,
        },
    }
}

/// Writes `value` at `path` in `root`, assuming every intermediate
/// segment already exists as an object (guaranteed by the caller having
/// confirmed the slot via `ReportBlueprint::get` first).
fn write_at(root: &mut Value, path: &KeyPath, value: Value) {
    let segments = path.segments();
    let Some((last, ancestors)) = segments.split_last() else {
        return;
    };
    let mut current = root;
    for segment in ancestors {
        let Some(next) = current.get_mut(segment) else {
            return;
        };
        current = next;
    }
    if let Some(obj) = current.as_object_mut() {
        obj.insert(last.clone(), value);
    }
}

/// Populates Chapter 7's three 7.2 tables by filtering the finding ledger
/// and ordering each table by ID within its category.
fn populate_finding_tables(root: &mut Value, findings: &[Finding]) {
    let tables = [
        (FindingCategory::MinorDeviation, "minor_deviations"),
        (FindingCategory::SevereDeviation, "severe_deviations"),
        (FindingCategory::Recommendation, "recommendations"),
    ];

    for (category, key) in tables {
        let mut entries: Vec<&Finding> = findings.iter().filter(|f| f.category == category).collect();
        entries.sort_by(|a, b| a.id.cmp(&b.id));
        let value = serde_json::to_value(&entries).unwrap_or(Value::Array(Vec::new()));
        write_at(root, &KeyPath::new(["chapter7", "7.2", key]), value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn finding(id: &str, category: FindingCategory, description: &str) -> Finding {
        Finding {
            id: id.to_string(),
            category,
            description: description.to_string(),
            status: None,
            originating_stage: "test".to_string(),
        }
    }

    #[test]
    fn fills_simple_chapter_slots_from_content() {
        let results = vec![
            ChapterResult {
                stage: StageName::Chapter1,
                content: serde_json::json!({"introduction": "scope text"}),
            },
            ChapterResult {
                stage: StageName::Chapter5,
                content: serde_json::json!([{"kuerzel": "SRV-01"}]),
            },
        ];
        let report = assemble(ReportBlueprint::default_template(), &results, &[]);
        assert_eq!(report["chapter1"]["introduction"], "scope text");
        assert_eq!(report["chapter5"][0]["kuerzel"], "SRV-01");
    }

    #[test]
    fn resolves_chapter3_subchapters_from_key_tagged_array() {
        let results = vec![ChapterResult {
            stage: StageName::Chapter3,
            content: serde_json::json!([
                {"key": "3.1", "summary": "org measures"},
                {"key": "3.6.1", "summary": "analysis"}
            ]),
        }];
        let report = assemble(ReportBlueprint::default_template(), &results, &[]);
        assert_eq!(report["chapter3"]["3.1"], "org measures");
        assert_eq!(report["chapter3"]["3.6.1"], "analysis");
        assert!(report["chapter3"]["3.2"].is_null());
    }

    #[test]
    fn any_chapter4_variant_fills_the_shared_chapter4_slot() {
        let results = vec![ChapterResult {
            stage: StageName::Chapter4Surv1,
            content: serde_json::json!({"assessment": "ok"}),
        }];
        let report = assemble(ReportBlueprint::default_template(), &results, &[]);
        assert_eq!(report["chapter4"]["assessment"], "ok");
    }

    #[test]
    fn populates_finding_tables_sorted_by_id_within_category() {
        let findings = vec![
            finding("AG-02", FindingCategory::MinorDeviation, "second"),
            finding("AG-01", FindingCategory::MinorDeviation, "first"),
            finding("AS-01", FindingCategory::SevereDeviation, "severe"),
            finding("OK-01", FindingCategory::Ok, "informational, excluded"),
        ];
        let report = assemble(ReportBlueprint::default_template(), &[], &findings);
        let minor = report["chapter7"]["7.2"]["minor_deviations"].as_array().unwrap();
        assert_eq!(minor.len(), 2);
        assert_eq!(minor[0]["id"], "AG-01");
        assert_eq!(minor[1]["id"], "AG-02");
        let severe = report["chapter7"]["7.2"]["severe_deviations"].as_array().unwrap();
        assert_eq!(severe.len(), 1);
        let recommendations = report["chapter7"]["7.2"]["recommendations"].as_array().unwrap();
        assert!(recommendations.is_empty());
    }

    #[test]
    fn missing_stage_content_leaves_slot_null_without_failing() {
        let report = assemble(ReportBlueprint::default_template(), &[], &[]);
        assert!(report["chapter1"].is_null());
        assert!(report["chapter7"]["7.2"]["minor_deviations"].as_array().unwrap().is_empty());
    }
}
