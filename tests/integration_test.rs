//! End-to-end tests exercising the Audit Controller over a real
//! (temp-directory) object store and a deterministic mock LLM client,
//! without ever reaching a live provider.

use std::sync::Arc;

use grundschutz_auditor::config::AuditConfig;
use grundschutz_auditor::controller::{AuditController, RunMode, StageStatus};
use grundschutz_auditor::docfinder::{BsiCategory, DocumentFinder};
use grundschutz_auditor::findings::{Finding, FindingCategory};
use grundschutz_auditor::llm::MockLlmClient;
use grundschutz_auditor::objectstore::{LocalObjectStore, ObjectStore};
use grundschutz_auditor::stages::chapter5::Chapter5Runner;
use grundschutz_auditor::stages::{StageContext, StageName, StageRunner};

async fn test_context(store: Arc<dyn ObjectStore>) -> StageContext {
    let mut config = AuditConfig::default();
    config.test_mode = true;
    config.source_prefix = "source".to_string();
    config.output_prefix = "output".to_string();

    let llm: Arc<dyn grundschutz_auditor::llm::LlmClient> = Arc::new(MockLlmClient::new());
    let finder = Arc::new(DocumentFinder::new(
        Arc::clone(&store),
        Arc::clone(&llm),
        config.source_prefix.clone(),
        config.output_prefix.clone(),
    ));

    StageContext {
        store,
        llm,
        finder,
        config,
    }
}

fn requirement_json(kuerzel: &str, status: &str) -> serde_json::Value {
    serde_json::json!({
        "zielobjekt_kuerzel": kuerzel,
        "anforderung_id": "SYS.1.1.A1",
        "titel": "Patch management",
        "umsetzungsstatus": status,
        "umsetzungserlaeuterung": "explanation",
        "datum_letzte_pruefung": null,
    })
}

#[tokio::test]
async fn chapter5_reads_merged_requirements_nested_under_output_prefix() {
    let dir = tempfile::tempdir().unwrap();
    let store: Arc<dyn ObjectStore> = Arc::new(LocalObjectStore::new(dir.path()).await.unwrap());
    let ctx = test_context(Arc::clone(&store)).await;

    let merged_key = ctx
        .config
        .artifact_key("results/intermediate/extracted_grundschutz_check_merged.json");
    let requirements = vec![
        requirement_json("SRV-01", "Nein"),
        requirement_json("SRV-01", "Ja"),
    ];
    grundschutz_auditor::objectstore::write_json(&*store, &merged_key, &requirements)
        .await
        .unwrap();

    let outcome = Chapter5Runner.run(&ctx).await.unwrap();
    let summaries = outcome.result.content.as_array().unwrap();
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0]["kuerzel"], "SRV-01");
    assert_eq!(summaries[0]["total_requirements"], 2);
}

#[tokio::test]
async fn controller_skips_stage_whose_artifact_already_exists() {
    let dir = tempfile::tempdir().unwrap();
    let store: Arc<dyn ObjectStore> = Arc::new(LocalObjectStore::new(dir.path()).await.unwrap());
    let ctx = test_context(Arc::clone(&store)).await;

    let existing_key = ctx.config.artifact_key("results/chapter-5.json");
    grundschutz_auditor::objectstore::write_json(
        &*store,
        &existing_key,
        &serde_json::json!({"stage": "Chapter5", "content": []}),
    )
    .await
    .unwrap();

    let controller = AuditController::new(ctx);
    let summary = controller
        .run(RunMode::RunStage {
            name: StageName::Chapter5,
            force: false,
        })
        .await
        .unwrap();

    assert_eq!(summary.stage_statuses.len(), 1);
    assert_eq!(
        summary.stage_statuses[0],
        (StageName::Chapter5, StageStatus::SkippedAlreadyComplete)
    );
}

#[tokio::test]
async fn controller_force_reruns_a_completed_stage() {
    let dir = tempfile::tempdir().unwrap();
    let store: Arc<dyn ObjectStore> = Arc::new(LocalObjectStore::new(dir.path()).await.unwrap());
    let ctx = test_context(Arc::clone(&store)).await;

    let existing_key = ctx.config.artifact_key("results/chapter-5.json");
    grundschutz_auditor::objectstore::write_json(
        &*store,
        &existing_key,
        &serde_json::json!({"stage": "Chapter5", "content": []}),
    )
    .await
    .unwrap();
    let merged_key = ctx
        .config
        .artifact_key("results/intermediate/extracted_grundschutz_check_merged.json");
    grundschutz_auditor::objectstore::write_json(
        &*store,
        &merged_key,
        &vec![requirement_json("SRV-02", "Teilweise")],
    )
    .await
    .unwrap();

    let controller = AuditController::new(ctx);
    let summary = controller
        .run(RunMode::RunStage {
            name: StageName::Chapter5,
            force: true,
        })
        .await
        .unwrap();

    assert_eq!(summary.stage_statuses[0], (StageName::Chapter5, StageStatus::Ran));

    let updated: serde_json::Value = grundschutz_auditor::objectstore::read_json(&*store, &existing_key)
        .await
        .unwrap();
    assert_eq!(updated["content"][0]["kuerzel"], "SRV-02");
}

#[tokio::test]
async fn controller_marks_stage_failed_when_prerequisite_artifact_is_missing() {
    let dir = tempfile::tempdir().unwrap();
    let store: Arc<dyn ObjectStore> = Arc::new(LocalObjectStore::new(dir.path()).await.unwrap());
    let ctx = test_context(Arc::clone(&store)).await;

    let controller = AuditController::new(ctx);
    let summary = controller
        .run(RunMode::RunStage {
            name: StageName::Chapter5,
            force: false,
        })
        .await
        .unwrap();

    match &summary.stage_statuses[0].1 {
        StageStatus::Failed { reason } => {
            assert!(reason.contains("gs-check-extraction"));
        }
        other => panic!("expected Failed status, got {other:?}"),
    }
}

#[tokio::test]
async fn generate_report_only_assembles_final_report_from_existing_artifacts() {
    let dir = tempfile::tempdir().unwrap();
    let store: Arc<dyn ObjectStore> = Arc::new(LocalObjectStore::new(dir.path()).await.unwrap());
    let ctx = test_context(Arc::clone(&store)).await;
    let config = ctx.config.clone();

    let chapter5_key = config.artifact_key("results/chapter-5.json");
    grundschutz_auditor::objectstore::write_json(
        &*store,
        &chapter5_key,
        &serde_json::json!({
            "stage": "Chapter5",
            "content": [{"kuerzel": "SRV-01", "total_requirements": 2, "nein": 1, "teilweise": 0, "ja": 1, "entbehrlich": 0}]
        }),
    )
    .await
    .unwrap();

    let findings = vec![Finding {
        id: "AG-01".to_string(),
        category: FindingCategory::MinorDeviation,
        description: "example deviation".to_string(),
        status: None,
        originating_stage: "test".to_string(),
    }];
    let all_findings_key = config.artifact_key("results/all_findings.json");
    grundschutz_auditor::objectstore::write_json(&*store, &all_findings_key, &findings)
        .await
        .unwrap();

    let controller = AuditController::new(ctx);
    let summary = controller.run(RunMode::GenerateReportOnly).await.unwrap();
    assert!(summary.stage_statuses.is_empty());

    let final_report_key = config.artifact_key("final_audit_report.json");
    assert!(store.exists(&final_report_key).await.unwrap());

    let report: serde_json::Value = grundschutz_auditor::objectstore::read_json(&*store, &final_report_key)
        .await
        .unwrap();
    assert_eq!(report["chapter5"][0]["kuerzel"], "SRV-01");
    assert_eq!(report["chapter7"]["7.2"]["minor_deviations"][0]["id"], "AG-01");
}

#[tokio::test]
async fn document_finder_falls_back_to_sonstiges_when_llm_classification_unseeded() {
    let dir = tempfile::tempdir().unwrap();
    let store: Arc<dyn ObjectStore> = Arc::new(LocalObjectStore::new(dir.path()).await.unwrap());
    store.write("source/netzplan.pdf", b"content").await.unwrap();
    store.write("source/strukturanalyse.pdf", b"content").await.unwrap();

    let llm: Arc<dyn grundschutz_auditor::llm::LlmClient> = Arc::new(MockLlmClient::new());
    let finder = DocumentFinder::new(Arc::clone(&store), llm, "source", "output");

    let findings = finder.ensure_initialized().await.unwrap();
    assert_eq!(findings.len(), 1);
    assert_eq!(findings[0].category, FindingCategory::MinorDeviation);

    let map_key = finder.document_map_key();
    let map: grundschutz_auditor::docfinder::DocumentMap =
        grundschutz_auditor::objectstore::read_json(&*store, map_key).await.unwrap();
    assert_eq!(map.documents_for(BsiCategory::Sonstiges).len(), 2);
    assert!(map.documents_for(BsiCategory::Netzplan).is_empty());
}
