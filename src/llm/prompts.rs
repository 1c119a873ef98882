//! Prompt bundles for each stage, loaded by name so the audit-type-specific
//! Chapter 4 variants can swap bodies behind one selection point.

use crate::config::AuditType;

/// A system/user prompt pair for one stage task.
#[derive(Debug, Clone)]
pub struct PromptBundle {
    /// System/instruction prompt.
    pub system: String,
    /// User-turn prompt template.
    pub user_template: String,
}

impl PromptBundle {
    fn new(system: impl Into<String>, user_template: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            user_template: user_template.into(),
        }
    }
}

/// Returns the prompt bundle for classifying a source document into a BSI
/// category (Document Finder initialization).
#[must_use]
pub fn classification_bundle() -> PromptBundle {
    PromptBundle::new(
        "You are a document classification assistant for a BSI Grundschutz \
         security audit. Assign each filename to exactly one of the nine \
         document categories. Never invent a category outside the allowed \
         set.",
        "Classify each of the following filenames into a BSI document \
         category, returning one entry per input filename: {filenames}",
    )
}

/// Returns the prompt bundle for building the ground-truth system
/// structure map from Strukturanalyse and Modellierung documents.
#[must_use]
pub fn ground_truth_bundle() -> PromptBundle {
    PromptBundle::new(
        "You extract the system structure (Zielobjekte and Baustein \
         assignments) from BSI Grundschutz structural-analysis and \
         modelling documents. Report only what the documents state.",
        "Extract every Zielobjekt (kuerzel, name) and every \
         Baustein-to-Zielobjekt assignment from the attached documents.",
    )
}

/// Returns the prompt bundle for one Grundschutz-Check extraction chunk.
#[must_use]
pub fn gs_check_extraction_bundle() -> PromptBundle {
    PromptBundle::new(
        "You extract BSI Grundschutz-Check requirement rows from a chunk \
         of a Grundschutz-Check PDF. Each row has a Zielobjekt kuerzel, an \
         Anforderung ID, a title, an implementation status, an \
         implementation explanation, and an optional last-review date. \
         Report only rows present in this chunk; never infer a row from \
         context outside it.",
        "Extract every requirement row found in this chunk, covering pages \
         {start_page}-{end_page} of Zielobjekt {kuerzel}.",
    )
}

/// Returns the prompt bundle for the Chapter 4 variant selected by
/// `audit_type`.
#[must_use]
pub fn chapter4_bundle(audit_type: AuditType) -> PromptBundle {
    match audit_type {
        AuditType::Cert => PromptBundle::new(
            "You write Chapter 4 of an initial BSI Grundschutz \
             certification audit report, assessing overall readiness \
             across the modelled Bausteine.",
            "Summarize certification readiness across the Informationsverbund \
             and every assigned Zielobjekt's Baustein coverage.",
        ),
        AuditType::Surveillance1 => PromptBundle::new(
            "You write Chapter 4 of a first BSI Grundschutz surveillance \
             audit report, assessing progress since certification.",
            "Summarize progress since certification across the modelled \
             Bausteine, focusing on previously open findings.",
        ),
        AuditType::Surveillance2 => PromptBundle::new(
            "You write Chapter 4 of a second BSI Grundschutz surveillance \
             audit report, assessing sustained compliance.",
            "Summarize sustained compliance across the modelled Bausteine \
             since the first surveillance audit.",
        ),
    }
}

/// Returns the prompt bundle for one Chapter 3 subchapter task.
#[must_use]
pub fn chapter3_subchapter_bundle(subchapter_key: &str) -> PromptBundle {
    PromptBundle::new(
        "You write one subchapter of Chapter 3 of a BSI Grundschutz audit \
         report, drawing only on the requirements and documents for the \
         Zielobjekt categories assigned to this subchapter.",
        format!("Answer the configured questions for subchapter {subchapter_key}."),
    )
}

/// Returns the prompt bundle for the five targeted Phase E analysis
/// questions, asked over the merged requirement set.
#[must_use]
pub fn analysis_bundle() -> PromptBundle {
    PromptBundle::new(
        "You analyze a merged set of BSI Grundschutz-Check requirements \
         for plausibility issues: implausible Entbehrlich classifications, \
         unmet requirements not covered by a realization plan, and stale \
         review dates.",
        "Answer the five targeted analysis questions over the attached \
         merged requirement set.",
    )
}
