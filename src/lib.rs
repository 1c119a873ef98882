//! # Grundschutz Auditor
//!
//! Staged orchestration pipeline for BSI Grundschutz audits: source PDFs
//! go in, a structured audit report comes out.
//!
//! The pipeline is a DAG of stages — Document Finder, Ground-Truth
//! Mapper, Grundschutz-Check Extractor, one runner per report chapter —
//! coordinated by an Audit Controller that assigns finding IDs centrally
//! and tracks per-stage completion so a run can resume after a partial
//! failure. A strictly deterministic Report Assembler merges every
//! stage's output into the final report; it never calls the LLM or the
//! Document Finder.
//!
//! ## Modules
//!
//! - [`config`]: run configuration (audit type, concurrency limits, test mode).
//! - [`objectstore`]: the durable object store interface (local filesystem or cloud).
//! - [`llm`]: the schema-constrained structured-generation interface to the LLM provider.
//! - [`pdf`]: per-page text extraction from source PDFs.
//! - [`docfinder`]: classifies source documents into BSI categories.
//! - [`groundtruth`]: builds the system structure map of Zielobjekte and Baustein assignments.
//! - [`extractor`]: chunked extraction and merge of Grundschutz-Check requirements.
//! - [`findings`]: the central, ID-assigning finding ledger.
//! - [`blueprint`]: the report's typed template.
//! - [`stages`]: one runner per pipeline stage.
//! - [`controller`]: topological stage execution and resumability.
//! - [`assembler`]: deterministic merge of stage results into the final report.

#![warn(missing_docs)]

pub mod assembler;
pub mod blueprint;
pub mod cli;
pub mod config;
pub mod controller;
pub mod docfinder;
pub mod embedding;
pub mod error;
pub mod extractor;
pub mod findings;
pub mod groundtruth;
pub mod llm;
pub mod objectstore;
pub mod pdf;
pub mod stages;

pub use error::{Error, Result};

pub use config::{AuditConfig, AuditType};
pub use controller::{AuditController, RunMode, RunSummary, StageStatus};
pub use docfinder::{BsiCategory, DocumentFinder, DocumentMap};
pub use findings::{Finding, FindingCategory, FindingLedger};
pub use groundtruth::{GroundTruthMapper, SystemStructureMap, Zielobjekt};
pub use stages::{ChapterResult, StageContext, StageName, StageOutcome, StageRunner};
