//! The LLM Interface: the pipeline's sole capability for model-backed
//! reasoning, structured generation, and optional embeddings.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;

use super::schema::Schema;

/// A single document attached to an LLM request, referencing the object
/// store key it was loaded from (used for provenance in findings, not sent
/// to the provider).
#[derive(Debug, Clone)]
pub struct AttachedDocument {
    /// Object store key the bytes were read from.
    pub source_key: String,
    /// Raw document bytes (PDF, plain text, or pre-extracted text).
    pub bytes: Vec<u8>,
    /// MIME type of `bytes`.
    pub mime_type: String,
}

/// A structured-generation request: a prompt plus the documents it should
/// reason over and the schema its answer must conform to.
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    /// System/instruction prompt.
    pub system_prompt: String,
    /// User-turn prompt (task-specific instructions and context).
    pub user_prompt: String,
    /// Documents the model should ground its answer in.
    pub documents: Vec<AttachedDocument>,
    /// JSON schema the response must validate against.
    pub schema: Schema,
}

/// Capability contract for model-backed reasoning. Implementations are
/// responsible for retrying transient failures internally (see
/// [`super::retry`]); callers see only the four terminal outcomes named in
/// the error-handling design (`LlmError::{Transient,Schema,Blocked,Fatal}`,
/// with `Transient` only ever escaping after the retry budget above is
/// exhausted).
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Produces a schema-conformant JSON value for the given request.
    async fn generate_structured(&self, request: GenerateRequest) -> Result<Value>;

    /// Produces a dense embedding vector for `text`. Never called by the
    /// default pipeline (Open Question 1 prefers direct document
    /// attachment over retrieval), but part of the capability contract so
    /// a future retrieval strategy can opt in without a trait change.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Extracts a best-effort layout/structure description from a
    /// document (headings, tables, page boundaries), used to accelerate
    /// the Grundschutz-Check extractor's header pre-scan when a provider
    /// supports it natively. Optional: the default implementation reports
    /// it is unsupported, and callers fall back to `pdf::extract_text`.
    async fn parse_layout(&self, _document: &AttachedDocument) -> Result<Option<Value>> {
        Ok(None)
    }
}
