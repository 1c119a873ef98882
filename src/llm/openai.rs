//! `LlmClient` implementation backed by an OpenAI-compatible chat API via
//! `async-openai`, using its JSON-schema response-format support for
//! structured generation.

use async_openai::Client;
use async_openai::config::OpenAIConfig;
use async_openai::types::{
    ChatCompletionRequestMessageContentPartTextArgs, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestUserMessageArgs, ChatCompletionRequestUserMessageContent,
    ChatCompletionRequestUserMessageContentPart, CreateChatCompletionRequestArgs, ResponseFormat,
    ResponseFormatJsonSchema,
};
use async_trait::async_trait;
use serde_json::Value;

use crate::error::{LlmError, Result};

use super::retry::{ConcurrencyLimiter, RetryPolicy, with_retry};
use super::traits::{AttachedDocument, GenerateRequest, LlmClient};

/// A live LLM client, bounding concurrency with a shared semaphore and
/// retrying transient failures with exponential backoff.
pub struct OpenAiClient {
    client: Client<OpenAIConfig>,
    model: String,
    embedding_model: String,
    limiter: ConcurrencyLimiter,
    retry_policy: RetryPolicy,
    call_timeout: std::time::Duration,
}

impl OpenAiClient {
    /// Builds a client from environment-provided credentials
    /// (`OPENAI_API_KEY`, optionally `OPENAI_API_BASE`).
    #[must_use]
    pub fn new(model: impl Into<String>, embedding_model: impl Into<String>, max_concurrent: usize) -> Self {
        Self {
            client: Client::new(),
            model: model.into(),
            embedding_model: embedding_model.into(),
            limiter: ConcurrencyLimiter::new(max_concurrent),
            retry_policy: RetryPolicy::default(),
            call_timeout: std::time::Duration::from_secs(7200),
        }
    }

    /// Builds the user-turn content: plain text when the request carries no
    /// attached documents (the common case), otherwise a content-part array
    /// with the prompt first and one text part per attached document so the
    /// model reasons over their actual content rather than a reference to
    /// them.
    fn build_user_content(request: &GenerateRequest) -> Result<ChatCompletionRequestUserMessageContent> {
        if request.documents.is_empty() {
            return Ok(ChatCompletionRequestUserMessageContent::Text(request.user_prompt.clone()));
        }

        let mut parts = Vec::with_capacity(request.documents.len() + 1);
        let prompt_part = ChatCompletionRequestMessageContentPartTextArgs::default()
            .text(request.user_prompt.clone())
            .build()
            .map_err(|e| LlmError::Fatal(e.to_string()))?;
        parts.push(ChatCompletionRequestUserMessageContentPart::Text(prompt_part));

        for document in &request.documents {
            let document_part = ChatCompletionRequestMessageContentPartTextArgs::default()
                .text(document_as_text(document))
                .build()
                .map_err(|e| LlmError::Fatal(e.to_string()))?;
            parts.push(ChatCompletionRequestUserMessageContentPart::Text(document_part));
        }

        Ok(ChatCompletionRequestUserMessageContent::Array(parts))
    }

    async fn call_once(&self, request: &GenerateRequest) -> Result<Value> {
        let schema_format = ResponseFormat::JsonSchema {
            json_schema: ResponseFormatJsonSchema {
                description: None,
                name: "structured_response".to_string(),
                schema: Some(request.schema.document.clone()),
                strict: Some(true),
            },
        };

        let system_message = ChatCompletionRequestSystemMessageArgs::default()
            .content(request.system_prompt.clone())
            .build()
            .map_err(|e| LlmError::Fatal(e.to_string()))?;
        let user_message = ChatCompletionRequestUserMessageArgs::default()
            .content(Self::build_user_content(request)?)
            .build()
            .map_err(|e| LlmError::Fatal(e.to_string()))?;

        let chat_request = CreateChatCompletionRequestArgs::default()
            .model(self.model.clone())
            .messages(vec![system_message.into(), user_message.into()])
            .response_format(schema_format)
            .build()
            .map_err(|e| LlmError::Fatal(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(chat_request)
            .await
            .map_err(|e| LlmError::Transient(e.to_string()))?;

        let content = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .ok_or_else(|| LlmError::Blocked("provider returned no message content".to_string()))?;

        let value: Value =
            serde_json::from_str(&content).map_err(|e| LlmError::Schema(e.to_string()))?;
        request.schema.validate(&value)?;
        Ok(value)
    }
}

/// Renders an attached document as plain text for inclusion in the user
/// turn: PDF bytes are run through the per-page extractor (falling back to
/// a lossy UTF-8 decode if parsing fails), anything else is decoded as-is.
fn document_as_text(document: &AttachedDocument) -> String {
    let body = if document.mime_type == "application/pdf" {
        crate::pdf::extract_pages(&document.bytes)
            .map(|pages| {
                pages
                    .into_iter()
                    .map(|page| format!("[page {}]\n{}", page.page_number, page.text))
                    .collect::<Vec<_>>()
                    .join("\n\n")
            })
            .unwrap_or_else(|_| String::from_utf8_lossy(&document.bytes).into_owned())
    } else {
        String::from_utf8_lossy(&document.bytes).into_owned()
    };
    format!("--- attached document: {} ---\n{body}", document.source_key)
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn generate_structured(&self, request: GenerateRequest) -> Result<Value> {
        let _permit = self.limiter.acquire().await?;
        with_retry("generate_structured", &self.retry_policy, || {
            let request = request.clone();
            async move {
                tokio::time::timeout(self.call_timeout, self.call_once(&request))
                    .await
                    .map_err(|_| LlmError::Timeout {
                        seconds: self.call_timeout.as_secs(),
                    })?
            }
        })
        .await
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let _permit = self.limiter.acquire().await?;
        let request = async_openai::types::CreateEmbeddingRequestArgs::default()
            .model(self.embedding_model.clone())
            .input(text)
            .build()
            .map_err(|e| LlmError::Fatal(e.to_string()))?;
        let response = self
            .client
            .embeddings()
            .create(request)
            .await
            .map_err(|e| LlmError::Transient(e.to_string()))?;
        response
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| LlmError::Fatal("provider returned no embedding".to_string()).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_as_text_falls_back_to_lossy_decode_for_unparsable_pdf() {
        let document = AttachedDocument {
            source_key: "source/broken.pdf".to_string(),
            bytes: b"not a pdf".to_vec(),
            mime_type: "application/pdf".to_string(),
        };
        let text = document_as_text(&document);
        assert!(text.contains("source/broken.pdf"));
        assert!(text.contains("not a pdf"));
    }

    #[test]
    fn document_as_text_decodes_plain_text_directly() {
        let document = AttachedDocument {
            source_key: "source/notes.txt".to_string(),
            bytes: b"hello world".to_vec(),
            mime_type: "text/plain".to_string(),
        };
        assert!(document_as_text(&document).contains("hello world"));
    }
}
