//! A deterministic `LlmClient` for tests, replaying canned responses keyed
//! by a hash of the request prompt so stage and controller suites never
//! need network access.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use crate::embedding::{DEFAULT_DIMENSIONS, Embedder, FallbackEmbedder};
use crate::error::{LlmError, Result};

use super::traits::{GenerateRequest, LlmClient};

/// Hashes a request's prompts into a stable lookup key.
fn request_key(request: &GenerateRequest) -> String {
    format!("{}\u{0}{}", request.system_prompt, request.user_prompt)
}

/// Replays pre-seeded responses; unseeded requests fail with
/// [`LlmError::Fatal`] so a missing test fixture is loud, not silent.
pub struct MockLlmClient {
    responses: Mutex<HashMap<String, Value>>,
    default_response: Option<Value>,
}

impl MockLlmClient {
    /// Creates a client with no seeded responses.
    #[must_use]
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(HashMap::new()),
            default_response: None,
        }
    }

    /// Creates a client that returns `default_response` for any request not
    /// otherwise seeded, useful for stage tests that only care about
    /// control flow, not extraction content.
    #[must_use]
    pub fn with_default(default_response: Value) -> Self {
        Self {
            responses: Mutex::new(HashMap::new()),
            default_response: Some(default_response),
        }
    }

    /// Seeds the response for a request whose system/user prompts exactly
    /// match `system_prompt`/`user_prompt`.
    pub fn seed(&self, system_prompt: &str, user_prompt: &str, response: Value) {
        let key = format!("{system_prompt}\u{0}{user_prompt}");
        self.responses.lock().expect("lock").insert(key, response);
    }
}

impl Default for MockLlmClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn generate_structured(&self, request: GenerateRequest) -> Result<Value> {
        let key = request_key(&request);
        if let Some(response) = self.responses.lock().expect("lock").get(&key) {
            request.schema.validate(response)?;
            return Ok(response.clone());
        }
        if let Some(default) = &self.default_response {
            return Ok(default.clone());
        }
        Err(LlmError::Fatal(format!(
            "no mock response seeded for prompt: {}",
            request.user_prompt
        ))
        .into())
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        FallbackEmbedder::new(DEFAULT_DIMENSIONS).embed(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::schema::Schema;
    use serde_json::json;

    fn request(system: &str, user: &str) -> GenerateRequest {
        GenerateRequest {
            system_prompt: system.to_string(),
            user_prompt: user.to_string(),
            documents: vec![],
            schema: Schema::from_value(json!({"type": "object"})).unwrap(),
        }
    }

    #[tokio::test]
    async fn returns_seeded_response() {
        let client = MockLlmClient::new();
        client.seed("sys", "user", json!({"ok": true}));
        let response = client
            .generate_structured(request("sys", "user"))
            .await
            .unwrap();
        assert_eq!(response, json!({"ok": true}));
    }

    #[tokio::test]
    async fn unseeded_request_without_default_fails() {
        let client = MockLlmClient::new();
        assert!(client.generate_structured(request("a", "b")).await.is_err());
    }

    #[tokio::test]
    async fn falls_back_to_default_response() {
        let client = MockLlmClient::with_default(json!({"default": true}));
        let response = client
            .generate_structured(request("a", "b"))
            .await
            .unwrap();
        assert_eq!(response, json!({"default": true}));
    }

    #[tokio::test]
    async fn embed_is_deterministic() {
        let client = MockLlmClient::new();
        let a = client.embed("hello").await.unwrap();
        let b = client.embed("hello").await.unwrap();
        assert_eq!(a, b);
    }
}
