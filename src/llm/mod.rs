//! LLM Interface: schema-constrained structured generation, optional
//! embeddings, and the retry/concurrency machinery shared by every stage
//! that calls a model.

pub mod mock;
pub mod openai;
pub mod prompts;
pub mod retry;
pub mod schema;
pub mod traits;

pub use mock::MockLlmClient;
pub use openai::OpenAiClient;
pub use retry::{ConcurrencyLimiter, RetryPolicy, RetryableError, with_retry};
pub use schema::Schema;
pub use traits::{AttachedDocument, GenerateRequest, LlmClient};
