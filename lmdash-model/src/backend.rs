use async_trait::async_trait;

use crate::error::Result;
use crate::types::{ChatRequest, ChatResponse, GenerateRequest, GenerateResponse};

/// A server able to run generation and chat requests.
///
/// [`OllamaClient`](crate::OllamaClient) is the production implementation.
/// Comparisons and probes are written against this trait so they can run
/// against a scripted backend in tests.
#[async_trait]
pub trait ModelBackend: Send + Sync {
    /// Run a single-prompt completion.
    async fn generate(&self, request: &GenerateRequest) -> Result<GenerateResponse>;

    /// Run a chat completion.
    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse>;
}
