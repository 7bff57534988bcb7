//! Ollama embedding provider using the `/api/embed` endpoint.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};

/// The default Ollama server address.
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

/// The default model for Ollama embeddings.
pub const DEFAULT_EMBEDDING_MODEL: &str = "nomic-embed-text";

/// The default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

const PROVIDER: &str = "Ollama";

/// An [`EmbeddingProvider`] backed by a local Ollama server.
///
/// Uses `reqwest` to call `POST {base_url}/api/embed` directly. Every request
/// carries a timeout so a stalled server surfaces as
/// [`RagError::EmbeddingUnavailable`] instead of blocking forever.
///
/// # Example
///
/// ```rust,ignore
/// use lmdash_rag::OllamaEmbeddingProvider;
///
/// let provider = OllamaEmbeddingProvider::new("http://localhost:11434")?
///     .with_model_name("nomic-embed-text");
/// let embedding = provider.embed("hello world").await?;
/// ```
#[derive(Debug, Clone)]
pub struct OllamaEmbeddingProvider {
    client: reqwest::Client,
    base_url: String,
    model: String,
    timeout: Duration,
}

impl OllamaEmbeddingProvider {
    /// Create a new provider for the server at `base_url`.
    ///
    /// Uses the default model (`nomic-embed-text`) and timeout (120 s).
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT)
    }

    /// Create a new provider with an explicit per-request timeout.
    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(RagError::ConfigError("Ollama base URL must not be empty".into()));
        }

        let client = reqwest::Client::builder().timeout(timeout).build().map_err(|e| {
            RagError::ConfigError(format!("failed to build HTTP client: {e}"))
        })?;

        Ok(Self { client, base_url, model: DEFAULT_EMBEDDING_MODEL.into(), timeout })
    }

    /// Set the embedding model name (e.g. `mxbai-embed-large`).
    pub fn with_model_name(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// The server address requests are sent to.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// The per-request timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn unavailable(&self, message: String) -> RagError {
        RagError::EmbeddingUnavailable { provider: format!("{PROVIDER}/{}", self.model), message }
    }
}

// ── Ollama API request/response types ──────────────────────────────

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: Vec<&'a str>,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: String,
}

// ── EmbeddingProvider implementation ───────────────────────────────

#[async_trait]
impl EmbeddingProvider for OllamaEmbeddingProvider {
    fn model_id(&self) -> &str {
        &self.model
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        debug!(provider = PROVIDER, text_len = text.len(), "embedding single text");

        let results = self.embed_batch(&[text]).await?;
        results.into_iter().next().ok_or_else(|| self.unavailable("API returned no embeddings".into()))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!(provider = PROVIDER, batch_size = texts.len(), model = %self.model, "embedding batch");

        let request_body = EmbedRequest { model: &self.model, input: texts.to_vec() };

        let response = self
            .client
            .post(format!("{}/api/embed", self.base_url))
            .json(&request_body)
            .send()
            .await
            .map_err(|e| {
                error!(provider = PROVIDER, error = %e, "request failed");
                let reason = if e.is_timeout() { "request timed out" } else { "request failed" };
                self.unavailable(format!("{reason}: {e}"))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let detail =
                serde_json::from_str::<ErrorResponse>(&body).map(|e| e.error).unwrap_or(body);

            error!(provider = PROVIDER, %status, "API error");
            return Err(self.unavailable(format!("API returned {status}: {detail}")));
        }

        let embed_response: EmbedResponse = response.json().await.map_err(|e| {
            error!(provider = PROVIDER, error = %e, "failed to parse response");
            self.unavailable(format!("failed to parse response: {e}"))
        })?;

        if embed_response.embeddings.len() != texts.len() {
            return Err(self.unavailable(format!(
                "API returned {} embeddings for {} inputs",
                embed_response.embeddings.len(),
                texts.len()
            )));
        }

        Ok(embed_response.embeddings)
    }

    fn with_model(&self, model_id: &str) -> Result<Arc<dyn EmbeddingProvider>> {
        Ok(Arc::new(self.clone().with_model_name(model_id)))
    }
}
