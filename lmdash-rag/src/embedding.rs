//! Embedding provider trait for generating vector embeddings from text.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{RagError, Result};

/// A provider that generates vector embeddings from text input.
///
/// Every provider is bound to one embedding model, reported by
/// [`model_id`](EmbeddingProvider::model_id). Vectors from different models
/// must never be compared, so corpora record the model that built them and
/// queries re-target the provider with [`with_model`](EmbeddingProvider::with_model).
///
/// The default [`embed_batch`](EmbeddingProvider::embed_batch) implementation
/// calls [`embed`](EmbeddingProvider::embed) sequentially; backends that
/// support native batching should override it.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Identifier of the embedding model this provider uses.
    fn model_id(&self) -> &str;

    /// Generate an embedding vector for a single text input.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embedding vectors for a batch of text inputs, in input order.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }

    /// Return a provider for the same service bound to another model.
    ///
    /// The default implementation always fails with
    /// [`RagError::EmbeddingUnavailable`]; providers that can address several
    /// models override it.
    fn with_model(&self, model_id: &str) -> Result<Arc<dyn EmbeddingProvider>> {
        Err(RagError::EmbeddingUnavailable {
            provider: self.model_id().to_string(),
            message: format!("provider cannot switch to embedding model '{model_id}'"),
        })
    }
}
