use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use lmdash_model::{OllamaClient, OllamaConfig};
use lmdash_rag::{CorpusConfig, CorpusManager, OllamaEmbeddingProvider};

use crate::cli::GlobalArgs;

/// Resolved runtime settings.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub ollama: OllamaConfig,
    pub embedding_model: String,
    pub corpus_root: PathBuf,
    pub files_root: PathBuf,
}

impl Settings {
    pub fn from_args(args: &GlobalArgs) -> Result<Self> {
        if args.timeout_secs == 0 {
            bail!("--timeout-secs must be greater than zero");
        }
        let embedding_model = args.embedding_model.trim().to_string();
        if embedding_model.is_empty() {
            bail!("--embedding-model must not be empty");
        }
        Ok(Self {
            ollama: OllamaConfig::new(&args.ollama_url)
                .with_timeout(Duration::from_secs(args.timeout_secs)),
            embedding_model,
            corpus_root: args.corpus_root.clone(),
            files_root: args.files_root.clone(),
        })
    }

    pub fn client(&self) -> Result<OllamaClient> {
        OllamaClient::new(self.ollama.clone()).context("failed to create Ollama client")
    }

    pub fn corpus_manager(&self) -> Result<CorpusManager> {
        let provider =
            OllamaEmbeddingProvider::with_timeout(self.ollama.base_url.as_str(), self.ollama.timeout)
                .context("failed to create embedding provider")?
                .with_model_name(self.embedding_model.as_str());
        let config = CorpusConfig::builder()
            .root(self.corpus_root.clone())
            .build()
            .context("invalid corpus configuration")?;
        CorpusManager::builder()
            .config(config)
            .embedding_provider(Arc::new(provider))
            .build()
            .context("failed to create corpus manager")
    }
}
