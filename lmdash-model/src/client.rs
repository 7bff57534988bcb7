//! HTTP client for the Ollama REST API.

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::{debug, error, info, warn};

use crate::backend::ModelBackend;
use crate::config::OllamaConfig;
use crate::error::{ModelError, Result};
use crate::types::{
    ChatBody, ChatRequest, ChatResponse, GenerateBody, GenerateRequest, GenerateResponse,
    LocalModel, ModelOptions, PullProgress, TagsResponse,
};

/// Substring marking locally built models that have no registry upstream.
const CUSTOM_MODEL_MARKER: &str = "gpt";

/// Outcome of re-pulling one model in [`OllamaClient::update_models`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// Custom model, not pulled.
    Skipped,
    /// Pulled successfully.
    Updated,
    /// The pull failed with this message.
    Failed(String),
}

/// Per-model result of [`OllamaClient::update_models`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelUpdate {
    /// Model name.
    pub name: String,
    /// What happened to it.
    pub outcome: UpdateOutcome,
}

/// Client for a single Ollama server.
///
/// Non-streaming requests are bounded by [`OllamaConfig::timeout`]. Pulls
/// only bound the connect phase since a download can legitimately take
/// much longer.
///
/// # Example
///
/// ```rust,ignore
/// use lmdash_model::{GenerateRequest, OllamaClient, OllamaConfig};
///
/// let client = OllamaClient::new(OllamaConfig::from_env())?;
/// for model in client.list_models().await? {
///     println!("{} {:.2} GB", model.name, model.size_gb());
/// }
/// let reply = client.generate(&GenerateRequest::new("llama3", "Why is the sky blue?")).await?;
/// ```
#[derive(Debug, Clone)]
pub struct OllamaClient {
    http: reqwest::Client,
    config: OllamaConfig,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

impl OllamaClient {
    /// Create a client from `config`.
    pub fn new(config: OllamaConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(config.timeout)
            .build()
            .map_err(|e| ModelError::Unavailable(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { http, config })
    }

    /// The configuration this client was built with.
    pub fn config(&self) -> &OllamaConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.base_url)
    }

    async fn send(&self, request: RequestBuilder, model: Option<&str>) -> Result<Response> {
        let response = request.send().await.map_err(|e| {
            error!(base_url = %self.config.base_url, error = %e, "request failed");
            let reason = if e.is_timeout() { "request timed out" } else { "request failed" };
            ModelError::Unavailable(format!("{reason}: {e}"))
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&body).map(|e| e.error).unwrap_or(body);
        error!(%status, message = %message, "API error");
        match (status, model) {
            (StatusCode::NOT_FOUND, Some(model)) => {
                Err(ModelError::ModelNotFound { model: model.to_string(), message })
            }
            _ => Err(ModelError::Api { status: status.as_u16(), message }),
        }
    }

    async fn parse<T: DeserializeOwned>(response: Response) -> Result<T> {
        response.json().await.map_err(|e| {
            error!(error = %e, "failed to parse response");
            ModelError::InvalidResponse(e.to_string())
        })
    }

    /// List installed models (`GET /api/tags`).
    pub async fn list_models(&self) -> Result<Vec<LocalModel>> {
        debug!(base_url = %self.config.base_url, "listing models");
        let request = self.http.get(self.url("/api/tags")).timeout(self.config.timeout);
        let tags: TagsResponse = Self::parse(self.send(request, None).await?).await?;
        info!(count = tags.models.len(), "listed models");
        Ok(tags.models)
    }

    /// Download a model (`POST /api/pull`), returning the progress status lines.
    ///
    /// `name` is passed through [`normalize_model_name`] first.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::ModelNotFound`] when the server reports an error
    /// for the pull, and [`ModelError::InvalidArgument`] for an empty name.
    pub async fn pull_model(&self, name: &str) -> Result<Vec<String>> {
        let name = normalize_model_name(name);
        if name.is_empty() {
            return Err(ModelError::InvalidArgument("model name must not be empty".into()));
        }
        debug!(model = %name, "pulling model");

        let request = self.http.post(self.url("/api/pull")).json(&json!({ "name": name, "stream": true }));
        let response = self.send(request, Some(name.as_str())).await?;

        let mut statuses = Vec::new();
        let mut buffer: Vec<u8> = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| {
                error!(model = %name, error = %e, "pull stream interrupted");
                ModelError::Unavailable(format!("pull stream interrupted: {e}"))
            })?;
            buffer.extend_from_slice(&chunk);
            while let Some(pos) = buffer.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = buffer.drain(..=pos).collect();
                record_progress(&name, &line, &mut statuses)?;
            }
        }
        record_progress(&name, &buffer, &mut statuses)?;

        info!(model = %name, lines = statuses.len(), "pulled model");
        Ok(statuses)
    }

    /// Fetch model details (`POST /api/show`).
    pub async fn show_model(&self, name: &str) -> Result<Value> {
        debug!(model = %name, "showing model");
        let request = self
            .http
            .post(self.url("/api/show"))
            .timeout(self.config.timeout)
            .json(&json!({ "name": name }));
        Self::parse(self.send(request, Some(name)).await?).await
    }

    /// Delete a model (`DELETE /api/delete`).
    pub async fn remove_model(&self, name: &str) -> Result<()> {
        let request = self
            .http
            .delete(self.url("/api/delete"))
            .timeout(self.config.timeout)
            .json(&json!({ "name": name }));
        self.send(request, Some(name)).await?;
        info!(model = %name, "removed model");
        Ok(())
    }

    /// Pull every installed model again, skipping custom models.
    ///
    /// A failed pull is recorded in the outcome and does not stop the rest.
    pub async fn update_models(&self) -> Result<Vec<ModelUpdate>> {
        let models = self.list_models().await?;
        let mut updates = Vec::with_capacity(models.len());
        for model in models {
            let outcome = if model.name.contains(CUSTOM_MODEL_MARKER) {
                debug!(model = %model.name, "skipping custom model");
                UpdateOutcome::Skipped
            } else {
                match self.pull_model(&model.name).await {
                    Ok(_) => UpdateOutcome::Updated,
                    Err(e) => {
                        warn!(model = %model.name, error = %e, "update failed");
                        UpdateOutcome::Failed(e.to_string())
                    }
                }
            };
            updates.push(ModelUpdate { name: model.name, outcome });
        }
        info!(count = updates.len(), "updated models");
        Ok(updates)
    }
}

fn record_progress(model: &str, line: &[u8], statuses: &mut Vec<String>) -> Result<()> {
    let line = String::from_utf8_lossy(line);
    let line = line.trim();
    if line.is_empty() {
        return Ok(());
    }
    let progress: PullProgress = serde_json::from_str(line)
        .map_err(|e| ModelError::InvalidResponse(format!("bad pull progress line: {e}")))?;
    if let Some(message) = progress.error {
        error!(model = %model, message = %message, "pull failed");
        return Err(ModelError::ModelNotFound { model: model.to_string(), message });
    }
    if let Some(status) = progress.status {
        statuses.push(status);
    }
    Ok(())
}

/// Clean up a model name typed by a user.
///
/// Strips surrounding whitespace and a leading `ollama run ` or
/// `ollama pull ` copied from a model page.
///
/// ```
/// use lmdash_model::normalize_model_name;
///
/// assert_eq!(normalize_model_name("  ollama run llama3:8b "), "llama3:8b");
/// assert_eq!(normalize_model_name("mistral"), "mistral");
/// ```
pub fn normalize_model_name(raw: &str) -> String {
    let trimmed = raw.trim();
    ["ollama run", "ollama pull"]
        .iter()
        .filter_map(|prefix| trimmed.strip_prefix(prefix))
        .find(|rest| rest.is_empty() || rest.starts_with(char::is_whitespace))
        .unwrap_or(trimmed)
        .trim()
        .to_string()
}

#[async_trait]
impl ModelBackend for OllamaClient {
    async fn generate(&self, request: &GenerateRequest) -> Result<GenerateResponse> {
        request.options.validate()?;
        debug!(model = %request.model, prompt_len = request.prompt.len(), "generating");

        let body = GenerateBody {
            model: &request.model,
            prompt: &request.prompt,
            stream: false,
            options: ModelOptions::from(&request.options),
            context: &request.context,
            format: request.json_format.then_some("json"),
        };
        let http = self
            .http
            .post(self.url("/api/generate"))
            .timeout(self.config.timeout)
            .json(&body);
        let response: GenerateResponse =
            Self::parse(self.send(http, Some(request.model.as_str())).await?).await?;

        info!(model = %request.model, eval_count = ?response.eval_count, "generation complete");
        Ok(response)
    }

    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse> {
        request.options.validate()?;
        debug!(
            model = %request.model,
            messages = request.messages.len(),
            tools = request.tools.len(),
            "chatting"
        );

        let body = ChatBody {
            model: &request.model,
            messages: &request.messages,
            stream: false,
            options: ModelOptions::from(&request.options),
            tools: &request.tools,
        };
        let http = self.http.post(self.url("/api/chat")).timeout(self.config.timeout).json(&body);
        let response: ChatResponse = Self::parse(self.send(http, Some(request.model.as_str())).await?).await?;

        info!(
            model = %request.model,
            tool_calls = response.message.tool_calls.len(),
            "chat complete"
        );
        Ok(response)
    }
}
