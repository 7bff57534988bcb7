//! Request and response types for the Ollama REST API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ModelError, Result};

const BYTES_PER_GB: f64 = 1024.0 * 1024.0 * 1024.0;

/// A model installed on the server, as listed by `GET /api/tags`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LocalModel {
    /// Model name including tag, e.g. `llama3:8b`.
    pub name: String,
    /// Size on disk in bytes.
    #[serde(default)]
    pub size: u64,
    /// Last modification time, when the server reports one.
    #[serde(default)]
    pub modified_at: Option<DateTime<Utc>>,
}

impl LocalModel {
    /// Size on disk in GiB.
    pub fn size_gb(&self) -> f64 {
        self.size as f64 / BYTES_PER_GB
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct TagsResponse {
    #[serde(default)]
    pub models: Vec<LocalModel>,
}

/// Sampling settings shared by every generation request.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct GenerationOptions {
    /// Sampling temperature, `0.0..=1.0`.
    pub temperature: f32,
    /// Maximum number of tokens to generate, `100..=32000`.
    pub max_tokens: u32,
    /// Presence penalty, `-2.0..=2.0`.
    pub presence_penalty: f32,
    /// Frequency penalty, `-2.0..=2.0`.
    pub frequency_penalty: f32,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self { temperature: 0.5, max_tokens: 4000, presence_penalty: 0.0, frequency_penalty: 0.0 }
    }
}

impl GenerationOptions {
    /// Check every field against its accepted range.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::InvalidArgument`] naming the first field out of range.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.temperature) {
            return Err(ModelError::InvalidArgument(format!(
                "temperature {} is outside 0.0..=1.0",
                self.temperature
            )));
        }
        if !(100..=32000).contains(&self.max_tokens) {
            return Err(ModelError::InvalidArgument(format!(
                "max_tokens {} is outside 100..=32000",
                self.max_tokens
            )));
        }
        for (name, value) in
            [("presence_penalty", self.presence_penalty), ("frequency_penalty", self.frequency_penalty)]
        {
            if !(-2.0..=2.0).contains(&value) {
                return Err(ModelError::InvalidArgument(format!(
                    "{name} {value} is outside -2.0..=2.0"
                )));
            }
        }
        Ok(())
    }

    /// Exact bit pattern of every field, usable as a hash key.
    pub(crate) fn key(&self) -> [u32; 4] {
        [
            self.temperature.to_bits(),
            self.max_tokens,
            self.presence_penalty.to_bits(),
            self.frequency_penalty.to_bits(),
        ]
    }
}

/// The `options` object understood by Ollama.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct ModelOptions {
    temperature: f32,
    num_predict: u32,
    presence_penalty: f32,
    frequency_penalty: f32,
}

impl From<&GenerationOptions> for ModelOptions {
    fn from(options: &GenerationOptions) -> Self {
        Self {
            temperature: options.temperature,
            num_predict: options.max_tokens,
            presence_penalty: options.presence_penalty,
            frequency_penalty: options.frequency_penalty,
        }
    }
}

/// A single-prompt completion request (`POST /api/generate`).
#[derive(Debug, Clone, PartialEq)]
pub struct GenerateRequest {
    /// Model to run.
    pub model: String,
    /// Prompt text.
    pub prompt: String,
    /// Sampling settings.
    pub options: GenerationOptions,
    /// Conversation context returned by a previous generation.
    pub context: Vec<i64>,
    /// Ask the server to constrain output to JSON.
    pub json_format: bool,
}

impl GenerateRequest {
    /// Create a request with default options and no context.
    pub fn new(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            prompt: prompt.into(),
            options: GenerationOptions::default(),
            context: Vec::new(),
            json_format: false,
        }
    }

    /// Set the sampling settings.
    pub fn with_options(mut self, options: GenerationOptions) -> Self {
        self.options = options;
        self
    }

    /// Carry a previous generation's context into this one.
    pub fn with_context(mut self, context: Vec<i64>) -> Self {
        self.context = context;
        self
    }

    /// Request JSON-constrained output.
    pub fn with_json_format(mut self) -> Self {
        self.json_format = true;
        self
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct GenerateBody<'a> {
    pub model: &'a str,
    pub prompt: &'a str,
    pub stream: bool,
    pub options: ModelOptions,
    #[serde(skip_serializing_if = "<[i64]>::is_empty")]
    pub context: &'a [i64],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<&'static str>,
}

/// The result of a completion request.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct GenerateResponse {
    /// Generated text.
    #[serde(default)]
    pub response: String,
    /// Context to pass to a follow-up request.
    #[serde(default)]
    pub context: Vec<i64>,
    /// Number of generated tokens.
    #[serde(default)]
    pub eval_count: Option<u64>,
    /// Time spent generating, in nanoseconds.
    #[serde(default)]
    pub eval_duration: Option<u64>,
}

/// A chat message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    /// `system`, `user`, `assistant` or `tool`.
    pub role: String,
    /// Message text.
    #[serde(default)]
    pub content: String,
    /// Base64-encoded images attached to the message.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<String>,
    /// Tool calls requested by the assistant.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
}

impl ChatMessage {
    /// A user message with text only.
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: "user".into(), content: content.into(), images: Vec::new(), tool_calls: Vec::new() }
    }

    /// Attach a base64-encoded image.
    pub fn with_image(mut self, image_base64: impl Into<String>) -> Self {
        self.images.push(image_base64.into());
        self
    }
}

/// A tool call emitted by the model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCall {
    /// The function the model wants to call.
    pub function: FunctionCall,
}

/// Function name and arguments of a [`ToolCall`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FunctionCall {
    /// Function name.
    pub name: String,
    /// Arguments as a JSON object.
    #[serde(default)]
    pub arguments: Value,
}

/// A function the model may call, described by a JSON schema.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolDefinition {
    /// Always `function`.
    #[serde(rename = "type")]
    pub kind: String,
    /// The function description.
    pub function: FunctionDefinition,
}

/// Name, description and parameter schema of a callable function.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FunctionDefinition {
    /// Function name.
    pub name: String,
    /// What the function does.
    pub description: String,
    /// JSON schema of the arguments object.
    pub parameters: Value,
}

impl ToolDefinition {
    /// Describe a function tool.
    pub fn function(name: impl Into<String>, description: impl Into<String>, parameters: Value) -> Self {
        Self {
            kind: "function".into(),
            function: FunctionDefinition {
                name: name.into(),
                description: description.into(),
                parameters,
            },
        }
    }
}

/// A chat request (`POST /api/chat`).
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    /// Model to run.
    pub model: String,
    /// Conversation so far.
    pub messages: Vec<ChatMessage>,
    /// Tools the model may call.
    pub tools: Vec<ToolDefinition>,
    /// Sampling settings.
    pub options: GenerationOptions,
}

impl ChatRequest {
    /// Create a request with default options and no tools.
    pub fn new(model: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        Self {
            model: model.into(),
            messages,
            tools: Vec::new(),
            options: GenerationOptions::default(),
        }
    }

    /// Set the sampling settings.
    pub fn with_options(mut self, options: GenerationOptions) -> Self {
        self.options = options;
        self
    }

    /// Offer tools to the model.
    pub fn with_tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.tools = tools;
        self
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct ChatBody<'a> {
    pub model: &'a str,
    pub messages: &'a [ChatMessage],
    pub stream: bool,
    pub options: ModelOptions,
    #[serde(skip_serializing_if = "<[ToolDefinition]>::is_empty")]
    pub tools: &'a [ToolDefinition],
}

/// The result of a chat request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatResponse {
    /// The assistant's reply.
    pub message: ChatMessage,
    /// Number of generated tokens.
    #[serde(default)]
    pub eval_count: Option<u64>,
    /// Time spent generating, in nanoseconds.
    #[serde(default)]
    pub eval_duration: Option<u64>,
}

/// One line of `POST /api/pull` progress.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct PullProgress {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}
