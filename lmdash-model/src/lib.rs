//! # lmdash-model
//!
//! Model-serving client for lmdash.
//!
//! ## Overview
//!
//! - [`OllamaClient`] manages installed models (list, pull, show, remove,
//!   update) and runs generation and chat requests
//! - [`ModelBackend`] abstracts generation and chat so comparisons and
//!   probes can run against any backend
//! - [`ComparisonRunner`] compares models on the same prompt or image and
//!   runs multi-turn prompts that carry context forward
//! - [`check_json_handling`] and [`check_function_calling`] probe model
//!   capabilities
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use lmdash_model::{ComparisonRunner, GenerationOptions, OllamaClient, OllamaConfig};
//!
//! let client = Arc::new(OllamaClient::new(OllamaConfig::from_env())?);
//! let runner = ComparisonRunner::new(client);
//! let models = vec!["llama3".to_string(), "mistral".to_string()];
//! let report = runner.compare(&models, "Explain borrowing.", &GenerationOptions::default()).await?;
//! for run in &report.runs {
//!     if let Some(metrics) = run.metrics() {
//!         println!("{}: {:.1} tok/s", run.model, metrics.tokens_per_second);
//!     }
//! }
//! ```

pub mod backend;
pub mod bench;
pub mod client;
pub mod config;
pub mod error;
pub mod probe;
pub mod text;
pub mod types;

pub use backend::ModelBackend;
pub use bench::{
    ComparisonReport, ComparisonRunner, ContextTurn, ModelRun, RunMetrics, RunOutcome,
    VISION_PROMPT, tokens_per_second,
};
pub use client::{ModelUpdate, OllamaClient, UpdateOutcome, normalize_model_name};
pub use config::{DEFAULT_OLLAMA_URL, DEFAULT_REQUEST_TIMEOUT, OllamaConfig};
pub use error::{ModelError, Result};
pub use probe::{WEATHER_TOOL, check_function_calling, check_json_handling, weather_tool};
pub use text::extract_code_blocks;
pub use types::{
    ChatMessage, ChatRequest, ChatResponse, FunctionCall, FunctionDefinition, GenerateRequest,
    GenerateResponse, GenerationOptions, LocalModel, ToolCall, ToolDefinition,
};
