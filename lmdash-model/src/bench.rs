//! Side-by-side model comparisons.
//!
//! [`ComparisonRunner`] sends the same prompt to several models one after
//! another and records timing and throughput for each. Fully successful
//! text comparisons are memoized: the same models, prompt and options
//! always return the cached report.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::backend::ModelBackend;
use crate::error::{ModelError, Result};
use crate::types::{ChatMessage, ChatRequest, GenerateRequest, GenerationOptions};

/// Prompt sent alongside the image in [`ComparisonRunner::compare_vision`].
pub const VISION_PROMPT: &str = "Describe this image:";

/// Generation throughput in tokens per second.
///
/// Returns `0.0` when either the token count or the duration is missing or zero.
///
/// ```
/// use lmdash_model::tokens_per_second;
///
/// assert_eq!(tokens_per_second(Some(50), Some(2_000_000_000)), 25.0);
/// assert_eq!(tokens_per_second(Some(50), None), 0.0);
/// ```
pub fn tokens_per_second(eval_count: Option<u64>, eval_duration_ns: Option<u64>) -> f64 {
    match (eval_count, eval_duration_ns) {
        (Some(count), Some(ns)) if count > 0 && ns > 0 => count as f64 / (ns as f64 / 1e9),
        _ => 0.0,
    }
}

/// Metrics for one successful model run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunMetrics {
    /// Generated text.
    pub response: String,
    /// Wall-clock time for the request.
    pub elapsed: Duration,
    /// Number of generated tokens, when reported.
    pub eval_count: Option<u64>,
    /// Generation time in nanoseconds, when reported.
    pub eval_duration_ns: Option<u64>,
    /// Derived from `eval_count` and `eval_duration_ns`.
    pub tokens_per_second: f64,
}

impl RunMetrics {
    fn new(
        response: String,
        elapsed: Duration,
        eval_count: Option<u64>,
        eval_duration_ns: Option<u64>,
    ) -> Self {
        Self {
            response,
            elapsed,
            eval_count,
            eval_duration_ns,
            tokens_per_second: tokens_per_second(eval_count, eval_duration_ns),
        }
    }
}

/// What happened when a model was run.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// The model answered.
    Completed(RunMetrics),
    /// The request failed with this message.
    Failed(String),
}

/// One model's entry in a [`ComparisonReport`].
#[derive(Debug, Clone, PartialEq)]
pub struct ModelRun {
    /// Model name.
    pub model: String,
    /// Result of the run.
    pub outcome: RunOutcome,
}

impl ModelRun {
    /// The metrics, if the run completed.
    pub fn metrics(&self) -> Option<&RunMetrics> {
        match &self.outcome {
            RunOutcome::Completed(metrics) => Some(metrics),
            RunOutcome::Failed(_) => None,
        }
    }
}

/// Results of running one prompt against several models.
#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonReport {
    /// The prompt every model received.
    pub prompt: String,
    /// The options every model ran with.
    pub options: GenerationOptions,
    /// One entry per model, in the requested order.
    pub runs: Vec<ModelRun>,
}

impl ComparisonReport {
    /// Whether every model completed.
    pub fn all_succeeded(&self) -> bool {
        self.runs.iter().all(|run| matches!(run.outcome, RunOutcome::Completed(_)))
    }
}

/// One step of a [`ComparisonRunner::contextual`] conversation.
#[derive(Debug, Clone, PartialEq)]
pub struct ContextTurn {
    /// The prompt sent at this step.
    pub prompt: String,
    /// The model's answer and timings.
    pub metrics: RunMetrics,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    models: Vec<String>,
    prompt: String,
    options: [u32; 4],
}

/// Runs prompts against one or more models through a [`ModelBackend`].
pub struct ComparisonRunner {
    backend: Arc<dyn ModelBackend>,
    cache: Mutex<HashMap<CacheKey, Arc<ComparisonReport>>>,
}

impl ComparisonRunner {
    /// Create a runner over `backend` with an empty cache.
    pub fn new(backend: Arc<dyn ModelBackend>) -> Self {
        Self { backend, cache: Mutex::new(HashMap::new()) }
    }

    /// Number of memoized comparisons.
    pub async fn cached_reports(&self) -> usize {
        self.cache.lock().await.len()
    }

    /// Send `prompt` to each model in turn.
    ///
    /// A failing model is recorded in its [`ModelRun`] and does not stop
    /// the others. The report is cached only if every model completed.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::InvalidArgument`] for an empty model list or
    /// out-of-range options.
    pub async fn compare(
        &self,
        models: &[String],
        prompt: &str,
        options: &GenerationOptions,
    ) -> Result<Arc<ComparisonReport>> {
        validate_models(models)?;
        options.validate()?;

        let key =
            CacheKey { models: models.to_vec(), prompt: prompt.to_string(), options: options.key() };
        if let Some(report) = self.cache.lock().await.get(&key) {
            debug!(models = models.len(), "comparison served from cache");
            return Ok(Arc::clone(report));
        }

        let mut runs = Vec::with_capacity(models.len());
        for model in models {
            let request = GenerateRequest::new(model.as_str(), prompt).with_options(*options);
            let started = Instant::now();
            let outcome = match self.backend.generate(&request).await {
                Ok(response) => RunOutcome::Completed(RunMetrics::new(
                    response.response,
                    started.elapsed(),
                    response.eval_count,
                    response.eval_duration,
                )),
                Err(e) => {
                    warn!(model = %model, error = %e, "model run failed");
                    RunOutcome::Failed(e.to_string())
                }
            };
            runs.push(ModelRun { model: model.clone(), outcome });
        }

        let report = Arc::new(ComparisonReport {
            prompt: prompt.to_string(),
            options: *options,
            runs,
        });
        if report.all_succeeded() {
            self.cache.lock().await.insert(key, Arc::clone(&report));
        }
        info!(models = models.len(), cached = report.all_succeeded(), "comparison complete");
        Ok(report)
    }

    /// Ask each model to describe an image.
    ///
    /// The image is sent base64-encoded with the prompt [`VISION_PROMPT`].
    /// Vision comparisons are not cached.
    pub async fn compare_vision(
        &self,
        models: &[String],
        image: &[u8],
        options: &GenerationOptions,
    ) -> Result<ComparisonReport> {
        validate_models(models)?;
        options.validate()?;
        if image.is_empty() {
            return Err(ModelError::InvalidArgument("image must not be empty".into()));
        }

        let encoded = STANDARD.encode(image);
        let mut runs = Vec::with_capacity(models.len());
        for model in models {
            let message = ChatMessage::user(VISION_PROMPT).with_image(encoded.clone());
            let request = ChatRequest::new(model.as_str(), vec![message]).with_options(*options);
            let started = Instant::now();
            let outcome = match self.backend.chat(&request).await {
                Ok(response) => RunOutcome::Completed(RunMetrics::new(
                    response.message.content,
                    started.elapsed(),
                    response.eval_count,
                    response.eval_duration,
                )),
                Err(e) => {
                    warn!(model = %model, error = %e, "vision run failed");
                    RunOutcome::Failed(e.to_string())
                }
            };
            runs.push(ModelRun { model: model.clone(), outcome });
        }

        info!(models = models.len(), image_bytes = image.len(), "vision comparison complete");
        Ok(ComparisonReport { prompt: VISION_PROMPT.to_string(), options: *options, runs })
    }

    /// Run `prompts` in order against one model, feeding each response's
    /// context into the next request.
    ///
    /// Stops at the first failing prompt.
    pub async fn contextual(
        &self,
        model: &str,
        prompts: &[String],
        options: &GenerationOptions,
    ) -> Result<Vec<ContextTurn>> {
        options.validate()?;

        let mut context = Vec::new();
        let mut turns = Vec::with_capacity(prompts.len());
        for prompt in prompts {
            let request = GenerateRequest::new(model, prompt.as_str())
                .with_options(*options)
                .with_context(std::mem::take(&mut context));
            let started = Instant::now();
            let response = self.backend.generate(&request).await?;
            let elapsed = started.elapsed();
            context = response.context;
            turns.push(ContextTurn {
                prompt: prompt.clone(),
                metrics: RunMetrics::new(
                    response.response,
                    elapsed,
                    response.eval_count,
                    response.eval_duration,
                ),
            });
        }

        info!(model = %model, turns = turns.len(), "contextual run complete");
        Ok(turns)
    }
}

fn validate_models(models: &[String]) -> Result<()> {
    if models.is_empty() {
        return Err(ModelError::InvalidArgument("at least one model is required".into()));
    }
    Ok(())
}
