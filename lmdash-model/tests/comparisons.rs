//! Comparison, contextual and probe behaviour against a scripted backend.

use std::sync::Arc;
use std::sync::Mutex;

use async_trait::async_trait;
use lmdash_model::{
    ChatMessage, ChatRequest, ChatResponse, ComparisonRunner, FunctionCall, GenerateRequest,
    GenerateResponse, GenerationOptions, ModelBackend, ModelError, Result, RunOutcome, ToolCall,
    VISION_PROMPT, WEATHER_TOOL, check_function_calling, check_json_handling,
};

/// Answers by model name and records every request it sees.
#[derive(Default)]
struct ScriptedBackend {
    generated: Mutex<Vec<GenerateRequest>>,
    chats: Mutex<Vec<ChatRequest>>,
}

impl ScriptedBackend {
    fn generate_calls(&self) -> usize {
        self.generated.lock().unwrap().len()
    }
}

#[async_trait]
impl ModelBackend for ScriptedBackend {
    async fn generate(&self, request: &GenerateRequest) -> Result<GenerateResponse> {
        self.generated.lock().unwrap().push(request.clone());
        match request.model.as_str() {
            "broken" => Err(ModelError::Unavailable("connection refused".into())),
            "no-json" => Err(ModelError::Api { status: 400, message: "format unsupported".into() }),
            "chatty" => Ok(GenerateResponse {
                response: "Sure! Here you go: {\"name\": \"Ann\"}".into(),
                ..Default::default()
            }),
            _ => {
                let turn = request.context.len() as i64;
                Ok(GenerateResponse {
                    response: if request.json_format {
                        r#"{"name": "Ann", "age": 31, "city": "Oslo"}"#.into()
                    } else {
                        format!("{} says: {}", request.model, request.prompt)
                    },
                    context: (0..=turn).collect(),
                    eval_count: Some(20),
                    eval_duration: Some(500_000_000),
                })
            }
        }
    }

    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse> {
        self.chats.lock().unwrap().push(request.clone());
        let mut message = ChatMessage {
            role: "assistant".into(),
            content: String::new(),
            images: Vec::new(),
            tool_calls: Vec::new(),
        };
        match request.model.as_str() {
            "no-tools" => {
                return Err(ModelError::Api {
                    status: 400,
                    message: "model does not support tools".into(),
                });
            }
            "tool-user" => message.tool_calls.push(ToolCall {
                function: FunctionCall {
                    name: WEATHER_TOOL.into(),
                    arguments: serde_json::json!({ "location": "Paris, France" }),
                },
            }),
            "broken" => return Err(ModelError::Unavailable("connection refused".into())),
            _ => message.content = format!("{} sees an image", request.model),
        }
        Ok(ChatResponse { message, eval_count: Some(8), eval_duration: Some(0) })
    }
}

fn models(names: &[&str]) -> Vec<String> {
    names.iter().map(|n| n.to_string()).collect()
}

#[tokio::test]
async fn compare_records_each_model_in_order() {
    let backend = Arc::new(ScriptedBackend::default());
    let runner = ComparisonRunner::new(backend.clone());

    let report = runner
        .compare(&models(&["llama3", "mistral"]), "hello", &GenerationOptions::default())
        .await
        .unwrap();

    assert_eq!(report.runs.len(), 2);
    assert_eq!(report.runs[0].model, "llama3");
    assert_eq!(report.runs[1].model, "mistral");
    let metrics = report.runs[1].metrics().unwrap();
    assert_eq!(metrics.response, "mistral says: hello");
    assert!((metrics.tokens_per_second - 40.0).abs() < 1e-9);
}

#[tokio::test]
async fn successful_comparison_is_memoized() {
    let backend = Arc::new(ScriptedBackend::default());
    let runner = ComparisonRunner::new(backend.clone());
    let options = GenerationOptions::default();
    let names = models(&["llama3", "mistral"]);

    let first = runner.compare(&names, "hello", &options).await.unwrap();
    let second = runner.compare(&names, "hello", &options).await.unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(backend.generate_calls(), 2);
    assert_eq!(runner.cached_reports().await, 1);

    let warmer = GenerationOptions { temperature: 0.9, ..options };
    runner.compare(&names, "hello", &warmer).await.unwrap();
    runner.compare(&names, "goodbye", &options).await.unwrap();
    assert_eq!(backend.generate_calls(), 6);
    assert_eq!(runner.cached_reports().await, 3);
}

#[tokio::test]
async fn partial_failure_is_reported_and_not_cached() {
    let backend = Arc::new(ScriptedBackend::default());
    let runner = ComparisonRunner::new(backend.clone());
    let names = models(&["broken", "llama3"]);

    let report = runner.compare(&names, "hi", &GenerationOptions::default()).await.unwrap();
    assert!(matches!(&report.runs[0].outcome, RunOutcome::Failed(msg) if msg.contains("connection refused")));
    assert!(report.runs[1].metrics().is_some());
    assert!(!report.all_succeeded());

    runner.compare(&names, "hi", &GenerationOptions::default()).await.unwrap();
    assert_eq!(backend.generate_calls(), 4);
    assert_eq!(runner.cached_reports().await, 0);
}

#[tokio::test]
async fn compare_rejects_bad_input_without_calling_backend() {
    let backend = Arc::new(ScriptedBackend::default());
    let runner = ComparisonRunner::new(backend.clone());

    let err = runner.compare(&[], "hi", &GenerationOptions::default()).await.unwrap_err();
    assert!(matches!(err, ModelError::InvalidArgument(_)));

    let bad = GenerationOptions { max_tokens: 10, ..Default::default() };
    let err = runner.compare(&models(&["llama3"]), "hi", &bad).await.unwrap_err();
    assert!(matches!(err, ModelError::InvalidArgument(_)));
    assert_eq!(backend.generate_calls(), 0);
}

#[tokio::test]
async fn vision_sends_base64_image_with_fixed_prompt() {
    let backend = Arc::new(ScriptedBackend::default());
    let runner = ComparisonRunner::new(backend.clone());

    let report = runner
        .compare_vision(&models(&["llava", "broken"]), b"\x89PNG", &GenerationOptions::default())
        .await
        .unwrap();

    assert_eq!(report.prompt, VISION_PROMPT);
    assert_eq!(report.runs[0].metrics().unwrap().response, "llava sees an image");
    assert_eq!(report.runs[0].metrics().unwrap().tokens_per_second, 0.0);
    assert!(matches!(report.runs[1].outcome, RunOutcome::Failed(_)));

    let chats = backend.chats.lock().unwrap();
    let message = &chats[0].messages[0];
    assert_eq!(message.content, VISION_PROMPT);
    assert_eq!(message.images, vec!["iVBORw==".to_string()]);
}

#[tokio::test]
async fn vision_rejects_empty_image() {
    let runner = ComparisonRunner::new(Arc::new(ScriptedBackend::default()));
    let err = runner
        .compare_vision(&models(&["llava"]), &[], &GenerationOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ModelError::InvalidArgument(_)));
}

#[tokio::test]
async fn contextual_carries_context_forward() {
    let backend = Arc::new(ScriptedBackend::default());
    let runner = ComparisonRunner::new(backend.clone());
    let prompts = models(&["Hi, how are you?", "What's your name?", "Tell me a joke."]);

    let turns = runner.contextual("llama3", &prompts, &GenerationOptions::default()).await.unwrap();

    assert_eq!(turns.len(), 3);
    assert_eq!(turns[2].prompt, "Tell me a joke.");
    let sent = backend.generated.lock().unwrap();
    assert!(sent[0].context.is_empty());
    assert_eq!(sent[1].context, vec![0]);
    assert_eq!(sent[2].context, vec![0, 1]);
}

#[tokio::test]
async fn contextual_stops_at_first_failure() {
    let runner = ComparisonRunner::new(Arc::new(ScriptedBackend::default()));
    let err = runner
        .contextual("broken", &models(&["a", "b"]), &GenerationOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ModelError::Unavailable(_)));
}

#[tokio::test]
async fn json_probe() {
    let backend = ScriptedBackend::default();
    let options = GenerationOptions::default();

    assert!(check_json_handling(&backend, "llama3", &options).await.unwrap());
    assert!(!check_json_handling(&backend, "chatty", &options).await.unwrap());
    assert!(!check_json_handling(&backend, "no-json", &options).await.unwrap());
    assert!(check_json_handling(&backend, "broken", &options).await.is_err());
    assert!(backend.generated.lock().unwrap().iter().all(|r| r.json_format));
}

#[tokio::test]
async fn function_calling_probe() {
    let backend = ScriptedBackend::default();
    let options = GenerationOptions::default();

    assert!(check_function_calling(&backend, "tool-user", &options).await.unwrap());
    assert!(!check_function_calling(&backend, "llava", &options).await.unwrap());
    assert!(!check_function_calling(&backend, "no-tools", &options).await.unwrap());
    assert!(check_function_calling(&backend, "broken", &options).await.is_err());

    let chats = backend.chats.lock().unwrap();
    assert_eq!(chats[0].tools[0].function.name, WEATHER_TOOL);
}
