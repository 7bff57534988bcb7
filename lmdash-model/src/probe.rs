//! Capability probes: does a model produce valid JSON, does it call tools.

use serde_json::{Value, json};
use tracing::{debug, info};

use crate::backend::ModelBackend;
use crate::error::{ModelError, Result};
use crate::types::{ChatMessage, ChatRequest, GenerateRequest, GenerationOptions, ToolDefinition};

const JSON_PROMPT: &str = "Return a JSON object describing a fictional person with the keys \
     \"name\", \"age\" and \"city\". Respond with JSON only.";

const WEATHER_PROMPT: &str = "What is the weather like in Paris today?";

/// Name of the tool offered by [`check_function_calling`].
pub const WEATHER_TOOL: &str = "get_current_weather";

/// The tool definition offered by [`check_function_calling`].
pub fn weather_tool() -> ToolDefinition {
    ToolDefinition::function(
        WEATHER_TOOL,
        "Get the current weather for a location",
        json!({
            "type": "object",
            "properties": {
                "location": {
                    "type": "string",
                    "description": "The city and country, e.g. Paris, France"
                },
                "unit": { "type": "string", "enum": ["celsius", "fahrenheit"] }
            },
            "required": ["location"]
        }),
    )
}

/// Whether `model` returns a parseable JSON object when asked for JSON output.
///
/// An error status from the server counts as `false`; connection failures
/// are returned as errors.
pub async fn check_json_handling(
    backend: &dyn ModelBackend,
    model: &str,
    options: &GenerationOptions,
) -> Result<bool> {
    let request = GenerateRequest::new(model, JSON_PROMPT).with_options(*options).with_json_format();
    let response = match backend.generate(&request).await {
        Ok(response) => response,
        Err(ModelError::Api { status, message }) => {
            debug!(model = %model, status, message = %message, "JSON probe rejected");
            return Ok(false);
        }
        Err(e) => return Err(e),
    };

    let supported = matches!(serde_json::from_str::<Value>(response.response.trim()), Ok(Value::Object(_)));
    info!(model = %model, supported, "JSON probe complete");
    Ok(supported)
}

/// Whether `model` answers a weather question by calling [`WEATHER_TOOL`].
///
/// Models that do not support tools usually make the server answer with an
/// error status, which counts as `false`.
pub async fn check_function_calling(
    backend: &dyn ModelBackend,
    model: &str,
    options: &GenerationOptions,
) -> Result<bool> {
    let request = ChatRequest::new(model, vec![ChatMessage::user(WEATHER_PROMPT)])
        .with_options(*options)
        .with_tools(vec![weather_tool()]);
    let response = match backend.chat(&request).await {
        Ok(response) => response,
        Err(ModelError::Api { status, message }) => {
            debug!(model = %model, status, message = %message, "function-calling probe rejected");
            return Ok(false);
        }
        Err(e) => return Err(e),
    };

    let supported = response.message.tool_calls.iter().any(|call| call.function.name == WEATHER_TOOL);
    info!(model = %model, supported, "function-calling probe complete");
    Ok(supported)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weather_tool_requires_location() {
        let tool = serde_json::to_value(weather_tool()).unwrap();
        assert_eq!(tool["type"], "function");
        assert_eq!(tool["function"]["name"], WEATHER_TOOL);
        assert_eq!(tool["function"]["parameters"]["required"][0], "location");
    }
}
