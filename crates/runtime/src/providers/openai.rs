//! OpenAI Chat Completions backend.

use crate::model::{
    Backend, Message, ModelError, ModelRequest, ModelResponse, ToolCallRequest, ToolSpec,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4o";

// ─────────────────────────────────────────────────────────────────────────────
// API Wire Types
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ApiRequest {
    model: String,
    messages: Vec<ApiMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<ApiTool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<&'static str>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "role", rename_all = "lowercase")]
enum ApiMessage {
    System {
        content: String,
    },
    User {
        content: String,
    },
    Assistant {
        content: Option<String>,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        tool_calls: Vec<ApiToolCall>,
    },
    Tool {
        tool_call_id: String,
        content: String,
    },
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolCall {
    id: String,
    #[serde(rename = "type", default = "function_type")]
    call_type: String,
    function: ApiFunctionCall,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiFunctionCall {
    name: String,
    /// JSON-encoded argument object.
    #[serde(default)]
    arguments: String,
}

fn function_type() -> String {
    "function".to_string()
}

#[derive(Debug, Serialize)]
struct ApiTool {
    #[serde(rename = "type")]
    tool_type: &'static str,
    function: ApiFunction,
}

#[derive(Debug, Serialize)]
struct ApiFunction {
    name: String,
    description: String,
    parameters: Value,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    choices: Vec<ApiChoice>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ApiResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ApiToolCall>>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Backend Implementation
// ─────────────────────────────────────────────────────────────────────────────

/// Builder for creating an OpenAI backend.
#[derive(Debug, Clone)]
pub struct OpenAiBackendBuilder {
    api_key: String,
    model: String,
    base_url: String,
}

impl OpenAiBackendBuilder {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Point at any OpenAI-compatible endpoint.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn build(self) -> OpenAiBackend {
        OpenAiBackend {
            client: reqwest::Client::new(),
            api_key: self.api_key,
            model: self.model,
            base_url: self.base_url,
        }
    }
}

/// OpenAI Chat Completions backend.
pub struct OpenAiBackend {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl OpenAiBackend {
    pub fn builder(api_key: impl Into<String>, model: impl Into<String>) -> OpenAiBackendBuilder {
        OpenAiBackendBuilder::new(api_key, model)
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }

    fn build_request(&self, request: &ModelRequest<'_>) -> ApiRequest {
        let mut messages = Vec::with_capacity(request.messages.len() + 1);
        messages.push(ApiMessage::System {
            content: request.system.to_string(),
        });
        messages.extend(request.messages.iter().map(Self::message_to_api));

        let tools: Vec<ApiTool> = request.tools.iter().map(Self::tool_to_api).collect();
        let tool_choice = (!tools.is_empty()).then_some("auto");

        ApiRequest {
            model: self.model.clone(),
            messages,
            tools,
            tool_choice,
        }
    }

    fn message_to_api(msg: &Message) -> ApiMessage {
        match msg {
            Message::System { content } => ApiMessage::System {
                content: content.clone(),
            },
            Message::User { content } => ApiMessage::User {
                content: content.clone(),
            },
            Message::Assistant {
                content,
                tool_calls,
            } => ApiMessage::Assistant {
                content: (!content.is_empty() || tool_calls.is_empty()).then(|| content.clone()),
                tool_calls: tool_calls.iter().map(Self::call_to_api).collect(),
            },
            Message::Tool { result } => ApiMessage::Tool {
                tool_call_id: result.call_id.clone(),
                content: result.content_text(),
            },
        }
    }

    fn call_to_api(call: &ToolCallRequest) -> ApiToolCall {
        ApiToolCall {
            id: call.id.clone(),
            call_type: function_type(),
            function: ApiFunctionCall {
                name: call.name.clone(),
                arguments: Value::Object(call.arguments.clone()).to_string(),
            },
        }
    }

    fn tool_to_api(spec: &ToolSpec) -> ApiTool {
        ApiTool {
            tool_type: "function",
            function: ApiFunction {
                name: spec.full_name(),
                description: spec.description.clone(),
                parameters: spec.schema.clone(),
            },
        }
    }

    fn response_from_api(response: ApiResponse) -> Result<ModelResponse, ModelError> {
        let message = response
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message)
            .ok_or_else(|| ModelError::InvalidResponse("no choices in response".into()))?;

        let tool_calls = message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|call| {
                let arguments = parse_arguments(&call.function.name, &call.function.arguments)?;
                Ok(ToolCallRequest::new(call.id, call.function.name, arguments))
            })
            .collect::<Result<Vec<_>, ModelError>>()?;

        Ok(ModelResponse {
            content: message.content.unwrap_or_default(),
            tool_calls,
        })
    }
}

/// Decode a tool call's argument string. Empty means no arguments.
fn parse_arguments(tool: &str, raw: &str) -> Result<Map<String, Value>, ModelError> {
    if raw.trim().is_empty() {
        return Ok(Map::new());
    }

    let reason = match serde_json::from_str(raw) {
        Ok(Value::Object(map)) => return Ok(map),
        Ok(other) => format!("expected a JSON object, got {other}"),
        Err(e) => e.to_string(),
    };
    Err(ModelError::InvalidToolArguments {
        tool: tool.to_string(),
        reason,
    })
}

impl std::fmt::Display for OpenAiBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "openai({}, {})", self.model, self.base_url)
    }
}

impl Backend for OpenAiBackend {
    async fn call(&self, request: ModelRequest<'_>) -> Result<ModelResponse, ModelError> {
        let api_request = self.build_request(&request);
        debug!(
            model = %self.model,
            messages = api_request.messages.len(),
            tools = api_request.tools.len(),
            "sending chat completion"
        );

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .header("content-type", "application/json")
            .header("accept", "application/json")
            .json(&api_request)
            .send()
            .await
            .map_err(|e| ModelError::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ModelError::Api(format!("{status}: {body}")));
        }

        let api_response: ApiResponse = response
            .json()
            .await
            .map_err(|e| ModelError::InvalidResponse(e.to_string()))?;

        Self::response_from_api(api_response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ToolCallResult;
    use serde_json::json;

    fn backend() -> OpenAiBackend {
        OpenAiBackend::builder("sk-test", DEFAULT_MODEL)
            .base_url("http://localhost:8080/v1/")
            .build()
    }

    #[test]
    fn display_and_endpoint() {
        let backend = backend();
        assert_eq!(backend.to_string(), "openai(gpt-4o, http://localhost:8080/v1/)");
        assert_eq!(backend.endpoint(), "http://localhost:8080/v1/chat/completions");
    }

    #[test]
    fn request_wire_format() {
        let mut args = Map::new();
        args.insert("city".into(), json!("Paris"));
        let messages = vec![
            Message::user("weather in Paris?"),
            Message::assistant_with_tools(
                "",
                vec![ToolCallRequest::new("call_1", "weather_getForecast", args)],
            ),
            Message::tool(ToolCallResult::success("call_1", "weather_getForecast", json!({"temp": 18}))),
        ];
        let tools = vec![ToolSpec {
            server: "weather".into(),
            bare_name: "getForecast".into(),
            description: "Forecast for a city".into(),
            schema: json!({"type": "object"}),
        }];
        let request = ModelRequest {
            system: "be brief",
            messages: &messages,
            tools: &tools,
        };

        let value = serde_json::to_value(backend().build_request(&request)).unwrap();
        assert_eq!(
            value,
            json!({
                "model": "gpt-4o",
                "messages": [
                    {"role": "system", "content": "be brief"},
                    {"role": "user", "content": "weather in Paris?"},
                    {"role": "assistant", "content": null, "tool_calls": [{
                        "id": "call_1",
                        "type": "function",
                        "function": {"name": "weather_getForecast", "arguments": "{\"city\":\"Paris\"}"}
                    }]},
                    {"role": "tool", "tool_call_id": "call_1", "content": "{\"temp\":18}"}
                ],
                "tools": [{
                    "type": "function",
                    "function": {
                        "name": "weather_getForecast",
                        "description": "Forecast for a city",
                        "parameters": {"type": "object"}
                    }
                }],
                "tool_choice": "auto"
            })
        );
    }

    #[test]
    fn no_tool_choice_without_tools() {
        let messages = vec![Message::user("hi")];
        let request = ModelRequest {
            system: "",
            messages: &messages,
            tools: &[],
        };
        let value = serde_json::to_value(backend().build_request(&request)).unwrap();
        assert!(value.get("tools").is_none());
        assert!(value.get("tool_choice").is_none());
    }

    #[test]
    fn response_with_tool_calls() {
        let api: ApiResponse = serde_json::from_value(json!({
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [
                        {"id": "a", "type": "function", "function": {"name": "weather_now", "arguments": "{\"city\":\"Paris\"}"}},
                        {"id": "b", "type": "function", "function": {"name": "notion_search", "arguments": ""}}
                    ]
                }
            }]
        }))
        .unwrap();

        let response = OpenAiBackend::response_from_api(api).unwrap();
        assert_eq!(response.content, "");
        assert_eq!(response.tool_calls.len(), 2);
        assert_eq!(response.tool_calls[0].arguments["city"], "Paris");
        assert!(response.tool_calls[1].arguments.is_empty());
        assert!(!response.is_final());
    }

    #[test]
    fn final_text_response() {
        let api: ApiResponse = serde_json::from_value(json!({
            "choices": [{"message": {"role": "assistant", "content": "It's 18°C in Paris"}}]
        }))
        .unwrap();
        let response = OpenAiBackend::response_from_api(api).unwrap();
        assert_eq!(response, ModelResponse::text("It's 18°C in Paris"));
    }

    #[test]
    fn empty_choices_is_invalid() {
        let api: ApiResponse = serde_json::from_value(json!({"choices": []})).unwrap();
        assert!(matches!(
            OpenAiBackend::response_from_api(api),
            Err(ModelError::InvalidResponse(_))
        ));
    }

    #[test]
    fn argument_parsing() {
        assert!(parse_arguments("notion_search", "  ").unwrap().is_empty());
        assert_eq!(parse_arguments("notion_search", r#"{"q": 1}"#).unwrap()["q"], 1);
        assert!(matches!(
            parse_arguments("notion_search", "{not json"),
            Err(ModelError::InvalidToolArguments { tool, .. }) if tool == "notion_search"
        ));
        assert!(matches!(
            parse_arguments("notion_search", "[1, 2]"),
            Err(ModelError::InvalidToolArguments { reason, .. }) if reason.contains("[1,2]")
        ));
    }

    #[test]
    fn bad_tool_arguments_name_the_tool() {
        let api: ApiResponse = serde_json::from_value(json!({
            "choices": [{
                "message": {
                    "role": "assistant",
                    "tool_calls": [
                        {"id": "a", "type": "function", "function": {"name": "weather_getForecast", "arguments": "{\"city\":"}}
                    ]
                }
            }]
        }))
        .unwrap();

        let err = OpenAiBackend::response_from_api(api).unwrap_err();
        assert!(err.to_string().starts_with("invalid arguments for tool weather_getForecast"));
        assert!(matches!(err, ModelError::InvalidToolArguments { .. }));
    }
}
