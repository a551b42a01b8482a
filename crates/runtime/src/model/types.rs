//! Core conversation types (provider-agnostic).
//!
//! These types represent the concepts shared by every model provider and by
//! the tool loop. Provider wire formats belong in adapter modules.

use super::errors::ModelError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::future::Future;

/// Separator between a server name and a tool's bare name.
pub const NAMESPACE_SEPARATOR: char = '_';

/// The role of a message sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// A tool call requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    /// Correlates the request with its result.
    pub id: String,
    /// Namespaced tool name (`{server}_{tool}`).
    pub name: String,
    pub arguments: Map<String, Value>,
}

impl ToolCallRequest {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: Map<String, Value>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }
}

/// Outcome of a tool execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ToolOutcome {
    /// Tool executed successfully.
    Success { output: Value },
    /// Tool execution failed.
    Error { message: String },
}

impl ToolOutcome {
    /// Whether this is an error.
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }
}

/// Result of a tool execution, paired with the call it answers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallResult {
    pub call_id: String,
    /// Namespaced tool name, copied from the request.
    pub name: String,
    pub outcome: ToolOutcome,
}

impl ToolCallResult {
    /// Create a successful result.
    pub fn success(call_id: impl Into<String>, name: impl Into<String>, output: Value) -> Self {
        Self {
            call_id: call_id.into(),
            name: name.into(),
            outcome: ToolOutcome::Success { output },
        }
    }

    /// Create an error result.
    pub fn error(
        call_id: impl Into<String>,
        name: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            call_id: call_id.into(),
            name: name.into(),
            outcome: ToolOutcome::Error {
                message: message.into(),
            },
        }
    }

    /// Text shown to the model for this result.
    ///
    /// String payloads are passed through, other JSON is serialized, and
    /// failures read `Error: <message>`.
    pub fn content_text(&self) -> String {
        match &self.outcome {
            ToolOutcome::Success {
                output: Value::String(text),
            } => text.clone(),
            ToolOutcome::Success { output } => output.to_string(),
            ToolOutcome::Error { message } => format!("Error: {message}"),
        }
    }
}

/// A message in the conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum Message {
    System {
        content: String,
    },
    User {
        content: String,
    },
    Assistant {
        content: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        tool_calls: Vec<ToolCallRequest>,
    },
    Tool {
        result: ToolCallResult,
    },
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self::System {
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::User {
            content: content.into(),
        }
    }

    /// A final assistant message without tool calls.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::Assistant {
            content: content.into(),
            tool_calls: Vec::new(),
        }
    }

    /// An assistant message that requests tool calls.
    pub fn assistant_with_tools(content: impl Into<String>, tool_calls: Vec<ToolCallRequest>) -> Self {
        Self::Assistant {
            content: content.into(),
            tool_calls,
        }
    }

    /// A tool message answering one request.
    pub fn tool(result: ToolCallResult) -> Self {
        Self::Tool { result }
    }

    pub fn role(&self) -> Role {
        match self {
            Self::System { .. } => Role::System,
            Self::User { .. } => Role::User,
            Self::Assistant { .. } => Role::Assistant,
            Self::Tool { .. } => Role::Tool,
        }
    }

    /// Text content (rendered result text for tool messages).
    pub fn text(&self) -> String {
        match self {
            Self::System { content } | Self::User { content } | Self::Assistant { content, .. } => {
                content.clone()
            }
            Self::Tool { result } => result.content_text(),
        }
    }

    /// Tool calls requested by an assistant message.
    pub fn tool_calls(&self) -> &[ToolCallRequest] {
        match self {
            Self::Assistant { tool_calls, .. } => tool_calls,
            _ => &[],
        }
    }

    /// The call id a tool message answers.
    pub fn answers(&self) -> Option<&str> {
        match self {
            Self::Tool { result } => Some(&result.call_id),
            _ => None,
        }
    }
}

/// A tool definition presented to the model.
///
/// The namespaced name is always derived from `server` and `bare_name`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    pub server: String,
    pub bare_name: String,
    pub description: String,
    /// JSON Schema for the tool's arguments.
    pub schema: Value,
}

impl ToolSpec {
    /// Build a spec for a tool reported by `server`.
    pub fn from_remote(server: &str, tool: mcp::Tool) -> Self {
        let description = tool.summary().to_string();
        Self {
            server: server.to_string(),
            bare_name: tool.name,
            description,
            schema: tool.input_schema,
        }
    }

    /// `{server}_{bare_name}`.
    pub fn full_name(&self) -> String {
        format!("{}{NAMESPACE_SEPARATOR}{}", self.server, self.bare_name)
    }
}

/// Everything needed for a model request.
#[derive(Debug, Clone)]
pub struct ModelRequest<'a> {
    pub system: &'a str,
    pub messages: &'a [Message],
    pub tools: &'a [ToolSpec],
}

/// The reply from a model: text, tool requests, or both.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelResponse {
    pub content: String,
    pub tool_calls: Vec<ToolCallRequest>,
}

impl ModelResponse {
    /// A plain text reply.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            tool_calls: Vec::new(),
        }
    }

    /// A reply requesting tool calls.
    pub fn with_tool_calls(tool_calls: Vec<ToolCallRequest>) -> Self {
        Self {
            content: String::new(),
            tool_calls,
        }
    }

    /// Whether the reply ends the tool loop.
    pub fn is_final(&self) -> bool {
        self.tool_calls.is_empty()
    }
}

/// Trait for LLM provider backends.
pub trait Backend: Send + Sync {
    fn call(
        &self,
        request: ModelRequest<'_>,
    ) -> impl Future<Output = Result<ModelResponse, ModelError>> + Send;
}
