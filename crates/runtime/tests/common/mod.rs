//! Stub servers and a scripted model for driving sessions in tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use mcp::{RemoteToolOutcome, Tool};
use runtime::{
    Backend, Message, ModelError, ModelRequest, ModelResponse, ServerHandle, ToolCallRequest,
};
use serde_json::{Map, Value, json};

type Handler = dyn Fn(&str, &Map<String, Value>) -> mcp::Result<RemoteToolOutcome> + Send + Sync;

/// A server with a fixed catalog and a closure answering every call.
pub struct StubServer {
    tools: Vec<&'static str>,
    handler: Box<Handler>,
    broken: bool,
    pub calls: Arc<AtomicUsize>,
}

impl StubServer {
    pub fn new(
        tools: &[&'static str],
        handler: impl Fn(&str, &Map<String, Value>) -> mcp::Result<RemoteToolOutcome>
        + Send
        + Sync
        + 'static,
    ) -> Self {
        Self {
            tools: tools.to_vec(),
            handler: Box::new(handler),
            broken: false,
            calls: Arc::default(),
        }
    }

    /// A server whose every call fails.
    pub fn failing(tools: &[&'static str]) -> Self {
        Self::new(tools, |name, _| {
            Err(mcp::Error::ToolCallFailed(format!("{name} is unavailable")))
        })
    }

    /// A server that cannot even list its tools.
    pub fn unreachable() -> Self {
        Self {
            broken: true,
            ..Self::failing(&[])
        }
    }

    pub fn call_count(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

#[async_trait]
impl ServerHandle for StubServer {
    async fn list_tools(&self) -> mcp::Result<Vec<Tool>> {
        if self.broken {
            return Err(mcp::Error::Http("connection refused".into()));
        }
        Ok(self
            .tools
            .iter()
            .map(|name| {
                serde_json::from_value(json!({
                    "name": name,
                    "description": format!("stub {name}"),
                    "inputSchema": {"type": "object"}
                }))
                .expect("valid tool")
            })
            .collect())
    }

    async fn call_tool(
        &self,
        name: &str,
        arguments: Map<String, Value>,
    ) -> mcp::Result<RemoteToolOutcome> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        (self.handler)(name, &arguments)
    }
}

/// What the model saw on one request.
#[derive(Debug, Clone)]
pub struct Seen {
    pub messages: Vec<Message>,
    pub tools: Vec<String>,
}

/// A backend that replays a fixed list of replies, then answers "done".
#[derive(Clone, Default)]
pub struct ScriptedBackend {
    replies: Arc<Mutex<VecDeque<Result<ModelResponse, ModelError>>>>,
    seen: Arc<Mutex<Vec<Seen>>>,
}

impl ScriptedBackend {
    pub fn new(replies: Vec<Result<ModelResponse, ModelError>>) -> Self {
        Self {
            replies: Arc::new(Mutex::new(replies.into())),
            seen: Arc::default(),
        }
    }

    /// Every request received so far.
    pub fn seen(&self) -> Vec<Seen> {
        self.seen.lock().unwrap().clone()
    }
}

impl Backend for ScriptedBackend {
    async fn call(&self, request: ModelRequest<'_>) -> Result<ModelResponse, ModelError> {
        self.seen.lock().unwrap().push(Seen {
            messages: request.messages.to_vec(),
            tools: request.tools.iter().map(|t| t.full_name()).collect(),
        });
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(ModelResponse::text("done")))
    }
}

/// A backend that requests the same tool forever.
#[derive(Clone)]
pub struct LoopingBackend {
    tool: &'static str,
    pub requests: Arc<AtomicUsize>,
}

impl LoopingBackend {
    pub fn new(tool: &'static str) -> Self {
        Self {
            tool,
            requests: Arc::default(),
        }
    }
}

impl Backend for LoopingBackend {
    async fn call(&self, _request: ModelRequest<'_>) -> Result<ModelResponse, ModelError> {
        let n = self.requests.fetch_add(1, Ordering::SeqCst);
        Ok(ModelResponse::with_tool_calls(vec![call(
            &format!("loop-{n}"),
            self.tool,
            json!({}),
        )]))
    }
}

/// Build a tool request; `arguments` must be a JSON object.
pub fn call(id: &str, name: &str, arguments: Value) -> ToolCallRequest {
    let arguments = match arguments {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    ToolCallRequest::new(id, name, arguments)
}

/// A forecast server answering `getForecast` with structured data.
pub fn weather_server() -> StubServer {
    StubServer::new(&["getForecast", "getAlerts"], |name, _args| match name {
        "getForecast" => Ok(RemoteToolOutcome::Structured(json!({ "temp": 18 }))),
        "getAlerts" => Ok(RemoteToolOutcome::Text("No active alerts".into())),
        other => Err(mcp::Error::ToolCallFailed(format!("no tool {other}"))),
    })
}
