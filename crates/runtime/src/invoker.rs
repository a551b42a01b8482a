//! Executes single tool requests, turning every failure into a result.

use tracing::{debug, warn};

use crate::model::{ToolCallRequest, ToolCallResult};
use crate::registry::CapabilityRegistry;

/// Runs one tool request against the registry.
///
/// Never fails: dispatch errors become [`ToolOutcome::Error`] results so the
/// model can see them and recover.
///
/// [`ToolOutcome::Error`]: crate::model::ToolOutcome::Error
#[derive(Debug, Clone, Copy)]
pub struct ToolInvoker<'a> {
    registry: &'a CapabilityRegistry,
}

impl<'a> ToolInvoker<'a> {
    pub fn new(registry: &'a CapabilityRegistry) -> Self {
        Self { registry }
    }

    pub async fn invoke(&self, request: ToolCallRequest) -> ToolCallResult {
        debug!(call_id = %request.id, tool = %request.name, "invoking tool");

        match self.registry.dispatch(&request.name, request.arguments).await {
            Ok(outcome) => ToolCallResult::success(request.id, request.name, outcome.into_value()),
            Err(e) => {
                warn!(call_id = %request.id, tool = %request.name, error = %e, "tool call failed");
                ToolCallResult::error(request.id, request.name, e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ToolOutcome;
    use crate::registry::ServerHandle;
    use async_trait::async_trait;
    use mcp::{RemoteToolOutcome, Tool};
    use serde_json::{Map, Value, json};

    struct Echo;

    #[async_trait]
    impl ServerHandle for Echo {
        async fn list_tools(&self) -> mcp::Result<Vec<Tool>> {
            Ok(Vec::new())
        }

        async fn call_tool(
            &self,
            name: &str,
            _arguments: Map<String, Value>,
        ) -> mcp::Result<RemoteToolOutcome> {
            match name {
                "text" => Ok(RemoteToolOutcome::Text("plain".into())),
                "image" => Ok(RemoteToolOutcome::Opaque(json!([{ "type": "image" }]))),
                "broken" => Err(mcp::Error::ToolCallFailed("quota exceeded".into())),
                _ => Ok(RemoteToolOutcome::Structured(json!({ "ok": true }))),
            }
        }
    }

    fn registry() -> CapabilityRegistry {
        let mut registry = CapabilityRegistry::new();
        registry.register_server("echo", Echo).unwrap();
        registry
    }

    async fn invoke(name: &str) -> ToolCallResult {
        let registry = registry();
        ToolInvoker::new(&registry)
            .invoke(ToolCallRequest::new("call-1", name, Map::new()))
            .await
    }

    #[tokio::test]
    async fn payload_shapes() {
        let structured = invoke("echo_data").await;
        assert_eq!(
            structured.outcome,
            ToolOutcome::Success {
                output: json!({ "ok": true })
            }
        );

        let text = invoke("echo_text").await;
        assert_eq!(text.content_text(), "plain");

        let opaque = invoke("echo_image").await;
        assert_eq!(
            opaque.outcome,
            ToolOutcome::Success {
                output: json!([{ "type": "image" }])
            }
        );
    }

    #[tokio::test]
    async fn remote_failure_becomes_error_result() {
        let result = invoke("echo_broken").await;
        assert_eq!(result.call_id, "call-1");
        assert_eq!(result.name, "echo_broken");
        assert_eq!(
            result.outcome,
            ToolOutcome::Error {
                message: "tool call failed: quota exceeded".into()
            }
        );
    }

    #[tokio::test]
    async fn routing_failures_become_error_results() {
        let unknown = invoke("calendar_create").await;
        match unknown.outcome {
            ToolOutcome::Error { message } => assert!(message.contains("unknown server: calendar")),
            other => panic!("expected error, got {other:?}"),
        }

        let malformed = invoke("nonamespace").await;
        assert!(malformed.outcome.is_error());
    }
}
