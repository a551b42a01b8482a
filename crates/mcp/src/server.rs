//! MCP server handle (connect, handshake, tool calls, lifecycle).

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use serde_json::{Map, Value};
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::protocol::{
    CallToolParams, CallToolResult, InitializeParams, InitializeResult, JsonRpcNotification,
    JsonRpcRequest, ListToolsParams, ListToolsResult, RequestId, Tool,
};
use crate::transport::{Transport, TransportConfig};

/// Default timeout for MCP operations.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Maximum size of a single incoming message (1MB).
/// Sized for large tool outputs (page dumps, search results).
pub const MAX_OUTPUT_SIZE: usize = 1024 * 1024;

/// Configuration for an MCP server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub name: String,
    pub transport: TransportConfig,
    pub timeout: Duration,
}

impl ServerConfig {
    pub fn new(name: impl Into<String>, transport: TransportConfig) -> Self {
        Self {
            name: name.into(),
            transport,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Handle to a connected MCP server.
pub struct Server {
    config: ServerConfig,
    transport: Transport,
    next_id: AtomicI64,
    server_info: Mutex<Option<InitializeResult>>,
}

impl Server {
    /// Open the transport to a server. Call [`Server::initialize`] before use.
    pub async fn connect(config: ServerConfig) -> Result<Self> {
        let transport = Transport::open(&config.transport).await?;
        Ok(Self {
            config,
            transport,
            next_id: AtomicI64::new(1),
            server_info: Mutex::new(None),
        })
    }

    /// Get the server name.
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Perform the initialize handshake (must be called before other operations).
    pub async fn initialize(&self) -> Result<&Self> {
        let params = InitializeParams::default();
        let result: InitializeResult = self.request("initialize", Some(params)).await?;

        self.transport
            .notify(&JsonRpcNotification::new("notifications/initialized"))
            .await?;

        info!(
            server = %self.config.name,
            remote = %result.server_info.name,
            protocol = %result.protocol_version,
            "MCP server initialized"
        );
        *self.server_info.lock().await = Some(result);

        Ok(self)
    }

    /// Check if the server is initialized.
    pub async fn is_initialized(&self) -> bool {
        self.server_info.lock().await.is_some()
    }

    /// Get server info (after initialization).
    pub async fn server_info(&self) -> Option<InitializeResult> {
        self.server_info.lock().await.clone()
    }

    /// Query the server's current tool list, following pagination cursors.
    pub async fn list_tools(&self) -> Result<Vec<Tool>> {
        self.ensure_initialized().await?;

        let mut tools = Vec::new();
        let mut cursor = None;
        loop {
            let params = ListToolsParams { cursor };
            let page: ListToolsResult = self.request("tools/list", Some(params)).await?;
            tools.extend(page.tools);
            match page.next_cursor {
                Some(next) if !next.is_empty() => cursor = Some(next),
                _ => break,
            }
        }
        Ok(tools)
    }

    /// Call a tool by name.
    ///
    /// A result flagged `isError` is returned as [`Error::ToolCallFailed`].
    pub async fn call_tool(
        &self,
        name: &str,
        arguments: Map<String, Value>,
    ) -> Result<CallToolResult> {
        self.ensure_initialized().await?;

        let params = CallToolParams {
            name: name.to_string(),
            arguments,
        };

        let result: CallToolResult = self.request("tools/call", Some(params)).await?;

        if result.is_error {
            return Err(Error::ToolCallFailed(result.text()));
        }

        Ok(result)
    }

    /// Shut the connection down (kills a child process, ends an HTTP session).
    pub async fn shutdown(&self) {
        self.transport.close().await;
        *self.server_info.lock().await = None;
    }

    // --- Internal methods ---

    async fn ensure_initialized(&self) -> Result<()> {
        if self.is_initialized().await {
            Ok(())
        } else {
            Err(Error::NotInitialized)
        }
    }

    fn next_request_id(&self) -> RequestId {
        RequestId::Number(self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    async fn request<P, R>(&self, method: &str, params: Option<P>) -> Result<R>
    where
        P: serde::Serialize,
        R: serde::de::DeserializeOwned,
    {
        let id = self.next_request_id();
        let mut request = JsonRpcRequest::new(id, method);
        if let Some(p) = params {
            request = request.with_params(p);
        }

        debug!(server = %self.config.name, method, id = ?request.id, "sending request");

        let response = timeout(self.config.timeout, self.transport.request(&request))
            .await
            .map_err(|_| Error::Timeout(self.config.timeout))??;

        let result_value = response.into_result()?;
        let result: R = serde_json::from_value(result_value)?;

        Ok(result)
    }
}
