//! MCP (Model Context Protocol) client library.
//!
//! This crate provides a client for communicating with MCP servers over a
//! child process's stdio or over Streamable HTTP.
//!
//! # Example
//!
//! ```no_run
//! use mcp::{Server, ServerConfig, TransportConfig};
//! use std::collections::HashMap;
//!
//! # async fn example() -> mcp::Result<()> {
//! let config = ServerConfig::new(
//!     "weather",
//!     TransportConfig::Http {
//!         url: "http://localhost:3000/mcp".to_string(),
//!         headers: HashMap::new(),
//!     },
//! );
//!
//! let server = Server::connect(config).await?;
//! server.initialize().await?;
//!
//! for tool in server.list_tools().await? {
//!     println!("Tool: {}", tool.name);
//! }
//!
//! let mut args = serde_json::Map::new();
//! args.insert("city".into(), "Paris".into());
//! let outcome = server.call_tool("getForecast", args).await?.into_outcome();
//! println!("{outcome:?}");
//!
//! server.shutdown().await;
//! # Ok(())
//! # }
//! ```

mod error;
mod protocol;
mod server;
mod transport;

pub use error::{Error, Result};
pub use protocol::{
    CallToolParams, CallToolResult, InitializeParams, InitializeResult, JsonRpcError,
    JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, ListToolsResult, PROTOCOL_VERSION,
    RemoteToolOutcome, RequestId, ServerCapabilities, ServerInfo, Tool, ToolContent,
    ToolsCapability,
};
pub use server::{DEFAULT_TIMEOUT, MAX_OUTPUT_SIZE, Server, ServerConfig};
pub use transport::TransportConfig;
