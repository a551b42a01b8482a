//! Transports carrying JSON-RPC messages to an MCP server.

mod http;
mod stdio;

pub use http::HttpTransport;
pub use stdio::StdioTransport;

use std::collections::HashMap;

use serde::Deserialize;

use crate::error::Result;
use crate::protocol::{JsonRpcNotification, JsonRpcRequest, JsonRpcResponse};

/// How to reach an MCP server.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "transport", rename_all = "lowercase")]
pub enum TransportConfig {
    /// Spawn a child process and talk newline-delimited JSON over its pipes.
    Stdio {
        command: String,
        #[serde(default)]
        args: Vec<String>,
        #[serde(default)]
        env: HashMap<String, String>,
    },
    /// POST to a Streamable HTTP endpoint.
    Http {
        url: String,
        #[serde(default)]
        headers: HashMap<String, String>,
    },
}

/// An open connection to one server.
pub enum Transport {
    Stdio(StdioTransport),
    Http(HttpTransport),
}

impl Transport {
    /// Open the transport described by `config`.
    pub async fn open(config: &TransportConfig) -> Result<Self> {
        match config {
            TransportConfig::Stdio { command, args, env } => {
                Ok(Self::Stdio(StdioTransport::spawn(command, args, env)?))
            }
            TransportConfig::Http { url, headers } => {
                Ok(Self::Http(HttpTransport::new(url.clone(), headers.clone())))
            }
        }
    }

    /// Send a request and wait for the response carrying the same id.
    pub async fn request(&self, request: &JsonRpcRequest) -> Result<JsonRpcResponse> {
        match self {
            Self::Stdio(t) => t.request(request).await,
            Self::Http(t) => t.request(request).await,
        }
    }

    /// Send a notification (no response expected).
    pub async fn notify(&self, notification: &JsonRpcNotification) -> Result<()> {
        match self {
            Self::Stdio(t) => t.notify(notification).await,
            Self::Http(t) => t.notify(notification).await,
        }
    }

    /// Release the underlying connection.
    pub async fn close(&self) {
        match self {
            Self::Stdio(t) => t.close().await,
            Self::Http(t) => t.close().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_http_config() {
        let config: TransportConfig = toml::from_str(
            r#"
transport = "http"
url = "http://localhost:3000/mcp"
headers = { Authorization = "Bearer abc" }
"#,
        )
        .unwrap();
        let TransportConfig::Http { url, headers } = config else {
            panic!("expected http transport");
        };
        assert_eq!(url, "http://localhost:3000/mcp");
        assert_eq!(headers["Authorization"], "Bearer abc");
    }

    #[test]
    fn parse_stdio_config() {
        let config: TransportConfig = toml::from_str(
            r#"
transport = "stdio"
command = "weather-mcp"
args = ["--units", "metric"]
"#,
        )
        .unwrap();
        assert_eq!(
            config,
            TransportConfig::Stdio {
                command: "weather-mcp".into(),
                args: vec!["--units".into(), "metric".into()],
                env: HashMap::new(),
            }
        );
    }
}
