use crate::model::ModelError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("server already registered: {0}")]
    DuplicateServer(String),

    #[error("invalid server name {0:?}: must be non-empty and must not contain '_'")]
    InvalidServerName(String),

    #[error("unknown server: {name}. Available: {available:?}")]
    UnknownServer { name: String, available: Vec<String> },

    #[error("expected namespaced tool name like 'notion_search', got {0:?}")]
    MalformedName(String),

    #[error("failed to list tools on server {server}: {source}")]
    RemoteQuery {
        server: String,
        #[source]
        source: mcp::Error,
    },

    #[error("{source}")]
    RemoteCall {
        tool: String,
        #[source]
        source: mcp::Error,
    },

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("invalid state: {0}")]
    InvalidState(String),
}

pub type Result<T> = std::result::Result<T, Error>;
