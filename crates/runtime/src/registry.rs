//! Capability registry: one handle per remote server, one namespaced catalog.

use std::collections::BTreeMap;

use async_trait::async_trait;
use mcp::{RemoteToolOutcome, Tool};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::model::{NAMESPACE_SEPARATOR, ToolSpec};
use crate::{Error, Result};

/// A connection to one remote capability server.
///
/// Handles are shared read-only by every call in a dispatch batch, so
/// implementations must tolerate concurrent use.
#[async_trait]
pub trait ServerHandle: Send + Sync {
    /// Query the server's live tool catalog.
    async fn list_tools(&self) -> mcp::Result<Vec<Tool>>;

    /// Call a tool by its bare name.
    async fn call_tool(
        &self,
        name: &str,
        arguments: Map<String, Value>,
    ) -> mcp::Result<RemoteToolOutcome>;

    /// Release the connection.
    async fn close(&self) {}
}

#[async_trait]
impl ServerHandle for mcp::Server {
    async fn list_tools(&self) -> mcp::Result<Vec<Tool>> {
        mcp::Server::list_tools(self).await
    }

    async fn call_tool(
        &self,
        name: &str,
        arguments: Map<String, Value>,
    ) -> mcp::Result<RemoteToolOutcome> {
        let result = mcp::Server::call_tool(self, name, arguments).await?;
        Ok(result.into_outcome())
    }

    async fn close(&self) {
        self.shutdown().await;
    }
}

/// Owns every server handle of a session and routes namespaced tool calls.
#[derive(Default)]
pub struct CapabilityRegistry {
    servers: BTreeMap<String, Box<dyn ServerHandle>>,
}

impl std::fmt::Debug for CapabilityRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapabilityRegistry")
            .field("servers", &self.servers.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handle under a unique name.
    ///
    /// Names may not contain the namespace separator, so a full tool name
    /// always splits back into exactly one server.
    pub fn register_server(
        &mut self,
        name: impl Into<String>,
        handle: impl ServerHandle + 'static,
    ) -> Result<()> {
        let name = name.into();
        if name.is_empty() || name.contains(NAMESPACE_SEPARATOR) {
            return Err(Error::InvalidServerName(name));
        }
        if self.servers.contains_key(&name) {
            return Err(Error::DuplicateServer(name));
        }

        debug!(server = %name, "registered server");
        self.servers.insert(name, Box::new(handle));
        Ok(())
    }

    /// Names of all registered servers, sorted.
    pub fn server_names(&self) -> Vec<String> {
        self.servers.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.servers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }

    /// Query one server's tools.
    pub async fn list_tools(&self, server: &str) -> Result<Vec<ToolSpec>> {
        query_specs(server, self.handle(server)?).await
    }

    /// Query every server and concatenate their tools.
    ///
    /// Servers are visited in name order, so the result is stable while the
    /// remote catalogs are. Fails as soon as one server fails.
    pub async fn list_all_tools(&self) -> Result<Vec<ToolSpec>> {
        let mut specs = Vec::new();
        for (name, handle) in &self.servers {
            specs.extend(query_specs(name, handle.as_ref()).await?);
        }
        Ok(specs)
    }

    /// Like [`list_all_tools`](Self::list_all_tools), but skips servers that
    /// fail and returns their errors alongside the partial catalog.
    pub async fn list_all_tools_lenient(&self) -> (Vec<ToolSpec>, Vec<Error>) {
        let mut specs = Vec::new();
        let mut failures = Vec::new();
        for (name, handle) in &self.servers {
            match query_specs(name, handle.as_ref()).await {
                Ok(found) => specs.extend(found),
                Err(e) => {
                    warn!(server = %name, error = %e, "skipping server in catalog");
                    failures.push(e);
                }
            }
        }
        (specs, failures)
    }

    /// Route a namespaced call (`{server}_{tool}`) to its server.
    pub async fn dispatch(
        &self,
        full_name: &str,
        arguments: Map<String, Value>,
    ) -> Result<RemoteToolOutcome> {
        let (server, bare) = split_full_name(full_name)?;
        let handle = self.handle(server)?;

        handle
            .call_tool(bare, arguments)
            .await
            .map_err(|source| Error::RemoteCall {
                tool: full_name.to_string(),
                source,
            })
    }

    /// Close every handle. Failures are the handle's concern.
    pub async fn close_all(&self) {
        for (name, handle) in &self.servers {
            handle.close().await;
            info!(server = %name, "closed server");
        }
    }

    fn handle(&self, server: &str) -> Result<&dyn ServerHandle> {
        self.servers
            .get(server)
            .map(|handle| &**handle)
            .ok_or_else(|| Error::UnknownServer {
                name: server.to_string(),
                available: self.server_names(),
            })
    }
}

/// Split `{server}_{tool}` at the first separator.
pub fn split_full_name(full_name: &str) -> Result<(&str, &str)> {
    full_name
        .split_once(NAMESPACE_SEPARATOR)
        .ok_or_else(|| Error::MalformedName(full_name.to_string()))
}

async fn query_specs(server: &str, handle: &dyn ServerHandle) -> Result<Vec<ToolSpec>> {
    let tools = handle
        .list_tools()
        .await
        .map_err(|source| Error::RemoteQuery {
            server: server.to_string(),
            source,
        })?;

    debug!(server, count = tools.len(), "listed tools");
    Ok(tools
        .into_iter()
        .map(|tool| ToolSpec::from_remote(server, tool))
        .collect())
}
