//! Streamable HTTP transport.
//!
//! Every message is POSTed to the endpoint. The server answers either with a
//! plain JSON body or with an event stream whose `data:` fields carry
//! JSON-RPC messages.

use std::collections::HashMap;

use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::{Error, Result};
use crate::protocol::{JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, RequestId};
use crate::server::MAX_OUTPUT_SIZE;

const SESSION_HEADER: &str = "Mcp-Session-Id";
const ACCEPT_BOTH: &str = "application/json, text/event-stream";

pub struct HttpTransport {
    client: reqwest::Client,
    url: String,
    headers: HashMap<String, String>,
    session_id: RwLock<Option<String>>,
}

impl HttpTransport {
    pub fn new(url: String, headers: HashMap<String, String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url,
            headers,
            session_id: RwLock::new(None),
        }
    }

    pub async fn request(&self, request: &JsonRpcRequest) -> Result<JsonRpcResponse> {
        let response = self.post(request).await?;

        if let Some(id) = response
            .headers()
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
        {
            let mut session_id = self.session_id.write().await;
            if session_id.as_deref() != Some(id) {
                debug!(url = %self.url, "server assigned session id");
                *session_id = Some(id.to_string());
            }
        }

        let is_event_stream = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("text/event-stream"));

        let body = response.text().await?;
        if body.len() > MAX_OUTPUT_SIZE {
            return Err(Error::OutputTooLarge {
                size: body.len(),
                max: MAX_OUTPUT_SIZE,
            });
        }

        if is_event_stream {
            parse_event_stream(&body, &request.id)
        } else {
            parse_json_body(&body, &request.id)
        }
    }

    pub async fn notify(&self, notification: &JsonRpcNotification) -> Result<()> {
        self.post(notification).await?;
        Ok(())
    }

    /// Terminate the server-side session, if one was assigned.
    pub async fn close(&self) {
        let Some(id) = self.session_id.write().await.take() else {
            return;
        };
        let mut req = self.client.delete(&self.url).header(SESSION_HEADER, id);
        for (name, value) in &self.headers {
            req = req.header(name, value);
        }
        if let Err(e) = req.send().await {
            debug!(url = %self.url, error = %e, "failed to close HTTP session");
        }
    }

    async fn post(&self, body: &impl Serialize) -> Result<reqwest::Response> {
        let mut req = self
            .client
            .post(&self.url)
            .header(ACCEPT, ACCEPT_BOTH)
            .json(body);

        for (name, value) in &self.headers {
            req = req.header(name, value);
        }
        if let Some(id) = self.session_id.read().await.as_deref() {
            req = req.header(SESSION_HEADER, id);
        }

        let response = req.send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Http(format!("{status}: {body}")));
        }
        Ok(response)
    }
}

fn parse_json_body(body: &str, id: &RequestId) -> Result<JsonRpcResponse> {
    let message: Value = serde_json::from_str(body)
        .map_err(|e| Error::InvalidResponse(format!("malformed JSON body: {e}")))?;

    // A server may batch notifications with the response.
    let candidates = match message {
        Value::Array(items) => items,
        other => vec![other],
    };
    find_response(candidates, id)
        .ok_or_else(|| Error::InvalidResponse(format!("no response for request {id:?}")))?
}

/// Pick the response matching `id` out of an SSE body.
fn parse_event_stream(body: &str, id: &RequestId) -> Result<JsonRpcResponse> {
    let mut events = Vec::new();
    let mut data = String::new();

    for line in body.lines() {
        if line.is_empty() {
            if !data.is_empty() {
                events.push(std::mem::take(&mut data));
            }
            continue;
        }
        if let Some(rest) = line.strip_prefix("data:") {
            if !data.is_empty() {
                data.push('\n');
            }
            data.push_str(rest.strip_prefix(' ').unwrap_or(rest));
        }
    }
    if !data.is_empty() {
        events.push(data);
    }

    let messages = events
        .iter()
        .filter_map(|event| serde_json::from_str::<Value>(event).ok())
        .collect();

    find_response(messages, id)
        .ok_or_else(|| Error::InvalidResponse(format!("no response for request {id:?} in event stream")))?
}

fn find_response(messages: Vec<Value>, id: &RequestId) -> Option<Result<JsonRpcResponse>> {
    messages.into_iter().find_map(|message| {
        match JsonRpcResponse::from_message(message)? {
            Ok(response) if &response.id == id => Some(Ok(response)),
            Ok(_) => None,
            Err(e) => Some(Err(Error::InvalidResponse(e.to_string()))),
        }
    })
}
