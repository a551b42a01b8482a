//! Child-process transport (newline-delimited JSON over stdin/stdout).

use std::collections::HashMap;
use std::process::Stdio;

use serde::Serialize;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::protocol::{JsonRpcNotification, JsonRpcRequest, JsonRpcResponse};
use crate::server::MAX_OUTPUT_SIZE;

/// Pipes to a running server process.
pub struct StdioTransport {
    process: Mutex<Child>,
    // One exchange at a time: a response is read on the same lock that wrote
    // its request, so concurrent callers never consume each other's replies.
    pipes: Mutex<Pipes>,
}

struct Pipes {
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
}

impl StdioTransport {
    /// Spawn the server process.
    pub fn spawn(command: &str, args: &[String], env: &HashMap<String, String>) -> Result<Self> {
        let mut cmd = Command::new(command);
        cmd.args(args)
            .envs(env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);

        let mut process = cmd.spawn()?;

        let stdin = process
            .stdin
            .take()
            .ok_or_else(|| Error::Spawn(std::io::Error::other("failed to capture stdin")))?;

        let stdout = process
            .stdout
            .take()
            .ok_or_else(|| Error::Spawn(std::io::Error::other("failed to capture stdout")))?;

        Ok(Self {
            process: Mutex::new(process),
            pipes: Mutex::new(Pipes {
                stdin,
                stdout: BufReader::new(stdout),
            }),
        })
    }

    pub async fn request(&self, request: &JsonRpcRequest) -> Result<JsonRpcResponse> {
        let mut pipes = self.pipes.lock().await;
        pipes.write_message(request).await?;

        loop {
            let message = pipes.read_message().await?;
            match JsonRpcResponse::from_message(message) {
                Some(Ok(response)) if response.id == request.id => return Ok(response),
                Some(Ok(response)) => {
                    debug!(id = ?response.id, "skipping stale response");
                }
                Some(Err(e)) => return Err(Error::InvalidResponse(e.to_string())),
                None => trace!("skipping server-initiated message"),
            }
        }
    }

    pub async fn notify(&self, notification: &JsonRpcNotification) -> Result<()> {
        self.pipes.lock().await.write_message(notification).await
    }

    pub async fn close(&self) {
        let mut process = self.process.lock().await;
        let _ = process.kill().await;
    }
}

impl Pipes {
    async fn write_message(&mut self, message: &impl Serialize) -> Result<()> {
        let json = serde_json::to_string(message)?;
        self.stdin.write_all(json.as_bytes()).await?;
        self.stdin.write_all(b"\n").await?;
        self.stdin.flush().await?;
        Ok(())
    }

    async fn read_message(&mut self) -> Result<Value> {
        loop {
            let mut line = String::new();
            let bytes_read = self.stdout.read_line(&mut line).await?;
            if bytes_read == 0 {
                return Err(Error::ServerExited);
            }

            if line.len() > MAX_OUTPUT_SIZE {
                return Err(Error::OutputTooLarge {
                    size: line.len(),
                    max: MAX_OUTPUT_SIZE,
                });
            }

            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            return serde_json::from_str(line)
                .map_err(|e| Error::InvalidResponse(format!("malformed JSON from server: {e}")));
        }
    }
}
