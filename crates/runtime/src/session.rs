//! Session management: the per-turn tool loop.

use serde::{Deserialize, Serialize};
use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;

use crate::dispatch::execute_batch;
use crate::history::History;
use crate::invoker::ToolInvoker;
use crate::model::{Backend, Message, ModelRequest, ModelResponse, ToolSpec};
use crate::registry::CapabilityRegistry;
use crate::{Error, Result};

pub const DEFAULT_MAX_ITERATIONS: usize = 10;
pub const DEFAULT_HISTORY_WINDOW: usize = 10;
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant that can check the weather \
    and manage a Notion workspace. Use the available tools when they help answer the user.";

/// Reply used when a turn hits the iteration limit.
pub const FALLBACK_REPLY: &str =
    "I've completed the requested operations. Is there anything else I can help you with?";

/// A unique identifier for a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Tunables for a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub system_prompt: String,
    /// Tool batches allowed per user turn.
    pub max_iterations: usize,
    /// Messages submitted to the model per request.
    pub history_window: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            max_iterations: DEFAULT_MAX_ITERATIONS,
            history_window: DEFAULT_HISTORY_WINDOW,
        }
    }
}

/// Where the session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    AwaitingUserInput,
    /// A request is with the model and no tools have run this turn.
    TurnSubmitted,
    /// `k` tool batches have run this turn.
    ToolsPending(usize),
    Terminated,
}

/// How a user turn ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    /// The model produced a final reply.
    Answer(String),
    /// The model kept requesting tools past the iteration limit.
    IterationLimitReached,
}

impl TurnOutcome {
    /// Text to show the user.
    pub fn text(&self) -> &str {
        match self {
            Self::Answer(text) => text,
            Self::IterationLimitReached => FALLBACK_REPLY,
        }
    }
}

/// A conversation session.
pub struct Session<B> {
    pub id: SessionId,
    registry: CapabilityRegistry,
    backend: B,
    config: SessionConfig,
    history: History,
    state: State,
}

impl<B: Backend> Session<B> {
    /// Create a session over the given servers and model backend.
    pub fn new(registry: CapabilityRegistry, backend: B) -> Self {
        Self {
            id: SessionId::new(),
            registry,
            backend,
            config: SessionConfig::default(),
            history: History::new(),
            state: State::AwaitingUserInput,
        }
    }

    pub fn with_config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the system prompt.
    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.config.system_prompt = system.into();
        self
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Every message so far, including tool traffic.
    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn registry(&self) -> &CapabilityRegistry {
        &self.registry
    }

    /// Send a user message and run the tool loop until the model answers.
    ///
    /// On error the turn is abandoned but the session stays usable.
    pub async fn chat(&mut self, user_input: &str) -> Result<TurnOutcome> {
        if self.state == State::Terminated {
            return Err(Error::InvalidState("session has ended".into()));
        }

        let span = info_span!("turn", session = %self.id);
        let outcome = self.run_turn(user_input).instrument(span).await;
        self.state = State::AwaitingUserInput;
        outcome
    }

    /// End the session and close every server.
    pub async fn end(&mut self) {
        if self.state == State::Terminated {
            return;
        }
        self.registry.close_all().await;
        self.state = State::Terminated;
        info!(session = %self.id, messages = self.history.len(), "session ended");
    }

    async fn run_turn(&mut self, user_input: &str) -> Result<TurnOutcome> {
        self.history.push(Message::user(user_input));

        // One catalog per user turn.
        let tools = self.registry.list_all_tools().await?;
        debug!(tools = tools.len(), "catalog ready");
        self.state = State::TurnSubmitted;

        loop {
            let response = self.submit(&tools).await?;
            if response.is_final() {
                self.history.push(Message::assistant(response.content.clone()));
                return Ok(TurnOutcome::Answer(response.content));
            }

            let executed = match self.state {
                State::ToolsPending(k) => k,
                _ => 0,
            };
            if executed >= self.config.max_iterations {
                warn!(
                    iteration = executed,
                    discarded = response.tool_calls.len(),
                    "iteration limit reached"
                );
                return Ok(TurnOutcome::IterationLimitReached);
            }

            let ModelResponse {
                content,
                tool_calls,
            } = response;
            self.history
                .push(Message::assistant_with_tools(content, tool_calls.clone()));

            debug!(iteration = executed + 1, calls = tool_calls.len(), "executing tools");
            let results = execute_batch(&ToolInvoker::new(&self.registry), tool_calls).await;
            self.history.extend(results.into_iter().map(Message::tool));
            self.state = State::ToolsPending(executed + 1);
        }
    }

    async fn submit(&self, tools: &[ToolSpec]) -> Result<ModelResponse> {
        let request = ModelRequest {
            system: &self.config.system_prompt,
            messages: self.history.window(self.config.history_window),
            tools,
        };
        Ok(self.backend.call(request).await?)
    }
}
