//! Almanac runtime: sessions, the capability registry, and model backends.
//!
//! # Overview
//!
//! - **CapabilityRegistry**: owns one [`ServerHandle`] per remote server and
//!   exposes their tools under namespaced names (`{server}_{tool}`).
//! - **ToolInvoker** / [`execute_batch`]: run the model's tool requests
//!   concurrently, turning every failure into a result the model can read.
//! - **Session**: drives a user turn through repeated model and tool rounds,
//!   bounded by an iteration limit.
//! - **Backend**: a trait abstracting LLM providers (OpenAI, etc.).
//!
//! # Example
//!
//! ```ignore
//! use mcp::{Server, ServerConfig, TransportConfig};
//! use runtime::{CapabilityRegistry, OpenAiBackend, Session};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let transport = TransportConfig::Http {
//!     url: "http://localhost:3000/mcp".into(),
//!     headers: Default::default(),
//! };
//! let weather = Server::connect(ServerConfig::new("weather", transport)).await?;
//! weather.initialize().await?;
//!
//! let mut registry = CapabilityRegistry::new();
//! registry.register_server("weather", weather)?;
//!
//! let backend = OpenAiBackend::builder("sk-...", "gpt-4o").build();
//! let mut session = Session::new(registry, backend);
//! let outcome = session.chat("What's the weather in Paris?").await?;
//! println!("{}", outcome.text());
//! session.end().await;
//! # Ok(())
//! # }
//! ```

mod dispatch;
mod error;
mod history;
mod invoker;
pub mod model;
mod providers;
mod registry;
mod session;

pub use dispatch::execute_batch;
pub use error::{Error, Result};
pub use history::History;
pub use invoker::ToolInvoker;
pub use model::{
    Backend, Message, ModelError, ModelRequest, ModelResponse, Role, ToolCallRequest,
    ToolCallResult, ToolOutcome, ToolSpec,
};
pub use providers::{DEFAULT_BASE_URL, DEFAULT_MODEL, OpenAiBackend, OpenAiBackendBuilder};
pub use registry::{CapabilityRegistry, ServerHandle, split_full_name};
pub use session::{
    DEFAULT_HISTORY_WINDOW, DEFAULT_MAX_ITERATIONS, DEFAULT_SYSTEM_PROMPT, FALLBACK_REPLY,
    Session, SessionConfig, SessionId, State, TurnOutcome,
};
