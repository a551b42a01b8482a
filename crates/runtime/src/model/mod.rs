//! Conversation types and the model backend trait.

pub mod errors;
pub mod types;

pub use errors::ModelError;
pub use types::{
    Backend, Message, ModelRequest, ModelResponse, NAMESPACE_SEPARATOR, Role, ToolCallRequest,
    ToolCallResult, ToolOutcome, ToolSpec,
};
