use thiserror::Error;

/// Failures talking to a chat-completions endpoint.
///
/// Any of these aborts the current turn; the session stays usable.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ModelError {
    /// The request never got an HTTP response.
    #[error("network: {0}")]
    Network(String),

    /// The endpoint answered with a non-success status.
    #[error("provider api: {0}")]
    Api(String),

    /// The body was not a usable chat completion.
    #[error("invalid provider response: {0}")]
    InvalidResponse(String),

    /// The model asked for a tool with an argument string that is not a
    /// JSON object.
    #[error("invalid arguments for tool {tool}: {reason}")]
    InvalidToolArguments { tool: String, reason: String },
}
