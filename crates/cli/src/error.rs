//! CLI error types.

use thiserror::Error;

use crate::config::ConfigError;

/// Errors that stop the CLI before or outside a chat turn.
///
/// Server connection failures and turn failures are reported inline and never
/// reach this type.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Configuration is invalid or missing required fields.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The API key environment variable is not set.
    #[error("{var} is not set. Export it or add it to a .env file")]
    MissingApiKey { var: String },

    /// An I/O error occurred.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
