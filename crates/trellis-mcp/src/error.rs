//! Error types for the trellis MCP server.

use thiserror::Error;

/// Errors that can occur while serving a tool invocation.
///
/// Every variant renders to a diagnostic sentence suitable for the tool
/// result's text block; none carry credentials.
#[derive(Debug, Error)]
pub enum Error {
    /// Arguments failed validation before any remote call was made.
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    /// The requested tool is not in the registry.
    #[error("tool not found: {0}")]
    UnknownTool(String),

    /// A classified failure from the relation backend.
    #[error(transparent)]
    Store(#[from] trellis_github::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for tool operations.
pub type Result<T> = std::result::Result<T, Error>;
