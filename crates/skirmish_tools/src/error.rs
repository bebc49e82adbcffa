//! Error type for the tools.

use skirmish_core::error::GameError;
use thiserror::Error;

/// Tool result alias.
pub type ToolResult<T> = std::result::Result<T, ToolError>;

/// Anything that can stop a tool invocation.
#[derive(Debug, Error)]
pub enum ToolError {
    /// The core refused to load or run something.
    #[error(transparent)]
    Game(#[from] GameError),

    /// Rules or scenarios failed validation.
    #[error("{count} validation problem(s) found")]
    Invalid {
        /// Number of problems.
        count: usize,
    },

    /// The summary could not be rendered.
    #[error("JSON output failed: {0}")]
    Json(#[from] serde_json::Error),

    /// Filesystem access failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
