//! Tool Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};

/// A collaborator error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for collaborator operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// The executable couldn't be found (install it or configure its path).
    #[display("`{_0}` not detected on your system")]
    ToolNotFound(#[error(not(source))] &'static str),
    /// The tool ran and exited unsuccessfully.
    /// A missing exit code means the process was killed by a signal.
    #[display("`{tool}` exited with code: {}", code.map_or_else(|| "none".to_string(), |c| c.to_string()))]
    ToolFailed {
        tool: &'static str,
        code: Option<i32>,
    },
    /// The key lookup ran but its output contained no usable key.
    #[display("no activation key in key lookup output")]
    KeyUnavailable,
    /// Spawning or talking to the child process failed.
    Io,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ToolFailed { .. } | Self::Io)
    }
}
