//! Library Error Types
//!
//! Each phase (scanning, reconciling, identifying) has its own `ErrorKind`
//! describing what failed inside it; the kinds here say which catalog entry or
//! file the failure belongs to, so one bad item never hides the rest.

use derive_more::{Display, Error};

/// A library error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for library operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    #[display("issue with file name generation from template")]
    Template,
    #[display("could not index the working directory")]
    Scan,
    /// Reconciling the catalog entry with this identifier failed part-way.
    #[display("could not reconcile `{_0}`")]
    Reconcile(#[error(not(source))] String),
    /// Identifying or renaming this file failed part-way.
    #[display("could not identify `{_0}`")]
    Identify(#[error(not(source))] String),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Scan | Self::Reconcile(_) | Self::Identify(_))
    }
}
