//! Error types for the [`identify`](super) module.

use derive_more::{Display, Error};

/// An identify error with automatic location tracking via [`exn::Exn`].
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for identify operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// Renaming the file failed.
    Storage,
    /// The [`NameGenerator`](crate::NameGenerator) could not render a name.
    Template,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Storage)
    }
}
