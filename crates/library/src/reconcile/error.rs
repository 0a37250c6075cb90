//! Error types for the [`reconcile`](super) module.
//!
//! Expected failures of the external collaborators (no file downloaded, no
//! key, conversion failed) are not errors: they become a failure marker and
//! an [`Outcome::Failed`](super::Outcome::Failed). What's left here is the
//! engine being unable to do its own bookkeeping.

use derive_more::{Display, Error};

/// A reconcile error with automatic location tracking via [`exn::Exn`].
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for reconcile operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// Re-indexing the working directory after an acquire failed.
    Scan,
    /// Deleting, renaming or writing a file in the working directory failed.
    Storage,
    /// The [`NameGenerator`](crate::NameGenerator) could not render a name.
    Template,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Scan | Self::Storage)
    }
}
