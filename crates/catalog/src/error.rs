//! Catalog Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};
use std::path::PathBuf;

/// A catalog error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for catalog operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
/// Every variant is a startup error: without a catalog there is nothing to
/// reconcile.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// The catalog snapshot does not exist; export it first.
    #[display("catalog not found: {}", _0.display())]
    NotFound(#[error(not(source))] PathBuf),
    /// The catalog snapshot exists but could not be read.
    #[display("could not read catalog: {}", _0.display())]
    Unreadable(#[error(not(source))] PathBuf),
    /// The catalog snapshot is not a JSON array of entries.
    #[display("malformed catalog: {}", _0.display())]
    Malformed(#[error(not(source))] PathBuf),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        // The file is either there and valid or it isn't; re-reading the
        // same snapshot won't change that.
        false
    }
}
