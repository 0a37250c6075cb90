//! Working directory classification and indexing.
//!
//! The engine works on a single flat directory. Every file it cares about is
//! classified by name into a [`FileKind`]; anything else is invisible to it.

pub mod error;
mod index;
mod kind;

pub use self::index::{FileIndex, WorkingFile};
pub use self::kind::{FileKind, SourceFormat, companion_name, marker_name};
