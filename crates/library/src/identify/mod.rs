//! Identification and renaming of existing decrypted outputs.
//!
//! Outputs produced elsewhere (or by older versions of the naming template)
//! are matched back to catalog entries and renamed to their canonical name.
//! A file is identified by, in order:
//!
//! 1. a catalog id contained in its name;
//! 2. its embedded tags ([`Matcher::match_tags`](crate::Matcher::match_tags));
//! 3. a [`Chooser`] picking among fuzzily ranked titles, when one is given;
//! 4. its tags alone, when [`IdentifyOptions::fallback_to_tags`] is set.
//!
//! Files that stay unidentified are left untouched.

pub mod error;
mod file;
mod stream;

pub use self::file::{IdentifyAction, IdentifyOptions, Method, Unidentified, identify_file};
pub use self::stream::{IdentifyEvent, identify};

use crate::Candidate;
use shelf_tools::Tags;

/// Asks someone to pick the right catalog entry for a file.
pub trait Chooser {
    /// Returns the index of the chosen candidate, or `None` to leave the
    /// file alone. `candidates` is never empty and is ordered best first.
    fn choose(&mut self, file: &str, tags: &Tags, candidates: &[Candidate<'_>]) -> Option<usize>;
}
