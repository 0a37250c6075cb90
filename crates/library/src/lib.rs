//! Reconciliation engine for an audiobook working directory.
//!
//! Given a [`Catalog`](shelf_catalog::Catalog) of purchased titles and a
//! single working directory, [`reconcile`](reconcile::reconcile) makes sure
//! every title ends up as a decrypted, canonically named output file, and
//! [`identify`](identify::identify) renames existing outputs to their
//! canonical names. Both are idempotent: running them again on a settled
//! directory changes nothing.

mod consts;
pub mod error;
pub mod identify;
mod matcher;
mod naming;
mod normalize;
pub mod reconcile;
pub mod scan;

pub use crate::matcher::{Candidate, Matcher, TagMatch, Tier, TitleIndex};
pub use crate::naming::{DEFAULT_TEMPLATE, NameGenerator, NameParts, OUTPUT_EXTENSION, PartToken, temporary_name};
pub use crate::normalize::{canonicalize, comparison_key};

use shelf_tools::ProgressFn;
use std::sync::Arc;

/// Settings shared by every operation of a run.
pub struct Context {
    pub naming: NameGenerator,
    pub matcher: Matcher,
    /// Delete sources in the alternate (voucher) format so the preferred
    /// format is acquired instead.
    pub replace_alternate_sources: bool,
    /// Receives conversion progress for display.
    pub progress: Option<Arc<ProgressFn>>,
}
impl Default for Context {
    fn default() -> Self {
        Self {
            naming: NameGenerator::default(),
            matcher: Matcher::default(),
            replace_alternate_sources: true,
            progress: None,
        }
    }
}
