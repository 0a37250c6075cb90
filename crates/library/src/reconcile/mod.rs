//! Catalog-to-directory reconciliation.
//!
//! For every [`CatalogEntry`](shelf_catalog::CatalogEntry) the engine drives
//! the working directory towards "a decrypted output exists for every part",
//! delegating the actual downloading and decrypting to a
//! [`Toolbox`](shelf_tools::Toolbox). Per entry it walks a fixed sequence of
//! checks (see [`reconcile_entry`]); a failure on one entry records a failure
//! marker and moves on to the next.
//!
//! The primary entry point is [`reconcile`], which streams a
//! [`ReconcileEvent`] per catalog entry in catalog order.

mod entry;
pub mod error;
mod outcome;
mod stream;

pub use self::entry::reconcile_entry;
pub use self::outcome::{FailReason, Outcome, SkipReason};
pub use self::stream::{ReconcileEvent, reconcile};
