use crate::Context;
use crate::error::{ErrorKind as LibraryErrorKind, Result as LibraryResult};
use crate::reconcile::entry::reconcile_entry_inner;
use crate::reconcile::outcome::{Outcome, SkipReason};
use crate::scan::FileIndex;
use async_stream::stream;
use exn::ResultExt;
use futures::Stream;
use shelf_catalog::{Catalog, CatalogEntry};
use shelf_tools::ToolHandle;
use std::collections::HashSet;

/// Progress events emitted by [`reconcile`] as it works through the catalog.
///
/// Events follow a strict ordering:
/// 1. [`Started`](Self::Started): exactly once.
/// 2. [`DiscoveryComplete`](Self::DiscoveryComplete): exactly once, with the
///    number of catalog entries.
/// 3. [`Reconciled`](Self::Reconciled): once per catalog entry, in catalog
///    order (an entry whose reconciliation errored yields an `Err` instead).
/// 4. [`Complete`](Self::Complete): exactly once.
pub enum ReconcileEvent<'a> {
    Started,
    DiscoveryComplete(u64),
    Reconciled { entry: &'a CatalogEntry, outcome: Outcome },
    Complete,
}

/// Streams [`ReconcileEvent`]s while reconciling every entry of `catalog`
/// against the working directory described by `index`.
///
/// Entries are processed strictly one after another: the collaborators are
/// heavyweight and every entry may change the directory the next one looks
/// at. An identifier seen earlier in the run is skipped with
/// [`SkipReason::AlreadyProcessed`].
///
/// Individual entry failures are surfaced as `Err` items without terminating
/// the stream.
pub fn reconcile<'a>(
    tools: &'a ToolHandle,
    ctx: &'a Context,
    catalog: &'a Catalog,
    index: FileIndex,
) -> impl Stream<Item = LibraryResult<ReconcileEvent<'a>>> + 'a {
    // `rustfmt` does not format macros that use braces. Wrap in parentheses!
    stream!({
        let mut index = index;
        yield Ok(ReconcileEvent::Started);
        // Infallible: a usize (either 32- or 64-bit) will always fit in a u64.
        yield Ok(ReconcileEvent::DiscoveryComplete(u64::try_from(catalog.len()).unwrap_or(0)));

        let mut seen = HashSet::new();
        for entry in catalog {
            if !seen.insert(entry.id.as_str()) {
                tracing::debug!(id = %entry.id, "Duplicate catalog entry");
                let outcome = Outcome::Skipped(SkipReason::AlreadyProcessed);
                yield Ok(ReconcileEvent::Reconciled { entry, outcome });
                continue;
            }
            yield reconcile_entry_inner(tools, ctx, &mut index, entry)
                .await
                .map(|outcome| ReconcileEvent::Reconciled { entry, outcome })
                .or_raise(|| LibraryErrorKind::Reconcile(entry.id.clone()));
        }

        yield Ok(ReconcileEvent::Complete);
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use shelf_tools::{FormatRequest, MockToolbox};
    use std::ops::Deref;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_event_order_and_per_entry_outcomes() {
        let temp_dir = tempfile::tempdir().unwrap();
        std::fs::write(temp_dir.path().join("A_Author_Done_B000000001.m4b"), b"x").unwrap();
        let catalog = Catalog::new([
            CatalogEntry::new("B000000001", "Done", ["A. Author"], None::<String>),
            CatalogEntry::new("B000000002", "Fresh", ["A. Author"], None::<String>),
            CatalogEntry::new("B000000003", "Unavailable", ["A. Author"], None::<String>),
            CatalogEntry::new("B000000002", "Fresh", ["A. Author"], None::<String>),
        ]);
        let tools: ToolHandle = Arc::new(
            MockToolbox::new(temp_dir.path())
                .on_acquire("B000000002", FormatRequest::Preferred, ["B000000002.aax"], true)
                .with_key("deadbeef"),
        );
        let ctx = Context::default();
        let index = FileIndex::scan(temp_dir.path()).await.unwrap();

        let events: Vec<_> = reconcile(&tools, &ctx, &catalog, index).collect().await;
        assert_eq!(events.len(), 7);
        assert!(matches!(events[0], Ok(ReconcileEvent::Started)));
        assert!(matches!(events[1], Ok(ReconcileEvent::DiscoveryComplete(4))));
        let outcomes: Vec<_> = events[2..6]
            .iter()
            .map(|e| match e {
                Ok(ReconcileEvent::Reconciled { entry, outcome }) => (entry.id.as_str(), outcome.to_string()),
                _ => panic!("expected a reconciled entry"),
            })
            .collect();
        assert_eq!(
            outcomes,
            [
                ("B000000001", "skipped: output exists (A_Author_Done_B000000001.m4b)".to_string()),
                ("B000000002", "converted: A_Author_Fresh_B000000002.m4b".to_string()),
                ("B000000003", "failed: acquire produced no file".to_string()),
                ("B000000002", "skipped: already processed".to_string()),
            ]
        );
        assert!(matches!(events[6], Ok(ReconcileEvent::Complete)));
    }

    #[tokio::test]
    async fn test_entry_errors_do_not_end_the_stream() {
        let temp_dir = tempfile::tempdir().unwrap();
        let catalog = Catalog::new([
            CatalogEntry::new("B000000001", "First", ["A. Author"], None::<String>),
            CatalogEntry::new("B000000002", "Second", ["A. Author"], None::<String>),
        ]);
        std::fs::write(temp_dir.path().join("B000000001.aax"), b"x").unwrap();
        let tools: ToolHandle = Arc::new(MockToolbox::new(temp_dir.path()).with_key("deadbeef"));
        // Names with a directory separator are rejected, failing the first
        // entry once it gets as far as converting.
        let ctx = Context { naming: "{{ authors }}/{{ title }}".parse().unwrap(), ..Context::default() };
        let index = FileIndex::scan(temp_dir.path()).await.unwrap();

        let events: Vec<_> = reconcile(&tools, &ctx, &catalog, index).collect().await;
        assert_eq!(events.len(), 5);
        let err = events[2].as_ref().err().unwrap();
        assert!(matches!(err.deref(), LibraryErrorKind::Reconcile(id) if id == "B000000001"));
        assert!(matches!(&events[3], Ok(ReconcileEvent::Reconciled { outcome: Outcome::Failed(_), .. })));
        assert!(matches!(events[4], Ok(ReconcileEvent::Complete)));
    }
}
