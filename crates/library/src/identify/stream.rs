use crate::Context;
use crate::error::{ErrorKind as LibraryErrorKind, Result as LibraryResult};
use crate::identify::Chooser;
use crate::identify::file::{IdentifyAction, IdentifyOptions, identify_file_inner};
use crate::matcher::TitleIndex;
use crate::scan::{FileIndex, FileKind};
use async_stream::stream;
use exn::ResultExt;
use futures::Stream;
use shelf_catalog::Catalog;
use shelf_tools::ToolHandle;

/// Progress events emitted by [`identify`], in the same order as
/// [`ReconcileEvent`](crate::reconcile::ReconcileEvent)s.
pub enum IdentifyEvent {
    Started,
    /// The number of decrypted outputs about to be looked at.
    DiscoveryComplete(u64),
    Identified(IdentifyAction),
    Complete,
}

/// Streams [`IdentifyEvent`]s while identifying and renaming every decrypted
/// output in the working directory, one at a time in name order.
///
/// Individual file failures are surfaced as `Err` items without terminating
/// the stream.
pub fn identify<'a>(
    tools: &'a ToolHandle,
    ctx: &'a Context,
    catalog: &'a Catalog,
    index: FileIndex,
    options: IdentifyOptions,
    mut chooser: Option<&'a mut dyn Chooser>,
) -> impl Stream<Item = LibraryResult<IdentifyEvent>> + 'a {
    stream!({
        let mut index = index;
        yield Ok(IdentifyEvent::Started);

        let titles = TitleIndex::new(catalog);
        let names: Vec<String> = index.names(FileKind::is_output).into_iter().collect();
        // Infallible: a usize (either 32- or 64-bit) will always fit in a u64.
        yield Ok(IdentifyEvent::DiscoveryComplete(u64::try_from(names.len()).unwrap_or(0)));

        for name in names {
            // An earlier rename may have overwritten this file.
            if !index.contains(&name) {
                continue;
            }
            let chooser = chooser.as_deref_mut().map(|c| c as &mut dyn Chooser);
            yield identify_file_inner(tools, ctx, catalog, &titles, &mut index, &name, options, chooser)
                .await
                .map(IdentifyEvent::Identified)
                .or_raise(|| LibraryErrorKind::Identify(name.clone()));
        }

        yield Ok(IdentifyEvent::Complete);
    })
}
