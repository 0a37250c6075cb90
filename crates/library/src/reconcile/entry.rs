use crate::Context;
use crate::error::{ErrorKind as LibraryErrorKind, Result as LibraryResult};
use crate::naming::temporary_name;
use crate::reconcile::error::{ErrorKind, Result};
use crate::reconcile::outcome::{FailReason, Outcome, SkipReason};
use crate::scan::{FileIndex, FileKind, companion_name, marker_name};
use exn::ResultExt;
use shelf_catalog::CatalogEntry;
use shelf_tools::{FormatRequest, ToolHandle};
use std::collections::BTreeSet;
use std::path::Path;
use tracing::instrument;

enum Part {
    Converted(String),
    AlreadyPresent(String),
    Failed,
}

/// Reconciles a single catalog entry against the working directory.
///
/// The checks run in a fixed order and the first one that settles the entry
/// wins:
///
/// 1. A decrypted output already matches: [`SkipReason::OutputExists`].
/// 2. A failure marker exists: skip with [`SkipReason::PreviouslyFailed`],
///    unless an encrypted source has since appeared, in which case the
///    marker is stale and is removed.
/// 3. Sources in the alternate (voucher) format are deleted together with
///    their companions when `ctx.replace_alternate_sources` is set.
/// 4. Without a source, one is acquired: first in the preferred format and,
///    only if that call fails, in the fallback format. New files are found by
///    diffing the directory before and after.
/// 5. The decryption key is looked up once and every part is converted on its
///    own: into a temporary sibling, then renamed into place, then the source
///    and its companion are deleted. A failed part leaves no temporary file
///    behind, marks the entry failed, and doesn't stop the other parts.
///
/// `index` must reflect the working directory and is kept current.
///
/// # Errors
/// Returns [`Exn<LibraryErrorKind::Reconcile>`](LibraryErrorKind::Reconcile)
/// when the engine's own file operations fail. Collaborator failures are
/// reported as [`Outcome::Failed`] instead.
pub async fn reconcile_entry(
    tools: &ToolHandle,
    ctx: &Context,
    index: &mut FileIndex,
    entry: &CatalogEntry,
) -> LibraryResult<Outcome> {
    reconcile_entry_inner(tools, ctx, index, entry).await.or_raise(|| LibraryErrorKind::Reconcile(entry.id.clone()))
}

#[instrument(skip_all, fields(id = %entry.id, title = %entry.title))]
pub(crate) async fn reconcile_entry_inner(
    tools: &ToolHandle,
    ctx: &Context,
    index: &mut FileIndex,
    entry: &CatalogEntry,
) -> Result<Outcome> {
    if let Some(output) = ctx.matcher.output(entry, index) {
        tracing::debug!(output = %output.name, "Output already present");
        return Ok(Outcome::Skipped(SkipReason::OutputExists(output.name.clone())));
    }

    let marker = marker_name(&entry.title);
    let mut sources = source_names(ctx, index, entry);
    if index.contains(&marker) {
        if sources.is_empty() {
            return Ok(Outcome::Skipped(SkipReason::PreviouslyFailed(marker)));
        }
        tracing::info!(marker = %marker, "Source appeared since last failure; retrying");
        index.delete(&marker).await.or_raise(|| ErrorKind::Storage)?;
    }

    if ctx.replace_alternate_sources {
        let (preferred, alternate): (Vec<_>, Vec<_>) = sources.into_iter().partition(|name| {
            index.get(name).and_then(|f| f.kind.source_format()).is_none_or(|format| format.is_preferred())
        });
        for name in &alternate {
            tracing::info!(source = %name, "Discarding source in alternate format");
            remove_source(index, name).await?;
        }
        sources = preferred;
    }

    if sources.is_empty() {
        sources = acquire(tools, ctx, index, entry).await?;
        if sources.is_empty() {
            let reason = format!("Error: Download failed or file not found for {} (ID: {})", entry.title, entry.id);
            mark_failed(index, entry, &reason).await?;
            return Ok(Outcome::Failed(FailReason::AcquireProducedNoFile));
        }
    }

    let key = match tools.activation_key().await {
        Ok(key) => key,
        Err(e) => {
            tracing::error!(error = ?e, "Could not look up the activation key");
            mark_failed(index, entry, "Error: Could not determine activation bytes.").await?;
            return Ok(Outcome::Failed(FailReason::KeyUnavailable));
        },
    };

    let mut converted = Vec::with_capacity(sources.len());
    let mut failed = 0;
    for source in &sources {
        match convert_part(tools, ctx, index, entry, &key, source).await? {
            Part::Converted(name) | Part::AlreadyPresent(name) => converted.push(name),
            Part::Failed => failed += 1,
        }
    }

    if failed == 0 {
        Ok(Outcome::Converted(converted))
    } else {
        Ok(Outcome::Failed(FailReason::ConvertFailed { converted, failed }))
    }
}

fn source_names(ctx: &Context, index: &FileIndex, entry: &CatalogEntry) -> Vec<String> {
    ctx.matcher.sources(entry, index).into_iter().map(|f| f.name.clone()).collect()
}

/// Asks the acquire collaborator for the entry and returns the names of the
/// sources it produced.
async fn acquire(tools: &ToolHandle, ctx: &Context, index: &mut FileIndex, entry: &CatalogEntry) -> Result<Vec<String>> {
    index.rescan().await.or_raise(|| ErrorKind::Scan)?;
    let before = index.names(FileKind::is_source);

    let mut new = BTreeSet::new();
    for request in [FormatRequest::Preferred, FormatRequest::Fallback] {
        tracing::info!(format = %request, "Acquiring");
        let result = tools.acquire(&entry.id, request).await;
        index.rescan().await.or_raise(|| ErrorKind::Scan)?;
        new = index.names(FileKind::is_source).difference(&before).cloned().collect();
        match result {
            Ok(()) => break,
            Err(e) => tracing::warn!(format = %request, error = ?e, new = new.len(), "Acquire reported failure"),
        }
    }
    if !new.is_empty() {
        tracing::debug!(files = ?new, "Acquired");
        return Ok(new.into_iter().collect());
    }

    // The tool may have found the file already present and left the directory
    // untouched.
    let found = source_names(ctx, index, entry);
    if !found.is_empty() {
        tracing::debug!(files = ?found, "Acquire produced nothing new; matched existing sources");
    }
    Ok(found)
}

async fn convert_part(
    tools: &ToolHandle,
    ctx: &Context,
    index: &mut FileIndex,
    entry: &CatalogEntry,
    key: &str,
    source: &str,
) -> Result<Part> {
    let final_name = ctx.naming.output_name(entry, source).or_raise(|| ErrorKind::Template)?;
    if index.contains(&final_name) {
        tracing::info!(source, output = %final_name, "Part already converted; removing redundant source");
        remove_source(index, source).await?;
        return Ok(Part::AlreadyPresent(final_name));
    }

    let temporary = temporary_name(&final_name);
    if index.delete(&temporary).await.or_raise(|| ErrorKind::Storage)? {
        tracing::debug!(file = %temporary, "Removed stale temporary output");
    }

    tracing::info!(source, output = %final_name, "Converting");
    let progress = ctx.progress.as_deref();
    match tools.convert(key, Path::new(source), Path::new(&temporary), progress).await {
        Ok(()) => {
            index.rename(&temporary, &final_name).await.or_raise(|| ErrorKind::Storage)?;
            remove_source(index, source).await?;
            Ok(Part::Converted(final_name))
        },
        Err(e) => {
            tracing::error!(source, error = ?e, "Conversion failed");
            index.delete(&temporary).await.or_raise(|| ErrorKind::Storage)?;
            mark_failed(index, entry, &format!("Error: Conversion failed for {source}")).await?;
            Ok(Part::Failed)
        },
    }
}

/// Deletes an encrypted source and its companion, if any.
async fn remove_source(index: &mut FileIndex, source: &str) -> Result<()> {
    index.delete(source).await.or_raise(|| ErrorKind::Storage)?;
    index.delete(&companion_name(source)).await.or_raise(|| ErrorKind::Storage)?;
    Ok(())
}

async fn mark_failed(index: &mut FileIndex, entry: &CatalogEntry, reason: &str) -> Result<()> {
    let marker = marker_name(&entry.title);
    tracing::warn!(marker = %marker, reason, "Marking entry as failed");
    index.write(&marker, reason).await.or_raise(|| ErrorKind::Storage)
}

#[cfg(test)]
mod tests {
    use super::*;
    use shelf_tools::{Call, MockToolbox, Toolbox};
    use std::sync::Arc;

    const ID: &str = "B012345678";
    const OUTPUT: &str = "A_Author_Series_One_The_Great_Test_B012345678.m4b";

    fn entry() -> CatalogEntry {
        CatalogEntry::new(ID, "The Great Test", ["A. Author"], Some("Series One"))
    }

    fn touch(dir: &Path, names: &[&str]) {
        for name in names {
            std::fs::write(dir.join(name), b"x").unwrap();
        }
    }

    fn listing(dir: &Path) -> Vec<String> {
        let mut names: Vec<_> =
            std::fs::read_dir(dir).unwrap().map(|e| e.unwrap().file_name().into_string().unwrap()).collect();
        names.sort();
        names
    }

    async fn run(tools: &Arc<MockToolbox>, ctx: &Context, entry: &CatalogEntry) -> Outcome {
        let handle: ToolHandle = tools.clone();
        let mut index = FileIndex::scan(tools.workdir()).await.unwrap();
        reconcile_entry(&handle, ctx, &mut index, entry).await.unwrap()
    }

    #[tokio::test]
    async fn test_acquires_converts_and_cleans_up() {
        let temp_dir = tempfile::tempdir().unwrap();
        let tools = Arc::new(
            MockToolbox::new(temp_dir.path())
                .on_acquire(ID, FormatRequest::Preferred, ["B012345678.aax"], true)
                .with_key("deadbeef"),
        );
        let ctx = Context::default();

        let outcome = run(&tools, &ctx, &entry()).await;
        assert_eq!(outcome, Outcome::Converted(vec![OUTPUT.to_string()]));
        assert_eq!(listing(temp_dir.path()), [OUTPUT]);
        assert_eq!(
            tools.calls(),
            [
                Call::Acquire { id: ID.into(), request: FormatRequest::Preferred },
                Call::ActivationKey,
                Call::Convert { source: "B012345678.aax".into(), dest: OUTPUT.replace(".m4b", "_tmp.m4b").into() },
            ]
        );

        // Running again is a no-op.
        let outcome = run(&tools, &ctx, &entry()).await;
        assert_eq!(outcome, Outcome::Skipped(SkipReason::OutputExists(OUTPUT.to_string())));
        assert_eq!(tools.calls().len(), 3);
        assert_eq!(listing(temp_dir.path()), [OUTPUT]);
    }

    #[tokio::test]
    async fn test_fallback_only_after_preferred_fails() {
        let temp_dir = tempfile::tempdir().unwrap();
        let tools = Arc::new(
            MockToolbox::new(temp_dir.path())
                .on_acquire(ID, FormatRequest::Fallback, ["B012345678-AAXC.aaxc", "B012345678-AAXC.voucher"], true)
                .with_key("deadbeef"),
        );
        let outcome = run(&tools, &Context::default(), &entry()).await;
        assert_eq!(outcome, Outcome::Converted(vec![OUTPUT.to_string()]));
        // The companion goes with its source.
        assert_eq!(listing(temp_dir.path()), [OUTPUT]);
        assert_eq!(tools.calls()[1], Call::Acquire { id: ID.into(), request: FormatRequest::Fallback });
    }

    #[tokio::test]
    async fn test_acquire_failure_writes_marker_then_skips() {
        let temp_dir = tempfile::tempdir().unwrap();
        let tools = Arc::new(MockToolbox::new(temp_dir.path()).with_key("deadbeef"));
        let ctx = Context::default();

        let outcome = run(&tools, &ctx, &entry()).await;
        assert_eq!(outcome, Outcome::Failed(FailReason::AcquireProducedNoFile));
        let marker = temp_dir.path().join("err_The_Great_Test.notdownloadable");
        let reason = std::fs::read_to_string(&marker).unwrap();
        assert!(reason.contains("B012345678"));
        assert!(!tools.calls().contains(&Call::ActivationKey));

        let calls = tools.calls().len();
        let outcome = run(&tools, &ctx, &entry()).await;
        assert_eq!(
            outcome,
            Outcome::Skipped(SkipReason::PreviouslyFailed("err_The_Great_Test.notdownloadable".to_string()))
        );
        assert_eq!(tools.calls().len(), calls);
    }

    #[tokio::test]
    async fn test_stale_marker_is_removed_when_source_appears() {
        let temp_dir = tempfile::tempdir().unwrap();
        touch(temp_dir.path(), &["err_The_Great_Test.notdownloadable", "B012345678.aax"]);
        let tools = Arc::new(MockToolbox::new(temp_dir.path()).with_key("deadbeef"));

        let outcome = run(&tools, &Context::default(), &entry()).await;
        assert_eq!(outcome, Outcome::Converted(vec![OUTPUT.to_string()]));
        assert_eq!(listing(temp_dir.path()), [OUTPUT]);
        assert!(!tools.calls().iter().any(|c| matches!(c, Call::Acquire { .. })));
    }

    #[tokio::test]
    async fn test_stale_marker_is_removed_when_source_matches_by_title() {
        let temp_dir = tempfile::tempdir().unwrap();
        touch(temp_dir.path(), &["err_The_Great_Test.notdownloadable", "The_Great_Test-AAX_44_128.aax"]);
        let tools = Arc::new(MockToolbox::new(temp_dir.path()).with_key("deadbeef"));

        let outcome = run(&tools, &Context::default(), &entry()).await;
        assert_eq!(outcome, Outcome::Converted(vec![OUTPUT.to_string()]));
        assert_eq!(listing(temp_dir.path()), [OUTPUT]);
        assert!(!tools.calls().iter().any(|c| matches!(c, Call::Acquire { .. })));
    }

    #[tokio::test]
    async fn test_alternate_format_is_replaced() {
        let temp_dir = tempfile::tempdir().unwrap();
        touch(temp_dir.path(), &["B012345678-AAXC.aaxc", "B012345678-AAXC.voucher"]);
        let tools = Arc::new(
            MockToolbox::new(temp_dir.path())
                .on_acquire(ID, FormatRequest::Preferred, ["B012345678.aax"], true)
                .with_key("deadbeef"),
        );

        let outcome = run(&tools, &Context::default(), &entry()).await;
        assert_eq!(outcome, Outcome::Converted(vec![OUTPUT.to_string()]));
        assert_eq!(tools.calls()[0], Call::Acquire { id: ID.into(), request: FormatRequest::Preferred });
        assert_eq!(listing(temp_dir.path()), [OUTPUT]);
    }

    #[tokio::test]
    async fn test_alternate_format_is_kept_when_disabled() {
        let temp_dir = tempfile::tempdir().unwrap();
        touch(temp_dir.path(), &["B012345678-AAXC.aaxc", "B012345678-AAXC.voucher"]);
        let tools = Arc::new(MockToolbox::new(temp_dir.path()).with_key("deadbeef"));
        let ctx = Context { replace_alternate_sources: false, ..Context::default() };

        let outcome = run(&tools, &ctx, &entry()).await;
        assert_eq!(outcome, Outcome::Converted(vec![OUTPUT.to_string()]));
        assert!(!tools.calls().iter().any(|c| matches!(c, Call::Acquire { .. })));
    }

    #[tokio::test]
    async fn test_missing_key_marks_failure_and_keeps_source() {
        let temp_dir = tempfile::tempdir().unwrap();
        touch(temp_dir.path(), &["B012345678.aax"]);
        let tools = Arc::new(MockToolbox::new(temp_dir.path()));

        let outcome = run(&tools, &Context::default(), &entry()).await;
        assert_eq!(outcome, Outcome::Failed(FailReason::KeyUnavailable));
        assert_eq!(listing(temp_dir.path()), ["B012345678.aax", "err_The_Great_Test.notdownloadable"]);
    }

    #[tokio::test]
    async fn test_parts_are_converted_independently() {
        let temp_dir = tempfile::tempdir().unwrap();
        touch(temp_dir.path(), &["B012345678-Part_1.aax", "B012345678-Part_2.aax"]);
        let tools = Arc::new(MockToolbox::new(temp_dir.path()).with_key("deadbeef").fail_convert("B012345678-Part_2.aax"));

        let outcome = run(&tools, &Context::default(), &entry()).await;
        let part_one = "A_Author_Series_One_The_Great_Test_B012345678_Part_1.m4b".to_string();
        assert_eq!(outcome, Outcome::Failed(FailReason::ConvertFailed { converted: vec![part_one.clone()], failed: 1 }));
        assert_eq!(
            listing(temp_dir.path()),
            [part_one.as_str(), "B012345678-Part_2.aax", "err_The_Great_Test.notdownloadable"]
        );
    }

    #[tokio::test]
    async fn test_stale_temporary_is_replaced() {
        let temp_dir = tempfile::tempdir().unwrap();
        let temporary = OUTPUT.replace(".m4b", "_tmp.m4b");
        touch(temp_dir.path(), &["B012345678.aax", temporary.as_str()]);
        let tools = Arc::new(MockToolbox::new(temp_dir.path()).with_key("deadbeef"));

        let outcome = run(&tools, &Context::default(), &entry()).await;
        assert_eq!(outcome, Outcome::Converted(vec![OUTPUT.to_string()]));
        assert_eq!(std::fs::read(temp_dir.path().join(OUTPUT)).unwrap(), b"decrypted");
        assert_eq!(listing(temp_dir.path()), [OUTPUT]);
    }

    #[tokio::test]
    async fn test_successful_acquire_without_files_fails() {
        let temp_dir = tempfile::tempdir().unwrap();
        let tools = Arc::new(
            MockToolbox::new(temp_dir.path())
                .on_acquire(ID, FormatRequest::Preferred, Vec::<String>::new(), true)
                .with_key("deadbeef"),
        );
        let outcome = run(&tools, &Context::default(), &entry()).await;
        assert_eq!(outcome, Outcome::Failed(FailReason::AcquireProducedNoFile));
        // A successful preferred call never triggers the fallback.
        assert_eq!(tools.calls().len(), 1);
    }
}
