use crate::Context;
use crate::error::{ErrorKind as LibraryErrorKind, Result as LibraryResult};
use crate::identify::Chooser;
use crate::identify::error::{ErrorKind, Result};
use crate::matcher::{TagMatch, TitleIndex};
use crate::naming::{NameParts, PartToken};
use crate::normalize::comparison_key;
use crate::scan::FileIndex;
use derive_more::Display;
use exn::ResultExt;
use shelf_catalog::Catalog;
use shelf_tools::{Tags, ToolHandle};
use std::path::Path;
use tracing::instrument;

#[derive(Debug, Clone, Copy, Default)]
pub struct IdentifyOptions {
    /// Name files that match no catalog entry from their tags alone (without
    /// an identifier) instead of leaving them untouched.
    pub fallback_to_tags: bool,
}

/// How a file was identified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Method {
    #[display("identifier in name")]
    Identifier,
    #[display("embedded tags")]
    Tags,
    #[display("chosen")]
    Chosen,
    #[display("tags only")]
    TagsOnly,
}

/// Why a file was left untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Unidentified {
    #[display("no title tag")]
    NoTitle,
    #[display("no catalog match")]
    NoMatch,
    #[display("several catalog entries share the title")]
    Ambiguous,
    #[display("skipped")]
    Skipped,
}

/// The outcome of (successfully) identifying a single file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentifyAction {
    /// The file was renamed. `replaced` is set when a file already held the
    /// target name and was overwritten.
    Renamed { from: String, to: String, method: Method, replaced: bool },
    /// The file already carries its canonical name.
    AlreadyCorrect(String),
    Unidentified { file: String, reason: Unidentified },
}

/// Identifies a single decrypted output and renames it to its canonical name.
///
/// The part suffix (`_Part_N`) is carried over from the current file name.
/// When the target name is taken, the existing file is overwritten with a
/// warning.
///
/// # Errors
/// Returns [`Exn<LibraryErrorKind::Identify>`](LibraryErrorKind::Identify)
/// when the name can't be rendered or the rename fails.
#[allow(clippy::too_many_arguments)]
pub async fn identify_file(
    tools: &ToolHandle,
    ctx: &Context,
    catalog: &Catalog,
    titles: &TitleIndex<'_>,
    index: &mut FileIndex,
    name: &str,
    options: IdentifyOptions,
    chooser: Option<&mut dyn Chooser>,
) -> LibraryResult<IdentifyAction> {
    identify_file_inner(tools, ctx, catalog, titles, index, name, options, chooser)
        .await
        .or_raise(|| LibraryErrorKind::Identify(name.to_string()))
}

#[allow(clippy::too_many_arguments)]
#[instrument(skip_all, fields(file = name))]
pub(crate) async fn identify_file_inner(
    tools: &ToolHandle,
    ctx: &Context,
    catalog: &Catalog,
    titles: &TitleIndex<'_>,
    index: &mut FileIndex,
    name: &str,
    options: IdentifyOptions,
    chooser: Option<&mut dyn Chooser>,
) -> Result<IdentifyAction> {
    let (parts, method) = match ctx.matcher.entry_by_identifier(name, catalog) {
        Some(entry) => (NameParts::from(entry), Method::Identifier),
        None => {
            let tags = tools.probe(Path::new(name)).await;
            match from_tags(ctx, catalog, titles, name, &tags, options, chooser) {
                Ok(found) => found,
                Err(reason) => {
                    tracing::info!(%reason, "Could not identify file");
                    return Ok(IdentifyAction::Unidentified { file: name.to_string(), reason });
                },
            }
        },
    };

    let target = ctx.naming.file_name(&parts, PartToken::find(name).as_ref()).or_raise(|| ErrorKind::Template)?;
    if target == name {
        return Ok(IdentifyAction::AlreadyCorrect(target));
    }
    let replaced = index.contains(&target);
    if replaced {
        tracing::warn!(target = %target, "Target name already exists; overwriting");
    }
    index.rename(name, &target).await.or_raise(|| ErrorKind::Storage)?;
    tracing::info!(%method, to = %target, "Renamed");
    Ok(IdentifyAction::Renamed { from: name.to_string(), to: target, method, replaced })
}

fn from_tags(
    ctx: &Context,
    catalog: &Catalog,
    titles: &TitleIndex<'_>,
    name: &str,
    tags: &Tags,
    options: IdentifyOptions,
    chooser: Option<&mut dyn Chooser>,
) -> std::result::Result<(NameParts, Method), Unidentified> {
    let reason = match ctx.matcher.match_tags(titles, tags, name) {
        TagMatch::Identified(entry) => return Ok((NameParts::from(entry), Method::Tags)),
        TagMatch::Ambiguous(_) => Unidentified::Ambiguous,
        TagMatch::NoMatch => Unidentified::NoMatch,
        TagMatch::NoTitle => Unidentified::NoTitle,
    };

    if let Some(chooser) = chooser {
        let query = match tags.title() {
            Some(title) => title.to_string(),
            None => name.rsplit_once('.').map_or(name, |(stem, _)| stem).replace('_', " "),
        };
        let candidates = ctx.matcher.rank(&query, catalog);
        if !candidates.is_empty() {
            return match chooser.choose(name, tags, &candidates).and_then(|i| candidates.get(i)) {
                Some(candidate) => Ok((NameParts::from(candidate.entry), Method::Chosen)),
                None => Err(Unidentified::Skipped),
            };
        }
    }

    if options.fallback_to_tags
        && let Some(parts) = parts_from_tags(tags)
    {
        return Ok((parts, Method::TagsOnly));
    }
    Err(reason)
}

/// Name parts for a file no catalog entry could be found for. The album
/// doubles as the series unless it just repeats the title.
fn parts_from_tags(tags: &Tags) -> Option<NameParts> {
    let title = tags.title()?;
    let series = tags.album().filter(|album| comparison_key(album) != comparison_key(title)).map(str::to_string);
    Some(NameParts {
        authors: tags.artist().unwrap_or_default().to_string(),
        series,
        title: title.to_string(),
        id: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Candidate;
    use shelf_catalog::CatalogEntry;
    use shelf_tools::MockToolbox;
    use std::sync::Arc;

    struct Pick(Option<usize>, Vec<String>);
    impl Chooser for Pick {
        fn choose(&mut self, _file: &str, _tags: &Tags, candidates: &[Candidate<'_>]) -> Option<usize> {
            self.1 = candidates.iter().map(|c| c.entry.id.clone()).collect();
            self.0
        }
    }

    fn catalog() -> Catalog {
        Catalog::new([
            CatalogEntry::new("B012345678", "The Great Test", ["A. Author"], Some("Series One")),
            CatalogEntry::new("B000000002", "Another Story", ["C. Writer"], None::<String>),
        ])
    }

    async fn identify_one(
        tools: MockToolbox,
        files: &[&str],
        name: &str,
        options: IdentifyOptions,
        chooser: Option<&mut Pick>,
    ) -> (tempfile::TempDir, IdentifyAction) {
        let temp_dir = tempfile::tempdir().unwrap();
        for file in files {
            std::fs::write(temp_dir.path().join(file), file.as_bytes()).unwrap();
        }
        let tools: ToolHandle = Arc::new(tools);
        let catalog = catalog();
        let titles = TitleIndex::new(&catalog);
        let mut index = FileIndex::scan(temp_dir.path()).await.unwrap();
        let ctx = Context::default();
        let chooser = chooser.map(|c| c as &mut dyn Chooser);
        let action = identify_file(&tools, &ctx, &catalog, &titles, &mut index, name, options, chooser).await.unwrap();
        (temp_dir, action)
    }

    #[tokio::test]
    async fn test_identifier_in_name() {
        let tools = MockToolbox::new(".");
        let (dir, action) =
            identify_one(tools, &["b012345678 Part 2.m4b"], "b012345678 Part 2.m4b", IdentifyOptions::default(), None)
                .await;
        let expected = "A_Author_Series_One_The_Great_Test_B012345678_Part_2.m4b";
        assert_eq!(
            action,
            IdentifyAction::Renamed {
                from: "b012345678 Part 2.m4b".into(),
                to: expected.into(),
                method: Method::Identifier,
                replaced: false,
            }
        );
        assert!(dir.path().join(expected).exists());
    }

    #[tokio::test]
    async fn test_already_correct() {
        let name = "A_Author_Series_One_The_Great_Test_B012345678.m4b";
        let (_dir, action) =
            identify_one(MockToolbox::new("."), &[name], name, IdentifyOptions::default(), None).await;
        assert_eq!(action, IdentifyAction::AlreadyCorrect(name.into()));
    }

    #[tokio::test]
    async fn test_identified_by_tags() {
        let tools = MockToolbox::new(".").with_tags("track.m4b", [("title", "Another Story"), ("artist", "C. Writer")]);
        let (_dir, action) = identify_one(tools, &["track.m4b"], "track.m4b", IdentifyOptions::default(), None).await;
        assert!(matches!(
            action,
            IdentifyAction::Renamed { ref to, method: Method::Tags, .. } if to == "C_Writer_Another_Story_B000000002.m4b"
        ));
    }

    #[tokio::test]
    async fn test_overwrites_existing_target() {
        let target = "C_Writer_Another_Story_B000000002.m4b";
        let tools = MockToolbox::new(".").with_tags("track.m4b", [("title", "Another Story")]);
        let (dir, action) =
            identify_one(tools, &["track.m4b", target], "track.m4b", IdentifyOptions::default(), None).await;
        assert!(matches!(action, IdentifyAction::Renamed { replaced: true, .. }));
        assert_eq!(std::fs::read(dir.path().join(target)).unwrap(), b"track.m4b");
        assert!(!dir.path().join("track.m4b").exists());
    }

    #[tokio::test]
    async fn test_unidentified_is_left_alone() {
        let tools = MockToolbox::new(".").with_tags("track.m4b", [("title", "Unknown Book")]);
        let (dir, action) = identify_one(tools, &["track.m4b"], "track.m4b", IdentifyOptions::default(), None).await;
        assert_eq!(action, IdentifyAction::Unidentified { file: "track.m4b".into(), reason: Unidentified::NoMatch });
        assert!(dir.path().join("track.m4b").exists());

        let (_dir, action) =
            identify_one(MockToolbox::new("."), &["x.m4b"], "x.m4b", IdentifyOptions::default(), None).await;
        assert_eq!(action, IdentifyAction::Unidentified { file: "x.m4b".into(), reason: Unidentified::NoTitle });
    }

    #[tokio::test]
    async fn test_fallback_to_tags() {
        let tools = MockToolbox::new(".")
            .with_tags("track.m4b", [("title", "Unknown Book"), ("artist", "Z. Nobody"), ("album", "Unknown Book")]);
        let options = IdentifyOptions { fallback_to_tags: true };
        let (_dir, action) = identify_one(tools, &["track.m4b"], "track.m4b", options, None).await;
        assert!(matches!(
            action,
            IdentifyAction::Renamed { ref to, method: Method::TagsOnly, .. } if to == "Z_Nobody_Unknown_Book.m4b"
        ));
    }

    #[tokio::test]
    async fn test_chooser_picks_candidate() {
        let tools = MockToolbox::new(".").with_tags("track.m4b", [("title", "The Great Tset")]);
        let mut chooser = Pick(Some(0), Vec::new());
        let options = IdentifyOptions::default();
        let (_dir, action) = identify_one(tools, &["track.m4b"], "track.m4b", options, Some(&mut chooser)).await;
        assert_eq!(chooser.1.first().map(String::as_str), Some("B012345678"));
        assert!(matches!(
            action,
            IdentifyAction::Renamed { ref to, method: Method::Chosen, .. }
                if to == "A_Author_Series_One_The_Great_Test_B012345678.m4b"
        ));
    }

    #[tokio::test]
    async fn test_chooser_skip_wins_over_fallback() {
        let tools = MockToolbox::new(".").with_tags("track.m4b", [("title", "The Great Tset")]);
        let mut chooser = Pick(None, Vec::new());
        let options = IdentifyOptions { fallback_to_tags: true };
        let (dir, action) = identify_one(tools, &["track.m4b"], "track.m4b", options, Some(&mut chooser)).await;
        assert_eq!(action, IdentifyAction::Unidentified { file: "track.m4b".into(), reason: Unidentified::Skipped });
        assert!(dir.path().join("track.m4b").exists());
    }
}
