pub mod error;
pub mod models;

pub use crate::models::{Catalog, CatalogEntry};

use crate::error::{ErrorKind, Result};
use crate::models::RawEntry;
use exn::ResultExt;
use std::io::ErrorKind as IoErrorKind;
use std::path::Path;
use tracing::instrument;

/// Loads the catalog snapshot written by the export collaborator.
///
/// The snapshot is a JSON array of rows. Rows without an identifier or a
/// title are dropped with a warning rather than failing the whole load,
/// since a single odd row (podcasts, bundles) shouldn't block the library.
///
/// # Errors
/// - [`ErrorKind::NotFound`] when the file doesn't exist.
/// - [`ErrorKind::Unreadable`] for any other I/O failure.
/// - [`ErrorKind::Malformed`] when the contents aren't a JSON array.
#[instrument(skip_all, fields(path = %path.as_ref().display()))]
pub fn load(path: impl AsRef<Path>) -> Result<Catalog> {
    let path = path.as_ref();
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == IoErrorKind::NotFound => exn::bail!(ErrorKind::NotFound(path.to_path_buf())),
        Err(e) => return Err(e).or_raise(|| ErrorKind::Unreadable(path.to_path_buf())),
    };
    parse(&bytes).or_raise(|| ErrorKind::Malformed(path.to_path_buf()))
}

/// Parses catalog rows from raw JSON bytes.
pub fn parse(json: &[u8]) -> std::result::Result<Catalog, serde_json::Error> {
    let rows: Vec<RawEntry> = serde_json::from_slice(json)?;
    let total = rows.len();
    let entries: Vec<_> = rows.into_iter().filter_map(RawEntry::validate).collect();
    if entries.len() < total {
        tracing::warn!(dropped = total - entries.len(), "Catalog rows without an id or title were ignored");
    }
    Ok(Catalog::new(entries))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ops::Deref;

    const EXPORT: &str = r#"[
        {"asin": "B012345678", "title": "The Great Test", "authors": "A. Author", "series_title": "Series One"},
        {"asin": "B087654321", "title": "Second Book", "authors": ["B. Writer", "C. Editor"]},
        {"title": "Orphan row"}
    ]"#;

    #[test]
    fn test_parse_export() {
        let catalog = parse(EXPORT.as_bytes()).unwrap();
        assert_eq!(catalog.len(), 2);
        let first = &catalog.entries()[0];
        assert_eq!(first.series_title.as_deref(), Some("Series One"));
        assert_eq!(catalog.entries()[1].authors_display(), "B. Writer, C. Editor");
    }

    #[test]
    fn test_load_missing_is_not_found() {
        let temp_dir = tempfile::tempdir().unwrap();
        let err = load(temp_dir.path().join("library.json")).unwrap_err();
        assert!(matches!(err.deref(), ErrorKind::NotFound(_)));
    }

    #[test]
    fn test_load_malformed() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("library.json");
        std::fs::write(&path, b"{\"not\": \"an array\"}").unwrap();
        let err = load(&path).unwrap_err();
        assert!(matches!(err.deref(), ErrorKind::Malformed(_)));
    }

    #[test]
    fn test_load_from_disk() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("library.json");
        std::fs::write(&path, EXPORT).unwrap();
        let catalog = load(&path).unwrap();
        assert!(catalog.get("B087654321").is_some());
    }
}
