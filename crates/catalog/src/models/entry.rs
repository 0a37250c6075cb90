use serde::Deserialize;
use std::fmt::{Display, Formatter, Result as FmtResult};

/// One purchased work from the catalog snapshot.
///
/// Immutable for the duration of a run. Entries are only ever constructed by
/// the catalog loader (or tests), which guarantees `id` and `title` are
/// non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CatalogEntry {
    /// Unique, stable identifier (the store's product ID).
    pub id: String,
    /// Work title
    pub title: String,
    /// Credited authors, in catalog order (may be empty when the export
    /// omitted them)
    pub authors: Vec<String>,
    /// Series the work belongs to, if any
    pub series_title: Option<String>,
}
impl CatalogEntry {
    pub fn new<S: Into<String>>(
        id: impl Into<String>,
        title: impl Into<String>,
        authors: impl IntoIterator<Item = S>,
        series_title: Option<impl Into<String>>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            authors: authors.into_iter().map(Into::into).collect(),
            series_title: series_title.map(Into::into).filter(|s: &String| !s.trim().is_empty()),
        }
    }

    /// Authors joined the way they are rendered into file names.
    pub fn authors_display(&self) -> String {
        self.authors.join(", ")
    }
}

impl Display for CatalogEntry {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{} ({})", self.title, self.id)
    }
}

/// The export writes authors either as a single comma-separated string or as
/// a list of names, depending on the tool version.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum RawAuthors {
    Joined(String),
    List(Vec<String>),
}
impl RawAuthors {
    pub(crate) fn into_names(self) -> Vec<String> {
        let names: Vec<String> = match self {
            Self::Joined(joined) => joined.split(',').map(str::to_string).collect(),
            Self::List(list) => list,
        };
        names.into_iter().map(|n| n.trim().to_string()).filter(|n| !n.is_empty()).collect()
    }
}

/// Catalog row as exported; every field is optional until validated.
#[derive(Debug, Deserialize)]
pub(crate) struct RawEntry {
    #[serde(alias = "asin")]
    pub(crate) id: Option<String>,
    pub(crate) title: Option<String>,
    pub(crate) authors: Option<RawAuthors>,
    pub(crate) series_title: Option<String>,
}
impl RawEntry {
    /// Rows missing an identifier or title cannot be matched against
    /// anything and are dropped.
    pub(crate) fn validate(self) -> Option<CatalogEntry> {
        let id = self.id.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())?;
        let title = self.title.filter(|s| !s.trim().is_empty())?;
        let authors = self.authors.map(RawAuthors::into_names).unwrap_or_default();
        Some(CatalogEntry::new(id, title, authors, self.series_title))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(r#""A. Author, B. Writer""#, &["A. Author", "B. Writer"])]
    #[case(r#"["A. Author", " B. Writer "]"#, &["A. Author", "B. Writer"])]
    #[case(r#""Solo""#, &["Solo"])]
    #[case(r#""""#, &[])]
    fn test_authors_shapes(#[case] json: &str, #[case] expected: &[&str]) {
        let raw: RawAuthors = serde_json::from_str(json).unwrap();
        assert_eq!(raw.into_names(), expected);
    }

    #[test]
    fn test_validate_requires_id_and_title() {
        let raw: RawEntry = serde_json::from_str(r#"{"title": "No ID"}"#).unwrap();
        assert!(raw.validate().is_none());
        let raw: RawEntry = serde_json::from_str(r#"{"asin": "B012345678", "title": "  "}"#).unwrap();
        assert!(raw.validate().is_none());
    }

    #[test]
    fn test_validate_drops_blank_series() {
        let raw: RawEntry =
            serde_json::from_str(r#"{"asin": "B012345678", "title": "T", "authors": "A", "series_title": ""}"#)
                .unwrap();
        let entry = raw.validate().unwrap();
        assert_eq!(entry.id, "B012345678");
        assert_eq!(entry.series_title, None);
        assert_eq!(entry.authors_display(), "A");
    }

    #[test]
    fn test_display() {
        let entry = CatalogEntry::new("B012345678", "The Great Test", ["A. Author"], None::<String>);
        assert_eq!(entry.to_string(), "The Great Test (B012345678)");
    }
}
