//! Identity matching between catalog entries and working files.
//!
//! Files are matched to an entry in tiers, and the first tier that yields
//! any file wins:
//!
//! 1. **Identifier**: the file name contains the entry's id (ignoring case).
//!    Skipped for ids shorter than [`Matcher::min_id_length`], which would
//!    match too much by accident.
//! 2. **Title**: the file's key and the title's key contain one another.
//!
//! The identify pass adds a third tier working the other way round, from a
//! file's embedded tags to a catalog entry ([`Matcher::match_tags`]), and a
//! fuzzy ranking used for interactive disambiguation ([`Matcher::rank`]).

use crate::normalize::comparison_key;
use crate::scan::{FileIndex, FileKind, WorkingFile};
use shelf_catalog::{Catalog, CatalogEntry};
use shelf_tools::Tags;
use std::collections::{HashMap, HashSet};

/// Which matching tier produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Identifier,
    Title,
}

#[derive(Debug, Clone)]
pub struct Matcher {
    /// Ids shorter than this never take part in identifier matching.
    pub min_id_length: usize,
    /// Maximum number of candidates [`rank`](Self::rank) returns.
    pub fuzzy_candidates: usize,
    /// Minimum similarity (`0.0..=1.0`) for a ranked candidate.
    pub fuzzy_cutoff: f64,
}
impl Default for Matcher {
    fn default() -> Self {
        Self { min_id_length: 8, fuzzy_candidates: 3, fuzzy_cutoff: 0.1 }
    }
}

impl Matcher {
    /// Files of the `wanted` kinds belonging to `entry`, together with the
    /// tier that found them. `None` when no tier matched.
    pub fn find<'a>(
        &self,
        entry: &CatalogEntry,
        index: &'a FileIndex,
        wanted: fn(FileKind) -> bool,
    ) -> Option<(Tier, Vec<&'a WorkingFile>)> {
        if entry.id.chars().count() >= self.min_id_length {
            let found: Vec<_> = index.containing_id(&entry.id).filter(|f| wanted(f.kind)).collect();
            if !found.is_empty() {
                return Some((Tier::Identifier, found));
            }
        }
        let found: Vec<_> = index.matching_key(&comparison_key(&entry.title)).filter(|f| wanted(f.kind)).collect();
        (!found.is_empty()).then_some((Tier::Title, found))
    }

    /// The first decrypted output that satisfies `entry`, if any.
    pub fn output<'a>(&self, entry: &CatalogEntry, index: &'a FileIndex) -> Option<&'a WorkingFile> {
        self.find(entry, index, FileKind::is_output).and_then(|(_, files)| files.into_iter().next())
    }

    /// Every encrypted source belonging to `entry`, ordered by name.
    pub fn sources<'a>(&self, entry: &CatalogEntry, index: &'a FileIndex) -> Vec<&'a WorkingFile> {
        self.find(entry, index, FileKind::is_source).map(|(_, files)| files).unwrap_or_default()
    }

    /// The first catalog entry whose id appears in `file_name`, ignoring case.
    pub fn entry_by_identifier<'c>(&self, file_name: &str, catalog: &'c Catalog) -> Option<&'c CatalogEntry> {
        let name = file_name.to_lowercase();
        catalog
            .iter()
            .find(|entry| entry.id.chars().count() >= self.min_id_length && name.contains(&entry.id.to_lowercase()))
    }

    /// Identifies a catalog entry from a file's embedded tags.
    ///
    /// The `title` tag is looked up by key (falling back to `album`). When
    /// several entries share that key the artist tag narrows them down (by
    /// containment in the entry's authors), then an id found in the file name.
    /// Whatever is still tied is [`TagMatch::Ambiguous`]; it is never guessed.
    pub fn match_tags<'c>(&self, titles: &TitleIndex<'c>, tags: &Tags, file_name: &str) -> TagMatch<'c> {
        let Some(title) = tags.title() else {
            return TagMatch::NoTitle;
        };
        let mut candidates = titles.get(&comparison_key(title));
        if candidates.is_empty()
            && let Some(album) = tags.album()
        {
            candidates = titles.get(&comparison_key(album));
        }
        match candidates {
            [] => TagMatch::NoMatch,
            [only] => TagMatch::Identified(*only),
            many => self.disambiguate(many, tags.artist(), file_name),
        }
    }

    fn disambiguate<'c>(&self, candidates: &[&'c CatalogEntry], artist: Option<&str>, file_name: &str) -> TagMatch<'c> {
        let name = file_name.to_lowercase();
        let has_id = |entry: &&&'c CatalogEntry| {
            entry.id.chars().count() >= self.min_id_length && name.contains(&entry.id.to_lowercase())
        };

        // Either key may hold the other: tags often list narrators too.
        let by_author: Vec<&'c CatalogEntry> = match artist.map(comparison_key).filter(|a| !a.is_empty()) {
            Some(artist) => candidates
                .iter()
                .copied()
                .filter(|e| {
                    let authors = comparison_key(&e.authors_display());
                    !authors.is_empty() && (authors.contains(artist.as_str()) || artist.contains(authors.as_str()))
                })
                .collect(),
            None => Vec::new(),
        };
        let remaining = match by_author.as_slice() {
            [only] => return TagMatch::Identified(*only),
            [] => candidates,
            several => several,
        };
        match remaining.iter().find(has_id) {
            Some(entry) => TagMatch::Identified(*entry),
            None => TagMatch::Ambiguous(remaining.to_vec()),
        }
    }

    /// Ranks catalog entries by title similarity to `query`, best first.
    ///
    /// At most [`fuzzy_candidates`](Self::fuzzy_candidates) entries scoring at
    /// least [`fuzzy_cutoff`](Self::fuzzy_cutoff) are returned, each entry at
    /// most once. Ties are broken by title, then id, so the ranking is
    /// deterministic.
    pub fn rank<'c>(&self, query: &str, catalog: &'c Catalog) -> Vec<Candidate<'c>> {
        let query = query.to_lowercase();
        let mut seen = HashSet::new();
        let mut ranked: Vec<_> = catalog
            .iter()
            .filter(|entry| seen.insert(entry.id.as_str()))
            .map(|entry| Candidate { entry, score: strsim::normalized_levenshtein(&query, &entry.title.to_lowercase()) })
            .filter(|candidate| candidate.score >= self.fuzzy_cutoff)
            .collect();
        ranked.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.entry.title.cmp(&b.entry.title))
                .then_with(|| a.entry.id.cmp(&b.entry.id))
        });
        ranked.truncate(self.fuzzy_candidates);
        ranked
    }
}

/// Catalog entries grouped by title key, built once per identify pass.
pub struct TitleIndex<'c> {
    by_title: HashMap<String, Vec<&'c CatalogEntry>>,
}
impl<'c> TitleIndex<'c> {
    pub fn new(catalog: &'c Catalog) -> Self {
        Self { by_title: catalog.group_by(|entry| comparison_key(&entry.title)) }
    }

    fn get(&self, key: &str) -> &[&'c CatalogEntry] {
        self.by_title.get(key).map(Vec::as_slice).unwrap_or_default()
    }
}

/// Result of matching embedded tags against the catalog.
#[derive(Debug, PartialEq)]
pub enum TagMatch<'c> {
    Identified(&'c CatalogEntry),
    /// Several entries share the title and nothing told them apart.
    Ambiguous(Vec<&'c CatalogEntry>),
    NoMatch,
    /// The file has no title tag to match on.
    NoTitle,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate<'c> {
    pub entry: &'c CatalogEntry,
    pub score: f64,
}
