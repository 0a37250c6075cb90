use crate::error::{ErrorKind, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub library: LibraryConfig,
    pub matching: MatchingConfig,
    pub naming: NamingConfig,
    pub acquire: AcquireConfig,
    pub tools: ToolsConfig,
}
impl Config {
    pub fn validate(&self) -> Result<()> {
        let invalid = |field: &'static str, reason: &str| ErrorKind::Invalid { field, reason: reason.to_string() };
        if self.matching.min_id_length == 0 {
            exn::bail!(invalid("matching.min_id_length", "must be at least 1"));
        }
        if self.matching.fuzzy_candidates == 0 {
            exn::bail!(invalid("matching.fuzzy_candidates", "must be at least 1"));
        }
        if !(0.0..=1.0).contains(&self.matching.fuzzy_cutoff) {
            exn::bail!(invalid("matching.fuzzy_cutoff", "must be between 0.0 and 1.0"));
        }
        if self.tools.profile.trim().is_empty() {
            exn::bail!(invalid("tools.profile", "must not be empty"));
        }
        if let Some(key) = &self.tools.activation_bytes
            && !(key.len() == 8 && key.chars().all(|c| c.is_ascii_hexdigit()))
        {
            exn::bail!(invalid("tools.activation_bytes", "must be 8 hexadecimal digits"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LibraryConfig {
    /// Working directory holding sources, outputs and failure markers.
    pub dir: PathBuf,
    /// Catalog snapshot; relative paths resolve against `dir`.
    pub catalog: PathBuf,
}
impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("."),
            catalog: PathBuf::from("library.json"),
        }
    }
}
impl LibraryConfig {
    pub fn catalog_path(&self) -> PathBuf {
        // Joining an absolute path replaces the base, which is what we want.
        self.dir.join(&self.catalog)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    /// Identifiers shorter than this never match by containment; short
    /// strings turn up inside unrelated file names far too often.
    pub min_id_length: usize,
    /// How many ranked candidates the interactive chooser is shown.
    pub fuzzy_candidates: usize,
    /// Minimum similarity (0.0–1.0) for a title to be offered at all.
    pub fuzzy_cutoff: f64,
}
impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            min_id_length: 8,
            fuzzy_candidates: 3,
            fuzzy_cutoff: 0.1,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NamingConfig {
    /// Output name template; `None` uses the library's built-in template.
    pub template: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AcquireConfig {
    /// Delete alternate-format sources (and their vouchers) so that the
    /// preferred format is downloaded instead.
    pub replace_alternate_sources: bool,
}
impl Default for AcquireConfig {
    fn default() -> Self {
        Self { replace_alternate_sources: true }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    /// Profile passed to the store CLI (`-P <profile>`).
    pub profile: String,
    pub audible: Option<PathBuf>,
    pub ffmpeg: Option<PathBuf>,
    pub ffprobe: Option<PathBuf>,
    /// Known account key; when set, the key lookup is never invoked.
    pub activation_bytes: Option<String>,
}
impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            profile: "default".to_string(),
            audible: None,
            ffmpeg: None,
            ffprobe: None,
            activation_bytes: None,
        }
    }
}
