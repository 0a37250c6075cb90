//! External collaborators.
//!
//! Everything the library core delegates to another program lives behind the
//! [`Toolbox`] trait: downloading a title, looking up the account's decryption
//! key, converting an encrypted source into a playable file and probing a
//! file's embedded tags. The core only consumes outcomes (success/failure and
//! which files appeared), never the mechanism.
//!
//! [`System`] is the real implementation, shelling out to the `audible` CLI,
//! `ffmpeg` and `ffprobe`. With the `mock` feature enabled, `MockToolbox`
//! scripts the same behaviour for tests.

mod audible;
pub mod error;
mod ffmpeg;
mod ffprobe;
#[cfg(feature = "mock")]
mod mock;
mod system;

pub use crate::audible::Audible;
pub use crate::ffmpeg::{ConvertProgress, Ffmpeg};
pub use crate::ffprobe::Ffprobe;
#[cfg(feature = "mock")]
pub use crate::mock::{Call, MockToolbox};
pub use crate::system::{Executables, System};

use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub type ToolHandle = Arc<dyn Toolbox + Send + Sync>;

/// Callback receiving live conversion progress. Display only: whatever it
/// does has no bearing on whether the conversion succeeded.
pub type ProgressFn = dyn Fn(ConvertProgress) + Send + Sync;

/// Which container the acquire collaborator is asked for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FormatRequest {
    /// Only the preferred (activation-key) container.
    Preferred,
    /// Preferred if available, otherwise whatever the store offers.
    Fallback,
}
impl Display for FormatRequest {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Preferred => write!(f, "preferred"),
            Self::Fallback => write!(f, "fallback"),
        }
    }
}

/// Embedded tag metadata as reported by the probe. Keys are lowercased.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tags(HashMap<String, String>);
impl Tags {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(&name.to_ascii_lowercase()).map(String::as_str).map(str::trim).filter(|v| !v.is_empty())
    }

    pub fn title(&self) -> Option<&str> {
        self.get("title")
    }

    pub fn artist(&self) -> Option<&str> {
        self.get("artist")
    }

    pub fn album(&self) -> Option<&str> {
        self.get("album")
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
impl<K: AsRef<str>, V: Into<String>> FromIterator<(K, V)> for Tags {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.as_ref().to_ascii_lowercase(), v.into())).collect())
    }
}

/// The set of external operations the reconciliation core depends on.
///
/// Every call is blocking from the core's point of view: it is awaited to
/// completion before the next decision is made. Timeouts, retries and
/// authentication are the implementation's business.
///
/// Paths are relative to [`workdir`](Self::workdir); absolute paths are
/// used as-is.
#[async_trait]
pub trait Toolbox: Send + Sync {
    /// Directory the collaborators read from and write into.
    fn workdir(&self) -> &Path;

    /// Downloads the title `id` into [`workdir`](Self::workdir).
    ///
    /// Success only means the tool reported success; callers must look at
    /// the directory to find out which files (if any) appeared.
    async fn acquire(&self, id: &str, request: FormatRequest) -> Result<()>;

    /// Looks up the short hexadecimal key needed to decrypt sources.
    async fn activation_key(&self) -> Result<String>;

    /// Decrypts `source` into `dest`. On failure `dest` may be left behind
    /// partially written; cleaning it up is the caller's job.
    async fn convert(&self, key: &str, source: &Path, dest: &Path, progress: Option<&ProgressFn>) -> Result<()>;

    /// Reads embedded tags. Never fails: an unreadable file has no tags.
    async fn probe(&self, path: &Path) -> Tags;
}

/// Resolves an executable from an explicit override or from `PATH`.
pub(crate) fn discover(name: &'static str, configured: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = configured {
        if path.is_file() {
            return Ok(path.to_path_buf());
        }
        tracing::warn!(tool = name, path = %path.display(), "Configured executable does not exist; searching PATH");
    }
    match which::which(name) {
        Ok(path) => {
            tracing::trace!(tool = name, path = %path.display(), "Discovered executable");
            Ok(path)
        },
        Err(_) => exn::bail!(crate::error::ErrorKind::ToolNotFound(name)),
    }
}
