//! Scripted collaborators for testing.

use crate::error::{ErrorKind, Result};
use crate::{ConvertProgress, FormatRequest, ProgressFn, Tags, Toolbox};
use async_trait::async_trait;
use exn::ResultExt;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

/// A collaborator invocation, recorded in call order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Acquire { id: String, request: FormatRequest },
    ActivationKey,
    Convert { source: PathBuf, dest: PathBuf },
    Probe(PathBuf),
}

struct Acquisition {
    files: Vec<String>,
    succeed: bool,
}

/// A [`Toolbox`] that works on a real directory but whose behaviour is
/// scripted up front.
///
/// - Unscripted acquisitions fail without producing files.
/// - Conversions succeed (writing a small placeholder file) unless the
///   source name was registered with [`fail_convert`](Self::fail_convert).
/// - Without [`with_key`](Self::with_key), the key lookup fails.
///
/// # Examples
///
/// ```
/// use shelf_tools::{FormatRequest, MockToolbox};
///
/// let temp_dir = tempfile::tempdir().unwrap();
/// let tools = MockToolbox::new(temp_dir.path())
///     .on_acquire("B012345678", FormatRequest::Preferred, ["B012345678.aax"], true)
///     .with_key("deadbeef");
/// ```
pub struct MockToolbox {
    workdir: PathBuf,
    acquisitions: HashMap<(String, FormatRequest), Acquisition>,
    key: Option<String>,
    failing: HashSet<String>,
    tags: HashMap<String, Tags>,
    calls: Mutex<Vec<Call>>,
}

impl MockToolbox {
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
            acquisitions: HashMap::new(),
            key: None,
            failing: HashSet::new(),
            tags: HashMap::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Scripts an acquisition: `files` are created in the working directory
    /// and the call reports `succeed`.
    pub fn on_acquire(
        mut self,
        id: impl Into<String>,
        request: FormatRequest,
        files: impl IntoIterator<Item = impl Into<String>>,
        succeed: bool,
    ) -> Self {
        let files = files.into_iter().map(Into::into).collect();
        self.acquisitions.insert((id.into(), request), Acquisition { files, succeed });
        self
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Conversions of this source file name will fail, leaving a partial
    /// destination file behind.
    pub fn fail_convert(mut self, source: impl Into<String>) -> Self {
        self.failing.insert(source.into());
        self
    }

    pub fn with_tags<K: AsRef<str>, V: Into<String>>(
        mut self,
        file: impl Into<String>,
        tags: impl IntoIterator<Item = (K, V)>,
    ) -> Self {
        self.tags.insert(file.into(), tags.into_iter().collect());
        self
    }

    /// Every invocation so far, in order.
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    fn record(&self, call: Call) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
    }

    fn file_name(path: &Path) -> String {
        path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default()
    }
}

#[async_trait]
impl Toolbox for MockToolbox {
    fn workdir(&self) -> &Path {
        &self.workdir
    }

    async fn acquire(&self, id: &str, request: FormatRequest) -> Result<()> {
        self.record(Call::Acquire { id: id.to_string(), request });
        let Some(acquisition) = self.acquisitions.get(&(id.to_string(), request)) else {
            exn::bail!(ErrorKind::ToolFailed { tool: "mock-acquire", code: Some(1) });
        };
        for file in &acquisition.files {
            std::fs::write(self.workdir.join(file), b"encrypted").or_raise(|| ErrorKind::Io)?;
        }
        if !acquisition.succeed {
            exn::bail!(ErrorKind::ToolFailed { tool: "mock-acquire", code: Some(1) });
        }
        Ok(())
    }

    async fn activation_key(&self) -> Result<String> {
        self.record(Call::ActivationKey);
        match &self.key {
            Some(key) => Ok(key.clone()),
            None => exn::bail!(ErrorKind::KeyUnavailable),
        }
    }

    async fn convert(&self, _key: &str, source: &Path, dest: &Path, progress: Option<&ProgressFn>) -> Result<()> {
        self.record(Call::Convert { source: source.to_path_buf(), dest: dest.to_path_buf() });
        let dest_path = self.workdir.join(dest);
        if self.failing.contains(&Self::file_name(source)) {
            std::fs::write(&dest_path, b"partial").or_raise(|| ErrorKind::Io)?;
            exn::bail!(ErrorKind::ToolFailed { tool: "mock-convert", code: Some(1) });
        }
        std::fs::write(&dest_path, b"decrypted").or_raise(|| ErrorKind::Io)?;
        if let Some(report) = progress {
            report(ConvertProgress { out_time: Duration::from_secs(1), finished: true });
        }
        Ok(())
    }

    async fn probe(&self, path: &Path) -> Tags {
        self.record(Call::Probe(path.to_path_buf()));
        self.tags.get(&Self::file_name(path)).cloned().unwrap_or_default()
    }
}
