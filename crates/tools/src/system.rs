use crate::error::Result;
use crate::{Audible, Ffmpeg, Ffprobe, FormatRequest, ProgressFn, Tags, Toolbox};
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Executable overrides; `None` means "search `PATH`".
#[derive(Debug, Clone, Default)]
pub struct Executables {
    pub audible: Option<PathBuf>,
    pub ffmpeg: Option<PathBuf>,
    pub ffprobe: Option<PathBuf>,
}

/// The real [`Toolbox`], shelling out to installed programs.
pub struct System {
    workdir: PathBuf,
    audible: Audible,
    ffmpeg: Ffmpeg,
    ffprobe: Ffprobe,
    activation_bytes: Option<String>,
}
impl System {
    /// Locates every executable up front so a missing tool is reported
    /// before any file is touched.
    pub fn discover(
        workdir: impl Into<PathBuf>,
        profile: impl Into<String>,
        executables: &Executables,
        activation_bytes: Option<String>,
    ) -> Result<Self> {
        Ok(Self {
            workdir: workdir.into(),
            audible: Audible::discover(profile, executables.audible.as_deref())?,
            ffmpeg: Ffmpeg::discover(executables.ffmpeg.as_deref())?,
            ffprobe: Ffprobe::discover(executables.ffprobe.as_deref())?,
            activation_bytes,
        })
    }
}

#[async_trait]
impl Toolbox for System {
    fn workdir(&self) -> &Path {
        &self.workdir
    }

    async fn acquire(&self, id: &str, request: FormatRequest) -> Result<()> {
        self.audible.download(&self.workdir, id, request).await
    }

    async fn activation_key(&self) -> Result<String> {
        match &self.activation_bytes {
            Some(key) => Ok(key.clone()),
            None => self.audible.activation_bytes().await,
        }
    }

    async fn convert(&self, key: &str, source: &Path, dest: &Path, progress: Option<&ProgressFn>) -> Result<()> {
        self.ffmpeg.convert(key, &self.workdir.join(source), &self.workdir.join(dest), progress).await
    }

    async fn probe(&self, path: &Path) -> Tags {
        self.ffprobe.tags(&self.workdir.join(path)).await
    }
}
