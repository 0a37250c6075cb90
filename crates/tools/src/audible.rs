use crate::error::{ErrorKind, Result};
use crate::{FormatRequest, discover};
use exn::{OptionExt, ResultExt};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::LazyLock;
use tokio::process::Command;
use tracing::instrument;

const TOOL: &str = "audible";

static ACTIVATION_BYTES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[a-fA-F0-9]{8}").unwrap());

/// The store's command-line client, bound to one profile.
///
/// Login and profile management happen outside of shelf; this only drives
/// the non-interactive subcommands.
#[derive(Debug, Clone)]
pub struct Audible {
    executable: PathBuf,
    profile: String,
}
impl Audible {
    pub fn discover(profile: impl Into<String>, configured: Option<&Path>) -> Result<Self> {
        Ok(Self {
            executable: discover(TOOL, configured)?,
            profile: profile.into(),
        })
    }

    fn command(&self) -> Command {
        let mut command = Command::new(&self.executable);
        command.arg("-P").arg(&self.profile).stdin(Stdio::null()).kill_on_drop(true);
        command
    }

    async fn run(mut command: Command) -> Result<()> {
        let status = command.status().await.or_raise(|| ErrorKind::Io)?;
        if !status.success() {
            exn::bail!(ErrorKind::ToolFailed { tool: TOOL, code: status.code() });
        }
        Ok(())
    }

    /// Downloads `id` into `workdir`.
    #[instrument(skip(self, workdir), fields(profile = %self.profile))]
    pub async fn download(&self, workdir: &Path, id: &str, request: FormatRequest) -> Result<()> {
        let mut command = self.command();
        command.current_dir(workdir).args(["download", "-a", id, "-y"]).arg(match request {
            FormatRequest::Preferred => "--aax",
            FormatRequest::Fallback => "--aax-fallback",
        });
        tracing::debug!(%request, "Requesting download");
        Self::run(command).await
    }

    /// Asks the store for the account's activation bytes.
    #[instrument(skip(self), fields(profile = %self.profile))]
    pub async fn activation_bytes(&self) -> Result<String> {
        let mut command = self.command();
        command.arg("activation-bytes").stderr(Stdio::inherit());
        let output = command.output().await.or_raise(|| ErrorKind::Io)?;
        if !output.status.success() {
            exn::bail!(ErrorKind::ToolFailed { tool: TOOL, code: output.status.code() });
        }
        parse_activation_bytes(&String::from_utf8_lossy(&output.stdout))
    }

    /// Writes the library snapshot as JSON to `output`.
    #[instrument(skip(self), fields(profile = %self.profile))]
    pub async fn export_library(&self, output: &Path) -> Result<()> {
        let mut command = self.command();
        command.args(["library", "export", "--format", "json", "--output"]).arg(output);
        Self::run(command).await
    }
}

/// The key is the first run of eight hex digits; everything else the tool
/// prints (banners, warnings) is noise.
pub(crate) fn parse_activation_bytes(stdout: &str) -> Result<String> {
    ACTIVATION_BYTES
        .find(stdout)
        .map(|m| m.as_str().to_string())
        .ok_or_raise(|| ErrorKind::KeyUnavailable)
}
