use crate::error::{ErrorKind, Result};
use crate::{ProgressFn, discover};
use exn::ResultExt;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};
use tokio::process::Command;
use tracing::instrument;

const TOOL: &str = "ffmpeg";

/// A snapshot of a running conversion, parsed from ffmpeg's
/// `-progress` key/value stream.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ConvertProgress {
    /// Position in the output stream written so far.
    pub out_time: Duration,
    /// Set on the final report ffmpeg emits before exiting.
    pub finished: bool,
}

#[derive(Debug, Clone)]
pub struct Ffmpeg {
    executable: PathBuf,
}
impl Ffmpeg {
    pub fn discover(configured: Option<&Path>) -> Result<Self> {
        Ok(Self { executable: discover(TOOL, configured)? })
    }

    /// Decrypts `source` into `dest` with a stream copy (no re-encoding).
    ///
    /// The progress stream on stdout is read concurrently with waiting for
    /// the process to exit. If reading progress fails, the stream is simply
    /// abandoned; only the exit status decides the outcome.
    #[instrument(skip(self, key, progress), fields(source = %source.display()))]
    pub async fn convert(&self, key: &str, source: &Path, dest: &Path, progress: Option<&ProgressFn>) -> Result<()> {
        let mut command = Command::new(&self.executable);
        command
            .args(["-y", "-hide_banner", "-nostats", "-loglevel", "error"])
            .args(["-activation_bytes", key])
            .arg("-i")
            .arg(source)
            .args(["-c", "copy", "-progress", "pipe:1"])
            .arg(dest)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .kill_on_drop(true);
        let mut child = command.spawn().or_raise(|| ErrorKind::Io)?;
        let mut lines = child.stdout.take().map(|stdout| BufReader::new(stdout).lines());
        let mut current = ConvertProgress::default();

        let status = loop {
            tokio::select! {
                status = child.wait() => break status.or_raise(|| ErrorKind::Io)?,
                line = next_line(&mut lines) => match line {
                    Ok(Some(line)) => forward(&line, &mut current, progress),
                    Ok(None) => lines = None,
                    Err(e) => {
                        tracing::debug!(error = %e, "Progress stream unreadable; continuing without it");
                        lines = None;
                    },
                },
            }
        };
        // The final report is often still buffered when the exit status arrives.
        if let Some(lines) = lines.as_mut() {
            while let Ok(Some(line)) = lines.next_line().await {
                forward(&line, &mut current, progress);
            }
        }
        if !status.success() {
            exn::bail!(ErrorKind::ToolFailed { tool: TOOL, code: status.code() });
        }
        Ok(())
    }
}

fn forward(line: &str, current: &mut ConvertProgress, progress: Option<&ProgressFn>) {
    if let (Some(update), Some(report)) = (parse_progress_line(line, current), progress) {
        report(update);
    }
}

/// Never resolves once the stream is gone, so the other `select!` branch
/// (the exit status) is the only one left to complete.
async fn next_line<R: AsyncBufRead + Unpin>(lines: &mut Option<Lines<R>>) -> io::Result<Option<String>> {
    match lines {
        Some(lines) => lines.next_line().await,
        None => std::future::pending().await,
    }
}

/// Folds one `key=value` line into `state`, returning a report at the end of
/// each block (ffmpeg terminates every block with a `progress=` line).
pub(crate) fn parse_progress_line(line: &str, state: &mut ConvertProgress) -> Option<ConvertProgress> {
    let (key, value) = line.trim().split_once('=')?;
    match key {
        // `out_time_ms` is also microseconds, a long-standing ffmpeg quirk.
        "out_time_us" | "out_time_ms" => {
            if let Ok(micros) = value.parse::<u64>() {
                state.out_time = Duration::from_micros(micros);
            }
            None
        },
        "progress" => {
            state.finished = value == "end";
            Some(*state)
        },
        _ => None,
    }
}
