use crate::error::{ErrorKind, Result};
use crate::{Tags, discover};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

const TOOL: &str = "ffprobe";

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    format: ProbeFormat,
}

#[derive(Debug, Default, Deserialize)]
struct ProbeFormat {
    #[serde(default)]
    tags: HashMap<String, String>,
}

#[derive(Debug, Clone)]
pub struct Ffprobe {
    executable: PathBuf,
}
impl Ffprobe {
    pub fn discover(configured: Option<&Path>) -> Result<Self> {
        Ok(Self { executable: discover(TOOL, configured)? })
    }

    /// Reads container-level tags. Any failure (missing file, not a media
    /// file, unexpected output) yields empty [`Tags`].
    pub async fn tags(&self, path: &Path) -> Tags {
        let output = Command::new(&self.executable)
            .args(["-v", "quiet", "-print_format", "json", "-show_format"])
            .arg(path)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await;
        match output {
            Ok(output) if output.status.success() => parse_tags(&output.stdout).unwrap_or_else(|e| {
                tracing::debug!(path = %path.display(), error = %e, "Unexpected probe output");
                Tags::default()
            }),
            Ok(output) => {
                let err = ErrorKind::ToolFailed { tool: TOOL, code: output.status.code() };
                tracing::debug!(path = %path.display(), error = %err, "Probe failed");
                Tags::default()
            },
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "Probe could not be started");
                Tags::default()
            },
        }
    }
}

pub(crate) fn parse_tags(stdout: &[u8]) -> std::result::Result<Tags, serde_json::Error> {
    let output: ProbeOutput = serde_json::from_slice(stdout)?;
    Ok(output.format.tags.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tags() {
        let json = br#"{"format": {"filename": "x.m4b", "tags": {"TITLE": "The Great Test", "artist": "A. Author", "album": "Series One"}}}"#;
        let tags = parse_tags(json).unwrap();
        assert_eq!(tags.title(), Some("The Great Test"));
        assert_eq!(tags.artist(), Some("A. Author"));
        assert_eq!(tags.album(), Some("Series One"));
    }

    #[test]
    fn test_parse_without_tags() {
        assert!(parse_tags(br#"{"format": {}}"#).unwrap().is_empty());
        assert!(parse_tags(br#"{}"#).unwrap().is_empty());
        assert!(parse_tags(b"not json").is_err());
    }
}
