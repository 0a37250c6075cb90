use crate::normalize::canonicalize;
use std::fmt::{Display, Formatter, Result as FmtResult};

pub const MARKER_PREFIX: &str = "err_";
pub const MARKER_EXTENSION: &str = "notdownloadable";
pub const COMPANION_EXTENSION: &str = "voucher";
const TEMPORARY_SUFFIX: &str = "_tmp";

/// Encrypted container formats, in order of preference.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SourceFormat {
    /// Decryptable with the account-wide activation key alone.
    Aax,
    /// Needs a per-file companion (voucher) alongside the source.
    Aaxc,
}
impl SourceFormat {
    pub fn extension(self) -> &'static str {
        match self {
            Self::Aax => "aax",
            Self::Aaxc => "aaxc",
        }
    }

    pub fn is_preferred(self) -> bool {
        matches!(self, Self::Aax)
    }
}
impl Display for SourceFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.extension())
    }
}

/// What a file in the working directory is, judged purely by its name.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FileKind {
    EncryptedSource(SourceFormat),
    EncryptedSourceCompanion,
    DecryptedOutput,
    FailureMarker,
    TemporaryOutput,
}
impl FileKind {
    /// Classifies a file name. Names that aren't any of the kinds the
    /// engine manages return `None` and are ignored.
    pub fn classify(name: &str) -> Option<Self> {
        let (stem, ext) = name.rsplit_once('.')?;
        let kind = match ext.to_ascii_lowercase().as_str() {
            "aax" => Self::EncryptedSource(SourceFormat::Aax),
            "aaxc" => Self::EncryptedSource(SourceFormat::Aaxc),
            COMPANION_EXTENSION => Self::EncryptedSourceCompanion,
            "m4b" if stem.ends_with(TEMPORARY_SUFFIX) => Self::TemporaryOutput,
            "m4b" => Self::DecryptedOutput,
            MARKER_EXTENSION if stem.starts_with(MARKER_PREFIX) => Self::FailureMarker,
            _ => return None,
        };
        Some(kind)
    }

    pub fn is_source(self) -> bool {
        matches!(self, Self::EncryptedSource(_))
    }

    pub fn is_output(self) -> bool {
        matches!(self, Self::DecryptedOutput)
    }

    pub fn source_format(self) -> Option<SourceFormat> {
        match self {
            Self::EncryptedSource(format) => Some(format),
            _ => None,
        }
    }
}

/// Failure marker file name for a catalog title.
pub fn marker_name(title: &str) -> String {
    format!("{MARKER_PREFIX}{}.{MARKER_EXTENSION}", canonicalize(title))
}

/// Companion file expected next to an encrypted source: same stem, voucher
/// extension.
pub fn companion_name(source_name: &str) -> String {
    let stem = source_name.rsplit_once('.').map_or(source_name, |(stem, _)| stem);
    format!("{stem}.{COMPANION_EXTENSION}")
}
