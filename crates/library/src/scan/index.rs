use crate::normalize::comparison_key;
use crate::scan::error::{ErrorKind, Result};
use crate::scan::kind::{FileKind, companion_name};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::instrument;

/// A file the engine manages, as seen in the working directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkingFile {
    /// Bare file name (no directory component).
    pub name: String,
    pub kind: FileKind,
    /// [`comparison_key`] of the name without its extension.
    pub key: String,
}
impl WorkingFile {
    fn new(name: impl Into<String>) -> Option<Self> {
        let name = name.into();
        let kind = FileKind::classify(&name)?;
        let key = comparison_key(name.rsplit_once('.').map_or(name.as_str(), |(stem, _)| stem));
        Some(Self { name, kind, key })
    }
}

/// Snapshot of the managed files in the working directory, ordered by name.
///
/// Built by [`scan`](Self::scan) and kept current by routing every change the
/// engine makes itself ([`delete`](Self::delete), [`rename`](Self::rename),
/// [`write`](Self::write)) through the index. Changes made by external tools
/// are only picked up by a fresh scan.
#[derive(Debug, Clone)]
pub struct FileIndex {
    root: PathBuf,
    files: BTreeMap<String, WorkingFile>,
}

impl FileIndex {
    /// Lists the regular files directly inside `root` (symlinks are followed,
    /// subdirectories are not descended into).
    #[instrument(skip_all, fields(root = %root.as_ref().display()))]
    pub async fn scan(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        let mut entries = fs::read_dir(&root).await.map_err(|e| ErrorKind::from_io(e, &root))?;
        let mut files = BTreeMap::new();
        while let Some(entry) = entries.next_entry().await.map_err(|e| ErrorKind::from_io(e, &root))? {
            let path = entry.path();
            match fs::metadata(&path).await {
                Ok(metadata) if metadata.is_file() => (),
                Ok(_) => continue,
                Err(e) => {
                    // Most likely a broken symlink.
                    tracing::debug!(path = %path.display(), error = %e, "Skipping unreadable directory entry");
                    continue;
                },
            }
            let Ok(name) = entry.file_name().into_string() else {
                tracing::warn!(path = %path.display(), "Skipping file with a non UTF-8 name");
                continue;
            };
            if let Some(file) = WorkingFile::new(name) {
                files.insert(file.name.clone(), file);
            }
        }
        tracing::debug!(files = files.len(), "Indexed working directory");
        Ok(Self { root, files })
    }

    /// Replaces the snapshot with a fresh scan of the same directory.
    pub async fn rescan(&mut self) -> Result<()> {
        *self = Self::scan(&self.root).await?;
        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&WorkingFile> {
        self.files.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.files.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &WorkingFile> {
        self.files.values()
    }

    pub fn of_kind(&self, wanted: impl Fn(FileKind) -> bool) -> impl Iterator<Item = &WorkingFile> {
        self.files.values().filter(move |f| wanted(f.kind))
    }

    /// Names of the files of the wanted kinds; used to diff snapshots taken
    /// before and after an external tool ran.
    pub fn names(&self, wanted: impl Fn(FileKind) -> bool) -> BTreeSet<String> {
        self.of_kind(wanted).map(|f| f.name.clone()).collect()
    }

    /// Files whose name contains `id`, ignoring case. An empty `id` matches
    /// nothing.
    pub fn containing_id(&self, id: &str) -> impl Iterator<Item = &WorkingFile> {
        let id = id.to_lowercase();
        self.files.values().filter(move |f| !id.is_empty() && f.name.to_lowercase().contains(&id))
    }

    /// Files whose key contains `key` or is contained in it. Empty keys on
    /// either side never match.
    pub fn matching_key(&self, key: &str) -> impl Iterator<Item = &WorkingFile> {
        let key = key.to_string();
        self.files
            .values()
            .filter(move |f| !key.is_empty() && !f.key.is_empty() && (f.key.contains(&key) || key.contains(&f.key)))
    }

    /// The companion of an encrypted source, if present.
    pub fn companion_of(&self, source_name: &str) -> Option<&WorkingFile> {
        self.files.get(&companion_name(source_name))
    }

    /// Removes a file from disk and from the index. Returns `false` if it was
    /// already gone.
    pub async fn delete(&mut self, name: &str) -> Result<bool> {
        let path = self.root.join(name);
        let deleted = match fs::remove_file(&path).await {
            Ok(()) => true,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
            Err(e) => exn::bail!(ErrorKind::from_io(e, &path)),
        };
        self.files.remove(name);
        tracing::debug!(file = name, deleted, "Removed file");
        Ok(deleted)
    }

    /// Renames `from` to `to`, replacing `to` if it exists.
    pub async fn rename(&mut self, from: &str, to: &str) -> Result<()> {
        let source = self.root.join(from);
        fs::rename(&source, self.root.join(to)).await.map_err(|e| ErrorKind::from_io(e, &source))?;
        self.files.remove(from);
        self.record(to);
        tracing::debug!(from, to, "Renamed file");
        Ok(())
    }

    /// Creates or overwrites a small text file.
    pub async fn write(&mut self, name: &str, contents: &str) -> Result<()> {
        let path = self.root.join(name);
        fs::write(&path, contents).await.map_err(|e| ErrorKind::from_io(e, &path))?;
        self.record(name);
        Ok(())
    }

    fn record(&mut self, name: &str) {
        if let Some(file) = WorkingFile::new(name) {
            self.files.insert(file.name.clone(), file);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scan::kind::SourceFormat;
    use std::ops::Deref;

    fn touch(dir: &Path, names: &[&str]) {
        for name in names {
            std::fs::write(dir.join(name), b"x").unwrap();
        }
    }

    #[tokio::test]
    async fn test_scan_classifies_and_ignores() {
        let temp_dir = tempfile::tempdir().unwrap();
        touch(temp_dir.path(), &["B0ABCDEFGH.aax", "x.aaxc", "x.voucher", "Out.m4b", "Out_tmp.m4b", "notes.txt"]);
        std::fs::create_dir(temp_dir.path().join("nested.m4b")).unwrap();

        let index = FileIndex::scan(temp_dir.path()).await.unwrap();
        assert_eq!(index.len(), 5);
        assert_eq!(index.get("B0ABCDEFGH.aax").unwrap().kind, FileKind::EncryptedSource(SourceFormat::Aax));
        assert_eq!(index.get("Out_tmp.m4b").unwrap().kind, FileKind::TemporaryOutput);
        assert!(!index.contains("notes.txt"));
        assert!(!index.contains("nested.m4b"));
        assert_eq!(index.companion_of("x.aaxc").unwrap().name, "x.voucher");
    }

    #[tokio::test]
    async fn test_scan_missing_directory() {
        let temp_dir = tempfile::tempdir().unwrap();
        let err = FileIndex::scan(temp_dir.path().join("missing")).await.unwrap_err();
        assert!(matches!(err.deref(), ErrorKind::NotFound(_)));
    }

    #[tokio::test]
    async fn test_lookups() {
        let temp_dir = tempfile::tempdir().unwrap();
        touch(temp_dir.path(), &["b0abcdefgh.aax", "The_Great_Test.m4b", "Other.m4b"]);
        let index = FileIndex::scan(temp_dir.path()).await.unwrap();

        let by_id: Vec<_> = index.containing_id("B0ABCDEFGH").map(|f| f.name.as_str()).collect();
        assert_eq!(by_id, ["b0abcdefgh.aax"]);
        assert_eq!(index.containing_id("").count(), 0);

        let by_key: Vec<_> = index.matching_key("thegreattest").map(|f| f.name.as_str()).collect();
        assert_eq!(by_key, ["The_Great_Test.m4b"]);
        // A longer key containing the file's key matches too.
        assert_eq!(index.matching_key("thegreattestunabridged").count(), 1);
        assert_eq!(index.matching_key("").count(), 0);
    }

    #[tokio::test]
    async fn test_mutations_keep_index_current() {
        let temp_dir = tempfile::tempdir().unwrap();
        touch(temp_dir.path(), &["a_tmp.m4b", "b.aax"]);
        let mut index = FileIndex::scan(temp_dir.path()).await.unwrap();

        index.rename("a_tmp.m4b", "a.m4b").await.unwrap();
        assert!(!index.contains("a_tmp.m4b"));
        assert_eq!(index.get("a.m4b").unwrap().kind, FileKind::DecryptedOutput);

        assert!(index.delete("b.aax").await.unwrap());
        assert!(!index.delete("b.aax").await.unwrap());
        assert!(!temp_dir.path().join("b.aax").exists());

        index.write("err_X.notdownloadable", "reason").await.unwrap();
        assert_eq!(std::fs::read_to_string(temp_dir.path().join("err_X.notdownloadable")).unwrap(), "reason");

        let fresh = FileIndex::scan(temp_dir.path()).await.unwrap();
        assert_eq!(fresh.names(|_| true), index.names(|_| true));
    }
}
