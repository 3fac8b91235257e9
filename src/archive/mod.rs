//! Snapshot storage.
//!
//! Snapshots live at `<archive root>/<repository path>/<reference>.<format>`.
//! The [`ArchiveStore`] is built once per run and handed to every job.

mod format;

use anyhow::{Context, Result, anyhow};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info};

use crate::config::ArchiveSettings;
use crate::paths::nest;

pub use format::ArchiveFormat;
use format::top_level_entries;

pub struct ArchiveStore {
    enabled: bool,
    root: PathBuf,
    format: ArchiveFormat,
    extension: String,
}

impl ArchiveStore {
    /// # Errors
    /// Returns an error if `settings.format` is not a supported format.
    pub fn new(settings: &ArchiveSettings) -> Result<Self> {
        Ok(Self {
            enabled: settings.enabled,
            root: settings.folder.clone(),
            format: settings.format.parse()?,
            extension: settings.format.clone(),
        })
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn snapshot_path(&self, repo: &str, reference: &str) -> PathBuf {
        nest(&self.root, repo).join(format!("{}.{}", reference, self.extension))
    }

    /// Whether a snapshot of `reference` is already stored for `repo`.
    pub fn exists(&self, repo: &str, reference: &str) -> bool {
        self.snapshot_path(repo, reference).is_file()
    }

    /// Write a snapshot of the top-level contents of `source`, replacing any
    /// snapshot stored under the same name. Returns the snapshot path.
    ///
    /// The archive is staged next to its destination and renamed into place,
    /// so a failed write leaves no partial file behind.
    ///
    /// # Errors
    /// Returns an error if the destination folder cannot be created, the old
    /// snapshot cannot be removed, `source` cannot be listed, or writing the
    /// archive fails.
    pub fn write(&self, repo: &str, reference: &str, source: &Path) -> Result<PathBuf> {
        let target = self.snapshot_path(repo, reference);
        let folder = target
            .parent()
            .ok_or_else(|| anyhow!("invalid snapshot path: {}", target.display()))?;
        fs::create_dir_all(folder)
            .with_context(|| format!("failed to create {}", folder.display()))?;

        if target.exists() {
            fs::remove_file(&target)
                .with_context(|| format!("failed to remove {}", target.display()))?;
        }

        let entries = top_level_entries(source).inspect_err(|e| {
            error!(dir = %source.display(), error = %e, "failed to get directory contents");
        })?;

        let staged = tempfile::Builder::new()
            .prefix(".snapshot-")
            .tempfile_in(folder)
            .with_context(|| format!("failed to stage snapshot in {}", folder.display()))?;
        self.format
            .write(&entries, staged.as_file())
            .inspect_err(|e| error!(repo, reference, error = %e, "failed to archive repository"))
            .with_context(|| format!("failed to write {}", target.display()))?;
        staged
            .persist(&target)
            .map_err(|e| e.error)
            .with_context(|| format!("failed to move snapshot to {}", target.display()))?;

        info!(repo, reference, path = %target.display(), "archived ref");
        Ok(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn store(root: &Path, format: &str) -> ArchiveStore {
        ArchiveStore::new(&ArchiveSettings {
            enabled: true,
            folder: root.to_path_buf(),
            format: format.to_string(),
        })
        .unwrap()
    }

    fn zip_names(path: &Path) -> Vec<String> {
        let mut zip = zip::ZipArchive::new(fs::File::open(path).unwrap()).unwrap();
        let mut names: Vec<String> = (0..zip.len())
            .map(|i| zip.by_index(i).unwrap().name().to_string())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn rejects_unknown_format() {
        let td = tempdir().unwrap();
        let settings = ArchiveSettings {
            enabled: true,
            folder: td.path().to_path_buf(),
            format: "cpio".into(),
        };
        assert!(ArchiveStore::new(&settings).is_err());
    }

    #[test]
    fn snapshot_path_layout() {
        let s = store(Path::new("/archive"), "tar.gz");
        assert_eq!(
            s.snapshot_path("github.com/owner/repo", "v1.0"),
            PathBuf::from("/archive/github.com/owner/repo/v1.0.tar.gz")
        );
    }

    #[test]
    fn exists_only_for_file_directly_under_repo_folder() {
        let td = tempdir().unwrap();
        let s = store(td.path(), "zip");
        let folder = td.path().join("host/repo");
        fs::create_dir_all(folder.join("nested")).unwrap();

        assert!(!s.exists("host/repo", "v1.0"));

        fs::write(folder.join("nested/v1.0.zip"), "x").unwrap();
        assert!(!s.exists("host/repo", "v1.0"));

        fs::write(folder.join("v1.0.tar"), "x").unwrap();
        assert!(!s.exists("host/repo", "v1.0"));

        fs::write(folder.join("v1.0.zip"), "x").unwrap();
        assert!(s.exists("host/repo", "v1.0"));
        assert!(!s.exists("host/repo", "v1.1"));
    }

    #[test]
    fn write_replaces_existing_snapshot() {
        let td = tempdir().unwrap();
        let root = td.path().join("archive");
        let src = td.path().join("work");
        fs::create_dir_all(&src).unwrap();
        fs::write(src.join("old.txt"), "old").unwrap();

        let s = store(&root, "zip");
        let first = s.write("host/repo", "main", &src).unwrap();
        assert_eq!(zip_names(&first), vec!["old.txt"]);

        fs::remove_file(src.join("old.txt")).unwrap();
        fs::write(src.join("new.txt"), "new").unwrap();
        let second = s.write("host/repo", "main", &src).unwrap();

        assert_eq!(first, second);
        assert_eq!(zip_names(&second), vec!["new.txt"]);
        let leftovers: Vec<_> = fs::read_dir(root.join("host/repo"))
            .unwrap()
            .flatten()
            .map(|e| e.file_name())
            .collect();
        assert_eq!(leftovers.len(), 1);
    }

    #[test]
    fn write_fails_for_missing_source() {
        let td = tempdir().unwrap();
        let s = store(&td.path().join("archive"), "zip");
        let err = s
            .write("host/repo", "main", &td.path().join("missing"))
            .unwrap_err();
        assert!(format!("{:#}", err).contains("failed to list"));
        assert!(!s.exists("host/repo", "main"));
    }

    #[test]
    fn write_creates_folders_for_slashed_references() {
        let td = tempdir().unwrap();
        let src = td.path().join("work");
        fs::create_dir_all(&src).unwrap();
        fs::write(src.join("a.txt"), "a").unwrap();

        let s = store(&td.path().join("archive"), "tar");
        let path = s.write("host/repo", "feature/x", &src).unwrap();
        assert!(path.ends_with("host/repo/feature/x.tar"));
        assert!(s.exists("host/repo", "feature/x"));
    }
}
