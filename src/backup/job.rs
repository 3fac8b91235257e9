use anyhow::{Context, Result};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, error, info, warn};

use crate::archive::ArchiveStore;
use crate::config::{ArchiveRef, BackupSettings, RefKind, Repository};
use crate::git::{self, Reference};
use crate::paths::{nest, normalize_repo_path};

use super::results::{BackupResult, JobKind};

/// Where a job keeps its working copy. `temp` is set for disposable copies
/// and owns the directory until the job is cleaned.
struct WorkingCopy {
    path: PathBuf,
    temp: Option<TempDir>,
}

/// A repository whose working copy has been allocated but not opened yet.
pub struct Workspace<'a> {
    def: &'a Repository,
    copy: WorkingCopy,
    trimmed: String,
}

impl<'a> Workspace<'a> {
    /// Allocate the working copy for `def`.
    ///
    /// - Temporary (backups disabled or `archive_only`): a fresh directory
    ///   under the scratch root, removed when the job ends.
    /// - Persistent: `<backup folder>/<normalized path>`, created if absent
    ///   and reused by later runs.
    ///
    /// # Errors
    /// Returns an error if the directory cannot be created.
    pub fn new(backup: &BackupSettings, def: &'a Repository) -> Result<Self> {
        let trimmed = normalize_repo_path(&def.path);

        let copy = if def.uses_temporary_copy(backup) {
            let scratch = backup.scratch.clone().unwrap_or_else(env::temp_dir);
            fs::create_dir_all(&scratch)
                .with_context(|| format!("failed to create {}", scratch.display()))?;
            let dir = tempfile::Builder::new()
                .prefix(&format!("{}-", dir_prefix(&def.name)))
                .tempdir_in(&scratch)
                .with_context(|| format!("failed to create a working copy in {}", scratch.display()))?;
            WorkingCopy {
                path: dir.path().to_path_buf(),
                temp: Some(dir),
            }
        } else {
            let path = nest(&backup.folder, &trimmed);
            fs::create_dir_all(&path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            WorkingCopy { path, temp: None }
        };

        debug!(
            repo = %def.name,
            path = %copy.path.display(),
            temporary = copy.temp.is_some(),
            "working copy ready"
        );
        Ok(Self { def, copy, trimmed })
    }

    pub fn path(&self) -> &Path {
        &self.copy.path
    }

    pub fn is_temporary(&self) -> bool {
        self.copy.temp.is_some()
    }

    /// Clone or open the working copy, then fetch `origin`.
    ///
    /// A failed fetch is logged and tolerated: the job continues with the
    /// references already present locally.
    ///
    /// # Errors
    /// Returns an error if cloning or opening fails.
    pub fn open(self, store: &'a ArchiveStore) -> Result<Job<'a>> {
        let repo = git::open_or_clone(&self.def.path, &self.copy.path).inspect_err(|e| {
            error!(repo = %self.def.name, error = %format!("{:#}", e), "open failed");
        })?;

        if let Err(e) = git::fetch_origin(&repo) {
            warn!(repo = %self.def.name, error = %format!("{:#}", e), "fetch failed, using local refs");
        }

        Ok(Job {
            def: self.def,
            copy: self.copy,
            trimmed: self.trimmed,
            repo,
            store,
        })
    }
}

/// An opened working copy. Dropping the job cleans it up: temporary copies
/// are deleted, persistent ones pruned.
pub struct Job<'a> {
    def: &'a Repository,
    copy: WorkingCopy,
    trimmed: String,
    repo: git2::Repository,
    store: &'a ArchiveStore,
}

impl Job<'_> {
    pub fn is_temporary(&self) -> bool {
        self.copy.temp.is_some()
    }

    /// Check out `reference` in the working copy.
    pub fn checkout(&self, reference: &Reference) -> Result<git2::Oid> {
        git::checkout(&self.repo, reference)
    }

    /// Update the persisted branch. Skipped for temporary copies since
    /// nothing outlives them.
    pub fn backup(&self) -> BackupResult {
        let name = &self.def.name;
        if self.is_temporary() {
            debug!(repo = %name, "temporary working copy, skipping backup");
            return BackupResult::skipped(name, JobKind::Backup, "", "temporary working copy");
        }

        let branch = Reference::Branch(self.def.branch.clone());
        match self.checkout(&branch) {
            Ok(head) => {
                info!(repo = %name, branch = %self.def.branch, head = %head, "backed up");
                BackupResult::success(name, JobKind::Backup, &self.def.branch)
            }
            Err(e) => {
                error!(repo = %name, branch = %self.def.branch, error = %format!("{:#}", e), "backup failed");
                BackupResult::failed(name, JobKind::Backup, &self.def.branch, &e)
            }
        }
    }

    /// Snapshot every configured reference. One result per reference, in
    /// configuration order.
    pub fn archive(&self) -> Vec<BackupResult> {
        self.def
            .archive_refs
            .iter()
            .map(|r| self.archive_ref(r))
            .collect()
    }

    fn archive_ref(&self, archive_ref: &ArchiveRef) -> BackupResult {
        let name = &self.def.name;
        let ref_name = &archive_ref.name;
        if !self.store.enabled() {
            return BackupResult::skipped(name, JobKind::Archive, ref_name, "archiving disabled");
        }

        let reference = self.resolve(archive_ref);
        debug!(repo = %name, reference = %reference, "attempting to archive");

        // Tags never move, so an existing snapshot is final. Branches are
        // archived again on every run.
        if reference.is_tag() && self.store.exists(&self.trimmed, ref_name) {
            info!(repo = %self.trimmed, reference = %ref_name, "skipping archive of existing ref");
            return BackupResult::skipped(name, JobKind::Archive, ref_name, "snapshot exists");
        }

        let written = self
            .checkout(&reference)
            .and_then(|_| self.store.write(&self.trimmed, ref_name, &self.copy.path));
        match written {
            Ok(_) => BackupResult::success(name, JobKind::Archive, ref_name),
            Err(e) => {
                warn!(
                    repo = %self.trimmed,
                    reference = %ref_name,
                    error = %format!("{:#}", e),
                    "failed to archive"
                );
                BackupResult::failed(name, JobKind::Archive, ref_name, &e)
            }
        }
    }

    fn resolve(&self, archive_ref: &ArchiveRef) -> Reference {
        let name = archive_ref.name.clone();
        match archive_ref.kind {
            Some(RefKind::Tag) => Reference::Tag(name),
            Some(RefKind::Branch) => Reference::Branch(name),
            None if git::has_tag(&self.repo, &name) => Reference::Tag(name),
            None => Reference::Branch(name),
        }
    }

    fn clean(&mut self) {
        match self.copy.temp.take() {
            Some(dir) => {
                debug!(repo = %self.def.name, path = %self.copy.path.display(), "removing working copy");
                if let Err(e) = dir.close() {
                    warn!(path = %self.copy.path.display(), error = %e, "failed to remove working copy");
                }
            }
            None => match git::prune_loose_objects(&self.repo) {
                Ok(removed) => debug!(repo = %self.def.name, removed, "pruned working copy"),
                Err(e) => {
                    warn!(repo = %self.def.name, error = %format!("{:#}", e), "prune failed")
                }
            },
        }
    }
}

impl Drop for Job<'_> {
    fn drop(&mut self) {
        self.clean();
    }
}

/// File-name-safe form of a repository name, for temporary directory names.
fn dir_prefix(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
                c
            } else {
                '-'
            }
        })
        .collect()
}
