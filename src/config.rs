use anyhow::{Context, Result, anyhow, bail};
use serde::Deserialize;
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::archive::ArchiveFormat;
use crate::paths::{normalize_repo_path, paths};

/// Top-level configuration structure loaded from `config.toml`.
///
/// Every section is optional; missing values fall back to the defaults
/// (backups and archives enabled under `./backup` and `./archive`, zip format).
///
/// Example TOML:
/// ```toml
/// [backup]
/// folder = "/var/backup/git"
///
/// [archive]
/// folder = "/var/archive/git"
/// format = "tar.gz"
///
/// [[repositories]]
/// name         = "git-backup"
/// path         = "https://github.com/jordan-thirus/git-backup.git"
/// branch       = "main"
/// archive_refs = ["v1.0", { name = "develop", kind = "branch" }]
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub backup: BackupSettings,
    #[serde(default)]
    pub archive: ArchiveSettings,
    #[serde(default)]
    pub repositories: Vec<Repository>,
}

/// Settings for persistent working copies.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BackupSettings {
    pub enabled: bool,
    pub folder: PathBuf,
    /// Parent directory for temporary working copies. System temp dir if unset.
    pub scratch: Option<PathBuf>,
}

impl Default for BackupSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            folder: PathBuf::from("./backup"),
            scratch: None,
        }
    }
}

/// Settings for compressed snapshots.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ArchiveSettings {
    pub enabled: bool,
    pub folder: PathBuf,
    pub format: String,
}

impl Default for ArchiveSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            folder: PathBuf::from("./archive"),
            format: "zip".to_string(),
        }
    }
}

/// A single `[[repositories]]` entry.
#[derive(Debug, Clone, Deserialize)]
pub struct Repository {
    pub name: String,
    pub path: String,
    #[serde(default)]
    pub branch: String,
    #[serde(default)]
    pub archive_only: bool,
    #[serde(default)]
    pub archive_refs: Vec<ArchiveRef>,
}

impl Repository {
    /// Whether this repository is processed in a disposable working copy.
    pub fn uses_temporary_copy(&self, backup: &BackupSettings) -> bool {
        !backup.enabled || self.archive_only
    }
}

/// Kind of a reference named in `archive_refs`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RefKind {
    Branch,
    Tag,
}

/// A reference to snapshot. Written either as a bare name or as
/// `{ name = "...", kind = "branch" | "tag" }`. Without a kind, the kind is
/// looked up in the opened repository.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "RawArchiveRef")]
pub struct ArchiveRef {
    pub name: String,
    pub kind: Option<RefKind>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawArchiveRef {
    Name(String),
    Detailed {
        name: String,
        #[serde(default)]
        kind: Option<RefKind>,
    },
}

impl From<RawArchiveRef> for ArchiveRef {
    fn from(raw: RawArchiveRef) -> Self {
        match raw {
            RawArchiveRef::Name(name) => ArchiveRef { name, kind: None },
            RawArchiveRef::Detailed { name, kind } => ArchiveRef { name, kind },
        }
    }
}

/// Parse a TOML document into a [`Config`] without validating it.
pub fn parse_config(txt: &str) -> Result<Config> {
    toml::from_str(txt).context("failed to parse configuration")
}

/// Load, override and validate the configuration.
///
/// Resolution order for the file:
/// 1. `explicit` (the `--config` flag)
/// 2. `GB_CONFIG` environment variable
/// 3. `config.toml` in [`crate::paths::config_home`]
///
/// # Errors
/// - The file named by 1. or 2. is missing or unreadable.
/// - The file cannot be parsed.
/// - An environment override has an invalid value.
/// - Validation fails (see [`Config::validate`]).
///
/// # Notes
/// - A missing default file is not an error; the built-in defaults are used.
pub fn load_config(explicit: Option<&Path>) -> Result<Config> {
    let (path, required) = match explicit {
        Some(p) => (p.to_path_buf(), true),
        None => match env::var_os("GB_CONFIG") {
            Some(p) if !p.is_empty() => (PathBuf::from(p), true),
            _ => (paths().config, false),
        },
    };

    let mut cfg = if required || path.exists() {
        let txt = fs::read_to_string(&path)
            .with_context(|| format!("config not found: {}", path.display()))?;
        parse_config(&txt).with_context(|| format!("invalid config: {}", path.display()))?
    } else {
        debug!(path = %path.display(), "no config file, using defaults");
        Config::default()
    };

    cfg.apply_overrides(|key| env::var(key).ok())?;
    cfg.validate()?;
    debug!(config = ?cfg, "configuration read");
    Ok(cfg)
}

impl Config {
    /// Apply `GB_*` overrides. `lookup` returns the value of a variable, if set.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(v) = lookup("GB_BACKUP_ENABLED") {
            self.backup.enabled = parse_bool("GB_BACKUP_ENABLED", &v)?;
        }
        if let Some(v) = lookup("GB_BACKUP_FOLDER") {
            self.backup.folder = PathBuf::from(v);
        }
        if let Some(v) = lookup("GB_ARCHIVE_ENABLED") {
            self.archive.enabled = parse_bool("GB_ARCHIVE_ENABLED", &v)?;
        }
        if let Some(v) = lookup("GB_ARCHIVE_FOLDER") {
            self.archive.folder = PathBuf::from(v);
        }
        if let Some(v) = lookup("GB_ARCHIVE_FORMAT") {
            self.archive.format = v;
        }
        Ok(())
    }

    /// Reject configurations the runner cannot process safely.
    ///
    /// # Errors
    /// - Unknown archive format.
    /// - A repository without `name` or `path`, or a duplicated `name`.
    /// - A persistent repository without `branch`.
    /// - Two persistent repositories sharing one working-copy path.
    pub fn validate(&self) -> Result<()> {
        self.archive.format.parse::<ArchiveFormat>()?;

        let mut names: HashMap<&str, usize> = HashMap::new();
        let mut persistent: HashMap<String, &str> = HashMap::new();
        for (idx, repo) in self.repositories.iter().enumerate() {
            if repo.name.trim().is_empty() {
                bail!("repository #{} has no name", idx + 1);
            }
            if repo.path.trim().is_empty() {
                bail!("repository {} has no path", repo.name);
            }
            if names.insert(repo.name.as_str(), idx).is_some() {
                bail!("repository name {} is used more than once", repo.name);
            }
            if !repo.uses_temporary_copy(&self.backup) {
                if repo.branch.trim().is_empty() {
                    bail!("repository {} keeps a working copy but has no branch", repo.name);
                }
                let trimmed = normalize_repo_path(&repo.path);
                if let Some(other) = persistent.insert(trimmed.clone(), &repo.name) {
                    bail!(
                        "repositories {} and {} share the backup path {}",
                        other,
                        repo.name,
                        trimmed
                    );
                }
            }
        }
        Ok(())
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        other => Err(anyhow!("{}: expected a boolean, got {:?}", key, other)),
    }
}
