//! Crate entry point for **git-backup**.
//!
//! This library provides the implementation behind the `git-backup` CLI:
//! keeping local mirrors of configured repositories and writing compressed
//! snapshots of selected branches and tags.
//!
//! The core is [`run`]: one pass over the configured repositories, each
//! handled by its own job whose failures are recorded as [`BackupResult`]s
//! instead of aborting the pass.

mod archive;
mod backup;
mod config;
mod git;
mod init;
mod list;
mod logging;
mod paths;
mod progress;
mod report;

/// Re-export commonly used types and commands so they can be accessed from `git_backup::*`.
pub use archive::{ArchiveFormat, ArchiveStore};
pub use backup::{
    BackupResult, BackupResults, Job, JobKind, Observer, Outcome, Workspace, cmd_run, run,
    run_with,
};
pub use config::{
    ArchiveRef, ArchiveSettings, BackupSettings, Config, RefKind, Repository, load_config,
    parse_config,
};
pub use git::Reference;
pub use init::cmd_init;
pub use list::cmd_list;
pub use logging::init_logging;
pub use paths::{config_home, nest, normalize_repo_path};
pub use report::render;
