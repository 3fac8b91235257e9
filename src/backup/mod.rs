mod job;
mod results;

use anyhow::{Result, bail};
use std::path::Path;
use tracing::{error, info};

use crate::archive::ArchiveStore;
use crate::config::{Config, Repository, load_config};
use crate::progress::Spinners;
use crate::report::render;

pub use job::{Job, Workspace};
pub use results::{BackupResult, BackupResults, JobKind, Outcome};

/// Hooks called around each repository of a run.
pub trait Observer {
    fn started(&mut self, _repo: &Repository) {}
    fn finished(&mut self, _repo: &Repository, _results: &[BackupResult]) {}
}

impl Observer for () {}

/// Run one full pass over `cfg.repositories`.
pub fn run(cfg: &Config, store: &ArchiveStore) -> BackupResults {
    run_with(cfg, store, &mut ())
}

/// Like [`run`], reporting progress to `observer`.
///
/// Repositories are processed one at a time, in configuration order. A
/// repository that cannot be prepared or opened gets a single failed `init`
/// result; the others are unaffected. Each opened repository yields one
/// backup result followed by one archive result per configured reference,
/// and its working copy is cleaned before the next repository starts.
pub fn run_with(cfg: &Config, store: &ArchiveStore, observer: &mut impl Observer) -> BackupResults {
    let mut results = BackupResults::new();
    for def in &cfg.repositories {
        info!(repo = %def.name, "processing");
        observer.started(def);

        let start = results.len();
        process(cfg, store, def, &mut results);

        observer.finished(def, &results.as_slice()[start..]);
    }
    results
}

fn process(cfg: &Config, store: &ArchiveStore, def: &Repository, results: &mut BackupResults) {
    let job = match Workspace::new(&cfg.backup, def).and_then(|ws| ws.open(store)) {
        Ok(job) => job,
        Err(e) => {
            error!(repo = %def.name, error = %format!("{:#}", e), "failed to initialize");
            results.push(BackupResult::failed(&def.name, JobKind::Init, "", &e));
            return;
        }
    };

    results.push(job.backup());
    results.extend(job.archive());
}

/// CLI command: run a one-time backup and archive.
///
/// Prints one progress line per repository, then the result list (as JSON
/// when `json` is set).
///
/// # Errors
/// - Returns an error if the configuration cannot be loaded or is invalid.
/// - Returns an error after printing the results if any action failed.
pub fn cmd_run(config: Option<&Path>, json: bool) -> Result<()> {
    let cfg = load_config(config)?;
    if cfg.repositories.is_empty() {
        eprintln!("no repositories configured");
        return Ok(());
    }

    let store = ArchiveStore::new(&cfg.archive)?;
    let mut spinners = Spinners::new();
    let results = run_with(&cfg, &store, &mut spinners);
    info!(results = results.len(), "run complete");

    if json {
        println!("{}", serde_json::to_string_pretty(&results)?);
    } else {
        print!("{}", render(&results));
    }

    if results.has_failures() {
        bail!(
            "{} of {} actions failed",
            results.count(Outcome::Failed),
            results.len()
        );
    }
    Ok(())
}
