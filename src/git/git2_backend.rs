use anyhow::{Context, Result, anyhow, bail};
use git2::{
    AutotagOption, BranchType, Commit, Cred, ErrorCode, FetchOptions, FetchPrune, ObjectType, Oid,
    RemoteCallbacks, Repository, build::CheckoutBuilder, build::RepoBuilder,
};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

use super::Reference;

/// Build a `FetchOptions` with SSH-agent credentials enabled.
///
/// This allows Git operations to authenticate using the user's SSH agent.
/// If no SSH key is found, it falls back to default credentials.
fn fetch_opts_with_creds() -> FetchOptions<'static> {
    let mut cb = RemoteCallbacks::new();
    cb.credentials(|_url, username_from_url, _allowed| {
        Cred::ssh_key_from_agent(username_from_url.unwrap_or("git")).or_else(|_| Cred::default())
    });

    let mut fo = FetchOptions::new();
    fo.remote_callbacks(cb);
    fo
}

/// Forced checkout that also drops untracked files, so the worktree holds
/// exactly the target tree.
fn force_checkout() -> CheckoutBuilder<'static> {
    let mut cb = CheckoutBuilder::new();
    cb.force().remove_untracked(true);
    cb
}

/// Open the repository at `dest`, or clone `url` into it when there is none.
///
/// `dest` may already exist as an empty directory.
///
/// # Errors
/// Returns an error if `dest` holds something other than a repository, or if
/// opening or cloning fails.
pub fn open_or_clone(url: &str, dest: &Path) -> Result<Repository> {
    match Repository::open(dest) {
        Ok(repo) => {
            debug!(path = %dest.display(), "opened existing working copy");
            Ok(repo)
        }
        Err(e) if e.code() == ErrorCode::NotFound => {
            debug!(url, path = %dest.display(), "cloning");
            let mut builder = RepoBuilder::new();
            builder.fetch_options(fetch_opts_with_creds());
            builder
                .clone(url, dest)
                .with_context(|| format!("git clone {}", url))
        }
        Err(e) => Err(e).with_context(|| format!("git open {}", dest.display())),
    }
}

/// Perform `git fetch --prune origin` for all branches and tags.
///
/// Branches land in `refs/remotes/origin/*`, tags in `refs/tags/*`.
///
/// # Errors
/// Returns an error if there is no `origin` remote or the fetch fails.
pub fn fetch_origin(repo: &Repository) -> Result<()> {
    let mut fo = fetch_opts_with_creds();
    fo.prune(FetchPrune::On);
    fo.download_tags(AutotagOption::All);

    let mut remote = repo.find_remote("origin").context("no origin remote")?;
    remote
        .fetch(
            &[
                "+refs/heads/*:refs/remotes/origin/*",
                "+refs/tags/*:refs/tags/*",
            ],
            Some(&mut fo),
            None,
        )
        .context("git fetch origin")?;
    Ok(())
}

fn fetch_refspec(repo: &Repository, refspec: &str) -> Result<()> {
    let mut fo = fetch_opts_with_creds();
    let mut remote = repo.find_remote("origin").context("no origin remote")?;
    remote
        .fetch(&[refspec], Some(&mut fo), None)
        .with_context(|| format!("git fetch origin {}", refspec))?;
    Ok(())
}

/// Whether `refs/tags/<name>` exists locally.
pub fn has_tag(repo: &Repository, name: &str) -> bool {
    repo.find_reference(&format!("refs/tags/{}", name)).is_ok()
}

/// Check out `reference` and return the commit HEAD points at afterwards.
///
/// - Branch: attach to `refs/heads/<name>` (fetching it from `origin` first
///   when it is missing locally), then fast-forward it from `origin`.
/// - Tag: attach to a local `<name>-branch` created at the tagged commit.
///   Tags are never checked out detached.
///
/// # Errors
/// Returns an error if the reference cannot be resolved, the checkout or
/// pull fails, or HEAD does not end up on the requested branch.
pub fn checkout(repo: &Repository, reference: &Reference) -> Result<Oid> {
    match reference {
        Reference::Branch(name) => checkout_branch(repo, name),
        Reference::Tag(name) => checkout_tag(repo, name),
    }
}

fn switch_to(repo: &Repository, refname: &str, commit: &Commit) -> Result<()> {
    repo.checkout_tree(commit.as_object(), Some(&mut force_checkout()))?;
    repo.set_head(refname)?;
    Ok(())
}

fn checkout_branch(repo: &Repository, name: &str) -> Result<Oid> {
    let refname = format!("refs/heads/{}", name);

    let local = match repo.find_reference(&refname) {
        Ok(r) => r,
        Err(_) => {
            debug!(branch = name, "branch missing locally, fetching from origin");
            fetch_refspec(repo, &format!("+{0}:{0}", refname))?;
            repo.find_reference(&refname)
                .with_context(|| format!("branch {} not found", name))?
        }
    };
    let commit = local.peel_to_commit()?;

    debug!(branch = name, "checking out branch");
    switch_to(repo, &refname, &commit)
        .with_context(|| format!("checkout of branch {} failed", name))?;
    pull(repo, name).with_context(|| format!("pull of branch {} failed", name))?;

    let head = repo.head().context("HEAD missing after checkout")?;
    if head.name() != Some(refname.as_str()) {
        bail!(
            "HEAD is {} after checking out {}",
            head.name().unwrap_or("<detached>"),
            refname
        );
    }
    Ok(head.peel_to_commit()?.id())
}

/// Fast-forward the checked-out branch `name` to its `origin` counterpart.
fn pull(repo: &Repository, name: &str) -> Result<()> {
    let tracking = format!("refs/remotes/origin/{}", name);
    fetch_refspec(repo, &format!("+refs/heads/{}:{}", name, tracking))?;

    let remote_tip = repo
        .find_reference(&tracking)
        .with_context(|| format!("{} not found", tracking))?
        .peel_to_commit()?;
    let mut local = repo.find_reference(&format!("refs/heads/{}", name))?;
    let local_id = local.peel_to_commit()?.id();

    if local_id == remote_tip.id() || repo.graph_descendant_of(local_id, remote_tip.id())? {
        return Ok(());
    }
    if !repo.graph_descendant_of(remote_tip.id(), local_id)? {
        bail!(
            "non-fast-forward update from {} to {}",
            local_id,
            remote_tip.id()
        );
    }

    repo.checkout_tree(remote_tip.as_object(), Some(&mut force_checkout()))?;
    local.set_target(remote_tip.id(), &format!("pull: fast-forward {}", name))?;
    debug!(branch = name, from = %local_id, to = %remote_tip.id(), "fast-forwarded");
    Ok(())
}

fn checkout_tag(repo: &Repository, name: &str) -> Result<Oid> {
    let commit = repo
        .revparse_single(&format!("refs/tags/{}", name))
        .with_context(|| format!("tag {} not found", name))?
        .peel_to_commit()
        .map_err(|_| anyhow!("tag {} didn't peel to a commit", name))?;

    let branch_name = format!("{}-branch", name);
    let mut branch = match repo.find_branch(&branch_name, BranchType::Local) {
        Ok(b) => b,
        Err(_) => repo.branch(&branch_name, &commit, false)?,
    };
    if branch.get().target() != Some(commit.id()) {
        warn!(tag = name, branch = %branch_name, "tag moved, resetting branch");
        branch
            .get_mut()
            .set_target(commit.id(), &format!("reset to tag {}", name))?;
    }

    let refname = branch
        .get()
        .name()
        .ok_or_else(|| anyhow!("invalid reference name"))?
        .to_string();
    debug!(tag = name, branch = %branch_name, "checking out tag");
    switch_to(repo, &refname, &commit).with_context(|| format!("checkout of tag {} failed", name))?;
    Ok(commit.id())
}

/// Delete loose objects not reachable from any reference, HEAD or the index.
/// Packed objects are left alone. Returns the number of objects removed.
///
/// # Errors
/// Returns an error if the object graph cannot be walked or a file cannot be
/// removed.
pub fn prune_loose_objects(repo: &Repository) -> Result<usize> {
    let reachable = reachable_objects(repo)?;
    let objects = repo.path().join("objects");

    let mut removed = 0;
    for dir in fs::read_dir(&objects)?.flatten() {
        let prefix = dir.file_name().to_string_lossy().into_owned();
        if prefix.len() != 2 || !prefix.chars().all(|c| c.is_ascii_hexdigit()) {
            continue;
        }
        for obj in fs::read_dir(dir.path())?.flatten() {
            let rest = obj.file_name().to_string_lossy().into_owned();
            if rest.len() != 38 {
                continue;
            }
            let Ok(oid) = Oid::from_str(&format!("{}{}", prefix, rest)) else {
                continue;
            };
            if !reachable.contains(&oid) {
                fs::remove_file(obj.path())
                    .with_context(|| format!("failed to remove object {}", oid))?;
                removed += 1;
            }
        }
    }
    Ok(removed)
}

fn reachable_objects(repo: &Repository) -> Result<HashSet<Oid>> {
    let mut seen = HashSet::new();
    let mut walk = repo.revwalk()?;

    if let Some(oid) = repo.head().ok().and_then(|h| h.target()) {
        walk.push(oid)?;
    }

    for r in repo.references()? {
        let Some(oid) = r?.target() else {
            continue;
        };
        let mut obj = repo.find_object(oid, None)?;
        loop {
            match obj.kind() {
                Some(ObjectType::Tag) => {
                    seen.insert(obj.id());
                    let target = obj
                        .as_tag()
                        .ok_or_else(|| anyhow!("object {} is not a tag", obj.id()))?
                        .target()?;
                    obj = target;
                }
                Some(ObjectType::Commit) => {
                    walk.push(obj.id())?;
                    break;
                }
                Some(ObjectType::Tree) => {
                    mark_tree(repo, obj.id(), &mut seen)?;
                    break;
                }
                _ => {
                    seen.insert(obj.id());
                    break;
                }
            }
        }
    }

    for oid in walk {
        let commit = repo.find_commit(oid?)?;
        seen.insert(commit.id());
        mark_tree(repo, commit.tree_id(), &mut seen)?;
    }

    if let Ok(index) = repo.index() {
        for entry in index.iter() {
            seen.insert(entry.id);
        }
    }
    Ok(seen)
}

fn mark_tree(repo: &Repository, id: Oid, seen: &mut HashSet<Oid>) -> Result<()> {
    if !seen.insert(id) {
        return Ok(());
    }
    let tree = repo.find_tree(id)?;
    for entry in tree.iter() {
        match entry.kind() {
            Some(ObjectType::Tree) => mark_tree(repo, entry.id(), seen)?,
            _ => {
                seen.insert(entry.id());
            }
        }
    }
    Ok(())
}
