#![allow(dead_code)]

use git2::{Commit, Oid, Repository, RepositoryInitOptions, Signature};
use std::fs;
use std::path::{Path, PathBuf};

use git_backup::{Config, nest, normalize_repo_path, parse_config};

/// A local repository standing in for a remote.
pub struct Origin {
    pub repo: Repository,
    pub dir: PathBuf,
}

impl Origin {
    pub fn init(dir: &Path) -> Self {
        let mut opts = RepositoryInitOptions::new();
        opts.initial_head("main");
        let repo = Repository::init_opts(dir, &opts).unwrap();
        Origin {
            repo,
            dir: dir.to_path_buf(),
        }
    }

    pub fn url(&self) -> String {
        self.dir.to_string_lossy().into_owned()
    }

    pub fn commit(&self, file: &str, body: &str) -> Oid {
        fs::write(self.dir.join(file), body).unwrap();
        let mut index = self.repo.index().unwrap();
        index.add_path(Path::new(file)).unwrap();
        index.write().unwrap();
        let tree = self.repo.find_tree(index.write_tree().unwrap()).unwrap();
        let sig = Signature::now("tester", "tester@example.com").unwrap();
        let parents: Vec<Commit> = self
            .repo
            .head()
            .ok()
            .and_then(|h| h.peel_to_commit().ok())
            .into_iter()
            .collect();
        let parent_refs: Vec<&Commit> = parents.iter().collect();
        self.repo
            .commit(Some("HEAD"), &sig, &sig, file, &tree, &parent_refs)
            .unwrap()
    }

    pub fn tag(&self, name: &str, target: Oid) {
        let obj = self.repo.find_object(target, None).unwrap();
        self.repo.tag_lightweight(name, &obj, false).unwrap();
    }
}

/// Parse `body` after a header pointing backup, scratch and archive folders
/// into `root`.
pub fn config(root: &Path, backup_enabled: bool, format: &str, body: &str) -> Config {
    let txt = format!(
        r#"
[backup]
enabled = {backup_enabled}
folder = '{backup}'
scratch = '{scratch}'

[archive]
folder = '{archive}'
format = '{format}'

{body}
"#,
        backup = root.join("backup").display(),
        scratch = root.join("scratch").display(),
        archive = root.join("archive").display(),
    );
    let cfg = parse_config(&txt).unwrap();
    cfg.validate().unwrap();
    cfg
}

pub fn snapshot(root: &Path, origin: &Origin, reference: &str, format: &str) -> PathBuf {
    nest(&root.join("archive"), &normalize_repo_path(&origin.url()))
        .join(format!("{}.{}", reference, format))
}

pub fn zip_names(path: &Path) -> Vec<String> {
    let mut zip = zip::ZipArchive::new(fs::File::open(path).unwrap()).unwrap();
    let mut names: Vec<String> = (0..zip.len())
        .map(|i| zip.by_index(i).unwrap().name().to_string())
        .collect();
    names.sort();
    names
}
