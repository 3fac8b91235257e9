use std::{
    env,
    path::{Component, Path, PathBuf},
};

/// Scheme prefixes removed from a remote location. At most one is stripped.
const SCHEMES: &[&str] = &["https://", "http://", "ssh://", "git://", "ftp://", "ftps://"];

const REPO_SUFFIX: &str = ".git";

#[derive(Clone)]
pub struct Paths {
    pub config: PathBuf,
}

/// Directory holding the git-backup configuration.
///
/// `$XDG_CONFIG_HOME/git-backup`, falling back to `$HOME/.config/git-backup`.
pub fn config_home() -> PathBuf {
    let xdg = env::var_os("XDG_CONFIG_HOME");
    let base = xdg
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(env::var_os("HOME").unwrap_or_default()).join(".config"));
    base.join("git-backup")
}

pub fn paths() -> Paths {
    Paths {
        config: config_home().join("config.toml"),
    }
}

/// Derive the on-disk sub-path for a repository from its remote location.
///
/// Removes a trailing `.git` and then one leading protocol scheme. Both trims
/// are anchored, so text embedded elsewhere in the location is left alone:
///
/// ```text
/// https://github.com/owner/repo.git  -> github.com/owner/repo
/// github.com/owner/repo.git          -> github.com/owner/repo
/// bad://http://host/repo.git.bak     -> bad://http://host/repo.git.bak
/// ```
pub fn normalize_repo_path(location: &str) -> String {
    let trimmed = location.strip_suffix(REPO_SUFFIX).unwrap_or(location);
    SCHEMES
        .iter()
        .find_map(|scheme| trimmed.strip_prefix(scheme))
        .unwrap_or(trimmed)
        .to_string()
}

/// Join `sub` beneath `root`, keeping only its normal components.
///
/// Root markers, drive prefixes, `.` and `..` are dropped so the result
/// always stays inside `root`, even for absolute local remotes.
pub fn nest(root: &Path, sub: &str) -> PathBuf {
    let mut out = root.to_path_buf();
    for c in Path::new(sub).components() {
        if let Component::Normal(part) = c {
            out.push(part);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const PRUNED: &str = "github.com/jordan-thirus/git-backup";

    #[test]
    fn strips_every_known_scheme_and_suffix() {
        for scheme in SCHEMES {
            let location = format!("{}{}.git", scheme, PRUNED);
            assert_eq!(normalize_repo_path(&location), PRUNED, "{}", scheme);
        }
    }

    #[test]
    fn strips_scheme_without_suffix() {
        assert_eq!(
            normalize_repo_path("http://github.com/jordan-thirus/git-backup"),
            PRUNED
        );
    }

    #[test]
    fn strips_suffix_without_scheme() {
        assert_eq!(
            normalize_repo_path("github.com/jordan-thirus/git-backup.git"),
            PRUNED
        );
        assert_eq!(normalize_repo_path("host/repo.git"), "host/repo");
    }

    #[test]
    fn leaves_embedded_scheme_and_suffix_alone() {
        let nested = "bad://http://github.com/jordan-thirus/git-backup.git.bak";
        assert_eq!(normalize_repo_path(nested), nested);
    }

    #[test]
    fn strips_at_most_one_scheme() {
        assert_eq!(
            normalize_repo_path("https://http://host/repo.git"),
            "http://host/repo"
        );
        assert_eq!(normalize_repo_path("host/repo.git.git"), "host/repo.git");
    }

    #[test]
    fn nest_keeps_absolute_locations_under_root() {
        let root = Path::new("/var/backup");
        assert_eq!(
            nest(root, "/srv/git/repo"),
            PathBuf::from("/var/backup/srv/git/repo")
        );
        assert_eq!(
            nest(root, "../../etc/./passwd"),
            PathBuf::from("/var/backup/etc/passwd")
        );
        assert_eq!(
            nest(root, "github.com/owner/repo"),
            PathBuf::from("/var/backup/github.com/owner/repo")
        );
    }
}
