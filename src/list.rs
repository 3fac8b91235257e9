use anyhow::Result;
use std::path::Path;

use crate::config::{Config, RefKind, load_config};
use crate::paths::{nest, normalize_repo_path};

/// CLI command: print the configured repositories.
///
/// Example output:
/// ```text
/// - git-backup (https://github.com/jordan-thirus/git-backup.git)
///   working copy: ./backup/github.com/jordan-thirus/git-backup [branch main]
///   archive: v1.0, main (branch) -> ./archive/github.com/jordan-thirus/git-backup
/// ```
///
/// # Errors
/// Returns an error if the configuration cannot be loaded or is invalid.
pub fn cmd_list(config: Option<&Path>) -> Result<()> {
    let cfg = load_config(config)?;
    if cfg.repositories.is_empty() {
        eprintln!("no repositories configured");
    }
    for line in describe(&cfg) {
        println!("{}", line);
    }
    Ok(())
}

fn describe(cfg: &Config) -> Vec<String> {
    let mut lines = Vec::new();
    for repo in &cfg.repositories {
        let trimmed = normalize_repo_path(&repo.path);
        lines.push(format!("- {} ({})", repo.name, repo.path));

        if repo.uses_temporary_copy(&cfg.backup) {
            lines.push("  working copy: temporary".to_string());
        } else {
            lines.push(format!(
                "  working copy: {} [branch {}]",
                nest(&cfg.backup.folder, &trimmed).display(),
                repo.branch
            ));
        }

        if !repo.archive_refs.is_empty() {
            let refs: Vec<String> = repo
                .archive_refs
                .iter()
                .map(|r| match r.kind {
                    Some(RefKind::Branch) => format!("{} (branch)", r.name),
                    Some(RefKind::Tag) => format!("{} (tag)", r.name),
                    None => r.name.clone(),
                })
                .collect();
            let state = if cfg.archive.enabled { "" } else { " [disabled]" };
            lines.push(format!(
                "  archive: {} -> {}{}",
                refs.join(", "),
                nest(&cfg.archive.folder, &trimmed).display(),
                state
            ));
        }
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_config;

    #[test]
    fn describes_modes_and_refs() {
        let cfg = parse_config(
            r#"
[backup]
folder = "/b"
[archive]
folder = "/a"
[[repositories]]
name = "kept"
path = "https://host/kept.git"
branch = "main"
archive_refs = ["v1", { name = "dev", kind = "branch" }]
[[repositories]]
name = "throwaway"
path = "git://host/throwaway"
archive_only = true
"#,
        )
        .unwrap();

        assert_eq!(
            describe(&cfg),
            vec![
                "- kept (https://host/kept.git)",
                "  working copy: /b/host/kept [branch main]",
                "  archive: v1, dev (branch) -> /a/host/kept",
                "- throwaway (git://host/throwaway)",
                "  working copy: temporary",
            ]
        );
    }
}
