use serde::Serialize;
use std::fmt;

/// What a result entry reports on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobKind {
    /// Preparing or opening the working copy.
    Init,
    /// Updating the persisted branch.
    Backup,
    /// Writing one snapshot.
    Archive,
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            JobKind::Init => "init",
            JobKind::Backup => "backup",
            JobKind::Archive => "archive",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Success,
    Failed,
    Skipped,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Outcome::Success => "success",
            Outcome::Failed => "failed",
            Outcome::Skipped => "skipped",
        })
    }
}

/// Outcome of one action on one repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackupResult {
    pub name: String,
    #[serde(rename = "ref")]
    pub reference: String,
    pub kind: JobKind,
    pub outcome: Outcome,
    pub message: String,
}

impl BackupResult {
    pub fn success(name: &str, kind: JobKind, reference: &str) -> Self {
        Self {
            name: name.to_string(),
            reference: reference.to_string(),
            kind,
            outcome: Outcome::Success,
            message: String::new(),
        }
    }

    pub fn skipped(name: &str, kind: JobKind, reference: &str, reason: &str) -> Self {
        Self {
            outcome: Outcome::Skipped,
            message: reason.to_string(),
            ..Self::success(name, kind, reference)
        }
    }

    /// The message carries the whole context chain of `err`.
    pub fn failed(name: &str, kind: JobKind, reference: &str, err: &anyhow::Error) -> Self {
        Self {
            outcome: Outcome::Failed,
            message: format!("{:#}", err),
            ..Self::success(name, kind, reference)
        }
    }
}

/// All results of one run, in processing order.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct BackupResults {
    results: Vec<BackupResult>,
}

impl BackupResults {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, result: BackupResult) {
        self.results.push(result);
    }

    pub fn extend(&mut self, results: impl IntoIterator<Item = BackupResult>) {
        self.results.extend(results);
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn as_slice(&self) -> &[BackupResult] {
        &self.results
    }

    pub fn iter(&self) -> std::slice::Iter<'_, BackupResult> {
        self.results.iter()
    }

    pub fn count(&self, outcome: Outcome) -> usize {
        self.results.iter().filter(|r| r.outcome == outcome).count()
    }

    pub fn has_failures(&self) -> bool {
        self.count(Outcome::Failed) > 0
    }

    /// Results recorded for the repository called `name`.
    pub fn for_repository<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a BackupResult> {
        self.results.iter().filter(move |r| r.name == name)
    }
}

impl<'a> IntoIterator for &'a BackupResults {
    type Item = &'a BackupResult;
    type IntoIter = std::slice::Iter<'a, BackupResult>;

    fn into_iter(self) -> Self::IntoIter {
        self.results.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{Context, anyhow};

    #[test]
    fn failed_keeps_context_chain() {
        let err = Err::<(), _>(anyhow!("connection refused"))
            .context("git fetch origin")
            .unwrap_err();
        let r = BackupResult::failed("repo", JobKind::Init, "", &err);
        assert_eq!(r.outcome, Outcome::Failed);
        assert_eq!(r.message, "git fetch origin: connection refused");
        assert!(r.reference.is_empty());
    }

    #[test]
    fn counts_by_outcome() {
        let mut results = BackupResults::new();
        results.push(BackupResult::skipped("a", JobKind::Backup, "", "temporary working copy"));
        results.extend([
            BackupResult::success("a", JobKind::Archive, "v1"),
            BackupResult::failed("b", JobKind::Init, "", &anyhow!("boom")),
        ]);
        assert_eq!(results.len(), 3);
        assert_eq!(results.count(Outcome::Success), 1);
        assert_eq!(results.count(Outcome::Skipped), 1);
        assert!(results.has_failures());
        assert_eq!(results.for_repository("a").count(), 2);
    }

    #[test]
    fn serializes_as_flat_list() {
        let mut results = BackupResults::new();
        results.push(BackupResult::success("a", JobKind::Archive, "v1.0"));
        let json = serde_json::to_value(&results).unwrap();
        assert_eq!(
            json,
            serde_json::json!([{
                "name": "a",
                "ref": "v1.0",
                "kind": "archive",
                "outcome": "success",
                "message": ""
            }])
        );
    }
}
