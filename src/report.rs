use colored::Colorize;
use std::fmt::Write;

use crate::backup::{BackupResults, Outcome};

/// Render results as one line per action plus a summary line.
///
/// ```text
/// success  backup   git-backup main
/// failed   archive  git-backup v2.0: tag v2.0 not found
/// 1 succeeded, 1 failed, 0 skipped
/// ```
pub fn render(results: &BackupResults) -> String {
    let mut out = String::new();
    for r in results {
        let outcome = format!("{:<8}", r.outcome.to_string());
        let outcome = match r.outcome {
            Outcome::Success => outcome.green(),
            Outcome::Failed => outcome.red(),
            Outcome::Skipped => outcome.yellow(),
        };
        let mut line = format!("{} {:<8} {}", outcome, r.kind.to_string(), r.name);
        if !r.reference.is_empty() {
            line.push(' ');
            line.push_str(&r.reference);
        }
        if !r.message.is_empty() {
            line.push_str(": ");
            line.push_str(&r.message);
        }
        let _ = writeln!(out, "{}", line.trim_end());
    }
    let _ = writeln!(
        out,
        "{} succeeded, {} failed, {} skipped",
        results.count(Outcome::Success),
        results.count(Outcome::Failed),
        results.count(Outcome::Skipped)
    );
    out
}
