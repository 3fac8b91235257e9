use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::time::Duration;

use crate::backup::{BackupResult, Observer, Outcome};
use crate::config::Repository;

/// Spinner style used during ongoing operations.
/// - Yellow spinner with animated braille-style frames.
/// - Displays the current message (`{wide_msg}`) next to the spinner.
pub fn spinner_style() -> ProgressStyle {
    ProgressStyle::with_template("\x1b[33m{spinner}\x1b[0m {wide_msg}")
        .unwrap()
        .tick_strings(&["⣾", "⣽", "⣻", "⢿", "⡿", "⣟", "⣯", "⣷"])
}

/// Style used when an operation finishes successfully.
pub fn ok_style() -> ProgressStyle {
    ProgressStyle::with_template("\x1b[32m✔\x1b[0m {wide_msg}").unwrap()
}

/// Style used when an operation fails with an error.
pub fn err_style() -> ProgressStyle {
    ProgressStyle::with_template("\x1b[31m✘\x1b[0m {wide_msg}").unwrap()
}

/// One spinner line per repository, finished with ✔ or ✘.
pub struct Spinners {
    mp: MultiProgress,
    current: Option<ProgressBar>,
}

impl Spinners {
    pub fn new() -> Self {
        Self {
            mp: MultiProgress::new(),
            current: None,
        }
    }
}

impl Observer for Spinners {
    fn started(&mut self, repo: &Repository) {
        let pb = self.mp.add(ProgressBar::new_spinner());
        pb.set_style(spinner_style());
        pb.set_message(format!("processing {}", repo.name));
        pb.enable_steady_tick(Duration::from_millis(80));
        self.current = Some(pb);
    }

    fn finished(&mut self, repo: &Repository, results: &[BackupResult]) {
        let Some(pb) = self.current.take() else {
            return;
        };
        let failed = results
            .iter()
            .filter(|r| r.outcome == Outcome::Failed)
            .count();
        if failed == 0 {
            pb.set_style(ok_style());
            pb.finish_with_message(format!("{} ({} actions)", repo.name, results.len()));
        } else {
            pb.set_style(err_style());
            pb.finish_with_message(format!(
                "{} ({} of {} actions failed)",
                repo.name,
                failed,
                results.len()
            ));
        }
    }
}
