//! Progress tracking and reporting

use indicatif::{ProgressBar, ProgressStyle};
use std::cell::Cell;
use std::time::Duration;

/// Spinner on stderr with running entry counts
pub struct ProgressTracker {
    progress_bar: ProgressBar,
    files_seen: Cell<u64>,
    directories_seen: Cell<u64>,
}

impl ProgressTracker {
    pub fn new() -> Self {
        let pb = ProgressBar::new_spinner();
        if let Ok(style) =
            ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}")
        {
            pb.set_style(style);
        }
        pb.enable_steady_tick(Duration::from_millis(100));

        Self {
            progress_bar: pb,
            files_seen: Cell::new(0),
            directories_seen: Cell::new(0),
        }
    }

    /// A tracker that draws nothing
    pub fn hidden() -> Self {
        Self {
            progress_bar: ProgressBar::hidden(),
            files_seen: Cell::new(0),
            directories_seen: Cell::new(0),
        }
    }

    pub fn file(&self) {
        self.files_seen.set(self.files_seen.get() + 1);
        self.refresh();
    }

    pub fn directory(&self) {
        self.directories_seen.set(self.directories_seen.get() + 1);
        self.refresh();
    }

    pub fn counts(&self) -> (u64, u64) {
        (self.files_seen.get(), self.directories_seen.get())
    }

    /// Print a line without tearing the spinner
    pub fn println(&self, line: &str) {
        if self.progress_bar.is_hidden() {
            println!("{line}");
        } else {
            self.progress_bar.suspend(|| println!("{line}"));
        }
    }

    pub fn finish(&self) {
        self.progress_bar.finish_and_clear();
    }

    fn refresh(&self) {
        self.progress_bar.inc(1);
        self.progress_bar.set_message(format!(
            "{} files, {} directories",
            self.files_seen.get(),
            self.directories_seen.get()
        ));
    }
}
