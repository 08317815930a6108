use indicatif::{ProgressBar, ProgressStyle};
use sftp_mirror_core::{ProgressReporter, RemoteEntry, RunState, TransferOutcome};
use std::sync::Mutex;
use std::time::Duration;

const TICK_CHARS: &str = "⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏";

/// CLI progress reporter using indicatif.
///
/// - Listing: spinner (entry count unknown upfront)
/// - Fetching: progress bar over the listed entries
/// - Cataloging: spinner
pub struct CliReporter {
    bar: Mutex<Option<ProgressBar>>,
}

impl CliReporter {
    pub fn new() -> Self {
        Self {
            bar: Mutex::new(None),
        }
    }

    fn set_bar(&self, pb: ProgressBar) {
        if let Ok(mut guard) = self.bar.lock() {
            if let Some(old) = guard.take() {
                old.finish_and_clear();
            }
            *guard = Some(pb);
        }
    }

    fn finish_bar(&self) {
        if let Ok(mut guard) = self.bar.lock() {
            if let Some(pb) = guard.take() {
                pb.finish_and_clear();
            }
        }
    }

    fn with_bar(&self, f: impl FnOnce(&ProgressBar)) {
        if let Ok(guard) = self.bar.lock() {
            if let Some(pb) = guard.as_ref() {
                f(pb);
            }
        }
    }

    fn spinner(message: &'static str) -> ProgressBar {
        let pb = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
            pb.set_style(style.tick_chars(TICK_CHARS));
        }
        pb.set_message(message);
        pb.enable_steady_tick(Duration::from_millis(80));
        pb
    }
}

impl ProgressReporter for CliReporter {
    fn on_state_change(&self, state: &RunState) {
        match state {
            RunState::Listing => self.set_bar(Self::spinner("Listing remote directory...")),
            RunState::Cataloging => self.set_bar(Self::spinner("Writing to catalog...")),
            RunState::Done | RunState::Aborted => self.finish_bar(),
            RunState::Idle | RunState::Fetching(_) => {}
        }
    }

    fn on_listing_complete(&self, entries: usize, duration_secs: f64) {
        self.finish_bar();
        eprintln!(
            "  \x1b[32m✓\x1b[0m Listing complete: {} entries in {:.2}s",
            entries, duration_secs
        );

        let pb = ProgressBar::new(entries as u64);
        if let Ok(style) = ProgressStyle::with_template(
            "  {spinner:.cyan} Fetching [{bar:30.cyan/dim}] {pos}/{len} files ({eta} remaining) {msg}",
        ) {
            pb.set_style(style.progress_chars("━╸─").tick_chars(TICK_CHARS));
        }
        pb.enable_steady_tick(Duration::from_millis(80));
        self.set_bar(pb);
    }

    fn on_fetch_start(&self, _index: usize, _total: usize, entry: &RemoteEntry) {
        let name = entry.relative_path.clone();
        self.with_bar(|pb| pb.set_message(name));
    }

    fn on_fetch_complete(&self, outcome: &TransferOutcome) {
        self.with_bar(|pb| {
            pb.inc(1);
            if let Some(ref error) = outcome.error {
                pb.println(format!(
                    "  \x1b[31m✗\x1b[0m {}: {}",
                    outcome.entry.relative_path, error
                ));
            }
        });
    }

    fn on_catalog_complete(&self, inserted: usize, failed: usize, duration_secs: f64) {
        self.finish_bar();
        if failed == 0 {
            eprintln!(
                "  \x1b[32m✓\x1b[0m Catalog write complete: {} records in {:.2}s",
                inserted, duration_secs
            );
        } else {
            eprintln!(
                "  \x1b[33m!\x1b[0m Catalog write complete: {} records, {} failed in {:.2}s",
                inserted, failed, duration_secs
            );
        }
    }
}
