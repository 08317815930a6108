use crate::engine::RunState;
use crate::fetcher::TransferOutcome;
use crate::remote::RemoteEntry;

/// Trait for reporting run progress.
///
/// The CLI implements this with indicatif. All methods have default no-op
/// implementations. Fetch callbacks may arrive from worker threads.
pub trait ProgressReporter: Send + Sync {
    fn on_state_change(&self, _state: &RunState) {}
    fn on_listing_complete(&self, _entries: usize, _duration_secs: f64) {}
    fn on_fetch_start(&self, _index: usize, _total: usize, _entry: &RemoteEntry) {}
    fn on_fetch_complete(&self, _outcome: &TransferOutcome) {}
    fn on_catalog_complete(&self, _inserted: usize, _failed: usize, _duration_secs: f64) {}
}

/// No-op progress reporter for silent operation.
pub struct SilentReporter;

impl ProgressReporter for SilentReporter {}
