use crate::config::AppConfig;
use crate::error::{CatalogError, Error, FetchError, ListError};
use crate::fetcher::{FileFetcher, Retrying, StreamFetcher, TransferOutcome};
use crate::lister;
use crate::progress::ProgressReporter;
use crate::remote::{ChannelSource, EntryKind, RemoteEntry, RemoteSession};
use crate::storage::{CatalogRecord, CatalogWriter};
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Where a run is. `Aborted` is only reachable from `Listing`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Listing,
    Fetching(usize),
    Cataloging,
    Done,
    Aborted,
}

/// Cooperative cancellation. Checked before each fetch starts; a fetch that
/// is already copying runs to its outcome.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone)]
pub struct MirrorOptions {
    pub remote_dir: String,
    pub local_dir: PathBuf,
    pub recursive: bool,
    pub workers: usize,
}

impl MirrorOptions {
    pub fn new(remote_dir: &str, local_dir: &Path) -> Self {
        Self {
            remote_dir: remote_dir.to_string(),
            local_dir: local_dir.to_path_buf(),
            recursive: true,
            workers: 1,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            remote_dir: config.remote.directory.clone(),
            local_dir: config.local.directory.clone(),
            recursive: config.transfer.recursive,
            workers: config.transfer.workers.max(1),
        }
    }
}

/// Everything one completed run produced.
#[derive(Debug)]
pub struct RunReport {
    /// Every attempted fetch, in listing order.
    pub outcomes: Vec<TransferOutcome>,
    /// Entries the listing produced, including any left unfetched by cancellation.
    pub planned: usize,
    pub cataloged: usize,
    pub catalog_failures: Vec<CatalogError>,
    pub catalog_listing: Result<Vec<CatalogRecord>, CatalogError>,
    pub cancelled: bool,
    pub listing_duration: Duration,
    pub fetch_duration: Duration,
    pub catalog_duration: Duration,
}

impl RunReport {
    pub fn successes(&self) -> impl Iterator<Item = &TransferOutcome> {
        self.outcomes.iter().filter(|o| o.success)
    }

    pub fn failures(&self) -> impl Iterator<Item = &TransferOutcome> {
        self.outcomes.iter().filter(|o| !o.success)
    }

    pub fn has_failures(&self) -> bool {
        self.failures().next().is_some()
    }

    pub fn bytes_copied(&self) -> u64 {
        self.successes().map(|o| o.bytes_copied).sum()
    }
}

struct PlannedFetch {
    entry: RemoteEntry,
    local_path: PathBuf,
}

struct StateTracker<'a> {
    state: RunState,
    reporter: &'a dyn ProgressReporter,
}

impl<'a> StateTracker<'a> {
    fn new(reporter: &'a dyn ProgressReporter) -> Self {
        Self {
            state: RunState::Idle,
            reporter,
        }
    }

    fn advance(&mut self, next: RunState) {
        debug!("Run state {:?} -> {:?}", self.state, next);
        self.state = next;
        self.reporter.on_state_change(&next);
    }
}

/// Drives one pass of list, fetch, catalog.
pub struct MirrorEngine<F = StreamFetcher> {
    options: MirrorOptions,
    fetcher: F,
    cancel: CancelToken,
}

impl MirrorEngine<StreamFetcher> {
    pub fn new(options: MirrorOptions) -> Self {
        Self {
            options,
            fetcher: StreamFetcher::default(),
            cancel: CancelToken::new(),
        }
    }
}

impl MirrorEngine<Retrying<StreamFetcher>> {
    pub fn from_config(config: &AppConfig) -> Self {
        let fetcher = Retrying::new(
            StreamFetcher::with_chunk_size(config.transfer.chunk_size),
            config.transfer.retries,
        );
        MirrorEngine::new(MirrorOptions::from_config(config)).with_fetcher(fetcher)
    }
}

impl<F: FileFetcher> MirrorEngine<F> {
    pub fn with_fetcher<G: FileFetcher>(self, fetcher: G) -> MirrorEngine<G> {
        MirrorEngine {
            options: self.options,
            fetcher,
            cancel: self.cancel,
        }
    }

    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn options(&self) -> &MirrorOptions {
        &self.options
    }

    /// Run the pipeline:
    /// 1. Ensure the catalog schema (failure is fatal)
    /// 2. List the remote tree completely (failure aborts the run)
    /// 3. Fetch every entry; a failed fetch is recorded and the run continues
    /// 4. Catalog the successful fetches only, best effort per record
    pub fn run<C, W>(
        &self,
        source: &C,
        catalog: &W,
        reporter: &dyn ProgressReporter,
    ) -> Result<RunReport, Error>
    where
        C: ChannelSource,
        W: CatalogWriter,
    {
        catalog.ensure_schema()?;

        let mut state = StateTracker::new(reporter);

        // Phase 1: List
        state.advance(RunState::Listing);
        info!("Listing {}", self.options.remote_dir);
        let list_start = Instant::now();
        let listed = source
            .open_channel()
            .map_err(|source| ListError::OpenFailed {
                path: self.options.remote_dir.clone(),
                source,
            })
            .and_then(|channel| self.plan(&channel).map(|plan| (channel, plan)));
        let (channel, plan) = match listed {
            Ok(listed) => listed,
            Err(e) => {
                error!("Can't list directory: {}", e);
                state.advance(RunState::Aborted);
                return Err(e.into());
            }
        };
        let listing_duration = list_start.elapsed();
        reporter.on_listing_complete(plan.len(), listing_duration.as_secs_f64());
        debug!(
            "Listing completed in {:.2}s, {} entries to fetch",
            listing_duration.as_secs_f64(),
            plan.len()
        );

        // Phase 2: Fetch
        info!("Fetching {} entries...", plan.len());
        let fetch_start = Instant::now();
        let outcomes = if self.options.workers > 1 && plan.len() > 1 {
            // The listing is complete; concurrent jobs use channels of their own.
            state.advance(RunState::Fetching(0));
            match self.fetch_concurrent(source, &plan, reporter) {
                Ok(outcomes) => outcomes,
                Err(e) => {
                    warn!("Worker pool unavailable ({}), fetching sequentially", e);
                    self.fetch_sequential(&channel, &plan, &mut state)
                }
            }
        } else {
            self.fetch_sequential(&channel, &plan, &mut state)
        };
        let fetch_duration = fetch_start.elapsed();
        let cancelled = outcomes.len() < plan.len();
        if cancelled {
            warn!(
                "Run cancelled: {} of {} entries were not fetched",
                plan.len() - outcomes.len(),
                plan.len()
            );
        }

        // Phase 3: Catalog
        state.advance(RunState::Cataloging);
        info!("Writing to catalog...");
        let catalog_start = Instant::now();
        let successful: Vec<&TransferOutcome> = outcomes.iter().filter(|o| o.success).collect();
        let summary = catalog.insert_batch(&successful);
        let catalog_listing = catalog.list_all();
        if let Err(ref e) = catalog_listing {
            error!("Query failed: {}", e);
        }
        let catalog_duration = catalog_start.elapsed();
        reporter.on_catalog_complete(
            summary.inserted,
            summary.failures.len(),
            catalog_duration.as_secs_f64(),
        );

        state.advance(RunState::Done);

        Ok(RunReport {
            planned: plan.len(),
            outcomes,
            cataloged: summary.inserted,
            catalog_failures: summary.failures,
            catalog_listing,
            cancelled,
            listing_duration,
            fetch_duration,
            catalog_duration,
        })
    }

    fn plan<S: RemoteSession>(&self, session: &S) -> Result<Vec<PlannedFetch>, ListError> {
        let mut plan = Vec::new();
        self.plan_dir(session, &self.options.remote_dir, "", &mut plan)?;
        Ok(plan)
    }

    /// Depth-first walk; directory contents take the place of the directory
    /// entry in the overall order.
    fn plan_dir<S: RemoteSession>(
        &self,
        session: &S,
        remote_dir: &str,
        prefix: &str,
        plan: &mut Vec<PlannedFetch>,
    ) -> Result<(), ListError> {
        for entry in lister::list_directory(session, remote_dir)? {
            let entry = entry.nested_under(prefix);
            match entry.kind {
                EntryKind::Directory if self.options.recursive => {
                    self.plan_dir(session, &entry.remote_path, &entry.relative_path, plan)?;
                }
                EntryKind::Directory => {
                    debug!("Skipping directory {} (recursion disabled)", entry.remote_path);
                }
                EntryKind::Other => {
                    warn!("Skipping special file {}", entry.remote_path);
                }
                EntryKind::File | EntryKind::Symlink => {
                    match entry.local_path(&self.options.local_dir) {
                        Some(local_path) => plan.push(PlannedFetch { entry, local_path }),
                        None => warn!(
                            "Skipping {}: path leaves the local directory",
                            entry.remote_path
                        ),
                    }
                }
            }
        }
        Ok(())
    }

    fn fetch_sequential<S: RemoteSession>(
        &self,
        session: &S,
        plan: &[PlannedFetch],
        state: &mut StateTracker<'_>,
    ) -> Vec<TransferOutcome> {
        let total = plan.len();
        let mut outcomes = Vec::with_capacity(total);

        for (index, item) in plan.iter().enumerate() {
            if self.cancel.is_cancelled() {
                break;
            }
            state.advance(RunState::Fetching(index));
            state.reporter.on_fetch_start(index, total, &item.entry);
            let outcome = self.fetch_one(session, item);
            log_outcome(&outcome);
            state.reporter.on_fetch_complete(&outcome);
            outcomes.push(outcome);
        }

        outcomes
    }

    /// Each pool job opens its own channel; outcomes come back in plan order.
    fn fetch_concurrent<C: ChannelSource>(
        &self,
        source: &C,
        plan: &[PlannedFetch],
        reporter: &dyn ProgressReporter,
    ) -> Result<Vec<TransferOutcome>, rayon::ThreadPoolBuildError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.options.workers)
            .build()?;
        let total = plan.len();

        let outcomes: Vec<Option<TransferOutcome>> = pool.install(|| {
            plan.par_iter()
                .enumerate()
                .map_init(
                    || source.open_channel(),
                    |channel, (index, item)| {
                        if self.cancel.is_cancelled() {
                            return None;
                        }
                        reporter.on_fetch_start(index, total, &item.entry);
                        let outcome = match channel {
                            Ok(channel) => self.fetch_one(&*channel, item),
                            Err(e) => TransferOutcome::failed(
                                item.entry.clone(),
                                item.local_path.clone(),
                                0,
                                FetchError::RemoteOpenFailed(format!(
                                    "cannot open channel: {}",
                                    e
                                )),
                            ),
                        };
                        log_outcome(&outcome);
                        reporter.on_fetch_complete(&outcome);
                        Some(outcome)
                    },
                )
                .collect()
        });

        // Jobs that saw the cancel token produced nothing.
        Ok(outcomes.into_iter().flatten().collect())
    }

    fn fetch_one<S: RemoteSession>(&self, session: &S, item: &PlannedFetch) -> TransferOutcome {
        if let Err(error) = self.prepare_parent(&item.local_path) {
            return TransferOutcome::failed(item.entry.clone(), item.local_path.clone(), 0, error);
        }
        self.fetcher.fetch(session, &item.entry, &item.local_path)
    }

    /// Create missing sub-directories below the local root. The root itself
    /// is never created.
    fn prepare_parent(&self, local_path: &Path) -> Result<(), FetchError> {
        let Some(parent) = local_path.parent() else {
            return Ok(());
        };
        if parent == self.options.local_dir || parent.is_dir() {
            return Ok(());
        }
        if !self.options.local_dir.is_dir() {
            return Err(FetchError::LocalWriteFailed(format!(
                "local directory {} does not exist",
                self.options.local_dir.display()
            )));
        }
        fs::create_dir_all(parent)
            .map_err(|e| FetchError::LocalWriteFailed(format!("{}: {}", parent.display(), e)))
    }
}

fn log_outcome(outcome: &TransferOutcome) {
    match outcome.error {
        None => info!(
            "Fetched {} ({} bytes)",
            outcome.entry.relative_path, outcome.bytes_copied
        ),
        Some(ref e) => warn!("Failed to fetch {}: {}", outcome.entry.relative_path, e),
    }
}
