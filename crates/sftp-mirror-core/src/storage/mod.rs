pub mod models;
pub mod queries;
pub mod sqlite;

pub use models::CatalogRecord;
pub use sqlite::Database;

use crate::error::CatalogError;
use crate::fetcher::TransferOutcome;
use chrono::{DateTime, Utc};
use tracing::{debug, error, warn};

/// The catalog operations a mirror run needs.
pub trait CatalogWriter {
    /// Create the catalog structure if missing. Safe to call repeatedly.
    fn ensure_schema(&self) -> Result<(), CatalogError>;

    /// Append one record and return its id. Repeated filenames are kept.
    fn insert(&self, filename: &str, fetched_at: DateTime<Utc>) -> Result<i64, CatalogError>;

    /// All records, oldest id first.
    fn list_all(&self) -> Result<Vec<CatalogRecord>, CatalogError>;

    /// Record every successful outcome. A failed insert is logged and
    /// skipped; outcomes that did not succeed are never recorded.
    fn insert_batch(&self, outcomes: &[&TransferOutcome]) -> BatchSummary {
        let mut summary = BatchSummary::default();
        for outcome in outcomes {
            if !outcome.success {
                warn!(
                    "Refusing to catalog unsuccessful fetch of {}",
                    outcome.entry.relative_path
                );
                continue;
            }
            match self.insert(&outcome.entry.relative_path, Utc::now()) {
                Ok(id) => {
                    debug!("Cataloged {} as #{}", outcome.entry.relative_path, id);
                    summary.inserted += 1;
                }
                Err(e) => {
                    error!("Values cannot be inserted: {}", e);
                    summary.failures.push(e);
                }
            }
        }
        summary
    }
}

#[derive(Debug, Default)]
pub struct BatchSummary {
    pub inserted: usize,
    pub failures: Vec<CatalogError>,
}
