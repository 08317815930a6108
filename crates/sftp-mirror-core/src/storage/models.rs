use chrono::{DateTime, Utc};

/// One fetched file, as recorded in the catalog. Never updated after insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogRecord {
    pub id: i64,
    pub filename: String,
    pub fetched_at: DateTime<Utc>,
}
