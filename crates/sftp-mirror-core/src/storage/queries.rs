use super::models::CatalogRecord;
use super::sqlite::Database;
use super::CatalogWriter;
use crate::error::CatalogError;
use chrono::{DateTime, Utc};
use rusqlite::{params, Row};
use tracing::debug;

impl CatalogWriter for Database {
    fn ensure_schema(&self) -> Result<(), CatalogError> {
        self.connection()
            .execute_batch(include_str!("schema.sql"))
            .map_err(CatalogError::SchemaFailed)?;
        debug!("Catalog schema ready");
        Ok(())
    }

    fn insert(&self, filename: &str, fetched_at: DateTime<Utc>) -> Result<i64, CatalogError> {
        self.connection()
            .execute(
                "INSERT INTO files (filename, fetched_at) VALUES (?1, ?2)",
                params![filename, fetched_at],
            )
            .map_err(|source| CatalogError::InsertFailed {
                filename: filename.to_string(),
                source,
            })?;
        Ok(self.connection().last_insert_rowid())
    }

    fn list_all(&self) -> Result<Vec<CatalogRecord>, CatalogError> {
        let mut stmt = self
            .connection()
            .prepare("SELECT id, filename, fetched_at FROM files ORDER BY id ASC")
            .map_err(CatalogError::QueryFailed)?;

        let records = stmt
            .query_map([], record_from_row)
            .map_err(CatalogError::QueryFailed)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(CatalogError::QueryFailed)?;

        Ok(records)
    }
}

impl Database {
    /// Records for one filename, oldest first.
    pub fn history(&self, filename: &str) -> Result<Vec<CatalogRecord>, CatalogError> {
        let mut stmt = self
            .connection()
            .prepare(
                "SELECT id, filename, fetched_at FROM files WHERE filename = ?1 ORDER BY id ASC",
            )
            .map_err(CatalogError::QueryFailed)?;

        let records = stmt
            .query_map(params![filename], record_from_row)
            .map_err(CatalogError::QueryFailed)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(CatalogError::QueryFailed)?;

        Ok(records)
    }
}

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<CatalogRecord> {
    Ok(CatalogRecord {
        id: row.get(0)?,
        filename: row.get(1)?,
        fetched_at: row.get(2)?,
    })
}
