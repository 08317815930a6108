use super::CatalogWriter;
use crate::error::CatalogError;
use rusqlite::{Connection, Result};
use tracing::debug;

/// SQLite-backed catalog. Opening it also ensures the schema exists.
pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn open(path: &str) -> Result<Self, CatalogError> {
        let conn = Connection::open(path).map_err(CatalogError::OpenFailed)?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self, CatalogError> {
        let conn = Connection::open_in_memory().map_err(CatalogError::OpenFailed)?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self, CatalogError> {
        let db = Database { conn };
        db.configure_pragmas().map_err(CatalogError::OpenFailed)?;
        db.ensure_schema()?;
        Ok(db)
    }

    fn configure_pragmas(&self) -> Result<()> {
        self.conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA busy_timeout = 5000;",
        )?;
        debug!("SQLite pragmas configured (WAL mode, 5s busy timeout)");
        Ok(())
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn schema_version(&self) -> Result<i64> {
        self.conn
            .query_row("PRAGMA user_version", [], |row| row.get(0))
    }
}
