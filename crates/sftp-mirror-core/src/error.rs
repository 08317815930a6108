use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Listing error: {0}")]
    List(#[from] ListError),

    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("{0}")]
    Other(String),
}

/// Failure to enumerate a remote directory. Always fatal to a run.
#[derive(Error, Debug)]
pub enum ListError {
    #[error("cannot open remote directory '{path}': {source}")]
    OpenFailed {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("listing of '{path}' ended abnormally after {entries_seen} entries: {source}")]
    Truncated {
        path: String,
        entries_seen: usize,
        #[source]
        source: io::Error,
    },
}

/// Failure to copy a single entry. Recorded in the entry's outcome, never
/// raised to the run.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("remote open failed: {0}")]
    RemoteOpenFailed(String),

    #[error("local write failed: {0}")]
    LocalWriteFailed(String),

    #[error("read interrupted: {0}")]
    ReadInterrupted(String),
}

impl FetchError {
    /// Whether a fresh attempt could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, FetchError::RemoteOpenFailed(_) | FetchError::ReadInterrupted(_))
    }
}

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("cannot open catalog: {0}")]
    OpenFailed(#[source] rusqlite::Error),

    #[error("cannot create catalog schema: {0}")]
    SchemaFailed(#[source] rusqlite::Error),

    #[error("cannot record '{filename}': {source}")]
    InsertFailed {
        filename: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("cannot read catalog: {0}")]
    QueryFailed(#[source] rusqlite::Error),
}

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("TCP connection to {addr} failed: {source}")]
    Connect {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("SSH error: {0}")]
    Ssh(#[from] ssh2::Error),

    #[error("not authenticated as '{username}' ({attempts})")]
    NotAuthenticated { username: String, attempts: String },
}
