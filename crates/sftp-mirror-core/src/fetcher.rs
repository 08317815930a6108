use crate::error::FetchError;
use crate::remote::{RemoteEntry, RemoteSession};
use std::fs::{self, File};
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const DEFAULT_CHUNK_SIZE: usize = 32 * 1024;

/// Result of one fetch attempt. `success` is true exactly when `error` is
/// `None`; use the constructors to keep the two in step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferOutcome {
    pub entry: RemoteEntry,
    pub local_path: PathBuf,
    pub bytes_copied: u64,
    pub success: bool,
    pub error: Option<FetchError>,
}

impl TransferOutcome {
    pub fn succeeded(entry: RemoteEntry, local_path: PathBuf, bytes_copied: u64) -> Self {
        Self {
            entry,
            local_path,
            bytes_copied,
            success: true,
            error: None,
        }
    }

    pub fn failed(
        entry: RemoteEntry,
        local_path: PathBuf,
        bytes_copied: u64,
        error: FetchError,
    ) -> Self {
        Self {
            entry,
            local_path,
            bytes_copied,
            success: false,
            error: Some(error),
        }
    }
}

/// Copies one remote file to one local path. Never fails outward: every
/// failure is encoded in the returned outcome.
pub trait FileFetcher: Sync {
    fn fetch<S: RemoteSession>(
        &self,
        session: &S,
        entry: &RemoteEntry,
        local_path: &Path,
    ) -> TransferOutcome;
}

/// Streams the remote file in fixed-size chunks, byte for byte.
#[derive(Debug, Clone)]
pub struct StreamFetcher {
    chunk_size: usize,
}

impl Default for StreamFetcher {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl StreamFetcher {
    pub fn with_chunk_size(chunk_size: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
        }
    }
}

impl FileFetcher for StreamFetcher {
    fn fetch<S: RemoteSession>(
        &self,
        session: &S,
        entry: &RemoteEntry,
        local_path: &Path,
    ) -> TransferOutcome {
        let fail = |bytes: u64, error: FetchError| {
            TransferOutcome::failed(entry.clone(), local_path.to_path_buf(), bytes, error)
        };

        let mut remote = match session.open_file(&entry.remote_path) {
            Ok(file) => file,
            Err(e) => return fail(0, FetchError::RemoteOpenFailed(e.to_string())),
        };

        let local = match File::create(local_path) {
            Ok(file) => file,
            Err(e) => {
                return fail(
                    0,
                    FetchError::LocalWriteFailed(format!("{}: {}", local_path.display(), e)),
                )
            }
        };

        match copy_chunks(&mut remote, local, self.chunk_size) {
            Ok(bytes) => {
                debug!("Fetched {} ({} bytes)", entry.remote_path, bytes);
                TransferOutcome::succeeded(entry.clone(), local_path.to_path_buf(), bytes)
            }
            Err((bytes, error)) => {
                discard_partial(local_path);
                fail(bytes, error)
            }
        }
    }
}

/// Copy until the reader returns 0. On failure, reports how many bytes had
/// already been written.
fn copy_chunks<R: Read>(
    remote: &mut R,
    local: File,
    chunk_size: usize,
) -> Result<u64, (u64, FetchError)> {
    let mut writer = BufWriter::new(local);
    let mut buffer = vec![0u8; chunk_size];
    let mut copied: u64 = 0;

    loop {
        let read = match remote.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err((copied, FetchError::ReadInterrupted(e.to_string()))),
        };
        if let Err(e) = writer.write_all(&buffer[..read]) {
            return Err((copied, FetchError::LocalWriteFailed(e.to_string())));
        }
        copied += read as u64;
    }

    let file = writer
        .into_inner()
        .map_err(|e| (copied, FetchError::LocalWriteFailed(e.error().to_string())))?;
    file.sync_all()
        .map_err(|e| (copied, FetchError::LocalWriteFailed(e.to_string())))?;
    Ok(copied)
}

fn discard_partial(local_path: &Path) {
    if let Err(e) = fs::remove_file(local_path) {
        if e.kind() != io::ErrorKind::NotFound {
            warn!(
                "Could not remove partial file {}: {}",
                local_path.display(),
                e
            );
        }
    }
}

/// Re-attempts transient failures of the wrapped fetcher.
#[derive(Debug, Clone)]
pub struct Retrying<F> {
    inner: F,
    retries: u32,
}

impl<F: FileFetcher> Retrying<F> {
    pub fn new(inner: F, retries: u32) -> Self {
        Self { inner, retries }
    }
}

impl<F: FileFetcher> FileFetcher for Retrying<F> {
    fn fetch<S: RemoteSession>(
        &self,
        session: &S,
        entry: &RemoteEntry,
        local_path: &Path,
    ) -> TransferOutcome {
        let mut outcome = self.inner.fetch(session, entry, local_path);
        for attempt in 1..=self.retries {
            match outcome.error {
                Some(ref error) if error.is_transient() => {
                    warn!(
                        "Retrying {} (attempt {} of {}): {}",
                        entry.remote_path, attempt, self.retries, error
                    );
                }
                _ => break,
            }
            outcome = self.inner.fetch(session, entry, local_path);
        }
        outcome
    }
}
