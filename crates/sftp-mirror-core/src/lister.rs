use crate::error::ListError;
use crate::remote::{is_plain_name, DirEntry, RemoteDir, RemoteEntry, RemoteSession};
use tracing::{debug, warn};

/// Enumerate one remote directory in the order the remote yields it.
///
/// Either the complete listing is returned or an error; entries read before an
/// abnormal end are discarded. `.` and `..` are never returned, and names
/// that are not a single plain path segment are skipped with a warning. The
/// directory handle is closed on every path.
pub fn list_directory<S: RemoteSession>(
    session: &S,
    remote_dir: &str,
) -> Result<Vec<RemoteEntry>, ListError> {
    let dir = session
        .open_dir(remote_dir)
        .map_err(|source| ListError::OpenFailed {
            path: remote_dir.to_string(),
            source,
        })?;
    let mut dir = OpenDir::new(dir, remote_dir);

    let mut entries: Vec<RemoteEntry> = Vec::new();
    loop {
        match dir.next_entry() {
            Ok(Some(entry)) => {
                if entry.name == "." || entry.name == ".." {
                    continue;
                }
                if !is_plain_name(&entry.name) {
                    warn!(
                        "Skipping {:?} in {}: not a plain file name",
                        entry.name, remote_dir
                    );
                    continue;
                }
                entries.push(RemoteEntry::new(remote_dir, entry));
            }
            Ok(None) => break,
            Err(source) => {
                return Err(ListError::Truncated {
                    path: remote_dir.to_string(),
                    entries_seen: entries.len(),
                    source,
                });
            }
        }
    }

    // A failed close after a clean end of listing does not void the entries.
    if let Err(e) = dir.close() {
        warn!("Can't close remote directory {}: {}", remote_dir, e);
    }

    debug!("Listed {} entries in {}", entries.len(), remote_dir);
    Ok(entries)
}

/// Closes the wrapped directory when dropped unless already closed.
struct OpenDir<'a, D: RemoteDir> {
    dir: D,
    path: &'a str,
    closed: bool,
}

impl<'a, D: RemoteDir> OpenDir<'a, D> {
    fn new(dir: D, path: &'a str) -> Self {
        Self {
            dir,
            path,
            closed: false,
        }
    }

    fn next_entry(&mut self) -> std::io::Result<Option<DirEntry>> {
        self.dir.next_entry()
    }

    fn close(&mut self) -> std::io::Result<()> {
        self.closed = true;
        self.dir.close()
    }
}

impl<D: RemoteDir> Drop for OpenDir<'_, D> {
    fn drop(&mut self) {
        if !self.closed {
            if let Err(e) = self.dir.close() {
                warn!("Can't close remote directory {}: {}", self.path, e);
            }
        }
    }
}
