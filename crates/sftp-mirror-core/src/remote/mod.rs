pub mod sftp;

use std::io::{self, Read};
use std::path::{Component, Path, PathBuf};

/// What the remote listing says an entry is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
    Symlink,
    Other,
}

/// One raw member of a remote directory, as the transport yields it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub kind: EntryKind,
    pub size: Option<u64>,
}

/// One entry produced by a listing pass.
///
/// `relative_path` is the `/`-separated path below the mirrored root; for a
/// flat listing it equals `name`. It is what the catalog records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEntry {
    pub name: String,
    pub remote_path: String,
    pub relative_path: String,
    pub kind: EntryKind,
    pub size: Option<u64>,
}

impl RemoteEntry {
    pub fn new(remote_dir: &str, entry: DirEntry) -> Self {
        Self {
            remote_path: join_remote(remote_dir, &entry.name),
            relative_path: entry.name.clone(),
            name: entry.name,
            kind: entry.kind,
            size: entry.size,
        }
    }

    /// Re-root this entry under `prefix` (a parent's relative path).
    pub fn nested_under(mut self, prefix: &str) -> Self {
        if !prefix.is_empty() {
            self.relative_path = format!("{}/{}", prefix, self.relative_path);
        }
        self
    }

    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Directory
    }

    /// Destination of this entry below `local_root`, or `None` if any part of
    /// the relative path would step outside it.
    pub fn local_path(&self, local_root: &Path) -> Option<PathBuf> {
        let mut path = local_root.to_path_buf();
        for part in self.relative_path.split('/') {
            if !is_plain_name(part) {
                return None;
            }
            path.push(part);
        }
        Some(path)
    }
}

/// True for a single path segment that stays inside the directory it is
/// joined to: not empty, no separator or NUL, not `.`/`..`, no drive prefix.
pub fn is_plain_name(name: &str) -> bool {
    if name.is_empty() || name.contains(['/', '\0']) {
        return false;
    }
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

/// Remote paths are always POSIX, whatever the local platform.
pub fn join_remote(dir: &str, name: &str) -> String {
    format!("{}/{}", dir.trim_end_matches('/'), name)
}

/// An open directory handle on the remote side.
pub trait RemoteDir {
    /// Next entry, or `Ok(None)` once the remote signals a clean end of listing.
    fn next_entry(&mut self) -> io::Result<Option<DirEntry>>;

    fn close(&mut self) -> io::Result<()>;
}

/// One authenticated request/response channel. Not reentrant: callers keep at
/// most one operation in flight per channel.
pub trait RemoteSession {
    type Dir: RemoteDir;
    type File: Read;

    fn open_dir(&self, path: &str) -> io::Result<Self::Dir>;

    /// Open a remote file read-only.
    fn open_file(&self, path: &str) -> io::Result<Self::File>;
}

/// Hands out independent channels over one authenticated session, so that
/// concurrent fetches never share a channel.
pub trait ChannelSource: Sync {
    type Channel: RemoteSession;

    fn open_channel(&self) -> io::Result<Self::Channel>;
}
