#![allow(dead_code)]

use sftp_mirror_core::remote::{DirEntry, EntryKind, RemoteDir};
use sftp_mirror_core::{ChannelSource, RemoteSession};
use std::collections::{HashMap, HashSet};
use std::io::{self, Read};
use std::sync::{Arc, Mutex};

/// In-memory stand-in for an SFTP server.
///
/// Directories yield their members in insertion order, preceded by `.` and
/// `..` the way real servers do. Failure knobs simulate a dropped listing, a
/// file vanishing between listing and fetch, and a read that breaks mid-copy.
#[derive(Clone, Default)]
pub struct MemoryRemote {
    state: Arc<Mutex<State>>,
}

#[derive(Default)]
struct State {
    dirs: HashMap<String, Vec<String>>,
    files: HashMap<String, Vec<u8>>,
    kinds: HashMap<String, EntryKind>,
    truncate_listing_after: HashMap<String, usize>,
    vanished: HashSet<String>,
    failing_opens: HashMap<String, usize>,
    fail_read_after: HashMap<String, usize>,
    channels_opened: usize,
    dirs_opened: usize,
    dirs_closed: usize,
    fail_dir_close: bool,
}

fn parent_and_name(path: &str) -> (String, String) {
    match path.rsplit_once('/') {
        Some(("", name)) => ("/".to_string(), name.to_string()),
        Some((parent, name)) => (parent.to_string(), name.to_string()),
        None => ("/".to_string(), path.to_string()),
    }
}

fn normalize(path: &str) -> String {
    if path.len() > 1 {
        path.trim_end_matches('/').to_string()
    } else {
        path.to_string()
    }
}

impl MemoryRemote {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dir(self, path: &str) -> Self {
        self.add_dir(path);
        self
    }

    pub fn with_file(self, path: &str, content: &[u8]) -> Self {
        self.add_file(path, content);
        self
    }

    pub fn add_dir(&self, path: &str) {
        let path = normalize(path);
        let mut state = self.state.lock().unwrap();
        if state.dirs.contains_key(&path) {
            return;
        }
        state.dirs.insert(path.clone(), Vec::new());
        if path != "/" {
            let (parent, name) = parent_and_name(&path);
            state.dirs.entry(parent).or_default().push(name);
        }
    }

    pub fn add_file(&self, path: &str, content: &[u8]) {
        let (parent, name) = parent_and_name(path);
        let mut state = self.state.lock().unwrap();
        let members = state.dirs.entry(parent).or_default();
        if !members.contains(&name) {
            members.push(name);
        }
        state.files.insert(path.to_string(), content.to_vec());
    }

    /// A listed entry of the given kind (symlink, special file) backed by
    /// `content` when opened.
    pub fn add_special(&self, path: &str, kind: EntryKind, content: &[u8]) {
        self.add_file(path, content);
        self.state
            .lock()
            .unwrap()
            .kinds
            .insert(path.to_string(), kind);
    }

    /// Lists `name` in `dir` verbatim, however the server spelled it. Opening
    /// `<dir>/<name>` yields `content`.
    pub fn add_raw_entry(&self, dir: &str, name: &str, content: &[u8]) {
        let dir = normalize(dir);
        let mut state = self.state.lock().unwrap();
        state.dirs.entry(dir.clone()).or_default().push(name.to_string());
        state
            .files
            .insert(format!("{}/{}", dir, name), content.to_vec());
    }

    /// The file stays listed but can no longer be opened.
    pub fn vanish(&self, path: &str) {
        self.state.lock().unwrap().vanished.insert(path.to_string());
    }

    /// The next `times` opens of `path` fail, later ones succeed.
    pub fn fail_opens(&self, path: &str, times: usize) {
        self.state
            .lock()
            .unwrap()
            .failing_opens
            .insert(path.to_string(), times);
    }

    /// Reads of `path` error once `bytes` have been delivered.
    pub fn fail_read_after(&self, path: &str, bytes: usize) {
        self.state
            .lock()
            .unwrap()
            .fail_read_after
            .insert(path.to_string(), bytes);
    }

    /// Listing of `path` breaks after `entries` raw entries (dot entries included).
    pub fn truncate_listing_after(&self, path: &str, entries: usize) {
        self.state
            .lock()
            .unwrap()
            .truncate_listing_after
            .insert(normalize(path), entries);
    }

    pub fn fail_dir_close(&self) {
        self.state.lock().unwrap().fail_dir_close = true;
    }

    pub fn channels_opened(&self) -> usize {
        self.state.lock().unwrap().channels_opened
    }

    pub fn dirs_opened(&self) -> usize {
        self.state.lock().unwrap().dirs_opened
    }

    pub fn dirs_closed(&self) -> usize {
        self.state.lock().unwrap().dirs_closed
    }

    pub fn channel(&self) -> MemoryChannel {
        MemoryChannel {
            state: Arc::clone(&self.state),
        }
    }
}

impl ChannelSource for MemoryRemote {
    type Channel = MemoryChannel;

    fn open_channel(&self) -> io::Result<MemoryChannel> {
        self.state.lock().unwrap().channels_opened += 1;
        Ok(self.channel())
    }
}

pub struct MemoryChannel {
    state: Arc<Mutex<State>>,
}

impl RemoteSession for MemoryChannel {
    type Dir = MemoryDir;
    type File = MemoryFile;

    fn open_dir(&self, path: &str) -> io::Result<MemoryDir> {
        let path = normalize(path);
        let mut state = self.state.lock().unwrap();
        let members = state
            .dirs
            .get(&path)
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no such directory"))?;

        let mut entries = vec![
            DirEntry {
                name: ".".to_string(),
                kind: EntryKind::Directory,
                size: None,
            },
            DirEntry {
                name: "..".to_string(),
                kind: EntryKind::Directory,
                size: None,
            },
        ];
        for name in members {
            let child = if path == "/" {
                format!("/{}", name)
            } else {
                format!("{}/{}", path, name)
            };
            let entry = if let Some(kind) = state.kinds.get(&child) {
                DirEntry {
                    name,
                    kind: *kind,
                    size: state.files.get(&child).map(|c| c.len() as u64),
                }
            } else if state.dirs.contains_key(&child) {
                DirEntry {
                    name,
                    kind: EntryKind::Directory,
                    size: None,
                }
            } else {
                let size = state.files.get(&child).map(|c| c.len() as u64);
                DirEntry {
                    name,
                    kind: EntryKind::File,
                    size,
                }
            };
            entries.push(entry);
        }

        state.dirs_opened += 1;
        let truncate_after = state.truncate_listing_after.get(&path).copied();
        Ok(MemoryDir {
            entries,
            position: 0,
            truncate_after,
            state: Arc::clone(&self.state),
        })
    }

    fn open_file(&self, path: &str) -> io::Result<MemoryFile> {
        let mut state = self.state.lock().unwrap();
        if state.vanished.contains(path) {
            return Err(io::Error::new(io::ErrorKind::NotFound, "no such file"));
        }
        if let Some(remaining) = state.failing_opens.get_mut(path) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(io::Error::new(io::ErrorKind::TimedOut, "open timed out"));
            }
        }
        let data = state
            .files
            .get(path)
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no such file"))?;
        Ok(MemoryFile {
            data,
            position: 0,
            fail_after: state.fail_read_after.get(path).copied(),
        })
    }
}

pub struct MemoryDir {
    entries: Vec<DirEntry>,
    position: usize,
    truncate_after: Option<usize>,
    state: Arc<Mutex<State>>,
}

impl RemoteDir for MemoryDir {
    fn next_entry(&mut self) -> io::Result<Option<DirEntry>> {
        if self.truncate_after == Some(self.position) {
            return Err(io::Error::new(
                io::ErrorKind::ConnectionAborted,
                "channel closed mid-listing",
            ));
        }
        let entry = self.entries.get(self.position).cloned();
        self.position += 1;
        Ok(entry)
    }

    fn close(&mut self) -> io::Result<()> {
        let mut state = self.state.lock().unwrap();
        state.dirs_closed += 1;
        if state.fail_dir_close {
            return Err(io::Error::new(io::ErrorKind::Other, "close failed"));
        }
        Ok(())
    }
}

pub struct MemoryFile {
    data: Vec<u8>,
    position: usize,
    fail_after: Option<usize>,
}

impl Read for MemoryFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut end = self.data.len();
        if let Some(limit) = self.fail_after {
            if self.position >= limit {
                return Err(io::Error::new(
                    io::ErrorKind::ConnectionReset,
                    "connection reset by peer",
                ));
            }
            end = end.min(limit);
        }
        let n = buf.len().min(end - self.position);
        buf[..n].copy_from_slice(&self.data[self.position..self.position + n]);
        self.position += n;
        Ok(n)
    }
}

/// Deterministic non-text bytes covering every byte value.
pub fn binary_payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 31 + 7) as u8).collect()
}
