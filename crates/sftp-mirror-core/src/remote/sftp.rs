use super::{ChannelSource, DirEntry, EntryKind, RemoteDir, RemoteSession};
use crate::config::RemoteConfig;
use crate::error::SessionError;
use ssh2::{ErrorCode, FileStat, Session, Sftp};
use std::io;
use std::net::{TcpStream, ToSocketAddrs};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};

/// libssh2 reports the end of a directory listing as this session error.
const LIBSSH2_ERROR_FILE: i32 = -16;

/// An authenticated SSH session. Every channel it hands out is its own SFTP
/// subsystem, so channels may be used from different threads at once.
pub struct SshConnection {
    session: Session,
}

/// Connect, handshake and authenticate. Auth order: private key file,
/// password, then SSH agent.
pub fn connect(config: &RemoteConfig) -> Result<SshConnection, SessionError> {
    let addr = format!("{}:{}", config.host, config.port);
    info!("SFTP connecting to {}", addr);

    let timeout = (config.timeout_secs > 0).then(|| Duration::from_secs(config.timeout_secs));
    let tcp = open_tcp(&config.host, config.port, timeout).map_err(|source| {
        SessionError::Connect {
            addr: addr.clone(),
            source,
        }
    })?;

    let mut session = Session::new()?;
    session.set_tcp_stream(tcp);
    if let Some(timeout) = timeout {
        session.set_timeout(timeout.as_millis().min(u32::MAX as u128) as u32);
    }
    session.handshake()?;

    let method = authenticate(&session, config)?;
    info!("SFTP authenticated to {} as {} via {}", addr, config.username, method);

    Ok(SshConnection { session })
}

fn open_tcp(host: &str, port: u16, timeout: Option<Duration>) -> io::Result<TcpStream> {
    let Some(timeout) = timeout else {
        return TcpStream::connect((host, port));
    };

    let mut last_err = io::Error::new(io::ErrorKind::NotFound, "host resolved to no addresses");
    for addr in (host, port).to_socket_addrs()? {
        match TcpStream::connect_timeout(&addr, timeout) {
            Ok(stream) => return Ok(stream),
            Err(e) => {
                debug!("TCP connect to {} failed: {}", addr, e);
                last_err = e;
            }
        }
    }
    Err(last_err)
}

fn authenticate(session: &Session, config: &RemoteConfig) -> Result<&'static str, SessionError> {
    let mut attempts: Vec<String> = Vec::new();

    if let Some(ref key_path) = config.private_key {
        match session.userauth_pubkey_file(
            &config.username,
            None,
            key_path,
            config.passphrase.as_deref(),
        ) {
            Ok(()) if session.authenticated() => return Ok("publickey"),
            Ok(()) => attempts.push("publickey: rejected".to_string()),
            Err(e) => attempts.push(format!("publickey: {}", e)),
        }
    }

    if let Some(ref password) = config.password {
        match session.userauth_password(&config.username, password) {
            Ok(()) if session.authenticated() => return Ok("password"),
            Ok(()) => attempts.push("password: rejected".to_string()),
            Err(e) => attempts.push(format!("password: {}", e)),
        }
    }

    match session.userauth_agent(&config.username) {
        Ok(()) if session.authenticated() => return Ok("agent"),
        Ok(()) => attempts.push("agent: rejected".to_string()),
        Err(e) => attempts.push(format!("agent: {}", e)),
    }

    Err(SessionError::NotAuthenticated {
        username: config.username.clone(),
        attempts: attempts.join("; "),
    })
}

impl ChannelSource for SshConnection {
    type Channel = SftpChannel;

    fn open_channel(&self) -> io::Result<SftpChannel> {
        let sftp = self.session.sftp()?;
        Ok(SftpChannel { sftp })
    }
}

pub struct SftpChannel {
    sftp: Sftp,
}

impl RemoteSession for SftpChannel {
    type Dir = SftpDir;
    type File = ssh2::File;

    fn open_dir(&self, path: &str) -> io::Result<SftpDir> {
        let handle = self.sftp.opendir(Path::new(path))?;
        Ok(SftpDir { handle })
    }

    fn open_file(&self, path: &str) -> io::Result<ssh2::File> {
        Ok(self.sftp.open(Path::new(path))?)
    }
}

pub struct SftpDir {
    handle: ssh2::File,
}

impl RemoteDir for SftpDir {
    fn next_entry(&mut self) -> io::Result<Option<DirEntry>> {
        loop {
            match self.handle.readdir() {
                Ok((raw, stat)) => {
                    let Some(name) = utf8_name(&raw) else {
                        warn!("Skipping {}: name is not valid UTF-8", raw.display());
                        continue;
                    };
                    return Ok(Some(DirEntry {
                        name,
                        kind: entry_kind(&stat),
                        size: stat.size,
                    }));
                }
                Err(e) if e.code() == ErrorCode::Session(LIBSSH2_ERROR_FILE) => return Ok(None),
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn close(&mut self) -> io::Result<()> {
        Ok(self.handle.close()?)
    }
}

fn entry_kind(stat: &FileStat) -> EntryKind {
    // Servers that omit permissions give no kind; treat the entry as a file.
    let Some(perm) = stat.perm else {
        return EntryKind::File;
    };
    match perm & 0o170000 {
        0o040000 => EntryKind::Directory,
        0o120000 => EntryKind::Symlink,
        0o100000 => EntryKind::File,
        _ => EntryKind::Other,
    }
}

/// Remote paths are carried as `String`; a lossy name could not be opened again.
fn utf8_name(raw: &Path) -> Option<String> {
    raw.to_str().map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stat_with_perm(perm: Option<u32>) -> FileStat {
        FileStat {
            size: Some(0),
            uid: None,
            gid: None,
            perm,
            atime: None,
            mtime: None,
        }
    }

    #[test]
    fn test_entry_kind_from_mode_bits() {
        assert_eq!(entry_kind(&stat_with_perm(Some(0o100644))), EntryKind::File);
        assert_eq!(entry_kind(&stat_with_perm(Some(0o040755))), EntryKind::Directory);
        assert_eq!(entry_kind(&stat_with_perm(Some(0o120777))), EntryKind::Symlink);
        // socket, fifo, character device
        assert_eq!(entry_kind(&stat_with_perm(Some(0o140755))), EntryKind::Other);
        assert_eq!(entry_kind(&stat_with_perm(Some(0o010644))), EntryKind::Other);
        assert_eq!(entry_kind(&stat_with_perm(Some(0o020620))), EntryKind::Other);
    }

    #[test]
    fn test_missing_permissions_mean_file() {
        assert_eq!(entry_kind(&stat_with_perm(None)), EntryKind::File);
    }

    #[test]
    fn test_utf8_names_pass_through() {
        assert_eq!(utf8_name(Path::new("report.csv")).as_deref(), Some("report.csv"));
    }

    #[cfg(unix)]
    #[test]
    fn test_non_utf8_name_is_rejected() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let raw = Path::new(OsStr::from_bytes(b"caf\xe9.txt"));
        assert_eq!(utf8_name(raw), None);
    }
}
