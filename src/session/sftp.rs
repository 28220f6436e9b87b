//! libssh2-backed SFTP connections
//!
//! libssh2 is a blocking library, so every call runs on the blocking thread
//! pool via [`tokio::task::spawn_blocking`]. File reads are pumped from a
//! blocking task into a bounded channel and consumed as a [`ChunkStream`].

use super::{ChunkStream, Connector, RemoteConnection};
use crate::config::RemoteConfig;
use crate::error::{Error, Result};
use crate::types::RemoteEntry;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ssh2::{ErrorCode, FileStat, Session, Sftp};
use std::io::Read;
use std::net::{TcpStream, ToSocketAddrs};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_stream::wrappers::ReceiverStream;

/// SFTP status code for a missing file or directory
const SFTP_NO_SUCH_FILE: i32 = 2;

/// Read buffer size for file transfers
const CHUNK_SIZE: usize = 32 * 1024;

/// Chunks buffered between the blocking reader and the async consumer
const CHUNK_BUFFER: usize = 8;

/// Opens authenticated SFTP sessions from a [`RemoteConfig`]
#[derive(Clone, Debug)]
pub struct SftpConnector {
    config: Arc<RemoteConfig>,
}

impl SftpConnector {
    /// Create a connector for the given server settings
    pub fn new(config: RemoteConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }
}

#[async_trait]
impl Connector for SftpConnector {
    async fn connect(&self) -> Result<Box<dyn RemoteConnection>> {
        let config = self.config.clone();
        let handles = tokio::task::spawn_blocking(move || open_session(&config))
            .await
            .map_err(|e| Error::Connection(format!("connect task failed: {}", e)))??;

        tracing::info!(
            host = %self.config.host,
            port = self.config.port,
            user = %self.config.user,
            "SFTP session established"
        );

        Ok(Box::new(SftpConnection {
            handles: Arc::new(Mutex::new(handles)),
        }))
    }
}

struct SftpHandles {
    sftp: Sftp,
    // Kept alive for the lifetime of the SFTP channel.
    _session: Session,
}

fn open_session(config: &RemoteConfig) -> Result<SftpHandles> {
    let target = format!("{}:{}", config.host, config.port);
    let addr = target
        .to_socket_addrs()
        .map_err(|e| Error::Connection(format!("cannot resolve {}: {}", target, e)))?
        .next()
        .ok_or_else(|| Error::Connection(format!("{} resolved to no address", target)))?;

    let tcp = TcpStream::connect_timeout(&addr, config.connect_timeout)
        .map_err(|e| Error::Connection(format!("TCP connect to {} failed: {}", target, e)))?;

    let mut session = Session::new()
        .map_err(|e| Error::Connection(format!("cannot create SSH session: {}", e)))?;
    session.set_tcp_stream(tcp);
    session.set_timeout(millis_u32(config.connect_timeout));
    session
        .handshake()
        .map_err(|e| Error::Connection(format!("SSH handshake with {} failed: {}", target, e)))?;

    let auth = match (&config.key_path, &config.password) {
        (Some(key_path), _) => session.userauth_pubkey_file(
            &config.user,
            None,
            key_path,
            config.key_passphrase.as_deref(),
        ),
        (None, Some(password)) => session.userauth_password(&config.user, password),
        (None, None) => {
            return Err(Error::Connection(
                "no password or private key configured".to_string(),
            ));
        }
    };
    auth.map_err(|e| {
        Error::Connection(format!("authentication as {} failed: {}", config.user, e))
    })?;
    if !session.authenticated() {
        return Err(Error::Connection(format!(
            "authentication as {} was rejected",
            config.user
        )));
    }

    // Bounds every blocking libssh2 call from here on, including stalled reads.
    session.set_timeout(millis_u32(config.transfer_timeout));

    let sftp = session
        .sftp()
        .map_err(|e| Error::Connection(format!("cannot open SFTP channel: {}", e)))?;

    Ok(SftpHandles {
        sftp,
        _session: session,
    })
}

fn millis_u32(duration: Duration) -> u32 {
    u32::try_from(duration.as_millis()).unwrap_or(u32::MAX)
}

/// Transport errors are connection failures; SFTP status errors belong to the operation.
fn classify(error: ssh2::Error, protocol: impl FnOnce(String) -> Error) -> Error {
    match error.code() {
        ErrorCode::Session(_) => Error::Connection(error.to_string()),
        ErrorCode::SFTP(_) => protocol(error.to_string()),
    }
}

fn is_no_such_file(error: &ssh2::Error) -> bool {
    matches!(error.code(), ErrorCode::SFTP(SFTP_NO_SUCH_FILE))
}

fn to_datetime(mtime: Option<u64>) -> Option<DateTime<Utc>> {
    mtime.and_then(|secs| DateTime::from_timestamp(i64::try_from(secs).ok()?, 0))
}

/// Convert one readdir result, skipping names that cannot be addressed again
///
/// Remote paths are rebuilt from the entry name, so a name that is not valid
/// UTF-8 would be lossily re-encoded into a path that does not exist.
fn listed_entry(path: &Path, stat: &FileStat) -> Option<RemoteEntry> {
    let raw = path.file_name()?;
    let Some(name) = raw.to_str() else {
        tracing::warn!(
            name = %raw.to_string_lossy(),
            "skipping remote entry whose name is not valid UTF-8"
        );
        return None;
    };
    Some(RemoteEntry {
        name: name.to_string(),
        is_directory: stat.is_dir(),
        size: stat.size.unwrap_or(0),
        modified_at: to_datetime(stat.mtime),
    })
}

/// One SSH session with an open SFTP channel
struct SftpConnection {
    handles: Arc<Mutex<SftpHandles>>,
}

impl SftpConnection {
    async fn with_sftp<T, F>(&self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Sftp) -> Result<T> + Send + 'static,
    {
        let handles = self.handles.clone();
        tokio::task::spawn_blocking(move || {
            let guard = handles
                .lock()
                .map_err(|_| Error::Connection("SFTP session poisoned".to_string()))?;
            op(&guard.sftp)
        })
        .await
        .map_err(|e| Error::Connection(format!("SFTP task failed: {}", e)))?
    }
}

#[async_trait]
impl RemoteConnection for SftpConnection {
    async fn list(&mut self, dir: &str) -> Result<Vec<RemoteEntry>> {
        let dir = dir.to_string();
        self.with_sftp(move |sftp| {
            let entries = sftp.readdir(Path::new(&dir)).map_err(|e| {
                classify(e, |reason| Error::RemoteList {
                    path: dir.clone(),
                    reason,
                })
            })?;

            Ok(entries
                .iter()
                .filter_map(|(path, stat)| listed_entry(path, stat))
                .collect())
        })
        .await
    }

    async fn open_read(&mut self, path: &str) -> Result<ChunkStream> {
        let remote_path = path.to_string();
        let mut file = self
            .with_sftp({
                let remote_path = remote_path.clone();
                move |sftp| {
                    sftp.open(Path::new(&remote_path)).map_err(|e| {
                        classify(e, |reason| Error::TransferIo {
                            remote_path: remote_path.clone(),
                            reason,
                        })
                    })
                }
            })
            .await?;

        let (tx, rx) = tokio::sync::mpsc::channel::<Result<Vec<u8>>>(CHUNK_BUFFER);
        tokio::task::spawn_blocking(move || {
            let mut buf = vec![0u8; CHUNK_SIZE];
            loop {
                let item = match file.read(&mut buf) {
                    Ok(0) => return,
                    Ok(n) => Ok(buf[..n].to_vec()),
                    // Read errors on an open handle are transport failures.
                    Err(e) => Err(Error::Connection(format!(
                        "read of {} failed: {}",
                        remote_path, e
                    ))),
                };
                let failed = item.is_err();
                // Receiver gone means the consumer gave up (timeout or shutdown).
                if tx.blocking_send(item).is_err() || failed {
                    return;
                }
            }
        });

        Ok(Box::pin(ReceiverStream::new(rx)))
    }

    async fn remove(&mut self, path: &str) -> Result<()> {
        let remote_path = path.to_string();
        self.with_sftp(move |sftp| {
            sftp.unlink(Path::new(&remote_path)).map_err(|e| {
                classify(e, |reason| Error::RemoteDelete {
                    remote_path: remote_path.clone(),
                    reason,
                })
            })
        })
        .await
    }

    async fn exists(&mut self, path: &str) -> Result<bool> {
        let remote_path = path.to_string();
        self.with_sftp(move |sftp| match sftp.stat(Path::new(&remote_path)) {
            Ok(_) => Ok(true),
            Err(e) if is_no_such_file(&e) => Ok(false),
            Err(e) => Err(classify(e, |reason| {
                Error::Other(format!("stat of {} failed: {}", remote_path, reason))
            })),
        })
        .await
    }
}
