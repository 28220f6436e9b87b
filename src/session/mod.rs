//! Remote file operations over pooled SFTP connections
//!
//! [`TransferSession`] is the only component that talks to the remote server.
//! The wire protocol sits behind two traits so the rest of the crate never
//! depends on libssh2 directly:
//!
//! - [`Connector`] opens new connections (one SSH session + SFTP channel each)
//! - [`RemoteConnection`] is one live connection
//!
//! Connections are borrowed from a [`ConnectionPool`] for the duration of a
//! single operation.

mod pool;
mod sftp;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use pool::{ConnectionPool, PooledConnection};
pub use sftp::SftpConnector;

use crate::error::{Error, Result};
use crate::types::RemoteEntry;
use async_trait::async_trait;
use futures::StreamExt;
use futures::stream::BoxStream;
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncWriteExt;

/// Stream of file content chunks read from the remote server
pub type ChunkStream = BoxStream<'static, Result<Vec<u8>>>;

/// One live connection to the remote server
///
/// Implementations report transport failures as [`Error::Connection`] and
/// protocol-level failures with the operation's own variant
/// ([`Error::RemoteList`], [`Error::TransferIo`], [`Error::RemoteDelete`]).
/// A missing path is a protocol failure, not a connection failure.
#[async_trait]
pub trait RemoteConnection: Send {
    /// List the entries of a directory, in server order
    async fn list(&mut self, dir: &str) -> Result<Vec<RemoteEntry>>;

    /// Open a file for reading
    async fn open_read(&mut self, path: &str) -> Result<ChunkStream>;

    /// Remove a file
    async fn remove(&mut self, path: &str) -> Result<()>;

    /// Whether a path exists (file or directory)
    async fn exists(&mut self, path: &str) -> Result<bool>;
}

/// Factory for new remote connections
#[async_trait]
pub trait Connector: Send + Sync {
    /// Open and authenticate a new connection
    async fn connect(&self) -> Result<Box<dyn RemoteConnection>>;
}

/// Join a remote directory and an entry name with `/`
///
/// SFTP paths are POSIX paths no matter which platform the poller runs on.
pub fn join_remote(dir: &str, name: &str) -> String {
    let dir = dir.trim_end_matches('/');
    format!("{}/{}", dir, name)
}

/// Remote operations used by the poller and the health probe
#[derive(Clone)]
pub struct TransferSession {
    pool: ConnectionPool,
    transfer_timeout: Duration,
}

impl TransferSession {
    /// Create a session over `pool`
    ///
    /// `transfer_timeout` bounds the gap between two received chunks.
    pub fn new(pool: ConnectionPool, transfer_timeout: Duration) -> Self {
        Self {
            pool,
            transfer_timeout,
        }
    }

    /// The underlying pool
    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }

    /// List a remote directory
    pub async fn list(&self, dir: &str) -> Result<Vec<RemoteEntry>> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| list_error(dir, e))?;
        conn.list(dir).await.map_err(|e| list_error(dir, e))
    }

    /// Download `remote_path` into `local_temp_path`
    ///
    /// The local file is created (or truncated), filled chunk by chunk and
    /// synced to disk before this returns. Returns the number of bytes written.
    /// A partially written file is left behind on failure; removing it is up to
    /// the caller.
    pub async fn download(&self, remote_path: &str, local_temp_path: &Path) -> Result<u64> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| transfer_error(remote_path, e))?;

        let result = self
            .copy_to_file(&mut conn, remote_path, local_temp_path)
            .await;

        // A half-read remote handle is not reusable.
        if result.is_err() {
            conn.mark_broken();
        }
        result
    }

    async fn copy_to_file(
        &self,
        conn: &mut PooledConnection,
        remote_path: &str,
        local_temp_path: &Path,
    ) -> Result<u64> {
        let mut stream = conn
            .open_read(remote_path)
            .await
            .map_err(|e| transfer_error(remote_path, e))?;

        let local_error = |e: std::io::Error| Error::TransferIo {
            remote_path: remote_path.to_string(),
            reason: format!("local write to {} failed: {}", local_temp_path.display(), e),
        };

        let mut file = tokio::fs::File::create(local_temp_path)
            .await
            .map_err(local_error)?;
        let mut bytes = 0u64;

        loop {
            let next = tokio::time::timeout(self.transfer_timeout, stream.next())
                .await
                .map_err(|_| Error::TransferTimeout {
                    remote_path: remote_path.to_string(),
                    timeout_ms: self.transfer_timeout.as_millis() as u64,
                })?;

            match next {
                Some(Ok(chunk)) => {
                    file.write_all(&chunk).await.map_err(local_error)?;
                    bytes += chunk.len() as u64;
                }
                Some(Err(e)) => return Err(transfer_error(remote_path, e)),
                None => break,
            }
        }

        file.flush().await.map_err(local_error)?;
        file.sync_all().await.map_err(local_error)?;

        tracing::debug!(remote_path, bytes, "remote file copied to temp file");
        Ok(bytes)
    }

    /// Delete a remote file
    pub async fn delete(&self, remote_path: &str) -> Result<()> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| delete_error(remote_path, e))?;
        conn.remove(remote_path)
            .await
            .map_err(|e| delete_error(remote_path, e))
    }

    /// Check whether a remote path exists
    ///
    /// `Ok(false)` means the server answered and the path is missing; an
    /// unreachable server is an error.
    pub async fn exists(&self, path: &str) -> Result<bool> {
        let mut conn = self.pool.acquire().await?;
        conn.exists(path).await
    }
}

fn list_error(path: &str, error: Error) -> Error {
    match error {
        Error::RemoteList { .. } | Error::PoolExhausted { .. } => error,
        other => Error::RemoteList {
            path: path.to_string(),
            reason: other.to_string(),
        },
    }
}

fn transfer_error(remote_path: &str, error: Error) -> Error {
    match error {
        Error::TransferIo { .. } | Error::TransferTimeout { .. } | Error::PoolExhausted { .. } => {
            error
        }
        other => Error::TransferIo {
            remote_path: remote_path.to_string(),
            reason: other.to_string(),
        },
    }
}

fn delete_error(remote_path: &str, error: Error) -> Error {
    match error {
        Error::RemoteDelete { .. } | Error::PoolExhausted { .. } => error,
        other => Error::RemoteDelete {
            remote_path: remote_path.to_string(),
            reason: other.to_string(),
        },
    }
}
