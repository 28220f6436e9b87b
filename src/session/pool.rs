//! Bounded pool of remote connections

use super::{ChunkStream, Connector, RemoteConnection};
use crate::error::{Error, Result};
use crate::types::RemoteEntry;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Pool of live connections, bounded by `max_connections`
///
/// Cloning is cheap; clones share the same connections and permits.
#[derive(Clone)]
pub struct ConnectionPool {
    inner: Arc<PoolInner>,
}

struct PoolInner {
    connector: Arc<dyn Connector>,
    permits: Arc<Semaphore>,
    idle: Mutex<Vec<Box<dyn RemoteConnection>>>,
    max_connections: usize,
    acquire_timeout: Duration,
}

impl PoolInner {
    fn idle(&self) -> std::sync::MutexGuard<'_, Vec<Box<dyn RemoteConnection>>> {
        // The idle list stays consistent even if a holder panicked.
        self.idle.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl ConnectionPool {
    /// Create an empty pool; connections are opened lazily
    pub fn new(
        connector: Arc<dyn Connector>,
        max_connections: usize,
        acquire_timeout: Duration,
    ) -> Self {
        let max_connections = max_connections.max(1);
        Self {
            inner: Arc::new(PoolInner {
                connector,
                permits: Arc::new(Semaphore::new(max_connections)),
                idle: Mutex::new(Vec::with_capacity(max_connections)),
                max_connections,
                acquire_timeout,
            }),
        }
    }

    /// Borrow a connection, opening a new one when no idle connection is left
    ///
    /// Waits up to the acquire timeout for a free slot, then fails with
    /// [`Error::PoolExhausted`]. Connect failures are returned as-is.
    pub async fn acquire(&self) -> Result<PooledConnection> {
        let started = Instant::now();
        let permit = tokio::time::timeout(
            self.inner.acquire_timeout,
            self.inner.permits.clone().acquire_owned(),
        )
        .await
        .map_err(|_| Error::PoolExhausted {
            waited_ms: started.elapsed().as_millis() as u64,
        })?
        .map_err(|_| Error::ShuttingDown)?;

        let idle = self.inner.idle().pop();
        let conn = match idle {
            Some(conn) => conn,
            None => {
                tracing::debug!("opening new remote connection");
                self.inner.connector.connect().await?
            }
        };

        Ok(PooledConnection {
            conn: Some(conn),
            pool: self.inner.clone(),
            broken: false,
            _permit: permit,
        })
    }

    /// Maximum number of live connections
    pub fn max_connections(&self) -> usize {
        self.inner.max_connections
    }

    /// Connections currently borrowed
    pub fn in_use(&self) -> usize {
        self.inner.max_connections - self.inner.permits.available_permits()
    }

    /// Connections parked in the idle list
    pub fn idle_count(&self) -> usize {
        self.inner.idle().len()
    }

    /// Drop all idle connections and refuse further acquisitions
    pub fn close(&self) {
        self.inner.permits.close();
        self.inner.idle().clear();
    }
}

/// A connection borrowed from a [`ConnectionPool`]
///
/// Returned to the idle list on drop, unless an operation failed with a
/// connection-class error or the holder called [`mark_broken`](Self::mark_broken),
/// in which case it is closed.
pub struct PooledConnection {
    conn: Option<Box<dyn RemoteConnection>>,
    pool: Arc<PoolInner>,
    broken: bool,
    _permit: OwnedSemaphorePermit,
}

impl PooledConnection {
    /// Do not return this connection to the pool
    pub fn mark_broken(&mut self) {
        self.broken = true;
    }

    fn connection(&mut self) -> Result<&mut Box<dyn RemoteConnection>> {
        self.conn
            .as_mut()
            .ok_or_else(|| Error::Connection("connection already released".to_string()))
    }

    fn observe<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(e) = &result
            && e.is_connection_failure()
        {
            self.broken = true;
        }
        result
    }

    /// See [`RemoteConnection::list`]
    pub async fn list(&mut self, dir: &str) -> Result<Vec<RemoteEntry>> {
        let result = self.connection()?.list(dir).await;
        self.observe(result)
    }

    /// See [`RemoteConnection::open_read`]
    pub async fn open_read(&mut self, path: &str) -> Result<ChunkStream> {
        let result = self.connection()?.open_read(path).await;
        self.observe(result)
    }

    /// See [`RemoteConnection::remove`]
    pub async fn remove(&mut self, path: &str) -> Result<()> {
        let result = self.connection()?.remove(path).await;
        self.observe(result)
    }

    /// See [`RemoteConnection::exists`]
    pub async fn exists(&mut self, path: &str) -> Result<bool> {
        let result = self.connection()?.exists(path).await;
        self.observe(result)
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        let Some(conn) = self.conn.take() else {
            return;
        };
        if self.broken || self.pool.permits.is_closed() {
            tracing::debug!("discarding remote connection");
            return;
        }
        self.pool.idle().push(conn);
    }
}
