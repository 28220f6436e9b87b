//! The polling scheduler and composition root.
//!
//! [`SftpPoller`] owns every long-lived component and is organized by concern:
//! - [`tick`] - one poll-and-transfer cycle
//! - [`lifecycle`] - startup, the fixed-rate loop and shutdown

mod lifecycle;
mod tick;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;

use crate::config::{Config, PollConfig};
use crate::error::Result;
use crate::health::HealthProbe;
use crate::processor::FileProcessor;
use crate::session::{ConnectionPool, Connector, SftpConnector, TransferSession};
use crate::staging::LocalStaging;
use crate::types::{Event, HealthReport, PollerStats};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Scheduler state shared by every clone of the poller
#[derive(Clone)]
pub(crate) struct PollerState {
    /// Held for the duration of a tick; overlapping ticks are rejected, not queued
    pub(crate) tick_guard: Arc<tokio::sync::Mutex<()>>,
    /// Cancelled by `shutdown`; checked between transfers
    pub(crate) cancel_token: CancellationToken,
    /// Handle of the fixed-rate loop task, present while running
    pub(crate) loop_handle: Arc<std::sync::Mutex<Option<tokio::task::JoinHandle<()>>>>,
    /// Cumulative counters
    pub(crate) stats: Arc<std::sync::Mutex<PollerStats>>,
}

/// Polls a remote SFTP directory and lands new files locally (cloneable - all fields are Arc-wrapped)
#[derive(Clone)]
pub struct SftpPoller {
    /// Full configuration
    pub(crate) config: Arc<Config>,
    /// Compiled polling parameters
    pub(crate) poll: Arc<PollConfig>,
    /// Remote operations over the shared pool
    pub(crate) session: TransferSession,
    /// Local landing directory
    pub(crate) staging: LocalStaging,
    /// Receives landed files
    pub(crate) processor: Arc<dyn FileProcessor>,
    /// Present when `health.enabled`
    pub(crate) health: Option<HealthProbe>,
    /// Event broadcast channel sender (multiple subscribers supported)
    pub(crate) event_tx: tokio::sync::broadcast::Sender<Event>,
    /// Scheduler state
    pub(crate) state: PollerState,
}

impl SftpPoller {
    /// Create a poller that talks to the configured SFTP server
    ///
    /// No connection is opened until the first tick or health check.
    pub fn new(config: Config, processor: Arc<dyn FileProcessor>) -> Result<Self> {
        let connector = Arc::new(SftpConnector::new(config.remote.clone()));
        Self::with_connector(config, connector, processor)
    }

    /// Create a poller over a custom transport
    pub fn with_connector(
        config: Config,
        connector: Arc<dyn Connector>,
        processor: Arc<dyn FileProcessor>,
    ) -> Result<Self> {
        config.validate()?;
        let poll = PollConfig::from_config(&config)?;

        let pool = ConnectionPool::new(
            connector,
            config.pool.max_connections,
            config.pool.acquire_timeout,
        );
        let session = TransferSession::new(pool, config.remote.transfer_timeout);
        let staging = LocalStaging::new(&config.local.path, &config.local.temp_suffix);

        let health = config
            .health
            .enabled
            .then(|| HealthProbe::new(session.clone(), &poll.remote_path));

        // Buffer of 1000 events per subscriber
        let (event_tx, _rx) = tokio::sync::broadcast::channel(1000);

        tracing::info!(
            host = %config.remote.host,
            remote_path = %poll.remote_path,
            local_path = %poll.local_path.display(),
            filter = %poll.filter.pattern(),
            interval_ms = poll.poll_interval.as_millis() as u64,
            max_per_poll = poll.max_per_poll,
            "SFTP poller configured"
        );

        Ok(Self {
            config: Arc::new(config),
            poll: Arc::new(poll),
            session,
            staging,
            processor,
            health,
            event_tx,
            state: PollerState {
                tick_guard: Arc::new(tokio::sync::Mutex::new(())),
                cancel_token: CancellationToken::new(),
                loop_handle: Arc::new(std::sync::Mutex::new(None)),
                stats: Arc::new(std::sync::Mutex::new(PollerStats::default())),
            },
        })
    }

    /// Subscribe to poller events
    ///
    /// Each subscriber receives all events independently. A subscriber that
    /// falls behind by more than 1000 events receives `RecvError::Lagged`.
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Snapshot of the cumulative counters
    pub fn stats(&self) -> PollerStats {
        self.lock_stats().clone()
    }

    /// Run the health probe, if enabled
    pub async fn health(&self) -> Option<HealthReport> {
        match &self.health {
            Some(probe) => Some(probe.check().await),
            None => None,
        }
    }

    /// The health probe, if enabled
    pub fn health_probe(&self) -> Option<&HealthProbe> {
        self.health.as_ref()
    }

    /// Configuration the poller was built from
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Compiled polling parameters
    pub fn poll_config(&self) -> &PollConfig {
        &self.poll
    }

    /// Remote operations (shares the poller's connection pool)
    pub fn session(&self) -> &TransferSession {
        &self.session
    }

    /// Local landing directory
    pub fn staging(&self) -> &LocalStaging {
        &self.staging
    }

    pub(crate) fn emit(&self, event: Event) {
        // No subscribers is fine
        let _ = self.event_tx.send(event);
    }

    fn lock_stats(&self) -> std::sync::MutexGuard<'_, PollerStats> {
        self.state
            .stats
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub(crate) fn record(&self, update: impl FnOnce(&mut PollerStats)) {
        update(&mut self.lock_stats());
    }

    pub(crate) fn record_error(&self, update: impl FnOnce(&mut PollerStats), error: &str) {
        let mut stats = self.lock_stats();
        update(&mut stats);
        stats.last_error = Some(error.to_string());
    }
}
