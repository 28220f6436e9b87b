//! Startup, the fixed-rate loop and shutdown coordination.

use crate::error::{Error, Result};
use crate::types::Event;

use super::SftpPoller;

impl SftpPoller {
    /// Prepare the local directory and start the fixed-rate loop
    ///
    /// With `local.clearOnStart` the local directory is emptied first; a
    /// failure to clear it is fatal and no tick runs. The first tick starts
    /// immediately, later ticks every `poll.intervalMs`.
    ///
    /// # Errors
    ///
    /// [`Error::LocalDirClear`] or [`Error::StagingWrite`] when the local
    /// directory cannot be prepared, [`Error::ShuttingDown`] after `shutdown`,
    /// [`Error::Other`] when already running.
    pub async fn start(&self) -> Result<()> {
        if self.state.cancel_token.is_cancelled() {
            return Err(Error::ShuttingDown);
        }
        if self.is_running() {
            return Err(Error::Other("poller is already running".to_string()));
        }

        self.staging
            .prepare(self.poll.clear_local_dir_on_start)
            .await?;

        let poller = self.clone();
        let handle = tokio::spawn(async move {
            poller.run_loop().await;
        });

        let mut slot = self
            .state
            .loop_handle
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if slot.as_ref().is_some_and(|h| !h.is_finished()) {
            handle.abort();
            return Err(Error::Other("poller is already running".to_string()));
        }
        *slot = Some(handle);

        tracing::info!(
            remote_path = %self.poll.remote_path,
            interval_ms = self.poll.poll_interval.as_millis() as u64,
            "SFTP poller started"
        );
        Ok(())
    }

    /// Whether the fixed-rate loop is running
    pub fn is_running(&self) -> bool {
        self.state
            .loop_handle
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }

    /// Whether `shutdown` has been called
    pub fn is_shutting_down(&self) -> bool {
        self.state.cancel_token.is_cancelled()
    }

    /// Spawn the REST API server in a background task
    ///
    /// The server stops on its own once the poller shuts down.
    pub fn spawn_api_server(&self) -> tokio::task::JoinHandle<Result<()>> {
        let poller = self.clone();
        tokio::spawn(async move { crate::api::start_api_server(poller).await })
    }

    async fn run_loop(self) {
        let mut interval = tokio::time::interval(self.poll.poll_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.tick().await;
                }
                _ = self.state.cancel_token.cancelled() => {
                    break;
                }
            }
        }

        tracing::info!("polling loop stopped");
    }

    /// Gracefully shut down the poller
    ///
    /// Stops the timer and lets the running tick finish its current file
    /// (including the processor hand-off); remaining selected files stay on
    /// the server for the next run. Waits up to `poll.shutdownGraceMs` in total
    /// for the loop and any manually triggered tick, aborting the loop when the
    /// grace period runs out. Idle pooled connections are closed.
    pub async fn shutdown(&self) -> Result<()> {
        tracing::info!("Initiating graceful shutdown");

        // 1. Stop scheduling and signal the running tick
        self.state.cancel_token.cancel();

        // 2. Wait for the loop to wind down; one deadline covers steps 2 and 3
        let grace = self.poll.shutdown_grace;
        let deadline = tokio::time::Instant::now() + grace;
        let handle = self
            .state
            .loop_handle
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();

        if let Some(mut handle) = handle {
            match tokio::time::timeout_at(deadline, &mut handle).await {
                Ok(Ok(())) => {
                    tracing::info!("polling loop finished gracefully");
                }
                Ok(Err(e)) => {
                    tracing::warn!(error = %e, "polling loop ended abnormally");
                }
                Err(_) => {
                    tracing::warn!(
                        grace_ms = grace.as_millis() as u64,
                        "timeout waiting for the running tick, aborting it"
                    );
                    handle.abort();
                    // Resolves once the aborted task is dropped and its tick guard released
                    let _ = handle.await;
                }
            }
        }

        // 3. Manual ticks still in flight finish their current file the same way
        if tokio::time::timeout_at(deadline, self.state.tick_guard.lock())
            .await
            .is_err()
        {
            tracing::warn!("a manually triggered tick is still running");
        }

        // 4. Close idle connections
        self.session.pool().close();

        self.emit(Event::Shutdown);
        tracing::info!("Graceful shutdown complete");
        Ok(())
    }
}
