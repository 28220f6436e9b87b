//! One poll-and-transfer cycle.

use crate::error::{Error, Result};
use crate::session::join_remote;
use crate::staging::StagingFile;
use crate::types::{Event, RemoteEntry, TickReport, TransferResult};
use chrono::Utc;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::time::Instant;

use super::SftpPoller;

impl SftpPoller {
    /// Run one tick now
    ///
    /// Lists the remote directory, lands up to `maxPerPoll` matching files in
    /// listing order, deletes each remote source after its landing is durable
    /// and hands the local file to the processor. Transfers run sequentially;
    /// shutdown is honored between them.
    ///
    /// If another tick is already running this returns immediately with a
    /// `skipped` report.
    pub async fn tick(&self) -> TickReport {
        let started_at = Utc::now();

        let Ok(_guard) = self.state.tick_guard.try_lock() else {
            tracing::debug!("tick already running, skipping");
            self.record(|s| s.ticks_skipped += 1);
            self.emit(Event::TickSkipped { at: started_at });
            return TickReport::skipped(started_at);
        };

        let mut report = TickReport::new(started_at);
        if self.state.cancel_token.is_cancelled() {
            report.cancelled = true;
            return report;
        }

        let clock = Instant::now();
        self.record(|s| s.last_tick_at = Some(started_at));
        self.emit(Event::TickStarted { at: started_at });

        self.run_tick(&mut report).await;

        self.record(|s| s.ticks_run += 1);
        let duration_ms = clock.elapsed().as_millis() as u64;
        tracing::debug!(
            listed = report.listed,
            eligible = report.eligible,
            selected = report.selected,
            landed = report.landed(),
            duration_ms,
            "tick finished"
        );
        self.emit(Event::TickFinished {
            eligible: report.eligible,
            landed: report.landed(),
            duration_ms,
        });

        report
    }

    async fn run_tick(&self, report: &mut TickReport) {
        let remote_path = &self.poll.remote_path;

        let entries = match self.session.list(remote_path).await {
            Ok(entries) => entries,
            Err(e) => {
                tracing::error!(remote_path = %remote_path, error = %e, "failed to list remote directory");
                let message = e.to_string();
                self.record_error(|s| s.list_failures += 1, &message);
                self.emit(Event::ListFailed {
                    remote_path: remote_path.clone(),
                    error: message.clone(),
                });
                report.error = Some(message);
                return;
            }
        };
        report.listed = entries.len();

        let eligible: Vec<RemoteEntry> = entries
            .into_iter()
            .filter(|entry| self.is_eligible(entry))
            .collect();
        report.eligible = eligible.len();

        let selected: Vec<RemoteEntry> = eligible.into_iter().take(self.poll.max_per_poll).collect();
        report.selected = selected.len();

        for (index, entry) in selected.iter().enumerate() {
            if self.state.cancel_token.is_cancelled() {
                tracing::info!(
                    remaining = selected.len() - index,
                    "shutdown requested, leaving remaining files for the next run"
                );
                report.cancelled = true;
                break;
            }
            let result = self.transfer_one(entry).await;
            report.results.push(result);
        }
    }

    fn is_eligible(&self, entry: &RemoteEntry) -> bool {
        !entry.is_directory
            && self.staging.is_valid_name(&entry.name)
            && self.poll.filter.is_match(&entry.name)
    }

    /// Land one remote file, then delete the source and hand the file off
    async fn transfer_one(&self, entry: &RemoteEntry) -> TransferResult {
        let remote_path = join_remote(&self.poll.remote_path, &entry.name);

        let staging = match self.staging.stage(&entry.name) {
            Ok(staging) => staging,
            Err(e) => return self.transfer_failed(&entry.name, e),
        };

        let (local_file, bytes) = match self.land(entry, &remote_path, &staging).await {
            Ok(landed) => landed,
            Err(e) => {
                self.staging.abort(&staging).await;
                return self.transfer_failed(&entry.name, e);
            }
        };

        tracing::info!(
            remote_path = %remote_path,
            local_path = %local_file.display(),
            bytes,
            "file landed"
        );
        self.record(|s| {
            s.files_landed += 1;
            s.bytes_landed += bytes;
        });
        self.emit(Event::FileLanded {
            remote_name: entry.name.clone(),
            local_path: local_file.clone(),
            bytes,
        });

        let mut result = TransferResult::landed(&entry.name, local_file.clone(), bytes);

        // The landing is durable at this point; the delete is best-effort and never retried.
        if self.poll.delete_after_transfer {
            match self.session.delete(&remote_path).await {
                Ok(()) => {
                    tracing::debug!(remote_path = %remote_path, "remote file deleted");
                    result.remote_deleted = true;
                    self.emit(Event::RemoteDeleted {
                        remote_name: entry.name.clone(),
                    });
                }
                Err(e) => {
                    tracing::warn!(
                        remote_path = %remote_path,
                        error = %e,
                        "failed to delete remote file after transfer"
                    );
                    let message = e.to_string();
                    self.record_error(|s| s.delete_failures += 1, &message);
                    self.emit(Event::RemoteDeleteFailed {
                        remote_name: entry.name.clone(),
                        error: message.clone(),
                    });
                    result.error = Some(message);
                }
            }
        }

        if let Err(e) = self.hand_off(&local_file).await {
            result.error.get_or_insert_with(|| e.to_string());
        }

        result
    }

    /// Download into the temp path, preserve the mtime, commit
    async fn land(
        &self,
        entry: &RemoteEntry,
        remote_path: &str,
        staging: &StagingFile,
    ) -> Result<(PathBuf, u64)> {
        let bytes = self
            .session
            .download(remote_path, &staging.temp_path)
            .await?;

        if self.poll.preserve_timestamp
            && let Some(modified_at) = entry.modified_at
            && let Err(e) = self.staging.set_modified(staging, modified_at).await
        {
            tracing::warn!(
                path = %staging.temp_path.display(),
                error = %e,
                "could not preserve remote modification time"
            );
        }

        let local_file = self.staging.commit(staging).await?;
        Ok((local_file, bytes))
    }

    fn transfer_failed(&self, remote_name: &str, error: Error) -> TransferResult {
        tracing::error!(
            remote_name,
            error = %error,
            "transfer failed, remote file left in place"
        );
        let message = error.to_string();
        self.record_error(|s| s.transfer_failures += 1, &message);
        self.emit(Event::TransferFailed {
            remote_name: remote_name.to_string(),
            error: message.clone(),
        });
        TransferResult::failed(remote_name, message)
    }

    /// Call the processor, containing errors and panics
    async fn hand_off(&self, path: &Path) -> Result<()> {
        let clock = Instant::now();
        let warn_after = self.poll.processor_warn_after;

        let mut call = std::pin::pin!(AssertUnwindSafe(self.processor.handle(path)).catch_unwind());
        let outcome = match tokio::time::timeout(warn_after, call.as_mut()).await {
            Ok(outcome) => outcome,
            Err(_) => {
                tracing::warn!(
                    path = %path.display(),
                    warn_after_ms = warn_after.as_millis() as u64,
                    "processor is taking longer than expected"
                );
                call.await
            }
        };
        let duration_ms = clock.elapsed().as_millis() as u64;

        let error = match outcome {
            Ok(Ok(())) => {
                tracing::debug!(path = %path.display(), duration_ms, "processor finished");
                self.emit(Event::Processed {
                    local_path: path.to_path_buf(),
                    duration_ms,
                });
                return Ok(());
            }
            Ok(Err(e)) => Error::Processor {
                path: path.to_path_buf(),
                reason: e.to_string(),
            },
            Err(panic) => Error::Processor {
                path: path.to_path_buf(),
                reason: format!("processor panicked: {}", panic_message(panic.as_ref())),
            },
        };

        tracing::error!(path = %path.display(), error = %error, "processor failed");
        let message = error.to_string();
        self.record_error(|s| s.processor_failures += 1, &message);
        self.emit(Event::ProcessorFailed {
            local_path: path.to_path_buf(),
            error: message,
        });
        Err(error)
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
