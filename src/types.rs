//! Core types for sftp-poller

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use utoipa::ToSchema;

/// One entry of a remote directory listing
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct RemoteEntry {
    /// File name (no directory component)
    pub name: String,
    /// Whether the entry is a directory
    pub is_directory: bool,
    /// Size in bytes
    pub size: u64,
    /// Remote modification time, when the server reports one
    pub modified_at: Option<DateTime<Utc>>,
}

impl RemoteEntry {
    /// Regular file entry
    pub fn file(name: impl Into<String>, size: u64, modified_at: Option<DateTime<Utc>>) -> Self {
        Self {
            name: name.into(),
            is_directory: false,
            size,
            modified_at,
        }
    }

    /// Directory entry
    pub fn directory(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_directory: true,
            size: 0,
            modified_at: None,
        }
    }
}

/// Outcome of one attempted download
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct TransferResult {
    /// Remote file name
    pub remote_name: String,
    /// Whether the file landed locally
    pub success: bool,
    /// Landed file, set on success
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<String>)]
    pub local_file: Option<PathBuf>,
    /// Bytes written
    pub bytes: u64,
    /// Whether the remote source was removed after landing
    pub remote_deleted: bool,
    /// Failure description, set when the transfer or a follow-up step failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TransferResult {
    pub(crate) fn landed(remote_name: &str, local_file: PathBuf, bytes: u64) -> Self {
        Self {
            remote_name: remote_name.to_string(),
            success: true,
            local_file: Some(local_file),
            bytes,
            remote_deleted: false,
            error: None,
        }
    }

    pub(crate) fn failed(remote_name: &str, error: String) -> Self {
        Self {
            remote_name: remote_name.to_string(),
            success: false,
            local_file: None,
            bytes: 0,
            remote_deleted: false,
            error: Some(error),
        }
    }
}

/// Summary of one tick
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct TickReport {
    /// When the tick started
    pub started_at: DateTime<Utc>,
    /// Another tick was already running; nothing was done
    pub skipped: bool,
    /// Entries returned by the listing
    pub listed: usize,
    /// Entries that passed the filter
    pub eligible: usize,
    /// Entries picked for transfer this tick
    pub selected: usize,
    /// One result per attempted transfer, in listing order
    pub results: Vec<TransferResult>,
    /// Shutdown stopped the tick before all selected entries were handled
    pub cancelled: bool,
    /// Listing failure that ended the tick early
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TickReport {
    pub(crate) fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            skipped: false,
            listed: 0,
            eligible: 0,
            selected: 0,
            results: Vec::new(),
            cancelled: false,
            error: None,
        }
    }

    pub(crate) fn skipped(started_at: DateTime<Utc>) -> Self {
        Self {
            skipped: true,
            ..Self::new(started_at)
        }
    }

    /// Number of files that landed locally
    pub fn landed(&self) -> usize {
        self.results.iter().filter(|r| r.success).count()
    }
}

/// Cumulative poller counters
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PollerStats {
    /// Ticks that ran to completion (including ticks ended by a listing failure)
    pub ticks_run: u64,
    /// Ticks rejected because another tick was running
    pub ticks_skipped: u64,
    /// Files that landed locally
    pub files_landed: u64,
    /// Bytes of landed files
    pub bytes_landed: u64,
    /// Listing failures
    pub list_failures: u64,
    /// Transfer and staging failures
    pub transfer_failures: u64,
    /// Best-effort remote deletes that failed
    pub delete_failures: u64,
    /// Processor errors and panics
    pub processor_failures: u64,
    /// Start time of the most recent tick
    pub last_tick_at: Option<DateTime<Utc>>,
    /// Most recent failure
    pub last_error: Option<String>,
}

/// Health state of the remote side
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum HealthStatus {
    /// Remote path reachable and present
    Up,
    /// Remote path missing or server unreachable
    Down,
}

/// Result of a health probe
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    /// UP or DOWN
    pub status: HealthStatus,
    /// Remote directory that was probed
    pub remote_path: String,
    /// Whether the path exists; absent when the server could not be asked
    pub remote_path_exists: Option<bool>,
    /// Probe failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl HealthReport {
    /// Whether the report is UP
    pub fn is_up(&self) -> bool {
        self.status == HealthStatus::Up
    }
}

/// Event emitted during the polling lifecycle
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A tick started
    TickStarted {
        /// Tick start time
        at: DateTime<Utc>,
    },

    /// A tick was rejected because another one was running
    TickSkipped {
        /// Rejection time
        at: DateTime<Utc>,
    },

    /// A tick finished
    TickFinished {
        /// Entries that passed the filter
        eligible: usize,
        /// Files that landed
        landed: usize,
        /// Tick duration in milliseconds
        duration_ms: u64,
    },

    /// Listing the remote directory failed
    ListFailed {
        /// Remote directory
        remote_path: String,
        /// Error message
        error: String,
    },

    /// A file landed in the local directory
    FileLanded {
        /// Remote file name
        remote_name: String,
        /// Final local path
        #[schema(value_type = String)]
        local_path: PathBuf,
        /// Bytes written
        bytes: u64,
    },

    /// A transfer failed; the remote file was left in place
    TransferFailed {
        /// Remote file name
        remote_name: String,
        /// Error message
        error: String,
    },

    /// The remote source was deleted after landing
    RemoteDeleted {
        /// Remote file name
        remote_name: String,
    },

    /// Best-effort remote delete failed
    RemoteDeleteFailed {
        /// Remote file name
        remote_name: String,
        /// Error message
        error: String,
    },

    /// The processor handled a landed file
    Processed {
        /// Local file
        #[schema(value_type = String)]
        local_path: PathBuf,
        /// Processor duration in milliseconds
        duration_ms: u64,
    },

    /// The processor failed or panicked
    ProcessorFailed {
        /// Local file
        #[schema(value_type = String)]
        local_path: PathBuf,
        /// Error message
        error: String,
    },

    /// Graceful shutdown initiated
    Shutdown,
}
