//! Error types for sftp-poller
//!
//! This module provides the error taxonomy of the poller, including:
//! - One variant per failure class of the polling core (list, transfer, delete, staging, ...)
//! - HTTP status code mapping for the API surface
//! - Structured error responses with machine-readable error codes

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;
use utoipa::ToSchema;

/// Result type alias for sftp-poller operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for sftp-poller
///
/// Each variant carries enough context (remote path, local path) to diagnose the
/// failure from a log line alone.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "remote.host")
        key: Option<String>,
    },

    /// Listing the remote directory failed (unreachable server or missing path)
    #[error("failed to list remote directory {path}: {reason}")]
    RemoteList {
        /// Remote directory that was listed
        path: String,
        /// Underlying failure
        reason: String,
    },

    /// Connection loss or remote/local I/O failure while transferring a file
    #[error("transfer of {remote_path} failed: {reason}")]
    TransferIo {
        /// Remote file being transferred
        remote_path: String,
        /// Underlying failure
        reason: String,
    },

    /// No data received within the configured transfer window
    #[error("transfer of {remote_path} stalled: no data for {timeout_ms} ms")]
    TransferTimeout {
        /// Remote file being transferred
        remote_path: String,
        /// Idle window that elapsed, in milliseconds
        timeout_ms: u64,
    },

    /// Removing the remote file failed (already gone or connection failure)
    #[error("failed to delete remote file {remote_path}: {reason}")]
    RemoteDelete {
        /// Remote file that could not be deleted
        remote_path: String,
        /// Underlying failure
        reason: String,
    },

    /// Writing or renaming a staged file failed; the final path was not touched
    #[error("failed to land {path}: {reason}")]
    StagingWrite {
        /// Final destination path
        path: PathBuf,
        /// Underlying failure
        reason: String,
    },

    /// Clearing the local directory at startup failed
    #[error("failed to clear local directory {path}: {reason}")]
    LocalDirClear {
        /// Directory being cleared
        path: PathBuf,
        /// Underlying failure
        reason: String,
    },

    /// The remote server could not be reached or the session could not be established
    #[error("connection error: {0}")]
    Connection(String),

    /// No pooled connection became available within the acquire timeout
    #[error("connection pool exhausted: no connection available after {waited_ms} ms")]
    PoolExhausted {
        /// How long the caller waited, in milliseconds
        waited_ms: u64,
    },

    /// The file processor failed (returned an error or panicked)
    #[error("processor failed for {path}: {reason}")]
    Processor {
        /// Local file handed to the processor
        path: PathBuf,
        /// Underlying failure
        reason: String,
    },

    /// A remote entry name that cannot be mapped to a file inside the local directory
    #[error("invalid file name: {0:?}")]
    InvalidFileName(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// API server error
    #[error("API server error: {0}")]
    ApiServerError(String),

    /// Shutdown in progress - no further ticks are started
    #[error("shutdown in progress")]
    ShuttingDown,

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Build a configuration error tied to a configuration key
    pub fn config(key: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.into()),
        }
    }

    /// Whether the error means the underlying connection can no longer be trusted
    ///
    /// Pooled connections that fail this way are discarded instead of being
    /// returned to the idle list.
    pub fn is_connection_failure(&self) -> bool {
        match self {
            Error::Connection(_) | Error::TransferTimeout { .. } => true,
            Error::TransferIo { .. } | Error::RemoteList { .. } | Error::RemoteDelete { .. } => {
                false
            }
            Error::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::ConnectionRefused
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::NotConnected
                    | std::io::ErrorKind::BrokenPipe
            ),
            _ => false,
        }
    }
}

/// API error response format
///
/// # Example JSON Response
///
/// ```json
/// {
///   "error": {
///     "code": "pool_exhausted",
///     "message": "connection pool exhausted: no connection available after 5000 ms",
///     "details": { "waited_ms": 5000 }
///   }
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiError {
    /// The error details
    pub error: ErrorDetail,
}

/// Detailed error information for API responses
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g., "remote_list_failed")
    pub code: String,

    /// Human-readable error message
    pub message: String,

    /// Optional additional context about the error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    /// Create a new API error with code and message
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }

    /// Create a "conflict" error
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new("conflict", message)
    }

    /// Create an "internal server error"
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new("internal_error", message)
    }
}

/// Convert errors to HTTP status codes for API responses
pub trait ToHttpStatus {
    /// Get the HTTP status code for this error
    fn status_code(&self) -> u16;

    /// Get the machine-readable error code
    fn error_code(&self) -> &str;
}

impl ToHttpStatus for Error {
    fn status_code(&self) -> u16 {
        match self {
            // 400 Bad Request
            Error::Config { .. } => 400,
            Error::InvalidFileName(_) => 400,

            // 500 Internal Server Error - local side
            Error::StagingWrite { .. } => 500,
            Error::LocalDirClear { .. } => 500,
            Error::Processor { .. } => 500,
            Error::Io(_) => 500,
            Error::Serialization(_) => 500,
            Error::ApiServerError(_) => 500,
            Error::Other(_) => 500,

            // 502 Bad Gateway - remote side
            Error::RemoteList { .. } => 502,
            Error::TransferIo { .. } => 502,
            Error::RemoteDelete { .. } => 502,
            Error::Connection(_) => 502,

            // 503 Service Unavailable
            Error::PoolExhausted { .. } => 503,
            Error::ShuttingDown => 503,

            // 504 Gateway Timeout
            Error::TransferTimeout { .. } => 504,
        }
    }

    fn error_code(&self) -> &str {
        match self {
            Error::Config { .. } => "config_error",
            Error::RemoteList { .. } => "remote_list_failed",
            Error::TransferIo { .. } => "transfer_io_error",
            Error::TransferTimeout { .. } => "transfer_timeout",
            Error::RemoteDelete { .. } => "remote_delete_failed",
            Error::StagingWrite { .. } => "staging_write_failed",
            Error::LocalDirClear { .. } => "local_dir_clear_failed",
            Error::Connection(_) => "connection_error",
            Error::PoolExhausted { .. } => "pool_exhausted",
            Error::Processor { .. } => "processor_error",
            Error::InvalidFileName(_) => "invalid_file_name",
            Error::Io(_) => "io_error",
            Error::Serialization(_) => "serialization_error",
            Error::ApiServerError(_) => "api_server_error",
            Error::ShuttingDown => "shutting_down",
            Error::Other(_) => "internal_error",
        }
    }
}

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        let code = error.error_code().to_string();
        let message = error.to_string();

        let details = match &error {
            Error::Config { key: Some(key), .. } => Some(serde_json::json!({
                "key": key,
            })),
            Error::RemoteList { path, .. } => Some(serde_json::json!({
                "remote_path": path,
            })),
            Error::TransferIo { remote_path, .. } | Error::RemoteDelete { remote_path, .. } => {
                Some(serde_json::json!({
                    "remote_path": remote_path,
                }))
            }
            Error::TransferTimeout {
                remote_path,
                timeout_ms,
            } => Some(serde_json::json!({
                "remote_path": remote_path,
                "timeout_ms": timeout_ms,
            })),
            Error::PoolExhausted { waited_ms } => Some(serde_json::json!({
                "waited_ms": waited_ms,
            })),
            Error::StagingWrite { path, .. }
            | Error::LocalDirClear { path, .. }
            | Error::Processor { path, .. } => Some(serde_json::json!({
                "path": path,
            })),
            _ => None,
        };

        ApiError {
            error: ErrorDetail {
                code,
                message,
                details,
            },
        }
    }
}
