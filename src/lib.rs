//! # sftp-poller
//!
//! Polls a directory on an SFTP server, lands matching files in a local
//! directory and hands each landed file to application code.
//!
//! ## Design Philosophy
//!
//! - **Land, then delete** - a remote file is removed only after its local
//!   copy is complete and durable under its final name
//! - **Bounded ticks** - every tick moves at most `poll.maxPerPoll` files, and
//!   a tick never overlaps another
//! - **Library-first** - embed [`SftpPoller`] and plug in a [`FileProcessor`];
//!   the REST API is optional
//! - **Event-driven** - consumers subscribe to events instead of scraping logs
//!
//! ## Quick Start
//!
//! ```no_run
//! use sftp_poller::{Config, LoggingProcessor, SftpPoller};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_json_str(
//!         r#"{
//!             "remote": { "host": "sftp.example.com", "user": "feed",
//!                         "password": "secret", "remotePath": "/outgoing" },
//!             "local": { "path": "./landing" },
//!             "poll": { "filterPattern": "*.csv" }
//!         }"#,
//!     )?;
//!
//!     let poller = SftpPoller::new(config, Arc::new(LoggingProcessor))?;
//!
//!     // Subscribe to events
//!     let mut events = poller.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     poller.start().await?;
//!     sftp_poller::run_with_shutdown(poller).await?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// REST API module
pub mod api;
/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// File name filters
pub mod filter;
/// Remote health probe
pub mod health;
/// Polling scheduler (decomposed into focused submodules)
pub mod poller;
/// Landed-file hand-off
pub mod processor;
/// Remote operations and connection pooling
pub mod session;
/// Local landing directory
pub mod staging;
/// Core types and events
pub mod types;

// Re-export commonly used types
pub use config::{Config, FilterSyntax, PollConfig};
pub use error::{ApiError, Error, ErrorDetail, Result, ToHttpStatus};
pub use filter::FileFilter;
pub use health::HealthProbe;
pub use poller::SftpPoller;
pub use processor::{FileProcessor, LoggingProcessor};
pub use session::{ConnectionPool, Connector, RemoteConnection, SftpConnector, TransferSession};
pub use staging::{LocalStaging, StagingFile};
pub use types::{
    Event, HealthReport, HealthStatus, PollerStats, RemoteEntry, TickReport, TransferResult,
};

/// Run until SIGTERM or Ctrl+C, then shut the poller down gracefully.
///
/// On unix both SIGTERM and SIGINT stop the poller; elsewhere only Ctrl+C
/// does. Call [`SftpPoller::start`] first.
pub async fn run_with_shutdown(poller: SftpPoller) -> Result<()> {
    let signal = wait_for_signal().await;
    tracing::info!(signal, "stop signal received, shutting down poller");
    poller.shutdown().await
}

#[cfg(unix)]
async fn wait_for_signal() -> &'static str {
    use tokio::signal::unix::{SignalKind, signal};

    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => tokio::select! {
            _ = sigterm.recv() => "SIGTERM",
            signal = ctrl_c() => signal,
        },
        Err(e) => {
            tracing::warn!(error = %e, "SIGTERM unavailable, only Ctrl+C stops the poller");
            ctrl_c().await
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() -> &'static str {
    ctrl_c().await
}

async fn ctrl_c() -> &'static str {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "cannot listen for Ctrl+C, stopping now");
    }
    "SIGINT"
}
