//! Polling daemon example
//!
//! Loads a JSON configuration, starts the poller with the logging processor
//! and, when `api.enabled` is set, the REST API.
//!
//! ```text
//! cargo run --example poll_sftp -- poller.json
//! SFTP_POLLER_CONFIG=poller.json RUST_LOG=sftp_poller=debug cargo run --example poll_sftp
//! ```
//!
//! After starting (with the API enabled) you can:
//! - Check the remote via GET http://localhost:8089/health
//! - Trigger a poll via POST http://localhost:8089/poll
//! - Stream events via GET http://localhost:8089/events

use sftp_poller::{Config, LoggingProcessor, SftpPoller};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config_path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("SFTP_POLLER_CONFIG").ok())
        .unwrap_or_else(|| "poller.json".to_string());
    let config = Config::load(&config_path)?;
    let api_enabled = config.api.enabled;

    let poller = SftpPoller::new(config, Arc::new(LoggingProcessor))?;

    // Print every event alongside the structured log
    let mut events = poller.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            println!("Event: {:?}", event);
        }
    });

    poller.start().await?;

    let api_handle = api_enabled.then(|| poller.spawn_api_server());

    sftp_poller::run_with_shutdown(poller).await?;

    if let Some(handle) = api_handle {
        handle.await??;
    }
    Ok(())
}
