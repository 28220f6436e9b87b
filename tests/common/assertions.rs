//! Event-waiting helpers for integration tests

use sftp_poller::{Event, SftpPoller};
use std::time::Duration;
use tokio::sync::broadcast::Receiver;

/// Wait until an event satisfying `matches` arrives, or `timeout` passes
pub async fn wait_for_event(
    events: &mut Receiver<Event>,
    timeout: Duration,
    matches: impl Fn(&Event) -> bool,
) -> Option<Event> {
    tokio::time::timeout(timeout, async {
        loop {
            match events.recv().await {
                Ok(event) if matches(&event) => return Some(event),
                Ok(_) => continue,
                Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                Err(_) => return None,
            }
        }
    })
    .await
    .ok()
    .flatten()
}

/// Wait until the poller has landed at least `count` files in total
pub async fn wait_for_landed(poller: &SftpPoller, count: u64, timeout: Duration) -> bool {
    tokio::time::timeout(timeout, async {
        while poller.stats().files_landed < count {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .is_ok()
}
