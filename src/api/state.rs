//! Application state for the API server

use crate::{Config, SftpPoller};
use std::sync::Arc;

/// Shared application state accessible to all route handlers
///
/// Cloned for each request (cheap Arc clones).
#[derive(Clone)]
pub struct AppState {
    /// The poller served by this API
    pub poller: SftpPoller,

    /// Configuration (read-only)
    pub config: Arc<Config>,
}

impl AppState {
    /// Create a new AppState
    pub fn new(poller: SftpPoller) -> Self {
        let config = poller.config.clone();
        Self { poller, config }
    }
}
