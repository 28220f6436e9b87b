//! Remote reachability probe

use crate::session::TransferSession;
use crate::types::{HealthReport, HealthStatus};

/// Reports UP when the configured remote directory can be reached and exists
///
/// Every call goes to the server; results are not cached.
#[derive(Clone)]
pub struct HealthProbe {
    session: TransferSession,
    remote_path: String,
}

impl HealthProbe {
    /// Create a probe for `remote_path`
    pub fn new(session: TransferSession, remote_path: impl Into<String>) -> Self {
        Self {
            session,
            remote_path: remote_path.into(),
        }
    }

    /// Remote directory being probed
    pub fn remote_path(&self) -> &str {
        &self.remote_path
    }

    /// Probe the remote directory
    pub async fn check(&self) -> HealthReport {
        match self.session.exists(&self.remote_path).await {
            Ok(true) => HealthReport {
                status: HealthStatus::Up,
                remote_path: self.remote_path.clone(),
                remote_path_exists: Some(true),
                error: None,
            },
            Ok(false) => {
                tracing::warn!(remote_path = %self.remote_path, "remote path does not exist");
                HealthReport {
                    status: HealthStatus::Down,
                    remote_path: self.remote_path.clone(),
                    remote_path_exists: Some(false),
                    error: None,
                }
            }
            Err(e) => {
                tracing::error!(
                    remote_path = %self.remote_path,
                    error = %e,
                    "health check failed"
                );
                HealthReport {
                    status: HealthStatus::Down,
                    remote_path: self.remote_path.clone(),
                    remote_path_exists: None,
                    error: Some(e.to_string()),
                }
            }
        }
    }
}
