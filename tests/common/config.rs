//! Test configuration helpers for in-memory and live pollers

use sftp_poller::Config;
use std::path::Path;
use std::time::Duration;

/// Error type for test configuration
#[derive(Debug)]
pub struct ConfigError(pub String);

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Config error: {}", self.0)
    }
}

impl std::error::Error for ConfigError {}

/// Configuration polling `remote_dir` into `local`, tuned for fast tests
pub fn fast_config(remote_dir: &str, local: &Path) -> Config {
    let json = serde_json::json!({
        "remote": {
            "host": "stub.invalid",
            "user": "tester",
            "password": "not-used",
            "remotePath": remote_dir,
            "transferTimeoutMs": 2000
        },
        "local": { "path": local },
        "poll": { "intervalMs": 50, "shutdownGraceMs": 5000 },
        "pool": { "acquireTimeoutMs": 500 }
    });
    Config::from_json_str(&json.to_string()).unwrap()
}

/// Load SFTP server settings from environment variables
///
/// Required environment variables:
/// - `SFTP_HOST` - Server hostname
/// - `SFTP_USER` - Login user
/// - `SFTP_PASSWORD` or `SFTP_KEY_PATH` - Credentials
/// - `SFTP_REMOTE_PATH` - Directory to poll (must exist and be writable)
///
/// Optional environment variables:
/// - `SFTP_PORT` - Port (default: 22)
pub fn load_live_config(local: &Path) -> Result<Config, ConfigError> {
    dotenvy::dotenv().ok();

    let var = |name: &str| {
        std::env::var(name).map_err(|_| ConfigError(format!("{name} not set in environment")))
    };

    let mut config = Config::default();
    config.remote.host = var("SFTP_HOST")?;
    config.remote.user = var("SFTP_USER")?;
    config.remote.remote_path = var("SFTP_REMOTE_PATH")?;
    config.remote.password = std::env::var("SFTP_PASSWORD").ok();
    config.remote.key_path = std::env::var("SFTP_KEY_PATH").ok().map(Into::into);
    config.remote.port = std::env::var("SFTP_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(22);
    config.remote.connect_timeout = Duration::from_secs(10);
    config.local.path = local.to_path_buf();

    config
        .validate()
        .map_err(|e| ConfigError(e.to_string()))?;
    Ok(config)
}

/// Whether live SFTP credentials are available
pub fn has_live_credentials() -> bool {
    dotenvy::dotenv().ok();
    std::env::var("SFTP_HOST").is_ok() && std::env::var("SFTP_REMOTE_PATH").is_ok()
}
