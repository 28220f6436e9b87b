//! Configuration types for sftp-poller
//!
//! The on-disk format is JSON with one nested section per key prefix, so the
//! dotted option names (`remote.host`, `poll.intervalMs`, `local.clearOnStart`, ...)
//! map one-to-one onto the document:
//!
//! ```json
//! {
//!   "remote": { "host": "sftp.example.com", "user": "feed", "password": "secret", "remotePath": "/out" },
//!   "local":  { "path": "./inbound", "clearOnStart": true },
//!   "poll":   { "intervalMs": 5000, "filterPattern": "*.csv", "maxPerPoll": 1 }
//! }
//! ```

use crate::error::{Error, Result};
use crate::filter::FileFilter;
use serde::{Deserialize, Serialize};
use std::{net::SocketAddr, path::Path, path::PathBuf, time::Duration};

/// Main configuration for [`SftpPoller`](crate::SftpPoller)
///
/// Sections:
/// - [`remote`](RemoteConfig) - SFTP server, credentials, remote directory, timeouts
/// - [`local`](LocalConfig) - local landing directory
/// - [`poll`](PollSettings) - schedule, filter, per-tick limits
/// - [`pool`](PoolConfig) - connection pool sizing
/// - [`health`](HealthConfig) - health probe switch
/// - [`api`](ApiConfig) - optional HTTP surface
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Remote SFTP server settings
    #[serde(default)]
    pub remote: RemoteConfig,

    /// Local landing directory settings
    #[serde(default)]
    pub local: LocalConfig,

    /// Polling behavior
    #[serde(default)]
    pub poll: PollSettings,

    /// Connection pool sizing
    #[serde(default)]
    pub pool: PoolConfig,

    /// Health probe settings
    #[serde(default)]
    pub health: HealthConfig,

    /// HTTP API settings
    #[serde(default)]
    pub api: ApiConfig,
}

impl Config {
    /// Parse a configuration document and validate it
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            Error::config(
                "config",
                format!("failed to read {}: {}", path.display(), e),
            )
        })?;
        Self::from_json_str(&json)
    }

    /// Check cross-field constraints that serde defaults cannot express
    pub fn validate(&self) -> Result<()> {
        let remote = &self.remote;
        if remote.host.trim().is_empty() {
            return Err(Error::config("remote.host", "must not be empty"));
        }
        if remote.port == 0 {
            return Err(Error::config("remote.port", "must be between 1 and 65535"));
        }
        if remote.user.trim().is_empty() {
            return Err(Error::config("remote.user", "must not be empty"));
        }
        if remote.password.is_none() && remote.key_path.is_none() {
            return Err(Error::config(
                "remote.password",
                "either remote.password or remote.keyPath must be set",
            ));
        }
        if remote.remote_path.trim().is_empty() {
            return Err(Error::config("remote.remotePath", "remote path is missing"));
        }
        if remote.connect_timeout.is_zero() {
            return Err(Error::config("remote.connectTimeoutMs", "must be positive"));
        }
        if remote.transfer_timeout.is_zero() {
            return Err(Error::config("remote.transferTimeoutMs", "must be positive"));
        }

        let suffix = &self.local.temp_suffix;
        if suffix.is_empty() || suffix.contains('/') || suffix.contains('\\') {
            return Err(Error::config(
                "local.tempSuffix",
                "must be a non-empty file name suffix",
            ));
        }

        if self.poll.interval.is_zero() {
            return Err(Error::config("poll.intervalMs", "must be positive"));
        }
        if self.poll.max_per_poll == 0 {
            return Err(Error::config("poll.maxPerPoll", "must be at least 1"));
        }
        FileFilter::new(&self.poll.filter_pattern, self.poll.filter_syntax)?;

        if self.pool.max_connections == 0 {
            return Err(Error::config("pool.maxConnections", "must be at least 1"));
        }
        // The tick loop holds one connection at a time; the probe needs its own slot.
        if self.health.enabled && self.pool.max_connections < 2 {
            return Err(Error::config(
                "pool.maxConnections",
                "must be at least 2 when health.enabled is true",
            ));
        }

        Ok(())
    }
}

/// SFTP server configuration
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteConfig {
    /// Server hostname
    #[serde(default)]
    pub host: String,

    /// Server port (default: 22)
    #[serde(default = "default_port")]
    pub port: u16,

    /// Login user
    #[serde(default)]
    pub user: String,

    /// Password for password authentication
    #[serde(default, skip_serializing)]
    pub password: Option<String>,

    /// Private key for public key authentication (takes precedence over password)
    #[serde(default)]
    pub key_path: Option<PathBuf>,

    /// Passphrase of the private key
    #[serde(default, skip_serializing)]
    pub key_passphrase: Option<String>,

    /// Remote directory to poll
    #[serde(default)]
    pub remote_path: String,

    /// Bound on TCP connect, SSH handshake and authentication (default: 10 seconds)
    #[serde(
        rename = "connectTimeoutMs",
        default = "default_connect_timeout",
        with = "duration_ms_serde"
    )]
    pub connect_timeout: Duration,

    /// Maximum time without receiving data during a transfer (default: 30 seconds)
    #[serde(
        rename = "transferTimeoutMs",
        default = "default_transfer_timeout",
        with = "duration_ms_serde"
    )]
    pub transfer_timeout: Duration,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: default_port(),
            user: String::new(),
            password: None,
            key_path: None,
            key_passphrase: None,
            remote_path: String::new(),
            connect_timeout: default_connect_timeout(),
            transfer_timeout: default_transfer_timeout(),
        }
    }
}

// Secrets never reach log output.
impl std::fmt::Debug for RemoteConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("key_path", &self.key_path)
            .field(
                "key_passphrase",
                &self.key_passphrase.as_ref().map(|_| "<redacted>"),
            )
            .field("remote_path", &self.remote_path)
            .field("connect_timeout", &self.connect_timeout)
            .field("transfer_timeout", &self.transfer_timeout)
            .finish()
    }
}

/// Local landing directory configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalConfig {
    /// Directory that receives landed files (default: "./inbound")
    #[serde(default = "default_local_path")]
    pub path: PathBuf,

    /// Remove everything inside `path` before the first tick (default: true)
    #[serde(default = "default_true")]
    pub clear_on_start: bool,

    /// Suffix of in-progress files (default: ".writing")
    #[serde(default = "default_temp_suffix")]
    pub temp_suffix: String,
}

impl Default for LocalConfig {
    fn default() -> Self {
        Self {
            path: default_local_path(),
            clear_on_start: true,
            temp_suffix: default_temp_suffix(),
        }
    }
}

/// File name filter syntax
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterSyntax {
    /// Shell-style glob (`*.csv`)
    #[default]
    Glob,
    /// Regular expression matched against the whole file name
    Regex,
}

/// Polling behavior
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollSettings {
    /// Fixed rate between tick starts (default: 5 seconds)
    #[serde(
        rename = "intervalMs",
        default = "default_poll_interval",
        with = "duration_ms_serde"
    )]
    pub interval: Duration,

    /// File name filter (default: "*")
    #[serde(default = "default_filter_pattern")]
    pub filter_pattern: String,

    /// Syntax of `filter_pattern` (default: glob)
    #[serde(default)]
    pub filter_syntax: FilterSyntax,

    /// Maximum number of files transferred per tick (default: 1)
    #[serde(default = "default_max_per_poll")]
    pub max_per_poll: usize,

    /// Delete the remote file once it has landed locally (default: true)
    #[serde(default = "default_true")]
    pub delete_after_transfer: bool,

    /// Copy the remote modification time onto the landed file (default: true)
    #[serde(default = "default_true")]
    pub preserve_timestamp: bool,

    /// How long `shutdown` waits for the in-flight item (default: 30 seconds)
    #[serde(
        rename = "shutdownGraceMs",
        default = "default_shutdown_grace",
        with = "duration_ms_serde"
    )]
    pub shutdown_grace: Duration,

    /// Processor invocations slower than this are logged (default: 10 seconds)
    #[serde(
        rename = "processorWarnAfterMs",
        default = "default_processor_warn_after",
        with = "duration_ms_serde"
    )]
    pub processor_warn_after: Duration,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: default_poll_interval(),
            filter_pattern: default_filter_pattern(),
            filter_syntax: FilterSyntax::default(),
            max_per_poll: default_max_per_poll(),
            delete_after_transfer: true,
            preserve_timestamp: true,
            shutdown_grace: default_shutdown_grace(),
            processor_warn_after: default_processor_warn_after(),
        }
    }
}

/// Connection pool sizing
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolConfig {
    /// Maximum number of live connections (default: 2)
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,

    /// How long a caller waits for a free connection (default: 5 seconds)
    #[serde(
        rename = "acquireTimeoutMs",
        default = "default_acquire_timeout",
        with = "duration_ms_serde"
    )]
    pub acquire_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: default_max_connections(),
            acquire_timeout: default_acquire_timeout(),
        }
    }
}

/// Health probe settings
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthConfig {
    /// Register the health probe and the `/health` route (default: true)
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// REST API configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiConfig {
    /// Start the API server alongside the poller (default: false)
    #[serde(default)]
    pub enabled: bool,

    /// Address to bind to (default: 127.0.0.1:8089)
    #[serde(default = "default_bind_address")]
    pub bind_address: SocketAddr,

    /// Enable Swagger UI at /swagger-ui (default: false)
    #[serde(default)]
    pub swagger_ui: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            bind_address: default_bind_address(),
            swagger_ui: false,
        }
    }
}

/// Runtime polling parameters, compiled once from [`Config`]
///
/// Immutable after construction and owned by the scheduler.
#[derive(Clone, Debug)]
pub struct PollConfig {
    /// Remote directory to poll
    pub remote_path: String,
    /// Local landing directory
    pub local_path: PathBuf,
    /// Compiled name filter
    pub filter: FileFilter,
    /// Fixed rate between tick starts
    pub poll_interval: Duration,
    /// Maximum number of transfers per tick
    pub max_per_poll: usize,
    /// Copy remote mtime onto landed files
    pub preserve_timestamp: bool,
    /// Delete remote files after landing
    pub delete_after_transfer: bool,
    /// Clear the local directory before the first tick
    pub clear_local_dir_on_start: bool,
    /// Bound on waiting for the in-flight item during shutdown
    pub shutdown_grace: Duration,
    /// Slow-processor warning threshold
    pub processor_warn_after: Duration,
}

impl PollConfig {
    /// Compile the polling parameters from a validated configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            remote_path: config.remote.remote_path.clone(),
            local_path: config.local.path.clone(),
            filter: FileFilter::new(&config.poll.filter_pattern, config.poll.filter_syntax)?,
            poll_interval: config.poll.interval,
            max_per_poll: config.poll.max_per_poll,
            preserve_timestamp: config.poll.preserve_timestamp,
            delete_after_transfer: config.poll.delete_after_transfer,
            clear_local_dir_on_start: config.local.clear_on_start,
            shutdown_grace: config.poll.shutdown_grace,
            processor_warn_after: config.poll.processor_warn_after,
        })
    }
}

fn default_port() -> u16 {
    22
}

fn default_true() -> bool {
    true
}

fn default_local_path() -> PathBuf {
    PathBuf::from("./inbound")
}

fn default_temp_suffix() -> String {
    ".writing".to_string()
}

fn default_filter_pattern() -> String {
    "*".to_string()
}

fn default_max_per_poll() -> usize {
    1
}

fn default_max_connections() -> usize {
    2
}

fn default_bind_address() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8089))
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_transfer_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(5)
}

fn default_shutdown_grace() -> Duration {
    Duration::from_secs(30)
}

fn default_processor_warn_after() -> Duration {
    Duration::from_secs(10)
}

fn default_acquire_timeout() -> Duration {
    Duration::from_secs(5)
}

// Duration serialization helper (integer milliseconds)
mod duration_ms_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
