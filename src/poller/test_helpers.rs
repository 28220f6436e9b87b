//! Shared test helpers for creating SftpPoller instances in tests.

use crate::config::Config;
use crate::error::{Error, Result};
use crate::processor::FileProcessor;
use crate::session::test_helpers::MemoryRemote;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::SftpPoller;

/// What the recording processor does with each file
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) enum Behavior {
    #[default]
    Succeed,
    Fail,
    Panic,
    Sleep(Duration),
}

/// Processor that remembers every path (and content) it was handed
#[derive(Default)]
pub(crate) struct RecordingProcessor {
    calls: Mutex<Vec<(PathBuf, Vec<u8>)>>,
    behavior: Mutex<Behavior>,
}

impl RecordingProcessor {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn with_behavior(behavior: Behavior) -> Arc<Self> {
        let processor = Self::default();
        *processor.behavior.lock().unwrap() = behavior;
        Arc::new(processor)
    }

    pub(crate) fn paths(&self) -> Vec<PathBuf> {
        self.calls.lock().unwrap().iter().map(|(p, _)| p.clone()).collect()
    }

    pub(crate) fn contents(&self) -> Vec<Vec<u8>> {
        self.calls.lock().unwrap().iter().map(|(_, c)| c.clone()).collect()
    }
}

#[async_trait]
impl FileProcessor for RecordingProcessor {
    async fn handle(&self, path: &Path) -> Result<()> {
        let content = tokio::fs::read(path).await?;
        self.calls.lock().unwrap().push((path.to_path_buf(), content));

        let behavior = *self.behavior.lock().unwrap();
        match behavior {
            Behavior::Succeed => Ok(()),
            Behavior::Fail => Err(Error::Other("rejected by processor".to_string())),
            Behavior::Panic => panic!("processor exploded"),
            Behavior::Sleep(duration) => {
                tokio::time::sleep(duration).await;
                Ok(())
            }
        }
    }
}

/// Valid configuration polling `/out` into `local`
pub(crate) fn test_config(local: &Path) -> Config {
    let mut config = Config::default();
    config.remote.host = "sftp.test".to_string();
    config.remote.user = "feed".to_string();
    config.remote.password = Some("secret".to_string());
    config.remote.remote_path = "/out".to_string();
    config.remote.transfer_timeout = Duration::from_millis(300);
    config.local.path = local.to_path_buf();
    config.poll.interval = Duration::from_millis(50);
    config.poll.shutdown_grace = Duration::from_secs(5);
    config.pool.acquire_timeout = Duration::from_millis(200);
    config
}

/// Poller over an in-memory remote
pub(crate) fn create_test_poller(
    remote: &MemoryRemote,
    config: Config,
    processor: Arc<RecordingProcessor>,
) -> SftpPoller {
    SftpPoller::with_connector(config, Arc::new(remote.connector()), processor).unwrap()
}
