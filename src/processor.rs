//! Hand-off of landed files to application code

use crate::error::Result;
use async_trait::async_trait;
use std::path::Path;
use tokio::io::{AsyncBufReadExt, BufReader};

/// Receives every file after it has landed in the local directory
///
/// Called once per landed file, awaited inside the tick that landed it. An
/// error (or a panic) is logged and counted; it never brings the remote file
/// back, and the poller keeps running.
#[async_trait]
pub trait FileProcessor: Send + Sync {
    /// Process the landed file at `path`
    async fn handle(&self, path: &Path) -> Result<()>;
}

/// Processor that logs the file name and each of its lines
#[derive(Clone, Copy, Debug, Default)]
pub struct LoggingProcessor;

#[async_trait]
impl FileProcessor for LoggingProcessor {
    async fn handle(&self, path: &Path) -> Result<()> {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        tracing::info!(file = %file_name, "processing file");

        let mut reader = BufReader::new(tokio::fs::File::open(path).await?);
        let mut buf = Vec::new();
        let mut lines = 0usize;
        loop {
            buf.clear();
            if reader.read_until(b'\n', &mut buf).await? == 0 {
                break;
            }
            lines += 1;
            let line = String::from_utf8_lossy(&buf);
            tracing::info!(file = %file_name, line = %line.trim_end_matches(['\r', '\n']), "line");
        }

        tracing::debug!(file = %file_name, lines, "finished processing file");
        Ok(())
    }
}
