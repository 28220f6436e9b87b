//! In-memory remote server for tests
//!
//! A virtual directory tree keyed by canonical absolute path. Entries keep
//! insertion order so listings are deterministic. Failure switches simulate an
//! unreachable server, stalled transfers and files vanishing before delete.

use super::{ChunkStream, Connector, RemoteConnection};
use crate::error::{Error, Result};
use crate::types::RemoteEntry;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Clone, Debug)]
enum Node {
    File {
        data: Vec<u8>,
        modified_at: Option<DateTime<Utc>>,
    },
    Dir,
}

#[derive(Default)]
struct State {
    nodes: Vec<(String, Node)>,
    unreachable: bool,
    chunk_size: Option<usize>,
    stall_after_chunks: Option<usize>,
    vanish_before_delete: HashSet<String>,
    deleted: Vec<String>,
}

impl State {
    fn find(&self, path: &str) -> Option<&Node> {
        self.nodes.iter().find(|(p, _)| p == path).map(|(_, n)| n)
    }

    fn remove(&mut self, path: &str) -> bool {
        let before = self.nodes.len();
        self.nodes.retain(|(p, _)| p != path);
        self.nodes.len() != before
    }

    fn ensure_parents(&mut self, path: &str) {
        let mut current = String::new();
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        for segment in &segments[..segments.len().saturating_sub(1)] {
            current.push('/');
            current.push_str(segment);
            if self.find(&current).is_none() {
                self.nodes.push((current.clone(), Node::Dir));
            }
        }
    }
}

/// Collapse `.` and empty segments, resolve `..`, reject escapes above the root
pub(crate) fn canonicalize(path: &str) -> Result<String> {
    let mut parts: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if parts.pop().is_none() {
                    return Err(Error::Other(format!("path escapes root: {}", path)));
                }
            }
            other => parts.push(other),
        }
    }
    Ok(format!("/{}", parts.join("/")))
}

fn parent_of(path: &str) -> &str {
    match path.rfind('/') {
        Some(0) => "/",
        Some(i) => &path[..i],
        None => "/",
    }
}

/// Shared handle to a virtual remote tree
#[derive(Clone, Default)]
pub(crate) struct MemoryRemote {
    state: Arc<Mutex<State>>,
    connects: Arc<AtomicUsize>,
}

impl MemoryRemote {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    pub(crate) fn connector(&self) -> MemoryConnector {
        MemoryConnector {
            remote: self.clone(),
        }
    }

    pub(crate) fn add_dir(&self, path: &str) {
        let path = canonicalize(path).unwrap();
        let mut state = self.state();
        state.ensure_parents(&path);
        if state.find(&path).is_none() {
            state.nodes.push((path, Node::Dir));
        }
    }

    pub(crate) fn add_file(&self, path: &str, data: &[u8]) {
        self.add_file_with_mtime(path, data, None);
    }

    pub(crate) fn add_file_with_mtime(
        &self,
        path: &str,
        data: &[u8],
        modified_at: Option<DateTime<Utc>>,
    ) {
        let path = canonicalize(path).unwrap();
        let mut state = self.state();
        state.ensure_parents(&path);
        state.remove(&path);
        state.nodes.push((
            path,
            Node::File {
                data: data.to_vec(),
                modified_at,
            },
        ));
    }

    pub(crate) fn contains(&self, path: &str) -> bool {
        let path = canonicalize(path).unwrap();
        self.state().find(&path).is_some()
    }

    pub(crate) fn remove_file(&self, path: &str) {
        let path = canonicalize(path).unwrap();
        self.state().remove(&path);
    }

    /// Remote paths successfully deleted through a connection, in order
    pub(crate) fn deleted(&self) -> Vec<String> {
        self.state().deleted.clone()
    }

    pub(crate) fn set_unreachable(&self, unreachable: bool) {
        self.state().unreachable = unreachable;
    }

    pub(crate) fn set_chunk_size(&self, size: usize) {
        self.state().chunk_size = Some(size.max(1));
    }

    /// Stop sending data (without closing the stream) after `chunks` chunks
    pub(crate) fn stall_after_chunks(&self, chunks: Option<usize>) {
        self.state().stall_after_chunks = chunks;
    }

    /// Make `path` disappear right before a delete reaches it
    pub(crate) fn vanish_before_delete(&self, path: &str) {
        let path = canonicalize(path).unwrap();
        self.state().vanish_before_delete.insert(path);
    }

    pub(crate) fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

pub(crate) struct MemoryConnector {
    remote: MemoryRemote,
}

#[async_trait]
impl Connector for MemoryConnector {
    async fn connect(&self) -> Result<Box<dyn RemoteConnection>> {
        if self.remote.state().unreachable {
            return Err(Error::Connection("connection refused".to_string()));
        }
        self.remote.connects.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MemoryConnection {
            remote: self.remote.clone(),
        }))
    }
}

struct MemoryConnection {
    remote: MemoryRemote,
}

impl MemoryConnection {
    fn check_reachable(&self) -> Result<()> {
        if self.remote.state().unreachable {
            return Err(Error::Connection("connection reset by peer".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteConnection for MemoryConnection {
    async fn list(&mut self, dir: &str) -> Result<Vec<RemoteEntry>> {
        self.check_reachable()?;
        let list_error = |reason: &str| Error::RemoteList {
            path: dir.to_string(),
            reason: reason.to_string(),
        };
        let dir_path = canonicalize(dir).map_err(|e| list_error(&e.to_string()))?;
        let state = self.remote.state();

        if dir_path != "/" && !matches!(state.find(&dir_path), Some(Node::Dir)) {
            return Err(list_error("no such file"));
        }

        Ok(state
            .nodes
            .iter()
            .filter(|(path, _)| path != "/" && parent_of(path) == dir_path)
            .map(|(path, node)| {
                let name = path.rsplit('/').next().unwrap_or_default().to_string();
                match node {
                    Node::File { data, modified_at } => {
                        RemoteEntry::file(name, data.len() as u64, *modified_at)
                    }
                    Node::Dir => RemoteEntry::directory(name),
                }
            })
            .collect())
    }

    async fn open_read(&mut self, path: &str) -> Result<ChunkStream> {
        self.check_reachable()?;
        let not_found = || Error::TransferIo {
            remote_path: path.to_string(),
            reason: "no such file".to_string(),
        };
        let canonical = canonicalize(path).map_err(|_| not_found())?;
        let state = self.remote.state();
        let Some(Node::File { data, .. }) = state.find(&canonical) else {
            return Err(not_found());
        };

        let chunk_size = state.chunk_size.unwrap_or(usize::MAX).min(data.len().max(1));
        let chunks: Vec<Result<Vec<u8>>> = data
            .chunks(chunk_size)
            .map(|c| Ok(c.to_vec()))
            .collect();

        Ok(match state.stall_after_chunks {
            Some(n) => futures::stream::iter(chunks.into_iter().take(n))
                .chain(futures::stream::pending())
                .boxed(),
            None => futures::stream::iter(chunks).boxed(),
        })
    }

    async fn remove(&mut self, path: &str) -> Result<()> {
        self.check_reachable()?;
        let canonical = canonicalize(path)?;
        let mut state = self.remote.state();

        if state.vanish_before_delete.remove(&canonical) {
            state.remove(&canonical);
        }

        match state.find(&canonical) {
            Some(Node::File { .. }) => {
                state.remove(&canonical);
                state.deleted.push(canonical);
                Ok(())
            }
            _ => Err(Error::RemoteDelete {
                remote_path: path.to_string(),
                reason: "no such file".to_string(),
            }),
        }
    }

    async fn exists(&mut self, path: &str) -> Result<bool> {
        self.check_reachable()?;
        let canonical = canonicalize(path)?;
        Ok(canonical == "/" || self.remote.state().find(&canonical).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonicalize_collapses_dots_and_slashes() {
        assert_eq!(canonicalize("/out//./a.csv").unwrap(), "/out/a.csv");
        assert_eq!(canonicalize("out/sub/../a.csv").unwrap(), "/out/a.csv");
        assert_eq!(canonicalize("/").unwrap(), "/");
        assert!(canonicalize("/../etc/passwd").is_err());
    }

    #[tokio::test]
    async fn listing_only_returns_direct_children() {
        let remote = MemoryRemote::new();
        remote.add_file("/out/a.csv", b"a");
        remote.add_file("/out/nested/deep.csv", b"d");

        let mut conn = remote.connector().connect().await.unwrap();
        let names: Vec<_> = conn
            .list("/out")
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.name)
            .collect();

        assert_eq!(names, vec!["a.csv", "nested"]);
    }
}
