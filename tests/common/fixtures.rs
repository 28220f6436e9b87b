//! Flat in-memory remote directory implementing the public transport traits

use async_trait::async_trait;
use futures::StreamExt;
use sftp_poller::session::ChunkStream;
use sftp_poller::{Connector, Error, RemoteConnection, RemoteEntry, Result};
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct Directory {
    files: Vec<(String, Vec<u8>)>,
    down: bool,
}

/// One remote directory holding plain files, shared between test and poller
#[derive(Clone)]
pub struct StubRemote {
    dir: String,
    inner: Arc<Mutex<Directory>>,
}

impl StubRemote {
    /// Empty remote directory at `dir`
    pub fn new(dir: &str) -> Self {
        Self {
            dir: dir.trim_end_matches('/').to_string(),
            inner: Arc::new(Mutex::new(Directory::default())),
        }
    }

    /// Add (or replace) a file
    pub fn put(&self, name: &str, data: &[u8]) {
        let mut inner = self.inner.lock().unwrap();
        inner.files.retain(|(n, _)| n != name);
        inner.files.push((name.to_string(), data.to_vec()));
    }

    /// Names still on the remote, in listing order
    pub fn names(&self) -> Vec<String> {
        self.inner
            .lock()
            .unwrap()
            .files
            .iter()
            .map(|(n, _)| n.clone())
            .collect()
    }

    /// Refuse every new connection and operation while `down`
    pub fn set_down(&self, down: bool) {
        self.inner.lock().unwrap().down = down;
    }

    /// Connector handing out connections to this directory
    pub fn connector(&self) -> Arc<dyn Connector> {
        Arc::new(self.clone())
    }

    fn check_up(&self) -> Result<()> {
        if self.inner.lock().unwrap().down {
            return Err(Error::Connection("server unreachable".to_string()));
        }
        Ok(())
    }

    fn name_in_dir<'a>(&self, path: &'a str) -> Option<&'a str> {
        path.strip_prefix(self.dir.as_str())?.strip_prefix('/')
    }
}

#[async_trait]
impl Connector for StubRemote {
    async fn connect(&self) -> Result<Box<dyn RemoteConnection>> {
        self.check_up()?;
        Ok(Box::new(self.clone()))
    }
}

#[async_trait]
impl RemoteConnection for StubRemote {
    async fn list(&mut self, dir: &str) -> Result<Vec<RemoteEntry>> {
        self.check_up()?;
        if dir.trim_end_matches('/') != self.dir {
            return Err(Error::RemoteList {
                path: dir.to_string(),
                reason: "no such file".to_string(),
            });
        }
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .files
            .iter()
            .map(|(name, data)| RemoteEntry::file(name.clone(), data.len() as u64, None))
            .collect())
    }

    async fn open_read(&mut self, path: &str) -> Result<ChunkStream> {
        self.check_up()?;
        let data = {
            let inner = self.inner.lock().unwrap();
            self.name_in_dir(path)
                .and_then(|name| inner.files.iter().find(|(n, _)| n == name))
                .map(|(_, data)| data.clone())
        };
        let data = data.ok_or_else(|| Error::TransferIo {
            remote_path: path.to_string(),
            reason: "no such file".to_string(),
        })?;
        Ok(futures::stream::iter([Ok(data)]).boxed())
    }

    async fn remove(&mut self, path: &str) -> Result<()> {
        self.check_up()?;
        let removed = {
            let mut inner = self.inner.lock().unwrap();
            let before = inner.files.len();
            if let Some(name) = self.name_in_dir(path) {
                inner.files.retain(|(n, _)| n != name);
            }
            inner.files.len() != before
        };
        if !removed {
            return Err(Error::RemoteDelete {
                remote_path: path.to_string(),
                reason: "no such file".to_string(),
            });
        }
        Ok(())
    }

    async fn exists(&mut self, path: &str) -> Result<bool> {
        self.check_up()?;
        let path = path.trim_end_matches('/');
        if path == self.dir {
            return Ok(true);
        }
        let inner = self.inner.lock().unwrap();
        Ok(self
            .name_in_dir(path)
            .is_some_and(|name| inner.files.iter().any(|(n, _)| n == name)))
    }
}
