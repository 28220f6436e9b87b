//! Local landing directory
//!
//! Files are written under a temporary name (`<name><suffix>`, `.writing` by
//! default) and renamed into place once complete, so a path in the landing
//! directory is either absent or holds its final content.

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tokio::io::{AsyncRead, AsyncWriteExt};
use walkdir::WalkDir;

/// Paths of one in-progress landing
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StagingFile {
    /// Where the file becomes visible after commit
    pub final_path: PathBuf,
    /// Where the content is written first
    pub temp_path: PathBuf,
}

/// The local directory that receives landed files
#[derive(Clone, Debug)]
pub struct LocalStaging {
    root: PathBuf,
    temp_suffix: String,
}

impl LocalStaging {
    /// Create a staging area rooted at `root`
    pub fn new(root: impl Into<PathBuf>, temp_suffix: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            temp_suffix: temp_suffix.into(),
        }
    }

    /// The landing directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Suffix of in-progress files
    pub fn temp_suffix(&self) -> &str {
        &self.temp_suffix
    }

    /// Startup preparation: optionally clear, then create the directory
    ///
    /// Without clearing, leftover temp files from an earlier crash are logged
    /// as orphans and left in place.
    pub async fn prepare(&self, clear: bool) -> Result<()> {
        if clear {
            let removed = clear_directory(&self.root).await?;
            tracing::info!(
                path = %self.root.display(),
                removed,
                "cleared local directory"
            );
        }

        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| Error::StagingWrite {
                path: self.root.clone(),
                reason: format!("cannot create local directory: {}", e),
            })?;

        if !clear {
            for orphan in self.find_orphans().await? {
                tracing::warn!(
                    path = %orphan.display(),
                    "staging orphan left by an interrupted transfer"
                );
            }
        }

        Ok(())
    }

    /// Whether `name` can be landed as a plain file directly under the root
    pub fn is_valid_name(&self, name: &str) -> bool {
        !name.is_empty()
            && name != "."
            && name != ".."
            && !name.contains(['/', '\\', '\0'])
            && !name.ends_with(&self.temp_suffix)
    }

    /// Paths for landing `name`
    pub fn stage(&self, name: &str) -> Result<StagingFile> {
        if !self.is_valid_name(name) {
            return Err(Error::InvalidFileName(name.to_string()));
        }
        let final_path = self.root.join(name);
        let temp_path = self.temp_path_for(&final_path);
        Ok(StagingFile {
            final_path,
            temp_path,
        })
    }

    fn temp_path_for(&self, final_path: &Path) -> PathBuf {
        let mut name = final_path.as_os_str().to_owned();
        name.push(&self.temp_suffix);
        PathBuf::from(name)
    }

    /// Copy a modification time onto the temp file (metadata only)
    pub async fn set_modified(&self, staging: &StagingFile, time: DateTime<Utc>) -> Result<()> {
        let temp_path = staging.temp_path.clone();
        let final_path = staging.final_path.clone();
        let modified = SystemTime::from(time);

        tokio::task::spawn_blocking(move || {
            std::fs::OpenOptions::new()
                .write(true)
                .open(&temp_path)
                .and_then(|file| file.set_modified(modified))
        })
        .await
        .map_err(|e| Error::Other(format!("set_modified task failed: {}", e)))?
        .map_err(|e| Error::StagingWrite {
            path: final_path,
            reason: format!("cannot set modification time: {}", e),
        })
    }

    /// Rename the temp file onto the final path and make the rename durable
    ///
    /// An existing file at the final path is replaced.
    pub async fn commit(&self, staging: &StagingFile) -> Result<PathBuf> {
        let commit_error = |reason: String| Error::StagingWrite {
            path: staging.final_path.clone(),
            reason,
        };

        tokio::fs::rename(&staging.temp_path, &staging.final_path)
            .await
            .map_err(|e| commit_error(format!("rename failed: {}", e)))?;

        if let Some(parent) = staging.final_path.parent() {
            sync_dir(parent)
                .await
                .map_err(|e| commit_error(format!("directory sync failed: {}", e)))?;
        }

        Ok(staging.final_path.clone())
    }

    /// Remove the temp file of an abandoned landing
    pub async fn abort(&self, staging: &StagingFile) {
        match tokio::fs::remove_file(&staging.temp_path).await {
            Ok(()) => {
                tracing::debug!(path = %staging.temp_path.display(), "removed temp file");
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(
                    path = %staging.temp_path.display(),
                    error = %e,
                    "failed to remove temp file"
                );
            }
        }
    }

    /// Write `bytes` to `final_path` through a temp file
    pub async fn land_atomically(&self, bytes: &[u8], final_path: &Path) -> Result<()> {
        let mut reader = bytes;
        self.land_from_reader(&mut reader, final_path).await
    }

    /// Stream `reader` to `final_path` through a temp file
    ///
    /// On any failure the temp file is removed and `final_path` is untouched.
    pub async fn land_from_reader<R>(&self, reader: &mut R, final_path: &Path) -> Result<()>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        let staging = StagingFile {
            final_path: final_path.to_path_buf(),
            temp_path: self.temp_path_for(final_path),
        };

        let result = async {
            write_synced(reader, &staging.temp_path)
                .await
                .map_err(|e| Error::StagingWrite {
                    path: staging.final_path.clone(),
                    reason: e.to_string(),
                })?;
            self.commit(&staging).await
        }
        .await;

        if result.is_err() {
            self.abort(&staging).await;
        }
        result.map(|_| ())
    }

    /// Temp files left in the root by interrupted landings
    pub async fn find_orphans(&self) -> Result<Vec<PathBuf>> {
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut orphans = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let is_file = entry.file_type().await?.is_file();
            if is_file && entry.file_name().to_string_lossy().ends_with(&self.temp_suffix) {
                orphans.push(entry.path());
            }
        }
        orphans.sort();
        Ok(orphans)
    }
}

async fn write_synced<R>(reader: &mut R, path: &Path) -> std::io::Result<()>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut file = tokio::fs::File::create(path).await?;
    tokio::io::copy(reader, &mut file).await?;
    file.flush().await?;
    file.sync_all().await
}

#[cfg(unix)]
async fn sync_dir(dir: &Path) -> std::io::Result<()> {
    tokio::fs::File::open(dir).await?.sync_all().await
}

// Directory handles cannot be synced on this platform; the rename is as durable as it gets.
#[cfg(not(unix))]
async fn sync_dir(_dir: &Path) -> std::io::Result<()> {
    Ok(())
}

/// Remove everything inside `root`, deepest entries first, keeping `root`
///
/// `root` itself may be a symbolic link to a directory; symbolic links inside
/// it are removed as links and never followed. A missing root (or a dangling
/// root link) is not an error. Returns the number of removed entries.
pub async fn clear_directory(root: &Path) -> Result<usize> {
    let root = root.to_path_buf();
    tokio::task::spawn_blocking(move || clear_directory_blocking(&root))
        .await
        .map_err(|e| Error::Other(format!("clear task failed: {}", e)))?
}

fn clear_directory_blocking(root: &Path) -> Result<usize> {
    let clear_error = |reason: String| Error::LocalDirClear {
        path: root.to_path_buf(),
        reason,
    };

    // A symlinked root is resolved once; links below it are never followed.
    let resolved = match std::fs::canonicalize(root) {
        Ok(resolved) => resolved,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(clear_error(e.to_string())),
    };
    match std::fs::metadata(&resolved) {
        Ok(meta) if meta.is_dir() => {}
        Ok(_) => return Err(clear_error("not a directory".to_string())),
        Err(e) => return Err(clear_error(e.to_string())),
    }

    let mut removed = 0;
    for entry in WalkDir::new(&resolved)
        .min_depth(1)
        .follow_links(false)
        .contents_first(true)
    {
        let entry = entry.map_err(|e| clear_error(e.to_string()))?;
        let path = entry.path();
        let outcome = if entry.file_type().is_dir() {
            std::fs::remove_dir(path)
        } else {
            std::fs::remove_file(path)
        };
        outcome.map_err(|e| clear_error(format!("{}: {}", path.display(), e)))?;
        removed += 1;
    }

    Ok(removed)
}
