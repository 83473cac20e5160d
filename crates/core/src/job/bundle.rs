//! Staged bundle file owned by a single job.

use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

/// Errors staging or reading the temporary bundle file.
#[derive(Debug, Error)]
pub enum BundleError {
    #[error("Failed to stage bundle at {path}: {source}")]
    Stage {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to read bundle at {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// A bundle written to a uniquely named file.
///
/// The file is removed by [`discard`](Self::discard) or, failing that, when
/// the guard is dropped. Either way it never outlives its job.
#[derive(Debug)]
pub struct BundleFile {
    path: PathBuf,
    removed: bool,
}

impl BundleFile {
    /// Write `bytes` to `<dir>/<uuid>.aab`, creating `dir` if needed.
    pub async fn stage(dir: &Path, bytes: &[u8]) -> Result<Self, BundleError> {
        let path = dir.join(format!("{}.aab", Uuid::new_v4()));

        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|source| BundleError::Stage {
                path: path.clone(),
                source,
            })?;
        write_or_remove(&path, || tokio::fs::write(&path, bytes))
            .await
            .map_err(|source| BundleError::Stage {
                path: path.clone(),
                source,
            })?;

        debug!(path = %path.display(), size = bytes.len(), "Staged bundle");
        Ok(Self {
            path,
            removed: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn read(&self) -> Result<Vec<u8>, BundleError> {
        tokio::fs::read(&self.path)
            .await
            .map_err(|source| BundleError::Read {
                path: self.path.clone(),
                source,
            })
    }

    /// Delete the file now.
    pub async fn discard(mut self) {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => debug!(path = %self.path.display(), "Removed staged bundle"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.path.display(), error = %e, "Failed to remove staged bundle"),
        }
        self.removed = true;
    }
}

/// Run `write`; if it fails, remove whatever part of `path` it left behind.
async fn write_or_remove<F, Fut>(path: &Path, write: F) -> io::Result<()>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = io::Result<()>>,
{
    let Err(error) = write().await else {
        return Ok(());
    };

    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!(path = %path.display(), "Removed partially staged bundle"),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove partially staged bundle"),
    }
    Err(error)
}

impl Drop for BundleFile {
    fn drop(&mut self) {
        if !self.removed {
            let _ = std::fs::remove_file(&self.path);
        }
    }
}
