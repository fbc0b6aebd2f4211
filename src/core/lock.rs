//! Run-level lock.
//!
//! Only one process may drive a cache at a time: interleaved appends from
//! two runs would break the assumptions pruning relies on. The lock is an
//! advisory exclusive lock on a sibling `.lock` file, released on drop.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum LockError {
    #[error("Another run holds the lock at {0}")]
    Held(PathBuf),

    #[error("Failed to open lock file {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Held for the lifetime of a run
#[derive(Debug)]
pub struct RunLock {
    path: PathBuf,
    _file: File,
}

impl RunLock {
    /// Try to take the lock without waiting
    pub fn acquire(path: impl Into<PathBuf>) -> Result<Self, LockError> {
        let path = path.into();
        let open_err = |source| LockError::Open {
            path: path.clone(),
            source,
        };

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(open_err)?;
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)
            .map_err(open_err)?;

        file.try_lock_exclusive()
            .map_err(|_| LockError::Held(path.clone()))?;

        debug!(lock = %path.display(), "Acquired run lock");
        Ok(Self { path, _file: file })
    }

    /// Lock file location for a cache file
    pub fn path_for(cache_path: &Path) -> PathBuf {
        let mut name = cache_path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".lock");
        cache_path.with_file_name(name)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_lock_path_for_cache() {
        assert_eq!(
            RunLock::path_for(Path::new("/home/u/.plexsort/media_cache.csv")),
            PathBuf::from("/home/u/.plexsort/media_cache.csv.lock")
        );
    }

    #[test]
    fn test_second_acquire_fails_until_release() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("run.lock");

        let first = RunLock::acquire(&path).unwrap();
        assert!(matches!(RunLock::acquire(&path), Err(LockError::Held(_))));

        drop(first);
        assert!(RunLock::acquire(&path).is_ok());
    }
}
