//! Opt-in per-file lock for serializing mutations of one store file.
//!
//! The mutator itself never locks. Callers that want one writer per file at
//! a time wrap their whole step sequence in [`with_file_lock`].

use crate::error::StoreError;
use chrono::Utc;
use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

pub fn store_lock_path(store_path: &Path) -> PathBuf {
    let mut path: OsString = store_path.as_os_str().to_os_string();
    path.push(".lock");
    PathBuf::from(path)
}

/// Lock file held for the guard's lifetime; removed on drop.
#[derive(Debug)]
pub struct FileLockGuard {
    lock_path: PathBuf,
    _file: File,
}

impl FileLockGuard {
    /// Create `<path>.lock`, failing immediately with `LockBusy` if it exists.
    pub fn acquire(path: &Path) -> Result<Self, StoreError> {
        let lock_path = store_lock_path(path);
        if let Some(parent) = lock_path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)
                .map_err(|e| StoreError::io(format!("create {}", parent.display()), e))?;
        }

        match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&lock_path)
        {
            Ok(mut file) => {
                let _ = writeln!(
                    file,
                    "pid={}\nutc={}",
                    std::process::id(),
                    Utc::now().to_rfc3339()
                );
                tracing::debug!(lock = %lock_path.display(), "acquired store lock");
                Ok(Self {
                    lock_path,
                    _file: file,
                })
            }
            Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => {
                Err(StoreError::LockBusy {
                    lock_path: lock_path.display().to_string(),
                })
            }
            Err(err) => Err(StoreError::io(
                format!("acquire lock {}", lock_path.display()),
                err,
            )),
        }
    }

    pub fn lock_path(&self) -> &Path {
        &self.lock_path
    }
}

impl Drop for FileLockGuard {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.lock_path);
    }
}

/// Run `f` while holding the lock for `path`.
pub fn with_file_lock<T, E, F>(path: impl AsRef<Path>, f: F) -> Result<T, E>
where
    F: FnOnce() -> Result<T, E>,
    E: From<StoreError>,
{
    let _guard = FileLockGuard::acquire(path.as_ref())?;
    f()
}
