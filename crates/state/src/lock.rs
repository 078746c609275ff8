//! Single-instance daemon lock

use shipit_errors::{Error, StateError};
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, warn};

/// Exclusive lock keyed on the application identifier.
///
/// The lock file holds the holder's pid. A lock whose holder is no longer
/// running is considered stale and broken; the daemon that crashed left its
/// state records behind for the new holder to resume.
///
/// Released on drop.
#[derive(Debug)]
pub struct InstanceLock {
    path: PathBuf,
}

impl InstanceLock {
    /// Acquire the lock at `path`.
    ///
    /// # Errors
    ///
    /// `AlreadyLocked` when another live process holds the lock, `LockFailed`
    /// on filesystem errors.
    pub async fn acquire(path: &Path) -> Result<Self, Error> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| Error::io_with_path(&e, parent))?;
        }

        loop {
            match tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(path)
                .await
            {
                Ok(file) => {
                    drop(file);
                    tokio::fs::write(path, std::process::id().to_string())
                        .await
                        .map_err(|e| StateError::LockFailed {
                            path: path.display().to_string(),
                            message: e.to_string(),
                        })?;
                    debug!(path = %path.display(), "instance lock acquired");
                    return Ok(Self {
                        path: path.to_path_buf(),
                    });
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    let holder = Self::holder_pid(path).await;
                    match holder {
                        Some(pid) if Self::pid_is_alive(pid).await => {
                            return Err(StateError::AlreadyLocked {
                                path: path.display().to_string(),
                                pid,
                            }
                            .into());
                        }
                        _ => {
                            warn!(path = %path.display(), ?holder, "breaking stale lock");
                            tokio::fs::remove_file(path).await.map_err(|e| {
                                StateError::LockFailed {
                                    path: path.display().to_string(),
                                    message: e.to_string(),
                                }
                            })?;
                            // Loop and contend for the lock again.
                        }
                    }
                }
                Err(e) => {
                    return Err(StateError::LockFailed {
                        path: path.display().to_string(),
                        message: e.to_string(),
                    }
                    .into());
                }
            }
        }
    }

    async fn holder_pid(path: &Path) -> Option<u32> {
        let contents = tokio::fs::read_to_string(path).await.ok()?;
        contents.trim().parse().ok()
    }

    async fn pid_is_alive(pid: u32) -> bool {
        // An empty lock file means the previous holder died between creating
        // and writing it; pid 0 never matches a real process.
        if pid == 0 {
            return false;
        }
        Command::new("kill")
            .arg("-0")
            .arg(pid.to_string())
            .output()
            .await
            .map(|output| output.status.success())
            .unwrap_or(false)
    }
}

impl Drop for InstanceLock {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn acquire_and_release() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("shipit.lock");

        let lock = InstanceLock::acquire(&path).await.unwrap();
        assert!(path.exists());

        drop(lock);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn second_acquire_fails_while_held() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("shipit.lock");

        let _lock = InstanceLock::acquire(&path).await.unwrap();
        let second = InstanceLock::acquire(&path).await;
        assert!(matches!(
            second,
            Err(Error::State(StateError::AlreadyLocked { .. }))
        ));
    }

    #[tokio::test]
    async fn stale_lock_is_broken() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("shipit.lock");

        // A pid that cannot be running: pid 0 is rejected outright.
        tokio::fs::write(&path, "0").await.unwrap();

        let lock = InstanceLock::acquire(&path).await.unwrap();
        drop(lock);
    }
}
