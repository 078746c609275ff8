//! Per-application state directory layout

use crate::constants;
use shipit_errors::{ConfigError, Error};
use std::path::{Path, PathBuf};

/// Provides the file locations shipit uses for one application.
///
/// This is the explicit context handle passed through the system instead of a
/// process-wide singleton: production constructs one from the host
/// application's identity, tests construct one over a temporary root.
#[derive(Debug, Clone)]
pub struct DirectoryManager {
    app_identifier: String,
    root: PathBuf,
}

impl DirectoryManager {
    /// Scope a directory manager to `app_identifier` under the default state
    /// root.
    ///
    /// The root is `$SHIPIT_STATE_ROOT` when set, otherwise
    /// `~/Library/Application Support` on macOS and `~/.local/state`
    /// elsewhere.
    ///
    /// # Errors
    ///
    /// Returns an error if no state root can be determined from the
    /// environment.
    pub fn for_application(app_identifier: impl Into<String>) -> Result<Self, Error> {
        let root = if let Some(root) = std::env::var_os(constants::STATE_ROOT_ENV) {
            PathBuf::from(root)
        } else {
            let home = std::env::var_os("HOME").ok_or(ConfigError::NoStateRoot)?;
            if cfg!(target_os = "macos") {
                Path::new(&home).join("Library/Application Support")
            } else {
                Path::new(&home).join(".local/state")
            }
        };
        Ok(Self::new(app_identifier, root))
    }

    /// Scope a directory manager to `app_identifier` under an explicit root.
    pub fn new(app_identifier: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            app_identifier: app_identifier.into(),
            root: root.into(),
        }
    }

    /// The application identifier all locations are scoped by.
    #[must_use]
    pub fn app_identifier(&self) -> &str {
        &self.app_identifier
    }

    /// The per-application state directory.
    #[must_use]
    pub fn state_directory(&self) -> PathBuf {
        self.root.join(&self.app_identifier)
    }

    /// Create the state directory (and downloads subdirectory) if missing.
    ///
    /// # Errors
    ///
    /// Returns an error if directory creation fails.
    pub async fn ensure_directories(&self) -> Result<(), Error> {
        tokio::fs::create_dir_all(self.downloads_directory())
            .await
            .map_err(|e| Error::io_with_path(&e, self.downloads_directory()))?;
        Ok(())
    }

    /// The serialized installer state record.
    #[must_use]
    pub fn state_file(&self) -> PathBuf {
        self.state_directory().join(constants::STATE_FILE)
    }

    /// The serialized update request written by clients.
    #[must_use]
    pub fn request_file(&self) -> PathBuf {
        self.state_directory().join(constants::REQUEST_FILE)
    }

    /// The single-instance lock file.
    #[must_use]
    pub fn lock_file(&self) -> PathBuf {
        self.state_directory().join(constants::LOCK_FILE)
    }

    /// The sentinel the watcher writes once the target has terminated.
    #[must_use]
    pub fn sentinel_file(&self) -> PathBuf {
        self.state_directory().join(constants::SENTINEL_FILE)
    }

    /// Directory for resumable download records and partial files.
    #[must_use]
    pub fn downloads_directory(&self) -> PathBuf {
        self.state_directory().join(constants::DOWNLOADS_DIR)
    }

    /// Daemon stdout log, append-only.
    #[must_use]
    pub fn stdout_log(&self) -> PathBuf {
        self.state_directory().join(constants::STDOUT_LOG)
    }

    /// Daemon stderr log, append-only.
    #[must_use]
    pub fn stderr_log(&self) -> PathBuf {
        self.state_directory().join(constants::STDERR_LOG)
    }
}
