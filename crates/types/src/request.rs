//! The update request written by client processes for the daemon to pick up

use serde::{Deserialize, Serialize};
use shipit_errors::{Error, InstallError};
use std::path::{Path, PathBuf};

/// A single update request, constructed by the client and written to disk for
/// the installer daemon to perform.
///
/// Both bundle paths must be absolute paths to bundle directories on the local
/// filesystem, and must differ from each other.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateRequest {
    /// The downloaded update's app bundle.
    pub update_bundle_path: PathBuf,

    /// Where the update should be installed. If a bundle is already present,
    /// the update is checked for suitability against this bundle.
    pub target_bundle_path: PathBuf,

    /// The bundle identifier of the application being updated.
    ///
    /// If present, the installer waits for termination of running processes
    /// matching this identifier whose executable lives under
    /// `target_bundle_path` before continuing.
    pub bundle_identifier: Option<String>,

    /// Whether to launch the installed bundle after a successful update.
    pub relaunch_after_install: bool,

    /// Whether the installed bundle should keep the update bundle's filename
    /// rather than the target's.
    pub use_update_bundle_name: bool,
}

impl UpdateRequest {
    /// Create a request with the required paths; the optional fields default
    /// to off.
    pub fn new(update_bundle_path: impl Into<PathBuf>, target_bundle_path: impl Into<PathBuf>) -> Self {
        Self {
            update_bundle_path: update_bundle_path.into(),
            target_bundle_path: target_bundle_path.into(),
            bundle_identifier: None,
            relaunch_after_install: false,
            use_update_bundle_name: false,
        }
    }

    /// Validate the request invariants.
    ///
    /// # Errors
    ///
    /// Returns `MissingInstallationData` naming the offending field when a
    /// path is empty, relative, or the two paths coincide.
    pub fn validate(&self) -> Result<(), Error> {
        Self::check_path(&self.update_bundle_path, "update_bundle_path")?;
        Self::check_path(&self.target_bundle_path, "target_bundle_path")?;

        if self.update_bundle_path == self.target_bundle_path {
            return Err(InstallError::MissingInstallationData {
                field: "update_bundle_path must differ from target_bundle_path".into(),
            }
            .into());
        }

        Ok(())
    }

    fn check_path(path: &Path, field: &str) -> Result<(), Error> {
        if path.as_os_str().is_empty() || !path.is_absolute() {
            return Err(InstallError::MissingInstallationData {
                field: field.into(),
            }
            .into());
        }
        Ok(())
    }
}
