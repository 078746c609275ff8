//! Installer error types

use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
pub enum InstallError {
    #[error("missing installation data: {field}")]
    MissingInstallationData { field: String },

    #[error("target is not a bundle: {path}")]
    CouldNotOpenTarget { path: String },

    #[error("invalid bundle version for {path}: {message}")]
    InvalidBundleVersion { path: String, message: String },

    #[error("backup failed: {message}")]
    BackupFailed { message: String },

    #[error("replacing target failed: {message}")]
    ReplacingTargetFailed { message: String },

    #[error("changing permissions failed on {path}: {message}")]
    ChangingPermissionsFailed { path: String, message: String },

    #[error("cannot move {src} to {dest}: paths are on different volumes")]
    MovingAcrossVolumes { src: String, dest: String },

    #[error("target bundle at {path} could not be restored and is lost")]
    TargetLost { path: String },
}

impl InstallError {
    #[must_use]
    pub fn discriminator(&self) -> &'static str {
        match self {
            Self::MissingInstallationData { .. } => "MissingInstallationData",
            Self::CouldNotOpenTarget { .. } => "CouldNotOpenTarget",
            Self::InvalidBundleVersion { .. } => "InvalidBundleVersion",
            Self::BackupFailed { .. } => "BackupFailed",
            Self::ReplacingTargetFailed { .. } => "ReplacingTargetFailed",
            Self::ChangingPermissionsFailed { .. } => "ChangingPermissionsFailed",
            Self::MovingAcrossVolumes { .. } => "MovingAcrossVolumes",
            Self::TargetLost { .. } => "TargetLost",
        }
    }

    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::BackupFailed { .. }
                | Self::ReplacingTargetFailed { .. }
                | Self::ChangingPermissionsFailed { .. }
        )
    }
}
