//! Platform operation error types

use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
pub enum PlatformError {
    #[error("process execution failed: {command}: {message}")]
    ProcessExecutionFailed { command: String, message: String },

    #[error("process enumeration failed: {message}")]
    ProcessEnumerationFailed { message: String },

    #[error("filesystem operation failed: {operation} on {path}: {message}")]
    FilesystemOperationFailed {
        operation: String,
        path: String,
        message: String,
    },

    #[error("failed to read bundle info from {path}: {message}")]
    BundleInfoUnreadable { path: String, message: String },

    #[error("failed to launch {bundle}: {message}")]
    LaunchFailed { bundle: String, message: String },
}

impl PlatformError {
    #[must_use]
    pub fn discriminator(&self) -> &'static str {
        match self {
            Self::ProcessExecutionFailed { .. } => "ProcessExecutionFailed",
            Self::ProcessEnumerationFailed { .. } => "ProcessEnumerationFailed",
            Self::FilesystemOperationFailed { .. } => "FilesystemOperationFailed",
            Self::BundleInfoUnreadable { .. } => "BundleInfoUnreadable",
            Self::LaunchFailed { .. } => "LaunchFailed",
        }
    }

    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::ProcessEnumerationFailed { .. } | Self::FilesystemOperationFailed { .. }
        )
    }
}
