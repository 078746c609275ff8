//! Persisted-record and lock error types

use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
pub enum StateError {
    #[error("record at {path} is corrupted: {message}")]
    RecordCorrupted { path: String, message: String },

    #[error("record at {path} has version {found}, this daemon supports {supported}")]
    IncompatibleRecordVersion {
        path: String,
        found: u32,
        supported: u32,
    },

    #[error("unknown installer phase value {value}")]
    UnknownPhase { value: i64 },

    #[error("no record at {path}")]
    RecordMissing { path: String },

    #[error("another instance holds the lock at {path} (pid {pid})")]
    AlreadyLocked { path: String, pid: u32 },

    #[error("failed to acquire lock at {path}: {message}")]
    LockFailed { path: String, message: String },
}

impl StateError {
    #[must_use]
    pub fn discriminator(&self) -> &'static str {
        match self {
            Self::RecordCorrupted { .. } => "InvalidState",
            Self::IncompatibleRecordVersion { .. } => "IncompatibleRecordVersion",
            Self::UnknownPhase { .. } => "UnknownPhase",
            Self::RecordMissing { .. } => "RecordMissing",
            Self::AlreadyLocked { .. } => "AlreadyLocked",
            Self::LockFailed { .. } => "LockFailed",
        }
    }
}
