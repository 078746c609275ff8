//! Domain event definitions

use shipit_types::InstallerPhase;
use std::path::PathBuf;
use uuid::Uuid;

/// Top-level event type, grouped by functional domain.
#[derive(Debug, Clone)]
pub enum AppEvent {
    Download(DownloadEvent),
    Install(InstallEvent),
    General(GeneralEvent),
}

/// Events emitted by the resumable downloader.
#[derive(Debug, Clone)]
pub enum DownloadEvent {
    Started {
        url: String,
        /// Byte offset this attempt resumed from; zero for a fresh download.
        resumed_from: u64,
        total_size: Option<u64>,
    },
    Progress {
        url: String,
        bytes_downloaded: u64,
        total_size: Option<u64>,
    },
    Completed {
        url: String,
        final_size: u64,
        path: PathBuf,
    },
    Failed {
        url: String,
        error: String,
    },
}

/// Events emitted by the installer state machine.
#[derive(Debug, Clone)]
pub enum InstallEvent {
    Started {
        run_id: Uuid,
        target_bundle_path: PathBuf,
    },
    WaitingForTermination {
        bundle_identifier: String,
        pids: Vec<u32>,
    },
    PhaseStarted {
        run_id: Uuid,
        phase: InstallerPhase,
        attempt: u32,
    },
    PhaseCompleted {
        run_id: Uuid,
        phase: InstallerPhase,
    },
    PhaseFailed {
        run_id: Uuid,
        phase: InstallerPhase,
        error: String,
        will_retry: bool,
    },
    BackupReused {
        backup_path: PathBuf,
    },
    Relaunched {
        bundle_path: PathBuf,
    },
    RelaunchFailed {
        bundle_path: PathBuf,
        error: String,
    },
    TargetRestored {
        original_path: PathBuf,
    },
    Aborted {
        run_id: Uuid,
        error: String,
    },
    Completed {
        run_id: Uuid,
        installed_path: PathBuf,
    },
}

/// Events that do not belong to a specific domain.
#[derive(Debug, Clone)]
pub enum GeneralEvent {
    Debug { message: String },
    Warning { message: String },
    Error { message: String },
}
