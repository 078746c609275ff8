//! Bridge from domain events to tracing records

use shipit_events::{AppEvent, DownloadEvent, GeneralEvent, InstallEvent};
use tracing::{debug, error, info, warn};

/// Log an `AppEvent` with structured fields at the appropriate level.
pub fn log_event(event: &AppEvent) {
    match event {
        AppEvent::Download(download) => log_download(download),
        AppEvent::Install(install) => log_install(install),
        AppEvent::General(general) => match general {
            GeneralEvent::Debug { message } => debug!(target: "shipit", "{message}"),
            GeneralEvent::Warning { message } => warn!(target: "shipit", "{message}"),
            GeneralEvent::Error { message } => error!(target: "shipit", "{message}"),
        },
    }
}

fn log_download(event: &DownloadEvent) {
    match event {
        DownloadEvent::Started {
            url,
            resumed_from,
            total_size,
        } => {
            info!(
                target: "shipit",
                url = %url,
                resumed_from = resumed_from,
                size = ?total_size,
                "download started"
            );
        }
        DownloadEvent::Progress {
            url,
            bytes_downloaded,
            total_size,
        } => {
            debug!(
                target: "shipit",
                url = %url,
                bytes_downloaded = bytes_downloaded,
                total = ?total_size,
                "download progress"
            );
        }
        DownloadEvent::Completed {
            url,
            final_size,
            path,
        } => {
            info!(
                target: "shipit",
                url = %url,
                size = final_size,
                path = %path.display(),
                "download completed"
            );
        }
        DownloadEvent::Failed { url, error } => {
            warn!(target: "shipit", url = %url, error = %error, "download failed");
        }
    }
}

fn log_install(event: &InstallEvent) {
    match event {
        InstallEvent::Started {
            run_id,
            target_bundle_path,
        } => {
            info!(
                target: "shipit",
                run_id = %run_id,
                bundle = %target_bundle_path.display(),
                "installation started"
            );
        }
        InstallEvent::WaitingForTermination {
            bundle_identifier,
            pids,
        } => {
            info!(
                target: "shipit",
                bundle_identifier = %bundle_identifier,
                pids = ?pids,
                "waiting for target termination"
            );
        }
        InstallEvent::PhaseStarted {
            run_id,
            phase,
            attempt,
        } => {
            info!(
                target: "shipit",
                run_id = %run_id,
                phase = phase.name(),
                attempt = attempt,
                "phase started"
            );
        }
        InstallEvent::PhaseCompleted { run_id, phase } => {
            info!(target: "shipit", run_id = %run_id, phase = phase.name(), "phase completed");
        }
        InstallEvent::PhaseFailed {
            run_id,
            phase,
            error,
            will_retry,
        } => {
            warn!(
                target: "shipit",
                run_id = %run_id,
                phase = phase.name(),
                error = %error,
                will_retry = will_retry,
                "phase failed"
            );
        }
        InstallEvent::BackupReused { backup_path } => {
            info!(target: "shipit", backup = %backup_path.display(), "backup reused");
        }
        InstallEvent::Relaunched { bundle_path } => {
            info!(target: "shipit", bundle = %bundle_path.display(), "relaunched");
        }
        InstallEvent::RelaunchFailed { bundle_path, error } => {
            warn!(
                target: "shipit",
                bundle = %bundle_path.display(),
                error = %error,
                "relaunch failed (install still succeeded)"
            );
        }
        InstallEvent::TargetRestored { original_path } => {
            warn!(target: "shipit", bundle = %original_path.display(), "original target restored");
        }
        InstallEvent::Aborted { run_id, error } => {
            error!(target: "shipit", run_id = %run_id, error = %error, "installation aborted");
        }
        InstallEvent::Completed {
            run_id,
            installed_path,
        } => {
            info!(
                target: "shipit",
                run_id = %run_id,
                installed = %installed_path.display(),
                "installation completed"
            );
        }
    }
}
