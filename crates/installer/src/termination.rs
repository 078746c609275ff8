//! Waiting for the target application to terminate
//!
//! Two cooperating contexts meet here. A daemon that can read the process
//! table polls it directly. A privileged daemon that cannot blocks on a
//! sentinel file instead, written by the user-context watcher once the last
//! matching process is gone. The filesystem is the one channel both contexts
//! agree on.

use shipit_config::{Config, DirectoryManager};
use shipit_errors::Error;
use shipit_events::{AppEvent, EventEmitter, EventSender, InstallEvent};
use shipit_platform::{fs as pfs, process};
use shipit_types::UpdateRequest;
use std::path::Path;
use tracing::{debug, info, warn};

/// Block until no running process matches the request's bundle identifier
/// and target path.
///
/// Returns immediately when the request names no bundle identifier, or when
/// the sentinel already exists. Safe to call again after a daemon restart;
/// there is no state to carry over.
///
/// # Errors
///
/// Returns an error only for filesystem failures while checking the
/// sentinel; an unreadable process table degrades to sentinel waiting.
pub async fn wait_for_termination(
    config: &Config,
    dirs: &DirectoryManager,
    request: &UpdateRequest,
    tx: Option<&EventSender>,
) -> Result<(), Error> {
    let Some(identifier) = &request.bundle_identifier else {
        return Ok(());
    };

    let sentinel = dirs.sentinel_file();
    if pfs::exists(&sentinel).await {
        info!("termination sentinel present, not waiting");
        return Ok(());
    }

    let mut announced = false;
    loop {
        match process::running_applications_matching(identifier, &request.target_bundle_path).await
        {
            Ok(apps) if apps.is_empty() => {
                info!(identifier, "no matching processes running");
                return Ok(());
            }
            Ok(apps) => {
                let pids: Vec<u32> = apps.iter().map(|app| app.pid).collect();
                debug!(identifier, ?pids, "waiting for termination");
                if !announced {
                    announced = true;
                    if let Some(tx) = tx {
                        tx.emit(AppEvent::Install(InstallEvent::WaitingForTermination {
                            bundle_identifier: identifier.clone(),
                            pids,
                        }));
                    }
                }
            }
            Err(e) => {
                // Likely a privileged context without process-table access;
                // the watcher owns the waiting from here.
                warn!(error = %e, "cannot enumerate processes, blocking on sentinel");
                return wait_for_sentinel(config, &sentinel).await;
            }
        }

        tokio::time::sleep(config.termination_poll_interval()).await;

        if pfs::exists(&sentinel).await {
            return Ok(());
        }
    }
}

async fn wait_for_sentinel(config: &Config, sentinel: &Path) -> Result<(), Error> {
    loop {
        if pfs::exists(sentinel).await {
            info!(sentinel = %sentinel.display(), "sentinel appeared");
            return Ok(());
        }
        tokio::time::sleep(config.sentinel_poll_interval()).await;
    }
}

/// Watcher entry point: poll until the target application has terminated,
/// then write the sentinel the daemon blocks on.
///
/// # Errors
///
/// Returns an error if the process table cannot be read or the sentinel
/// cannot be written.
pub async fn watch_and_signal(
    config: &Config,
    dirs: &DirectoryManager,
    bundle_identifier: &str,
    target_bundle_path: &Path,
) -> Result<(), Error> {
    loop {
        let apps =
            process::running_applications_matching(bundle_identifier, target_bundle_path).await?;
        if apps.is_empty() {
            break;
        }
        debug!(
            bundle_identifier,
            running = apps.len(),
            "target still running"
        );
        tokio::time::sleep(config.termination_poll_interval()).await;
    }

    dirs.ensure_directories().await?;
    let sentinel = dirs.sentinel_file();
    let file = tokio::fs::File::create(&sentinel)
        .await
        .map_err(|e| Error::io_with_path(&e, &sentinel))?;
    file.sync_all()
        .await
        .map_err(|e| Error::io_with_path(&e, &sentinel))?;
    info!(sentinel = %sentinel.display(), "termination sentinel written");
    Ok(())
}
