//! Per-phase work functions
//!
//! Each function performs the filesystem work of one phase and returns
//! `Ok` only once that work is complete. Functions are written to be
//! re-entered after a crash: the state file records the phase, so a resumed
//! daemon runs the same function again and must converge on the same final
//! on-disk state.

use crate::installer::Installer;
use crate::paths;
use shipit_errors::{Error, InstallError};
use shipit_events::{AppEvent, EventEmitter, InstallEvent};
use shipit_platform::{bundle, fs as pfs, launch, quarantine};
use shipit_types::{CodeSignature, InstallerState, OwnedBundle};
use tokio::fs;
use tracing::{debug, info, warn};

/// Capture the designated requirement from the target bundle.
///
/// This is the last moment the original target's signature can be trusted;
/// everything after verifies against the value stored here.
pub(crate) async fn read_signature(
    ctx: &Installer,
    state: &mut InstallerState,
) -> Result<(), Error> {
    let target = state.request.target_bundle_path.clone();

    let metadata = fs::metadata(&target)
        .await
        .map_err(|_| InstallError::CouldNotOpenTarget {
            path: target.display().to_string(),
        })?;
    if !metadata.is_dir() {
        return Err(InstallError::CouldNotOpenTarget {
            path: target.display().to_string(),
        }
        .into());
    }

    let version =
        bundle::bundle_version(&target)
            .await
            .map_err(|e| InstallError::InvalidBundleVersion {
                path: target.display().to_string(),
                message: e.to_string(),
            })?;
    debug!(bundle = %target.display(), version = %version, "target bundle opened");

    let signature = ctx.verifier.capture(&target).await?;
    state.code_signature = Some(signature);
    Ok(())
}

/// Check the update bundle against the stored requirement.
///
/// Rejecting a mismatch here is the primary defense against substitution of
/// the update payload between download and install.
pub(crate) async fn verify_update(ctx: &Installer, state: &InstallerState) -> Result<(), Error> {
    let signature = required_signature(state)?;
    ctx.verifier
        .verify(signature, &state.request.update_bundle_path)
        .await
}

/// Remove the quarantine attribute from the update bundle.
///
/// Failures are logged, not fatal: a bundle that keeps its quarantine bit
/// still installs, it just prompts on first launch.
pub(crate) async fn clear_quarantine(ctx: &Installer, state: &InstallerState) {
    let update = &state.request.update_bundle_path;
    if let Err(e) = quarantine::clear_quarantine(update).await {
        warn!(update = %update.display(), error = %e, "failed to clear quarantine");
        ctx.emit_warning(format!(
            "failed to clear quarantine on {}: {e}",
            update.display()
        ));
    }
}

/// Copy the target bundle to a sibling backup location.
///
/// A backup surviving from a prior attempt is reused when it still satisfies
/// the stored requirement.
pub(crate) async fn back_up(ctx: &Installer, state: &mut InstallerState) -> Result<(), Error> {
    let signature = required_signature(state)?.clone();
    let target = state.request.target_bundle_path.clone();
    let backup = paths::backup_path(&target);

    if pfs::exists(&backup).await {
        if ctx.verifier.verify(&signature, &backup).await.is_ok() {
            info!(backup = %backup.display(), "reusing backup from previous attempt");
            ctx.emit(AppEvent::Install(InstallEvent::BackupReused {
                backup_path: backup.clone(),
            }));
            record_owned_target(state, backup, signature);
            return Ok(());
        }
        // Stale or partial; rebuild it from scratch.
        pfs::remove_dir_all_if_exists(&backup).await?;
    }

    if !pfs::exists(&target).await {
        return Err(InstallError::CouldNotOpenTarget {
            path: target.display().to_string(),
        }
        .into());
    }

    pfs::copy_directory(&target, &backup)
        .await
        .map_err(|e| InstallError::BackupFailed {
            message: e.to_string(),
        })?;

    record_owned_target(state, backup, signature);
    Ok(())
}

fn record_owned_target(
    state: &mut InstallerState,
    backup: std::path::PathBuf,
    signature: CodeSignature,
) {
    state.backup_path = Some(backup.clone());
    state.owned_target = Some(OwnedBundle {
        original_path: state.request.target_bundle_path.clone(),
        temporary_path: backup,
        code_signature: signature,
    });
}

/// The atomic swap: move the target aside, move the update into place.
///
/// Both moves must be on one volume. Re-entry after a crash picks up
/// whichever move has not happened yet.
pub(crate) async fn install_swap(state: &InstallerState) -> Result<(), Error> {
    let target = state.request.target_bundle_path.clone();
    let update = state.request.update_bundle_path.clone();
    let final_path = paths::installed_path(state);
    let aside = paths::aside_path(&target);

    if !pfs::exists(&update).await {
        if pfs::exists(&final_path).await {
            // Resumed after both moves completed.
            debug!(installed = %final_path.display(), "swap already complete");
            return finish_swap(&final_path).await;
        }
        return Err(InstallError::MissingInstallationData {
            field: "update_bundle_path".into(),
        }
        .into());
    }

    if !pfs::same_volume(&update, &target).await? {
        return Err(InstallError::MovingAcrossVolumes {
            src: update.display().to_string(),
            dest: target.display().to_string(),
        }
        .into());
    }

    if pfs::exists(&target).await {
        pfs::remove_dir_all_if_exists(&aside).await?;
        pfs::atomic_rename(&target, &aside).await?;
    }

    pfs::remove_dir_all_if_exists(&final_path).await?;
    pfs::atomic_rename(&update, &final_path).await?;

    finish_swap(&final_path).await
}

async fn finish_swap(final_path: &std::path::Path) -> Result<(), Error> {
    pfs::normalize_permissions(final_path).await?;
    Ok(())
}

/// Confirm the installed bundle satisfies the requirement captured before
/// any mutation.
pub(crate) async fn verify_in_place(ctx: &Installer, state: &InstallerState) -> Result<(), Error> {
    let signature = required_signature(state)?;
    ctx.verifier
        .verify(signature, &paths::installed_path(state))
        .await
}

/// Launch the installed bundle in the active user session.
///
/// Failure is non-fatal: the bundle is installed either way.
pub(crate) async fn relaunch(ctx: &Installer, state: &InstallerState) {
    if !state.request.relaunch_after_install {
        return;
    }

    let installed = paths::installed_path(state);
    match launch::launch_in_user_session(&installed).await {
        Ok(()) => {
            info!(bundle = %installed.display(), "relaunched");
            ctx.emit(AppEvent::Install(InstallEvent::Relaunched {
                bundle_path: installed,
            }));
        }
        Err(e) => {
            warn!(bundle = %installed.display(), error = %e, "relaunch failed");
            ctx.emit(AppEvent::Install(InstallEvent::RelaunchFailed {
                bundle_path: installed,
                error: e.to_string(),
            }));
        }
    }
}

fn required_signature(state: &InstallerState) -> Result<&CodeSignature, Error> {
    state
        .code_signature
        .as_ref()
        .ok_or_else(|| {
            InstallError::MissingInstallationData {
                field: "code_signature".into(),
            }
            .into()
        })
}
