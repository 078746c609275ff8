//! Abort and target restoration
//!
//! Recovery has one job: whatever else happened, the path the user launches
//! must hold a bundle that satisfies the signature captured before any
//! mutation. If that cannot be arranged, the failure is reported loudly and
//! the records are left on disk for inspection.

use crate::installer::Installer;
use crate::paths;
use shipit_errors::{Error, InstallError};
use shipit_events::{AppEvent, EventEmitter, InstallEvent};
use shipit_platform::fs as pfs;
use shipit_types::{InstallerState, OwnedBundle};
use tracing::{error, info, warn};

/// Abort an installation, restoring the original target if necessary.
///
/// Must never run concurrently with an install; the caller holds the
/// instance lock. The update bundle is deliberately left on disk.
///
/// # Errors
///
/// `TargetLost` when the original bundle can neither be found intact nor
/// restored to a verifiable state; record cleanup is skipped so the on-disk
/// state can be examined.
pub(crate) async fn abort(ctx: &Installer, state: &InstallerState) -> Result<(), Error> {
    if let Some(owned) = &state.owned_target {
        let original = &owned.original_path;
        let intact = pfs::exists(original).await
            && ctx
                .verifier
                .verify(&owned.code_signature, original)
                .await
                .is_ok();

        if intact {
            info!(bundle = %original.display(), "target intact, no restoration needed");
        } else {
            restore(ctx, owned).await?;
        }
    }

    ctx.store.clear_request().await?;
    ctx.store.clear_state().await?;
    pfs::remove_file_if_exists(&ctx.store.directories().sentinel_file()).await?;
    Ok(())
}

/// Put the moved-aside bundle back at its original location and prove it
/// still satisfies the stored signature.
async fn restore(ctx: &Installer, owned: &OwnedBundle) -> Result<(), Error> {
    let original = &owned.original_path;
    let aside = paths::aside_path(original);

    // Whatever sits at the original path failed verification; get it out of
    // the way of the restore.
    pfs::remove_dir_all_if_exists(original).await?;

    if pfs::exists(&aside).await {
        info!(from = %aside.display(), to = %original.display(), "restoring moved-aside target");
        pfs::atomic_rename(&aside, original).await?;
    } else if pfs::exists(&owned.temporary_path).await {
        info!(from = %owned.temporary_path.display(), to = %original.display(), "restoring backup");
        pfs::atomic_rename(&owned.temporary_path, original).await?;
    } else {
        error!(bundle = %original.display(), "no backup or moved-aside bundle to restore from");
        return Err(target_lost(ctx, original));
    }

    if ctx
        .verifier
        .verify(&owned.code_signature, original)
        .await
        .is_err()
    {
        warn!(bundle = %original.display(), "restored bundle does not satisfy stored signature");
        return Err(target_lost(ctx, original));
    }

    ctx.emit(AppEvent::Install(InstallEvent::TargetRestored {
        original_path: original.clone(),
    }));
    Ok(())
}

fn target_lost(ctx: &Installer, original: &std::path::Path) -> Error {
    let err = InstallError::TargetLost {
        path: original.display().to_string(),
    };
    error!(bundle = %original.display(), "TARGET BUNDLE LOST: {err}");
    ctx.emit_error(err.to_string());
    err.into()
}
