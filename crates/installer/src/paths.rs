//! Derived filesystem locations for one installation

use shipit_types::InstallerState;
use std::path::{Path, PathBuf};

/// Sibling location the target is copied to before the swap.
///
/// Deterministic so a restarted daemon finds the backup a previous run made.
/// A sibling is on the same filesystem by construction, which the later
/// atomic rename depends on.
pub(crate) fn backup_path(target: &Path) -> PathBuf {
    sibling(target, "backup")
}

/// Sibling location the target is moved aside to during the swap.
pub(crate) fn aside_path(target: &Path) -> PathBuf {
    sibling(target, "old")
}

fn sibling(target: &Path, suffix: &str) -> PathBuf {
    let leaf = target
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "bundle".to_string());
    target
        .parent()
        .unwrap_or_else(|| Path::new("/"))
        .join(format!(".{leaf}.shipit-{suffix}"))
}

/// Where the installed bundle ends up.
///
/// Normally the target path; with `use_update_bundle_name` the installed
/// bundle keeps the update's basename inside the target's parent directory.
pub(crate) fn installed_path(state: &InstallerState) -> PathBuf {
    let target = &state.request.target_bundle_path;
    if state.request.use_update_bundle_name {
        if let (Some(parent), Some(update_leaf)) =
            (target.parent(), state.request.update_bundle_path.file_name())
        {
            return parent.join(update_leaf);
        }
    }
    target.clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use shipit_types::{InstallerState, UpdateRequest};

    #[test]
    fn siblings_stay_in_the_target_directory() {
        let target = Path::new("/Applications/App.app");
        assert_eq!(
            backup_path(target),
            PathBuf::from("/Applications/.App.app.shipit-backup")
        );
        assert_eq!(
            aside_path(target),
            PathBuf::from("/Applications/.App.app.shipit-old")
        );
    }

    #[test]
    fn installed_path_honors_update_bundle_name() {
        let mut request = UpdateRequest::new("/tmp/NewName.app", "/Applications/App.app");
        request.use_update_bundle_name = true;
        let state = InstallerState::from_request(request);
        assert_eq!(
            installed_path(&state),
            PathBuf::from("/Applications/NewName.app")
        );

        let request = UpdateRequest::new("/tmp/NewName.app", "/Applications/App.app");
        let state = InstallerState::from_request(request);
        assert_eq!(
            installed_path(&state),
            PathBuf::from("/Applications/App.app")
        );
    }
}
