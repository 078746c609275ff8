//! Filesystem primitives with the atomicity guarantees the installer needs

use shipit_errors::{Error, InstallError, PlatformError};
use std::path::Path;
use tokio::fs;

#[cfg(unix)]
use std::os::unix::fs::{MetadataExt, PermissionsExt};

fn fs_error(operation: &str, path: &Path, e: &std::io::Error) -> PlatformError {
    PlatformError::FilesystemOperationFailed {
        operation: operation.to_string(),
        path: path.display().to_string(),
        message: e.to_string(),
    }
}

/// Whether `a` and `b` reside on the same filesystem volume.
///
/// Nonexistent paths are resolved through their closest existing ancestor,
/// since a rename target typically does not exist yet.
///
/// # Errors
///
/// Returns an error if no ancestor of either path exists or cannot be
/// inspected.
pub async fn same_volume(a: &Path, b: &Path) -> Result<bool, Error> {
    let dev_a = device_of(a).await?;
    let dev_b = device_of(b).await?;
    Ok(dev_a == dev_b)
}

#[cfg(unix)]
async fn device_of(path: &Path) -> Result<u64, Error> {
    let mut probe = path;
    loop {
        match fs::metadata(probe).await {
            Ok(metadata) => return Ok(metadata.dev()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                probe = probe.parent().ok_or_else(|| fs_error("stat", path, &e))?;
            }
            Err(e) => return Err(fs_error("stat", path, &e).into()),
        }
    }
}

#[cfg(not(unix))]
async fn device_of(_path: &Path) -> Result<u64, Error> {
    Ok(0)
}

/// Rename `src` to `dst`, failing with `MovingAcrossVolumes` when the two
/// paths are not on the same filesystem.
///
/// The rename itself is atomic; this is the only primitive the swap phase is
/// allowed to use to mutate the target path.
///
/// # Errors
///
/// `MovingAcrossVolumes` on a cross-device rename, otherwise the underlying
/// filesystem error.
pub async fn atomic_rename(src: &Path, dst: &Path) -> Result<(), Error> {
    match fs::rename(src, dst).await {
        Ok(()) => Ok(()),
        Err(e) if is_cross_device(&e) => Err(InstallError::MovingAcrossVolumes {
            src: src.display().to_string(),
            dest: dst.display().to_string(),
        }
        .into()),
        Err(e) => Err(fs_error("rename", src, &e).into()),
    }
}

fn is_cross_device(e: &std::io::Error) -> bool {
    // EXDEV on every unix we target
    e.raw_os_error() == Some(18)
}

/// Recursively copy a directory tree, preserving symlinks and permissions.
///
/// # Errors
///
/// Returns an error if any entry cannot be read or written.
pub async fn copy_directory(src: &Path, dst: &Path) -> Result<(), Error> {
    fs::create_dir_all(dst)
        .await
        .map_err(|e| fs_error("create_dir_all", dst, &e))?;

    #[cfg(unix)]
    {
        let metadata = fs::metadata(src)
            .await
            .map_err(|e| fs_error("stat", src, &e))?;
        fs::set_permissions(dst, metadata.permissions())
            .await
            .map_err(|e| fs_error("set_permissions", dst, &e))?;
    }

    let mut entries = fs::read_dir(src)
        .await
        .map_err(|e| fs_error("read_dir", src, &e))?;
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| fs_error("read_dir", src, &e))?
    {
        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());

        let file_type = entry
            .file_type()
            .await
            .map_err(|e| fs_error("stat", &src_path, &e))?;
        if file_type.is_symlink() {
            let link_target = fs::read_link(&src_path)
                .await
                .map_err(|e| fs_error("read_link", &src_path, &e))?;
            #[cfg(unix)]
            fs::symlink(&link_target, &dst_path)
                .await
                .map_err(|e| fs_error("symlink", &dst_path, &e))?;
        } else if file_type.is_dir() {
            Box::pin(copy_directory(&src_path, &dst_path)).await?;
        } else {
            fs::copy(&src_path, &dst_path)
                .await
                .map_err(|e| fs_error("copy", &src_path, &e))?;
        }
    }

    Ok(())
}

/// Normalize permissions on an installed bundle: owner gets write, group and
/// other get read, execute bits are preserved.
///
/// # Errors
///
/// Returns `ChangingPermissionsFailed` if any entry cannot be updated.
#[cfg(unix)]
pub async fn normalize_permissions(path: &Path) -> Result<(), Error> {
    let metadata = fs::symlink_metadata(path).await.map_err(|e| {
        InstallError::ChangingPermissionsFailed {
            path: path.display().to_string(),
            message: e.to_string(),
        }
    })?;

    if metadata.file_type().is_symlink() {
        return Ok(());
    }

    let mode = if metadata.is_dir() || metadata.permissions().mode() & 0o111 != 0 {
        0o755
    } else {
        0o644
    };
    fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
        .await
        .map_err(|e| InstallError::ChangingPermissionsFailed {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

    if metadata.is_dir() {
        let mut entries = fs::read_dir(path).await.map_err(|e| {
            InstallError::ChangingPermissionsFailed {
                path: path.display().to_string(),
                message: e.to_string(),
            }
        })?;
        while let Some(entry) = entries.next_entry().await.map_err(|e| {
            InstallError::ChangingPermissionsFailed {
                path: path.display().to_string(),
                message: e.to_string(),
            }
        })? {
            Box::pin(normalize_permissions(&entry.path())).await?;
        }
    }

    Ok(())
}

#[cfg(not(unix))]
pub async fn normalize_permissions(_path: &Path) -> Result<(), Error> {
    Ok(())
}

/// Remove a file if it exists; missing files are not an error.
///
/// # Errors
///
/// Returns an error for any failure other than the file being absent.
pub async fn remove_file_if_exists(path: &Path) -> Result<(), Error> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(fs_error("remove_file", path, &e).into()),
    }
}

/// Remove a directory tree if it exists; missing trees are not an error.
///
/// # Errors
///
/// Returns an error for any failure other than the directory being absent.
pub async fn remove_dir_all_if_exists(path: &Path) -> Result<(), Error> {
    match fs::remove_dir_all(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(fs_error("remove_dir_all", path, &e).into()),
    }
}

/// Whether a path exists (without following a final symlink).
pub async fn exists(path: &Path) -> bool {
    fs::symlink_metadata(path).await.is_ok()
}
