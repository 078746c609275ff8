//! Launching the installed bundle in the active user session

use shipit_errors::{Error, PlatformError};
use std::path::Path;
use tokio::process::Command;
use tracing::debug;

/// Launch the bundle at `bundle_path` in the logged-in user's GUI session.
///
/// The daemon may be running as root; in that case the launch transitions to
/// the console user. Callers treat failure as non-fatal to the installation.
///
/// # Errors
///
/// Returns `LaunchFailed` if the bundle could not be launched.
pub async fn launch_in_user_session(bundle_path: &Path) -> Result<(), Error> {
    if current_uid().await? == 0 {
        let console_uid = console_user_uid().await?;
        debug!(uid = console_uid, bundle = %bundle_path.display(), "launching as console user");
        run_launcher(
            Command::new("launchctl")
                .arg("asuser")
                .arg(console_uid.to_string())
                .arg("open")
                .arg(bundle_path),
            bundle_path,
        )
        .await
    } else {
        run_launcher(Command::new("open").arg(bundle_path), bundle_path).await
    }
}

async fn run_launcher(command: &mut Command, bundle_path: &Path) -> Result<(), Error> {
    let output = command
        .output()
        .await
        .map_err(|e| PlatformError::LaunchFailed {
            bundle: bundle_path.display().to_string(),
            message: e.to_string(),
        })?;

    if output.status.success() {
        Ok(())
    } else {
        Err(PlatformError::LaunchFailed {
            bundle: bundle_path.display().to_string(),
            message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        }
        .into())
    }
}

async fn current_uid() -> Result<u32, Error> {
    let output = Command::new("id")
        .arg("-u")
        .output()
        .await
        .map_err(|e| PlatformError::ProcessExecutionFailed {
            command: "id -u".to_string(),
            message: e.to_string(),
        })?;
    String::from_utf8_lossy(&output.stdout)
        .trim()
        .parse()
        .map_err(|_| {
            PlatformError::ProcessExecutionFailed {
                command: "id -u".to_string(),
                message: "unparseable uid".to_string(),
            }
            .into()
        })
}

/// The uid owning the console, i.e. the logged-in GUI user.
async fn console_user_uid() -> Result<u32, Error> {
    let output = Command::new("stat")
        .args(["-f", "%u", "/dev/console"])
        .output()
        .await
        .map_err(|e| PlatformError::ProcessExecutionFailed {
            command: "stat /dev/console".to_string(),
            message: e.to_string(),
        })?;
    String::from_utf8_lossy(&output.stdout)
        .trim()
        .parse()
        .map_err(|_| {
            PlatformError::ProcessExecutionFailed {
                command: "stat /dev/console".to_string(),
                message: "unparseable uid".to_string(),
            }
            .into()
        })
}
