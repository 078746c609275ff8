//! Quarantine attribute clearing

use shipit_errors::{Error, PlatformError};
use std::path::Path;
use tokio::process::Command;

const QUARANTINE_ATTRIBUTE: &str = "com.apple.quarantine";

/// Recursively remove the quarantine attribute from `path`.
///
/// The operation is idempotent: a tree that carries no quarantine attribute
/// succeeds. Callers treat failures as non-fatal and log them.
///
/// # Errors
///
/// Returns an error if the attribute tool cannot be run or reports a failure
/// other than the attribute being absent.
pub async fn clear_quarantine(path: &Path) -> Result<(), Error> {
    let output = Command::new("xattr")
        .arg("-r")
        .arg("-d")
        .arg(QUARANTINE_ATTRIBUTE)
        .arg(path)
        .output()
        .await
        .map_err(|e| PlatformError::ProcessExecutionFailed {
            command: "xattr -r -d".to_string(),
            message: e.to_string(),
        })?;

    if output.status.success() {
        return Ok(());
    }

    let stderr = String::from_utf8_lossy(&output.stderr);
    // xattr reports a missing attribute per file; that is the idempotent case
    if stderr.lines().all(|line| line.is_empty() || line.contains("No such xattr")) {
        return Ok(());
    }

    Err(PlatformError::ProcessExecutionFailed {
        command: format!("xattr -r -d {QUARANTINE_ATTRIBUTE}"),
        message: stderr.trim().to_string(),
    }
    .into())
}
