//! Process-table queries for the termination wait

use crate::bundle;
use shipit_errors::{Error, PlatformError};
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::debug;

/// A running instance of the application being updated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunningApplication {
    pub pid: u32,
    pub executable_path: PathBuf,
}

/// Enumerate running processes whose executable lives under `bundle_path` and
/// whose bundle identifier matches `bundle_identifier`.
///
/// Processes that match the identifier but run from an executable outside
/// `bundle_path` are ignored: another copy of the application elsewhere on
/// disk is not the bundle being replaced.
///
/// # Errors
///
/// Returns an error if the process table cannot be read.
pub async fn running_applications_matching(
    bundle_identifier: &str,
    bundle_path: &Path,
) -> Result<Vec<RunningApplication>, Error> {
    // The identifier gates the whole query: if the bundle on disk no longer
    // carries the requested identifier, nothing can match.
    match bundle::bundle_identifier(bundle_path).await {
        Ok(found) if found == bundle_identifier => {}
        Ok(found) => {
            debug!(
                requested = bundle_identifier,
                found, "bundle identifier mismatch, not waiting"
            );
            return Ok(Vec::new());
        }
        Err(_) => return Ok(Vec::new()),
    }

    let processes = process_table().await?;
    Ok(processes
        .into_iter()
        .filter(|proc| proc.executable_path.starts_with(bundle_path))
        .collect())
}

/// Read the process table as `(pid, executable path)` pairs.
async fn process_table() -> Result<Vec<RunningApplication>, Error> {
    let output = Command::new("ps")
        .args(["-axo", "pid=,comm="])
        .output()
        .await
        .map_err(|e| PlatformError::ProcessEnumerationFailed {
            message: e.to_string(),
        })?;

    if !output.status.success() {
        return Err(PlatformError::ProcessEnumerationFailed {
            message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        }
        .into());
    }

    Ok(parse_process_table(&String::from_utf8_lossy(&output.stdout)))
}

fn parse_process_table(stdout: &str) -> Vec<RunningApplication> {
    stdout
        .lines()
        .filter_map(|line| {
            let trimmed = line.trim_start();
            let (pid, command) = trimmed.split_once(char::is_whitespace)?;
            let pid = pid.parse().ok()?;
            let command = command.trim();
            if command.is_empty() {
                return None;
            }
            Some(RunningApplication {
                pid,
                executable_path: PathBuf::from(command),
            })
        })
        .collect()
}
