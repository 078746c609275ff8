//! Versioned, atomically-written record envelopes

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use shipit_errors::{Error, StateError};
use std::path::Path;
use tokio::fs;
use tokio::io::AsyncWriteExt;

#[derive(Serialize, Deserialize)]
struct Envelope<T> {
    version: u32,
    record: T,
}

/// Read a record from `path`, refusing envelopes whose version differs from
/// `supported`.
///
/// # Errors
///
/// `RecordMissing` when no file exists, `RecordCorrupted` when it cannot be
/// parsed, `IncompatibleRecordVersion` on a version mismatch.
pub async fn read_record<T: DeserializeOwned>(path: &Path, supported: u32) -> Result<T, Error> {
    let contents = match fs::read(path).await {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(StateError::RecordMissing {
                path: path.display().to_string(),
            }
            .into());
        }
        Err(e) => return Err(Error::io_with_path(&e, path)),
    };

    // Peek the version before decoding the record so a future format change
    // is reported as incompatibility, not corruption.
    #[derive(Deserialize)]
    struct VersionOnly {
        version: u32,
    }
    let version: VersionOnly =
        serde_json::from_slice(&contents).map_err(|e| StateError::RecordCorrupted {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
    if version.version != supported {
        return Err(StateError::IncompatibleRecordVersion {
            path: path.display().to_string(),
            found: version.version,
            supported,
        }
        .into());
    }

    let envelope: Envelope<T> =
        serde_json::from_slice(&contents).map_err(|e| StateError::RecordCorrupted {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
    Ok(envelope.record)
}

/// Durably write a record to `path`.
///
/// The record is serialized to a sibling temporary file, flushed, then
/// renamed over `path`; a crash at any point leaves either the old record or
/// the new one, never a torn write.
///
/// # Errors
///
/// Returns an error if serialization or any filesystem step fails.
pub async fn write_record<T: Serialize>(path: &Path, version: u32, record: &T) -> Result<(), Error> {
    let envelope = Envelope { version, record };
    let contents = serde_json::to_vec_pretty(&envelope)?;

    let mut temp_path = path.as_os_str().to_owned();
    temp_path.push(".tmp");
    let temp_path = Path::new(&temp_path);

    let mut file = fs::File::create(temp_path)
        .await
        .map_err(|e| Error::io_with_path(&e, temp_path))?;
    file.write_all(&contents)
        .await
        .map_err(|e| Error::io_with_path(&e, temp_path))?;
    file.sync_all()
        .await
        .map_err(|e| Error::io_with_path(&e, temp_path))?;
    drop(file);

    fs::rename(temp_path, path)
        .await
        .map_err(|e| Error::io_with_path(&e, path))?;
    Ok(())
}

/// Remove a record; a missing record is not an error.
///
/// # Errors
///
/// Returns an error for any failure other than the record being absent.
pub async fn remove_record(path: &Path) -> Result<(), Error> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(Error::io_with_path(&e, path)),
    }
}
