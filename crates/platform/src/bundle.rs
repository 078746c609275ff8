//! Bundle metadata reads

use shipit_errors::{Error, PlatformError};
use std::path::Path;
use tokio::process::Command;

/// Read `CFBundleIdentifier` from the bundle at `bundle_path`.
///
/// # Errors
///
/// Returns `BundleInfoUnreadable` when the bundle has no readable identifier.
pub async fn bundle_identifier(bundle_path: &Path) -> Result<String, Error> {
    read_info_key(bundle_path, "CFBundleIdentifier").await
}

/// Read `CFBundleVersion` from the bundle at `bundle_path`.
///
/// # Errors
///
/// Returns `BundleInfoUnreadable` when the bundle has no readable version.
pub async fn bundle_version(bundle_path: &Path) -> Result<String, Error> {
    read_info_key(bundle_path, "CFBundleVersion").await
}

async fn read_info_key(bundle_path: &Path, key: &str) -> Result<String, Error> {
    let info_plist = bundle_path.join("Contents/Info.plist");

    // XML property lists are read directly; binary ones fall through to the
    // platform tool.
    if let Ok(contents) = tokio::fs::read_to_string(&info_plist).await {
        if let Some(value) = scan_xml_plist(&contents, key) {
            return Ok(value);
        }
    }

    let info_base = bundle_path.join("Contents/Info");
    let output = Command::new("defaults")
        .arg("read")
        .arg(&info_base)
        .arg(key)
        .output()
        .await
        .map_err(|e| PlatformError::BundleInfoUnreadable {
            path: bundle_path.display().to_string(),
            message: e.to_string(),
        })?;

    if !output.status.success() {
        return Err(PlatformError::BundleInfoUnreadable {
            path: bundle_path.display().to_string(),
            message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        }
        .into());
    }

    let value = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if value.is_empty() {
        return Err(PlatformError::BundleInfoUnreadable {
            path: bundle_path.display().to_string(),
            message: format!("{key} is empty"),
        }
        .into());
    }
    Ok(value)
}

/// Pull a top-level string value out of an XML property list.
///
/// Not a general plist parser: it only handles the flat
/// `<key>K</key><string>V</string>` pairs Info.plist files use for the keys
/// we read.
fn scan_xml_plist(contents: &str, key: &str) -> Option<String> {
    let needle = format!("<key>{key}</key>");
    let after_key = &contents[contents.find(&needle)? + needle.len()..];
    let start = after_key.find("<string>")? + "<string>".len();
    let end = after_key.find("</string>")?;
    if start > end {
        return None;
    }
    let value = after_key[start..end].trim();
    (!value.is_empty()).then(|| value.to_string())
}
