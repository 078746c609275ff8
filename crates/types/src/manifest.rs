//! The update manifest consumed from the feed client

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

/// Metadata describing an available update, parsed from the JSON served by
/// the update feed.
///
/// Only `url` is required. Fields this crate does not know about are kept
/// verbatim so client-side extensions survive a round trip through the
/// installer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateManifest {
    /// Where the update archive can be downloaded.
    pub url: String,

    /// Human-readable name of the release.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Release notes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,

    /// Publication date, ISO-8601.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pub_date: Option<DateTime<FixedOffset>>,

    /// Fields we do not interpret, preserved verbatim.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}
