//! Resumable download records

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// State required to resume a download from where it left off.
///
/// A record is written only for responses that carried an `ETag`: without a
/// validator there is no safe way to know the partial bytes still match the
/// server's content, so the download is non-resumable and restarts from zero.
///
/// The partial file's byte length, not anything in this record, is the
/// authoritative resume offset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadRecord {
    /// The canonical URL the response body belongs to.
    pub request_url: String,

    /// Selected response headers, lowercase names. Always contains `etag`;
    /// `last-modified` and `content-length` are kept when the server sent
    /// them.
    pub response_headers: BTreeMap<String, String>,

    /// Local partial file the body is being streamed to.
    pub file_path: PathBuf,
}

impl DownloadRecord {
    /// The validator the next conditional request must present.
    #[must_use]
    pub fn etag(&self) -> Option<&str> {
        self.response_headers.get("etag").map(String::as_str)
    }
}

/// Canonical fingerprint keying resumable-download records: the method and
/// URL hashed so the key is filesystem-safe regardless of URL contents.
#[must_use]
pub fn fingerprint(method: &str, url: &str) -> String {
    blake3::hash(format!("{method} {url}").as_bytes())
        .to_hex()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_is_stable_and_method_sensitive() {
        let a = fingerprint("GET", "https://example.com/update.zip");
        let b = fingerprint("GET", "https://example.com/update.zip");
        let c = fingerprint("HEAD", "https://example.com/update.zip");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|ch| ch.is_ascii_hexdigit()));
    }

    #[test]
    fn etag_lookup_uses_lowercase_names() {
        let mut headers = BTreeMap::new();
        headers.insert("etag".to_string(), "\"abc\"".to_string());
        let record = DownloadRecord {
            request_url: "https://example.com/u.zip".into(),
            response_headers: headers,
            file_path: "/tmp/u.part".into(),
        };
        assert_eq!(record.etag(), Some("\"abc\""));
    }
}
