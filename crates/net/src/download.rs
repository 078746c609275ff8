//! Resumable download engine
//!
//! Downloads stream to a fixed partial file keyed by the request fingerprint.
//! Response metadata is persisted beside the file so a later call can resume
//! with a conditional request; the partial file's length is the resume
//! offset. Network failures leave both on disk, so the caller just reissues
//! the download.

use crate::client::NetClient;
use crate::record::{fingerprint, DownloadRecord};
use futures::StreamExt;
use reqwest::{Response, StatusCode};
use shipit_errors::{Error, NetworkError, StateError};
use shipit_events::{AppEvent, DownloadEvent, EventEmitter, EventSender};
use shipit_state::{envelope, RECORD_VERSION};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// Headers persisted into download records.
const RECORDED_HEADERS: [&str; 3] = ["etag", "last-modified", "content-length"];

/// A completed download.
#[derive(Debug, Clone)]
pub struct DownloadedFile {
    /// Selected headers of the response that completed the body.
    pub headers: BTreeMap<String, String>,
    /// The local file holding the full body.
    pub path: PathBuf,
}

/// Stores download metadata and manages the disk locations partial bodies
/// stream to.
///
/// Concurrent downloads of the same URL are not supported; callers serialize.
pub struct DownloadManager {
    root: PathBuf,
    client: NetClient,
    tx: Option<EventSender>,
}

impl EventEmitter for DownloadManager {
    fn event_sender(&self) -> Option<&EventSender> {
        self.tx.as_ref()
    }
}

impl DownloadManager {
    /// Create a manager rooted at `root` (the per-application `downloads/`
    /// directory).
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, client: NetClient) -> Self {
        Self {
            root: root.into(),
            client,
            tx: None,
        }
    }

    /// Attach an event sender for download progress.
    #[must_use]
    pub fn with_events(mut self, tx: EventSender) -> Self {
        self.tx = Some(tx);
        self
    }

    /// Download `url`, resuming a previous partial transfer when possible.
    ///
    /// Retrieval is transparent to the caller: whether a prior download
    /// existed or not, a successful return means the file at the returned
    /// path holds the complete response body.
    ///
    /// # Errors
    ///
    /// Network and disk errors propagate; the partial file and its record
    /// are kept so the next call resumes.
    pub async fn download(&self, url: &str) -> Result<DownloadedFile, Error> {
        url::Url::parse(url).map_err(|e| NetworkError::InvalidUrl(e.to_string()))?;

        fs::create_dir_all(&self.root)
            .await
            .map_err(|e| Error::io_with_path(&e, &self.root))?;

        let fp = fingerprint("GET", url);
        let meta_path = self.root.join(format!("{fp}.meta"));
        let part_path = self.root.join(format!("{fp}.part"));

        let result = self
            .download_inner(url, &meta_path, &part_path)
            .await;

        match result {
            Ok(downloaded) => {
                self.emit(AppEvent::Download(DownloadEvent::Completed {
                    url: url.to_string(),
                    final_size: fs::metadata(&downloaded.path)
                        .await
                        .map(|m| m.len())
                        .unwrap_or(0),
                    path: downloaded.path.clone(),
                }));
                Ok(downloaded)
            }
            Err(e) => {
                self.emit(AppEvent::Download(DownloadEvent::Failed {
                    url: url.to_string(),
                    error: e.to_string(),
                }));
                Err(e)
            }
        }
    }

    async fn download_inner(
        &self,
        url: &str,
        meta_path: &Path,
        part_path: &Path,
    ) -> Result<DownloadedFile, Error> {
        let record = self.load_record(meta_path, part_path).await;

        let response = match &record {
            Some(record) => {
                let offset = fs::metadata(part_path)
                    .await
                    .map_err(|e| Error::io_with_path(&e, part_path))?
                    .len();
                self.resume(url, record, offset, meta_path, part_path).await?
            }
            None => None,
        };

        // No resumable response: plain GET streamed to a fresh file.
        let mut headers = match response {
            Some(headers) => headers,
            None => {
                let response = self.client.get(url).await?;
                if !response.status().is_success() {
                    return Err(http_error(&response));
                }
                self.stream_body(url, response, meta_path, part_path, false).await?
            }
        };

        // Record the full entity length, not whatever a partial response
        // carried, so completeness can be judged on the next call.
        let final_size = fs::metadata(part_path)
            .await
            .map_err(|e| Error::io_with_path(&e, part_path))?
            .len();
        headers.insert("content-length".to_string(), final_size.to_string());

        // A validator makes the next download resumable; without one any
        // stale record must go so a retry starts from zero.
        if headers.contains_key("etag") {
            let record = DownloadRecord {
                request_url: url.to_string(),
                response_headers: headers.clone(),
                file_path: part_path.to_path_buf(),
            };
            envelope::write_record(meta_path, RECORD_VERSION, &record).await?;
        } else {
            envelope::remove_record(meta_path).await?;
        }

        Ok(DownloadedFile {
            headers,
            path: part_path.to_path_buf(),
        })
    }

    /// Issue the conditional request for a resume attempt.
    ///
    /// Returns the final headers when this attempt completed the body, or
    /// `None` when the caller must restart with a plain request.
    async fn resume(
        &self,
        url: &str,
        record: &DownloadRecord,
        offset: u64,
        meta_path: &Path,
        part_path: &Path,
    ) -> Result<Option<BTreeMap<String, String>>, Error> {
        let Some(etag) = record.etag() else {
            return Ok(None);
        };

        // A file we already hold in full only needs revalidation: one
        // conditional request answered by 304 means nothing to transfer.
        let expected_len = record
            .response_headers
            .get("content-length")
            .and_then(|value| value.parse::<u64>().ok());
        if expected_len == Some(offset) {
            let response = self
                .client
                .get_with_headers(url, &[("If-None-Match", etag)])
                .await?;
            return match response.status() {
                StatusCode::NOT_MODIFIED => {
                    debug!(url, "download already complete");
                    Ok(Some(record.response_headers.clone()))
                }
                StatusCode::OK => {
                    let headers = self.stream_body(url, response, meta_path, part_path, false).await?;
                    Ok(Some(headers))
                }
                status if status.is_success() => Ok(None),
                _ => Err(http_error(&response)),
            };
        }

        let range = format!("bytes={offset}-");
        let response = self
            .client
            .get_with_headers(url, &[("Range", range.as_str()), ("If-Range", etag)])
            .await?;

        match response.status() {
            StatusCode::PARTIAL_CONTENT => {
                // A changed validator on a 206 means the server ignored
                // If-Range; the partial bytes cannot be trusted.
                let response_etag = header_value(&response, "etag");
                if response_etag.as_deref().is_some_and(|e| e != etag) {
                    debug!(url, "validator changed on partial response, restarting");
                    return Ok(None);
                }
                let headers = self.stream_body(url, response, meta_path, part_path, true).await?;
                Ok(Some(headers))
            }
            StatusCode::OK => {
                // Content changed server-side; overwrite from the start.
                let headers = self.stream_body(url, response, meta_path, part_path, false).await?;
                Ok(Some(headers))
            }
            StatusCode::RANGE_NOT_SATISFIABLE => {
                debug!(url, offset, "range not satisfiable, restarting");
                Ok(None)
            }
            status if status.is_success() => Ok(None),
            _ => Err(http_error(&response)),
        }
    }

    /// Stream a response body to `part_path`, appending or truncating.
    ///
    /// When the response carries a validator, its metadata is persisted
    /// before the first body byte is written: a crash mid-stream must leave
    /// both the partial file and the record a future call needs to resume.
    async fn stream_body(
        &self,
        url: &str,
        response: Response,
        meta_path: &Path,
        part_path: &Path,
        append: bool,
    ) -> Result<BTreeMap<String, String>, Error> {
        let mut headers = recorded_headers(&response);
        let content_length = response.content_length();

        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(append)
            .write(true)
            .truncate(!append)
            .open(part_path)
            .await
            .map_err(|e| Error::io_with_path(&e, part_path))?;

        let resumed_from = if append {
            file.metadata()
                .await
                .map_err(|e| Error::io_with_path(&e, part_path))?
                .len()
        } else {
            0
        };

        // A partial response reports the remaining bytes; the record wants
        // the full entity length.
        if let Some(len) = content_length {
            headers.insert("content-length".to_string(), (resumed_from + len).to_string());
        }

        if headers.contains_key("etag") {
            let record = DownloadRecord {
                request_url: url.to_string(),
                response_headers: headers.clone(),
                file_path: part_path.to_path_buf(),
            };
            envelope::write_record(meta_path, RECORD_VERSION, &record).await?;
        }

        self.emit(AppEvent::Download(DownloadEvent::Started {
            url: url.to_string(),
            resumed_from,
            total_size: content_length.map(|len| resumed_from + len),
        }));

        let mut written = resumed_from;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|_| NetworkError::StreamInterrupted { bytes: written })?;
            file.write_all(&chunk)
                .await
                .map_err(|e| Error::io_with_path(&e, part_path))?;
            written += chunk.len() as u64;

            self.emit(AppEvent::Download(DownloadEvent::Progress {
                url: url.to_string(),
                bytes_downloaded: written,
                total_size: content_length.map(|len| resumed_from + len),
            }));
        }

        // The record write that follows must observe a fully durable body.
        file.sync_all()
            .await
            .map_err(|e| Error::io_with_path(&e, part_path))?;

        Ok(headers)
    }

    /// Load the record for a fingerprint, upholding the invariant that a
    /// record never exists without its partial file.
    async fn load_record(&self, meta_path: &Path, part_path: &Path) -> Option<DownloadRecord> {
        let record =
            match envelope::read_record::<DownloadRecord>(meta_path, RECORD_VERSION).await {
                Ok(record) => record,
                Err(Error::State(StateError::RecordMissing { .. })) => return None,
                Err(_) => {
                    // Unreadable metadata is not worth failing a download
                    // over; drop it and start fresh.
                    let _ = envelope::remove_record(meta_path).await;
                    return None;
                }
            };

        if fs::metadata(part_path).await.is_err() {
            let _ = envelope::remove_record(meta_path).await;
            return None;
        }

        Some(record)
    }

    /// Bytes of `url` already on disk, i.e. the offset the next attempt
    /// would resume from. Zero when nothing has been downloaded.
    pub async fn downloaded_len(&self, url: &str) -> u64 {
        let fp = fingerprint("GET", url);
        fs::metadata(self.root.join(format!("{fp}.part")))
            .await
            .map(|m| m.len())
            .unwrap_or(0)
    }

    /// Remove every download record and partial file under the root.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be traversed or an entry
    /// cannot be removed.
    pub async fn clear_all(&self) -> Result<(), Error> {
        let mut entries = match fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(Error::io_with_path(&e, &self.root)),
        };

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| Error::io_with_path(&e, &self.root))?
        {
            fs::remove_file(entry.path())
                .await
                .map_err(|e| Error::io_with_path(&e, entry.path()))?;
        }
        Ok(())
    }
}

fn recorded_headers(response: &Response) -> BTreeMap<String, String> {
    RECORDED_HEADERS
        .iter()
        .filter_map(|name| header_value(response, name).map(|value| ((*name).to_string(), value)))
        .collect()
}

fn header_value(response: &Response, name: &str) -> Option<String> {
    response
        .headers()
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(ToString::to_string)
}

fn http_error(response: &Response) -> Error {
    NetworkError::HttpError {
        status: response.status().as_u16(),
        message: response
            .status()
            .canonical_reason()
            .unwrap_or("unexpected status")
            .to_string(),
    }
    .into()
}
