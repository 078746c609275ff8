//! Network-related error types

use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
pub enum NetworkError {
    #[error("connection timeout to {url}")]
    Timeout { url: String },

    #[error("download failed: {0}")]
    DownloadFailed(String),

    #[error("connection refused: {0}")]
    ConnectionRefused(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("HTTP error {status}: {message}")]
    HttpError { status: u16, message: String },

    #[error("rate limited: retry after {seconds} seconds")]
    RateLimited { seconds: u64 },

    #[error("range request failed: {message}")]
    RangeRequestFailed { message: String },

    #[error("stream interrupted after {bytes} bytes")]
    StreamInterrupted { bytes: u64 },
}

impl NetworkError {
    #[must_use]
    pub fn discriminator(&self) -> &'static str {
        match self {
            Self::Timeout { .. } => "DownloadTimeout",
            Self::InvalidUrl(_) => "InvalidUrl",
            Self::HttpError { .. } => "HttpError",
            Self::RateLimited { .. } => "RateLimited",
            Self::RangeRequestFailed { .. } => "RangeRequestFailed",
            Self::DownloadFailed(_) | Self::ConnectionRefused(_) | Self::StreamInterrupted { .. } => {
                "DownloadFailed"
            }
        }
    }

    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Timeout { .. }
                | Self::DownloadFailed(_)
                | Self::ConnectionRefused(_)
                | Self::RateLimited { .. }
                | Self::StreamInterrupted { .. }
        )
    }
}
