//! Error types for the download module.
//!
//! Each variant describes one failed attempt against one URL. The engine
//! collects them while walking the candidate list and reports the last one
//! through [`DownloadOutcome::Failure`](crate::models::DownloadOutcome).

use std::path::PathBuf;

use thiserror::Error;

use crate::models::ErrorKind;
use crate::utils::Retryable;

/// Errors that can occur while downloading one candidate URL.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// Network-level error (DNS, connection refused, TLS, timeout, broken body)
    #[error("network error downloading {url}: {message}")]
    Network {
        url: String,
        message: String,
        /// Connection errors and timeouts are worth another attempt
        transient: bool,
    },

    /// Non-2xx response
    #[error("HTTP {status} downloading {url}: {message}")]
    HttpStatus {
        url: String,
        status: u16,
        message: &'static str,
    },

    #[error("invalid URL: {url}")]
    InvalidUrl { url: String },

    /// The response is neither a PDF nor a page linking to one
    #[error("no document at {url}: {detail}")]
    ContentMismatch { url: String, detail: String },

    /// The page asks for a login before serving the document
    #[error("{url} requires signing in before the document can be downloaded")]
    LoginRequired { url: String },

    /// CAPTCHA page or rate limiting
    #[error("blocked by {url}: {reason}")]
    Blocked { url: String, reason: String },

    /// Body below the minimum plausible PDF size
    #[error("file from {url} is only {size} bytes (minimum {minimum})")]
    TooSmall { url: String, size: u64, minimum: u64 },

    /// File system error while reserving or writing the target file
    #[error("IO error writing to {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("download cancelled")]
    Cancelled,
}

impl DownloadError {
    /// Creates a network error from a reqwest error.
    pub fn network(url: impl Into<String>, err: reqwest::Error) -> Self {
        let transient = err.is_timeout() || err.is_connect() || err.is_request() || err.is_body();
        let message = if err.is_timeout() {
            "timed out".to_string()
        } else if err.is_redirect() {
            format!("too many redirects: {}", err)
        } else {
            err.to_string()
        };
        Self::Network {
            url: url.into(),
            message,
            transient,
        }
    }

    /// Creates an error for a non-success status.
    ///
    /// 429 is treated as a block rather than a plain request failure.
    pub fn http_status(url: impl Into<String>, status: u16) -> Self {
        let url = url.into();
        match status {
            429 => Self::Blocked {
                url,
                reason: "too many requests (HTTP 429)".to_string(),
            },
            _ => Self::HttpStatus {
                url,
                status,
                message: status_message(status),
            },
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// The error kind reported to callers
    pub fn kind(&self) -> ErrorKind {
        match self {
            DownloadError::Network { .. }
            | DownloadError::HttpStatus { .. }
            | DownloadError::InvalidUrl { .. } => ErrorKind::RequestFailed,
            DownloadError::ContentMismatch { .. } | DownloadError::LoginRequired { .. } => {
                ErrorKind::ContentMismatch
            }
            DownloadError::Blocked { .. } => ErrorKind::Blocked,
            DownloadError::TooSmall { .. } => ErrorKind::FileTooSmall,
            DownloadError::Io { .. } => ErrorKind::Storage,
            DownloadError::Cancelled => ErrorKind::Cancelled,
        }
    }

    /// Whether the whole download should stop instead of moving on
    pub fn is_fatal(&self) -> bool {
        matches!(self, DownloadError::Io { .. } | DownloadError::Cancelled)
    }
}

impl Retryable for DownloadError {
    fn is_transient(&self) -> bool {
        match self {
            DownloadError::Network { transient, .. } => *transient,
            DownloadError::HttpStatus { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

fn status_message(status: u16) -> &'static str {
    match status {
        401 | 403 => "access denied",
        404 => "not found",
        410 => "gone",
        500..=599 => "server error",
        _ => "unexpected status",
    }
}
