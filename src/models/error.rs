//! Error kinds reported to callers.

use serde::{Deserialize, Serialize};

/// Classification of a failed search or download.
///
/// Kinds are stable across sources so callers can react to them (wait, retry,
/// switch mirror) without inspecting messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Unknown source name, rejected before any network call
    UnsupportedSource,
    /// Non-2xx status, connection error, TLS error, timeout or redirect loop
    RequestFailed,
    /// Response arrived but the expected structure was absent
    ParseFailure,
    /// CAPTCHA or rate limiting detected
    Blocked,
    /// Response is not a document and no document link could be extracted
    ContentMismatch,
    /// Downloaded file below the minimum size, treated as corrupt
    FileTooSmall,
    /// The local download directory could not be written
    Storage,
    /// Abandoned cooperatively
    Cancelled,
}

impl ErrorKind {
    /// Short human readable label
    pub fn label(&self) -> &'static str {
        match self {
            ErrorKind::UnsupportedSource => "unsupported source",
            ErrorKind::RequestFailed => "request failed",
            ErrorKind::ParseFailure => "unexpected response format",
            ErrorKind::Blocked => "blocked",
            ErrorKind::ContentMismatch => "no document found",
            ErrorKind::FileTooSmall => "file too small",
            ErrorKind::Storage => "storage error",
            ErrorKind::Cancelled => "cancelled",
        }
    }

    /// Suggested next step for the user
    pub fn next_step(&self) -> &'static str {
        match self {
            ErrorKind::UnsupportedSource => "Pick one of the listed sources.",
            ErrorKind::RequestFailed => {
                "Check your connection and retry, or try one of the alternate links."
            }
            ErrorKind::ParseFailure => {
                "The site layout may have changed; try another source or open the link in a browser."
            }
            ErrorKind::Blocked => {
                "Wait a few minutes or switch networks, then retry; alternate sources are listed."
            }
            ErrorKind::ContentMismatch => {
                "Open one of the alternate links in a browser to fetch the document manually."
            }
            ErrorKind::FileTooSmall => {
                "The mirror returned a truncated file; retry later or use another mirror."
            }
            ErrorKind::Storage => "Check that the download directory exists and is writable.",
            ErrorKind::Cancelled => "Start the operation again when ready.",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}
