//! Download request and outcome models.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::error::ErrorKind;

/// A document identifier that can be resolved to retrieval URLs
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum DocumentId {
    Doi(String),
    Arxiv(String),
}

impl DocumentId {
    pub fn value(&self) -> &str {
        match self {
            DocumentId::Doi(doi) => doi,
            DocumentId::Arxiv(id) => id,
        }
    }

    pub fn as_doi(&self) -> Option<&str> {
        match self {
            DocumentId::Doi(doi) => Some(doi),
            DocumentId::Arxiv(_) => None,
        }
    }
}

impl std::fmt::Display for DocumentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DocumentId::Doi(doi) => write!(f, "doi:{}", doi),
            DocumentId::Arxiv(id) => write!(f, "arXiv:{}", id),
        }
    }
}

/// Everything the download engine needs to fetch one document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadRequest {
    /// Tried strictly in order
    pub candidate_urls: Vec<String>,
    pub suggested_filename: String,
    pub identifier: Option<DocumentId>,
}

impl DownloadRequest {
    pub fn new(candidate_urls: Vec<String>, suggested_filename: impl Into<String>) -> Self {
        Self {
            candidate_urls,
            suggested_filename: suggested_filename.into(),
            identifier: None,
        }
    }

    pub fn with_identifier(mut self, identifier: DocumentId) -> Self {
        self.identifier = Some(identifier);
        self
    }

    pub fn doi(&self) -> Option<&str> {
        self.identifier.as_ref().and_then(DocumentId::as_doi)
    }
}

/// Result of one download invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DownloadOutcome {
    Success {
        file_path: PathBuf,
        bytes_written: u64,
        /// URL that finally served the document
        url: String,
    },
    Failure {
        reason: ErrorKind,
        message: String,
        attempted_urls: Vec<String>,
        alternate_links: Vec<String>,
    },
}

impl DownloadOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, DownloadOutcome::Success { .. })
    }

    pub fn reason(&self) -> Option<ErrorKind> {
        match self {
            DownloadOutcome::Success { .. } => None,
            DownloadOutcome::Failure { reason, .. } => Some(*reason),
        }
    }

    pub fn file_path(&self) -> Option<&PathBuf> {
        match self {
            DownloadOutcome::Success { file_path, .. } => Some(file_path),
            DownloadOutcome::Failure { .. } => None,
        }
    }
}
