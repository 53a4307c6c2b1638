//! Search query and result models.

use serde::{Deserialize, Serialize};

use super::paper::{PaperRecord, SourceType};

/// Default number of results requested from sources that page
pub const DEFAULT_MAX_RESULTS: usize = 20;

/// A free-text search query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchQuery {
    pub query: String,
    pub max_results: usize,
}

impl SearchQuery {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            max_results: DEFAULT_MAX_RESULTS,
        }
    }

    /// Set the maximum number of results
    pub fn max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results.max(1);
        self
    }

    /// The query with surrounding whitespace removed
    pub fn text(&self) -> &str {
        self.query.trim()
    }

    pub fn is_blank(&self) -> bool {
        self.text().is_empty()
    }
}

/// Records returned by one source for one query, with a status message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResponse {
    pub records: Vec<PaperRecord>,
    pub status: String,
    pub source: SourceType,
    pub query: String,
}

impl SearchResponse {
    /// Create a response with a status derived from the record count
    pub fn new(records: Vec<PaperRecord>, source: SourceType, query: &str) -> Self {
        let papers = records.iter().filter(|r| r.is_paper()).count();
        let status = if papers == 0 {
            "no matching papers".to_string()
        } else {
            format!("found {} papers", papers)
        };

        Self {
            records,
            status,
            source,
            query: query.to_string(),
        }
    }

    /// Replace the status message
    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = status.into();
        self
    }

    /// Number of real search hits (notices and alternates excluded)
    pub fn paper_count(&self) -> usize {
        self.records.iter().filter(|r| r.is_paper()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Outcome of a source search: records, or a soft error the caller shows as-is
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SearchResult {
    Records(SearchResponse),
    SoftError { message: String },
}

impl SearchResult {
    pub fn soft_error(message: impl Into<String>) -> Self {
        SearchResult::SoftError {
            message: message.into(),
        }
    }

    /// The records carried by this result, empty for a soft error
    pub fn records(&self) -> &[PaperRecord] {
        match self {
            SearchResult::Records(response) => &response.records,
            SearchResult::SoftError { .. } => &[],
        }
    }

    pub fn into_records(self) -> Vec<PaperRecord> {
        match self {
            SearchResult::Records(response) => response.records,
            SearchResult::SoftError { .. } => Vec::new(),
        }
    }

    pub fn is_soft_error(&self) -> bool {
        matches!(self, SearchResult::SoftError { .. })
    }
}
