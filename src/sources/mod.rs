//! Academic source adapters with a trait-based architecture.
//!
//! Every source implements [`Source`]: it turns a free-text query into a
//! source-specific request (or synthesizes links without any request) and
//! normalizes the answer into [`PaperRecord`](crate::models::PaperRecord)s.
//! Sources are registered in a [`SourceRegistry`] and invoked through the
//! [`SearchDispatcher`](crate::dispatch::SearchDispatcher).
//!
//! | Source | Request | Failure surface |
//! |---|---|---|
//! | arXiv | Atom API | error, or soft error for unparseable feeds |
//! | Sci-Hub | none, mirror links | soft error for an empty query |
//! | Google Scholar | HTML scrape with retries | informational records + alternate engines |
//! | IEEE Xplore, PubMed | none, search page link | never fails |
//! | Semantic Scholar | JSON graph API | informational record with a search link |
//! | Google | none, search links | never fails |

mod arxiv;
mod context;
mod google;
mod google_scholar;
mod ieee_xplore;
pub mod mock;
pub mod notice;
mod pubmed;
mod registry;
mod sci_hub;
mod semantic;

pub use arxiv::ArxivSource;
pub use context::SearchContext;
pub use google::GoogleSource;
pub use google_scholar::GoogleScholarSource;
pub use ieee_xplore::IeeeXploreSource;
pub use mock::{MockBehavior, MockSource};
pub use pubmed::PubMedSource;
pub use registry::{SourceCapabilities, SourceRegistry};
pub use sci_hub::SciHubSource;
pub use semantic::SemanticScholarSource;

use async_trait::async_trait;

use crate::models::{ErrorKind, SearchQuery, SearchResult, SourceType};

/// The Source trait defines the interface for all academic source adapters.
///
/// # Implementing a New Source
///
/// 1. Create a struct that implements `Source`
/// 2. Return its [`SourceType`] and capabilities
/// 3. Implement `search`, returning `Ok(SearchResult::SoftError(..))` for
///    conditions the user should see verbatim and `Err(SourceError)` for
///    faults the dispatcher turns into an informational record
/// 4. Register it in `SourceRegistry::from_config`
#[async_trait]
pub trait Source: Send + Sync + std::fmt::Debug {
    /// Which source this is
    fn source_type(&self) -> SourceType;

    /// Unique identifier (e.g. "arxiv", "google_scholar")
    fn id(&self) -> &str {
        self.source_type().id()
    }

    /// Human-readable name of this source
    fn name(&self) -> &str {
        self.source_type().name()
    }

    /// Describe the capabilities of this source
    fn capabilities(&self) -> SourceCapabilities {
        SourceCapabilities::SEARCH
    }

    /// Whether this source is prone to CAPTCHAs and rate limiting
    fn is_soft_blocking(&self) -> bool {
        self.capabilities()
            .contains(SourceCapabilities::SOFT_BLOCKING)
    }

    /// Whether searching issues network requests
    fn uses_network(&self) -> bool {
        self.capabilities().contains(SourceCapabilities::NETWORK)
    }

    /// Search for papers matching the query
    async fn search(
        &self,
        query: &SearchQuery,
        ctx: &SearchContext,
    ) -> Result<SearchResult, SourceError>;
}

/// Errors that can occur when interacting with a source
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// Non-2xx status, connection failure or timeout
    #[error("request to {url} failed{}: {message}", .status.map(|s| format!(" with HTTP {}", s)).unwrap_or_default())]
    RequestFailed {
        url: String,
        status: Option<u16>,
        message: String,
    },

    /// Parsing error (XML, JSON, HTML)
    #[error("parse error: {0}")]
    Parse(String),

    /// Invalid request parameters or client setup
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The caller cancelled the search
    #[error("search cancelled")]
    Cancelled,
}

impl SourceError {
    /// Build a request failure from a reqwest error
    pub fn request(url: &str, err: reqwest::Error) -> Self {
        let message = if err.is_timeout() {
            "timed out".to_string()
        } else if err.is_connect() {
            format!("connection error: {}", err)
        } else {
            err.to_string()
        };
        SourceError::RequestFailed {
            url: url.to_string(),
            status: err.status().map(|s| s.as_u16()),
            message,
        }
    }

    /// Build a request failure from an unexpected HTTP status
    pub fn status(url: &str, status: reqwest::StatusCode) -> Self {
        SourceError::RequestFailed {
            url: url.to_string(),
            status: Some(status.as_u16()),
            message: status
                .canonical_reason()
                .unwrap_or("unexpected status")
                .to_string(),
        }
    }

    /// The error kind reported to callers
    pub fn kind(&self) -> ErrorKind {
        match self {
            SourceError::RequestFailed { .. } => ErrorKind::RequestFailed,
            SourceError::Parse(_) => ErrorKind::ParseFailure,
            SourceError::InvalidRequest(_) => ErrorKind::RequestFailed,
            SourceError::Cancelled => ErrorKind::Cancelled,
        }
    }
}

impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        let url = err.url().map(|u| u.to_string()).unwrap_or_default();
        SourceError::request(&url, err)
    }
}

impl From<serde_json::Error> for SourceError {
    fn from(err: serde_json::Error) -> Self {
        SourceError::Parse(format!("JSON: {}", err))
    }
}

impl From<feed_rs::parser::ParseFeedError> for SourceError {
    fn from(err: feed_rs::parser::ParseFeedError) -> Self {
        SourceError::Parse(format!("feed: {}", err))
    }
}
