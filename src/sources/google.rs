//! Google web search links.
//!
//! Produces three hand-off links: a PDF-only Google search, a Google search
//! biased toward academic pages, and a ResearchGate publication search.

use async_trait::async_trait;

use crate::models::{PaperBuilder, SearchQuery, SearchResponse, SearchResult, SourceType};
use crate::sources::{SearchContext, Source, SourceCapabilities, SourceError};

const GOOGLE_SEARCH_URL: &str = "https://www.google.com/search";
const RESEARCHGATE_SEARCH_URL: &str = "https://www.researchgate.net/search/publication";

#[derive(Debug, Clone, Default)]
pub struct GoogleSource;

impl GoogleSource {
    pub fn new() -> Self {
        Self
    }

    fn links(query: &str) -> [(String, String, &'static str); 3] {
        [
            (
                format!("PDF search: {}", query),
                format!(
                    "{}?q={}",
                    GOOGLE_SEARCH_URL,
                    urlencoding::encode(&format!("{} filetype:pdf", query))
                ),
                "Google results restricted to PDF files.",
            ),
            (
                format!("Academic search: {}", query),
                format!(
                    "{}?q={}",
                    GOOGLE_SEARCH_URL,
                    urlencoding::encode(&format!("{} academic paper research", query))
                ),
                "Google results biased toward academic pages.",
            ),
            (
                format!("ResearchGate: {}", query),
                format!("{}?q={}", RESEARCHGATE_SEARCH_URL, urlencoding::encode(query)),
                "Publications shared by their authors on ResearchGate.",
            ),
        ]
    }
}

#[async_trait]
impl Source for GoogleSource {
    fn source_type(&self) -> SourceType {
        SourceType::Google
    }

    fn capabilities(&self) -> SourceCapabilities {
        SourceCapabilities::SEARCH
    }

    async fn search(
        &self,
        query: &SearchQuery,
        _ctx: &SearchContext,
    ) -> Result<SearchResult, SourceError> {
        let text = query.text();
        let records = Self::links(text)
            .into_iter()
            .map(|(title, url, description)| {
                PaperBuilder::new(title, url, SourceType::Google)
                    .authors("Google")
                    .abstract_text(description)
                    .build()
            })
            .collect();

        Ok(SearchResult::Records(
            SearchResponse::new(records, SourceType::Google, &query.query)
                .with_status("generated 3 search links"),
        ))
    }
}
