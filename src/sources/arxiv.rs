//! arXiv source implementation.

use async_trait::async_trait;
use chrono::Datelike;
use feed_rs::parser;

use crate::models::{
    PaperBuilder, PaperRecord, SearchQuery, SearchResponse, SearchResult, SourceType,
};
use crate::sources::{SearchContext, Source, SourceCapabilities, SourceError};
use crate::utils::collapse_whitespace;

/// Base URL for arXiv API
pub const ARXIV_API_URL: &str = "http://export.arxiv.org/api/query";
/// Base URL for arXiv PDFs
pub const ARXIV_PDF_URL: &str = "https://arxiv.org/pdf";

/// arXiv source backed by the Atom query API
#[derive(Debug, Clone)]
pub struct ArxivSource {
    base_url: String,
}

impl ArxivSource {
    pub fn new() -> Self {
        Self::with_base_url(ARXIV_API_URL)
    }

    /// Point the source at another API endpoint (used by tests)
    pub fn with_base_url(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn search_url(&self, query: &SearchQuery) -> String {
        format!(
            "{}?search_query=all:{}&start=0&max_results={}",
            self.base_url,
            urlencoding::encode(query.text()),
            query.max_results
        )
    }

    /// Parse an Atom feed into records
    pub fn parse_feed(body: &[u8]) -> Result<Vec<PaperRecord>, SourceError> {
        let feed = parser::parse(body)?;
        Ok(feed.entries.iter().map(Self::parse_entry).collect())
    }

    fn parse_entry(entry: &feed_rs::model::Entry) -> PaperRecord {
        // "http://arxiv.org/abs/2301.12345v1" or "http://arxiv.org/abs/hep-th/9901001v1"
        let arxiv_id = entry
            .id
            .split_once("/abs/")
            .map(|(_, id)| id)
            .or_else(|| entry.id.rsplit('/').next())
            .unwrap_or(&entry.id)
            .to_string();

        let title = entry
            .title
            .as_ref()
            .map(|t| collapse_whitespace(&t.content))
            .unwrap_or_default();

        let authors = entry
            .authors
            .iter()
            .map(|a| collapse_whitespace(&a.name))
            .filter(|name| !name.is_empty())
            .collect::<Vec<_>>()
            .join(", ");

        let abstract_text = entry
            .summary
            .as_ref()
            .map(|s| collapse_whitespace(&s.content))
            .unwrap_or_default();

        let year = entry
            .published
            .or(entry.updated)
            .map(|d| d.year().to_string())
            .unwrap_or_default();

        let pdf_url = entry
            .links
            .iter()
            .find(|link| link.title.as_deref() == Some("pdf"))
            .map(|link| link.href.clone())
            .unwrap_or_else(|| format!("{}/{}.pdf", ARXIV_PDF_URL, arxiv_id));

        let categories = entry
            .categories
            .iter()
            .map(|c| c.term.as_str())
            .collect::<Vec<_>>()
            .join(", ");

        let mut builder = PaperBuilder::new(title, entry.id.clone(), SourceType::Arxiv)
            .authors(authors)
            .year(year)
            .abstract_text(abstract_text)
            .pdf_url(pdf_url)
            .arxiv_id(arxiv_id.clone())
            .opaque_id(arxiv_id);
        if !categories.is_empty() {
            builder = builder.extra("categories", categories);
        }
        builder.build()
    }
}

impl Default for ArxivSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Source for ArxivSource {
    fn source_type(&self) -> SourceType {
        SourceType::Arxiv
    }

    fn capabilities(&self) -> SourceCapabilities {
        SourceCapabilities::SEARCH | SourceCapabilities::NETWORK | SourceCapabilities::PDF_LINKS
    }

    async fn search(
        &self,
        query: &SearchQuery,
        ctx: &SearchContext,
    ) -> Result<SearchResult, SourceError> {
        if query.is_blank() {
            return Ok(SearchResult::Records(
                SearchResponse::new(Vec::new(), SourceType::Arxiv, &query.query)
                    .with_status("empty query"),
            ));
        }

        let url = self.search_url(query);
        tracing::debug!("Searching arXiv: {}", url);

        let response = ctx
            .client
            .get(&url)
            .timeout(ctx.timeout)
            .send()
            .await
            .map_err(|e| SourceError::request(&url, e))?;

        if !response.status().is_success() {
            return Err(SourceError::status(&url, response.status()));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| SourceError::request(&url, e))?;

        match Self::parse_feed(&body) {
            Ok(records) => {
                tracing::info!("arXiv returned {} entries", records.len());
                Ok(SearchResult::Records(SearchResponse::new(
                    records,
                    SourceType::Arxiv,
                    &query.query,
                )))
            }
            Err(e) => {
                tracing::warn!("Unreadable arXiv feed: {}", e);
                Ok(SearchResult::soft_error(format!(
                    "arXiv returned a response that could not be read ({}). Try again later.",
                    e
                )))
            }
        }
    }
}
