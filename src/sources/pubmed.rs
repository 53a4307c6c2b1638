//! PubMed source.
//!
//! Produces one record linking to the PubMed search page; no request is made.

use async_trait::async_trait;

use crate::models::{opaque_id, PaperBuilder, SearchQuery, SearchResponse, SearchResult, SourceType};
use crate::sources::notice::search_page_url;
use crate::sources::{SearchContext, Source, SourceCapabilities, SourceError};

#[derive(Debug, Clone, Default)]
pub struct PubMedSource;

impl PubMedSource {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Source for PubMedSource {
    fn source_type(&self) -> SourceType {
        SourceType::PubMed
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
        let record = PaperBuilder::new(
            format!("PubMed search: {}", text),
            search_page_url(SourceType::PubMed, text),
            SourceType::PubMed,
        )
        .authors("PubMed")
        .abstract_text("Open the link to search biomedical literature on PubMed.")
        .opaque_id(opaque_id(text))
        .build();

        Ok(SearchResult::Records(
            SearchResponse::new(vec![record], SourceType::PubMed, &query.query)
                .with_status("generated search page link"),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HttpConfig;
    use crate::utils::{CancelFlag, HttpClient, RetryPolicy};
    use std::time::Duration;

    #[tokio::test]
    async fn test_search_link() {
        let ctx = SearchContext::new(
            HttpClient::new(&HttpConfig::default()).unwrap(),
            Duration::from_secs(1),
            RetryPolicy::once(),
            CancelFlag::new(),
        );
        let result = PubMedSource::new()
            .search(&SearchQuery::new("crispr"), &ctx)
            .await
            .unwrap();

        let records = result.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].primary_url, "https://pubmed.ncbi.nlm.nih.gov/?term=crispr");
        assert_eq!(records[0].source, SourceType::PubMed);
    }
}
