//! IEEE Xplore source.
//!
//! The Xplore API needs a registered key, so no request is made: the adapter
//! returns a single record pointing at the public search page for the query.

use async_trait::async_trait;

use crate::models::{opaque_id, PaperBuilder, SearchQuery, SearchResponse, SearchResult, SourceType};
use crate::sources::notice::search_page_url;
use crate::sources::{SearchContext, Source, SourceCapabilities, SourceError};

/// IEEE Xplore search page link
#[derive(Debug, Clone, Default)]
pub struct IeeeXploreSource;

impl IeeeXploreSource {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Source for IeeeXploreSource {
    fn source_type(&self) -> SourceType {
        SourceType::IeeeXplore
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
        let url = search_page_url(SourceType::IeeeXplore, text);

        let record = PaperBuilder::new(
            format!("IEEE Xplore search: {}", text),
            url,
            SourceType::IeeeXplore,
        )
        .authors("IEEE Xplore")
        .abstract_text(
            "Open the link to browse IEEE journals, magazines and conference proceedings \
             matching this query.",
        )
        .opaque_id(opaque_id(text))
        .build();

        Ok(SearchResult::Records(
            SearchResponse::new(vec![record], SourceType::IeeeXplore, &query.query)
                .with_status("generated search page link"),
        ))
    }
}
