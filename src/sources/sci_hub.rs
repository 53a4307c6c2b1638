//! Sci-Hub source.
//!
//! Sci-Hub has no search API, so no request is made. The query is scanned for
//! a DOI and one link per mirror host is produced; the download engine does
//! the real work once the user picks one.

use async_trait::async_trait;
use url::Url;

use crate::models::{PaperBuilder, SearchQuery, SearchResponse, SearchResult, SourceType};
use crate::sources::{SearchContext, Source, SourceCapabilities, SourceError};
use crate::utils::extract_doi;

/// Sci-Hub mirror link generator
#[derive(Debug, Clone)]
pub struct SciHubSource {
    mirrors: Vec<String>,
}

impl SciHubSource {
    pub fn new(mirrors: Vec<String>) -> Self {
        Self {
            mirrors: mirrors
                .into_iter()
                .map(|m| m.trim_end_matches('/').to_string())
                .filter(|m| !m.is_empty())
                .collect(),
        }
    }
}

fn host_of(mirror: &str) -> String {
    Url::parse(mirror)
        .ok()
        .and_then(|url| url.host_str().map(str::to_string))
        .unwrap_or_else(|| mirror.to_string())
}

#[async_trait]
impl Source for SciHubSource {
    fn source_type(&self) -> SourceType {
        SourceType::SciHub
    }

    fn capabilities(&self) -> SourceCapabilities {
        SourceCapabilities::SEARCH | SourceCapabilities::DOI
    }

    async fn search(
        &self,
        query: &SearchQuery,
        _ctx: &SearchContext,
    ) -> Result<SearchResult, SourceError> {
        let text = query.text();
        if text.is_empty() {
            return Ok(SearchResult::soft_error(
                "Enter a DOI, a DOI link or a paper title to look up on Sci-Hub.",
            ));
        }

        let doi = extract_doi(text);
        match &doi {
            Some(doi) => tracing::debug!("Extracted DOI {} from query", doi),
            None => tracing::debug!("No DOI in query, generating title lookups"),
        }

        let records = self
            .mirrors
            .iter()
            .map(|mirror| {
                let host = host_of(mirror);
                let (title, url) = match &doi {
                    Some(doi) => (format!("DOI: {} ({})", doi, host), format!("{}/{}", mirror, doi)),
                    None => (
                        format!("Search: {} ({})", text, host),
                        format!("{}/{}", mirror, urlencoding::encode(text)),
                    ),
                };

                let mut builder = PaperBuilder::new(title, url.clone(), SourceType::SciHub)
                    .authors("Sci-Hub mirror")
                    .abstract_text(format!(
                        "Look the paper up on {}. Mirror availability varies by region; \
                         if this one fails, try the next.",
                        host
                    ))
                    .opaque_from(&url)
                    .extra("mirror", mirror.as_str());
                if let Some(doi) = &doi {
                    builder = builder.doi(doi.as_str()).extra("doi", doi.as_str());
                }
                builder.build()
            })
            .collect::<Vec<_>>();

        let status = format!("generated {} mirror links", records.len());
        Ok(SearchResult::Records(
            SearchResponse::new(records, SourceType::SciHub, &query.query).with_status(status),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{HttpConfig, MirrorConfig};
    use crate::utils::{CancelFlag, HttpClient, RetryPolicy};
    use std::time::Duration;

    fn context() -> SearchContext {
        SearchContext::new(
            HttpClient::new(&HttpConfig::default()).unwrap(),
            Duration::from_secs(1),
            RetryPolicy::once(),
            CancelFlag::new(),
        )
    }

    fn source() -> SciHubSource {
        SciHubSource::new(MirrorConfig::default().search)
    }

    #[tokio::test]
    async fn test_one_record_per_mirror_with_doi() {
        let result = source()
            .search(
                &SearchQuery::new("https://doi.org/10.1038/nature12373"),
                &context(),
            )
            .await
            .unwrap();

        let records = result.records();
        assert_eq!(records.len(), 4);
        assert_eq!(records[0].title, "DOI: 10.1038/nature12373 (sci-hub.se)");
        assert_eq!(records[0].primary_url, "https://sci-hub.se/10.1038/nature12373");
        assert_eq!(records[3].primary_url, "https://sci-hub.ren/10.1038/nature12373");
        for record in records {
            assert_eq!(record.doi(), Some("10.1038/nature12373"));
            assert_eq!(
                record.extra.get("doi").map(String::as_str),
                Some("10.1038/nature12373")
            );
            assert!(record.extra.contains_key("mirror"));
        }
    }

    #[tokio::test]
    async fn test_title_lookup_without_doi() {
        let result = source()
            .search(&SearchQuery::new("attention is all you need"), &context())
            .await
            .unwrap();

        let records = result.records();
        assert_eq!(records.len(), 4);
        assert_eq!(records[1].title, "Search: attention is all you need (sci-hub.ru)");
        assert_eq!(
            records[1].primary_url,
            "https://sci-hub.ru/attention%20is%20all%20you%20need"
        );
        assert!(records[1].doi().is_none());
        assert!(!records[1].extra.contains_key("doi"));
    }

    #[tokio::test]
    async fn test_empty_query_is_soft_error() {
        let result = source().search(&SearchQuery::new(""), &context()).await.unwrap();
        assert!(result.is_soft_error());
    }
}
