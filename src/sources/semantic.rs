//! Semantic Scholar source implementation.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

use crate::models::{
    opaque_id, PaperBuilder, PaperRecord, SearchQuery, SearchResponse, SearchResult, SourceType,
};
use crate::sources::notice::{notice_record, search_page_url, NoticeKind};
use crate::sources::{SearchContext, Source, SourceCapabilities, SourceError};
use crate::utils::collapse_whitespace;

const SEMANTIC_API_BASE: &str = "https://api.semanticscholar.org";
const SEMANTIC_PAPER_URL: &str = "https://www.semanticscholar.org/paper";
const SEARCH_FIELDS: &str =
    "title,authors,year,abstract,url,citationCount,venue,publicationDate,externalIds";
const SEARCH_LIMIT: usize = 10;

/// Semantic Scholar research source
///
/// Uses the Graph API search endpoint. Every failure is reported as a single
/// informational record linking to the website search.
#[derive(Debug, Clone)]
pub struct SemanticScholarSource {
    base_url: String,
    timeout: Duration,
    api_key: Option<String>,
}

impl SemanticScholarSource {
    pub fn new() -> Self {
        Self::with_base_url(SEMANTIC_API_BASE, Duration::from_secs(5))
    }

    /// Point the source at another API host with its own timeout
    pub fn with_base_url(base_url: &str, timeout: Duration) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
            api_key: std::env::var("SEMANTIC_SCHOLAR_API_KEY")
                .ok()
                .filter(|key| !key.is_empty()),
        }
    }

    fn search_url(&self, query: &str) -> String {
        format!(
            "{}/graph/v1/paper/search?query={}&limit={}&fields={}",
            self.base_url,
            urlencoding::encode(query),
            SEARCH_LIMIT,
            SEARCH_FIELDS
        )
    }

    /// Add API key to request headers if available
    fn add_api_key_if_present(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => builder.header("x-api-key", key),
            None => builder,
        }
    }

    async fn fetch(&self, url: &str, ctx: &SearchContext) -> Result<S2SearchResponse, SourceError> {
        let request = self.add_api_key_if_present(ctx.client.get(url).timeout(self.timeout));
        let response = request
            .send()
            .await
            .map_err(|e| SourceError::request(url, e))?;

        if !response.status().is_success() {
            return Err(SourceError::status(url, response.status()));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| SourceError::request(url, e))?;
        Ok(serde_json::from_slice(&body)?)
    }

    /// Parse Semantic Scholar paper data
    fn parse_paper(data: &S2Paper) -> PaperRecord {
        let title = data
            .title
            .as_deref()
            .map(collapse_whitespace)
            .unwrap_or_default();

        let authors = data
            .authors
            .iter()
            .filter_map(|a| a.name.as_deref())
            .collect::<Vec<_>>()
            .join(", ");

        let url = data
            .url
            .clone()
            .filter(|u| !u.is_empty())
            .or_else(|| {
                data.paper_id
                    .as_ref()
                    .map(|id| format!("{}/{}", SEMANTIC_PAPER_URL, id))
            })
            .unwrap_or_else(|| search_page_url(SourceType::SemanticScholar, &title));

        let opaque = data
            .paper_id
            .clone()
            .unwrap_or_else(|| opaque_id(&title));

        let mut builder = PaperBuilder::new(title, url, SourceType::SemanticScholar)
            .authors(authors)
            .year(data.year.map(|y| y.to_string()).unwrap_or_default())
            .abstract_text(data.r#abstract.clone().unwrap_or_default())
            .opaque_id(opaque);

        if let Some(ids) = &data.external_ids {
            if let Some(doi) = &ids.doi {
                builder = builder.doi(doi.as_str());
            }
            if let Some(arxiv) = &ids.arxiv {
                builder = builder
                    .arxiv_id(arxiv.as_str())
                    .pdf_url(format!("https://arxiv.org/pdf/{}.pdf", arxiv));
            }
        }
        if let Some(count) = data.citation_count {
            builder = builder.extra("citations", count.to_string());
        }
        if let Some(venue) = data.venue.as_deref().filter(|v| !v.is_empty()) {
            builder = builder.extra("venue", venue);
        }
        if let Some(date) = data.publication_date.as_deref() {
            builder = builder.extra("publication_date", date);
        }
        builder.build()
    }

    fn unavailable(&self, query: &SearchQuery, kind: NoticeKind, detail: &str) -> SearchResult {
        let text = query.text();
        let record = notice_record(
            SourceType::SemanticScholar,
            &kind,
            text,
            detail,
            &search_page_url(SourceType::SemanticScholar, text),
        );
        SearchResult::Records(
            SearchResponse::new(vec![record], SourceType::SemanticScholar, &query.query)
                .with_status("Semantic Scholar unavailable, use the search link"),
        )
    }
}

impl Default for SemanticScholarSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Source for SemanticScholarSource {
    fn source_type(&self) -> SourceType {
        SourceType::SemanticScholar
    }

    fn capabilities(&self) -> SourceCapabilities {
        SourceCapabilities::SEARCH
            | SourceCapabilities::NETWORK
            | SourceCapabilities::DOI
            | SourceCapabilities::PDF_LINKS
    }

    async fn search(
        &self,
        query: &SearchQuery,
        ctx: &SearchContext,
    ) -> Result<SearchResult, SourceError> {
        if query.is_blank() {
            return Ok(self.unavailable(query, NoticeKind::NoResults, "the query was empty"));
        }

        let url = self.search_url(query.text());
        tracing::debug!("Searching Semantic Scholar: {}", url);

        let fetched = tokio::time::timeout(self.timeout, self.fetch(&url, ctx)).await;
        let data = match fetched {
            Ok(Ok(data)) => data,
            Ok(Err(e)) => {
                tracing::warn!("Semantic Scholar search failed: {}", e);
                let kind = match &e {
                    SourceError::RequestFailed {
                        status: Some(status),
                        ..
                    } => NoticeKind::ErrorStatus(*status),
                    SourceError::RequestFailed { message, .. } => {
                        NoticeKind::ConnectionError(message.clone())
                    }
                    other => NoticeKind::Exception(other.kind()),
                };
                return Ok(self.unavailable(query, kind, &e.to_string()));
            }
            Err(_) => {
                tracing::warn!("Semantic Scholar timed out after {:?}", self.timeout);
                return Ok(self.unavailable(
                    query,
                    NoticeKind::ConnectionError(format!("timed out after {:?}", self.timeout)),
                    "",
                ));
            }
        };

        let records: Vec<PaperRecord> = data
            .data
            .iter()
            .take(query.max_results)
            .map(Self::parse_paper)
            .collect();

        if records.is_empty() {
            return Ok(self.unavailable(query, NoticeKind::NoResults, ""));
        }

        tracing::info!("Semantic Scholar returned {} papers", records.len());
        Ok(SearchResult::Records(SearchResponse::new(
            records,
            SourceType::SemanticScholar,
            &query.query,
        )))
    }
}

// ===== API Response Types =====

#[derive(Debug, Deserialize)]
struct S2SearchResponse {
    #[serde(default)]
    data: Vec<S2Paper>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct S2Paper {
    paper_id: Option<String>,
    title: Option<String>,
    #[serde(default)]
    authors: Vec<S2Author>,
    year: Option<i32>,
    r#abstract: Option<String>,
    url: Option<String>,
    citation_count: Option<u64>,
    venue: Option<String>,
    publication_date: Option<String>,
    external_ids: Option<S2ExternalIds>,
}

#[derive(Debug, Deserialize)]
struct S2Author {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct S2ExternalIds {
    #[serde(rename = "DOI")]
    doi: Option<String>,
    #[serde(rename = "ArXiv")]
    arxiv: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HttpConfig;
    use crate::utils::{CancelFlag, HttpClient, RetryPolicy};

    const SEARCH_BODY: &str = r#"{
        "total": 2,
        "offset": 0,
        "data": [
            {
                "paperId": "abc123",
                "title": "Graph Attention Networks",
                "authors": [{"authorId": "1", "name": "Petar Velickovic"}, {"authorId": "2", "name": "Guillem Cucurull"}],
                "year": 2018,
                "abstract": "We present graph attention networks.",
                "url": "https://www.semanticscholar.org/paper/abc123",
                "citationCount": 9000,
                "venue": "ICLR",
                "publicationDate": "2017-10-30",
                "externalIds": {"DOI": "10.48550/arXiv.1710.10903", "ArXiv": "1710.10903"}
            },
            {
                "paperId": "def456",
                "title": "Untitled preprint",
                "authors": [],
                "year": null,
                "abstract": null,
                "url": null,
                "citationCount": null,
                "venue": "",
                "publicationDate": null,
                "externalIds": null
            }
        ]
    }"#;

    fn context() -> SearchContext {
        SearchContext::new(
            HttpClient::new(&HttpConfig::default()).unwrap(),
            Duration::from_secs(5),
            RetryPolicy::once(),
            CancelFlag::new(),
        )
    }

    async fn search_stub(status: usize, body: &str) -> SearchResult {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/graph/v1/paper/search")
            .match_query(mockito::Matcher::Any)
            .with_status(status)
            .with_header("content-type", "application/json")
            .with_body(body)
            .create_async()
            .await;

        SemanticScholarSource::with_base_url(&server.url(), Duration::from_secs(5))
            .search(&SearchQuery::new("graph attention"), &context())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_search_parses_papers() {
        let result = search_stub(200, SEARCH_BODY).await;
        let records = result.records();
        assert_eq!(records.len(), 2);

        let first = &records[0];
        assert_eq!(first.title, "Graph Attention Networks");
        assert_eq!(first.authors, "Petar Velickovic, Guillem Cucurull");
        assert_eq!(first.year, "2018");
        assert_eq!(first.identifier.opaque_id, "abc123");
        assert_eq!(first.doi(), Some("10.48550/arXiv.1710.10903"));
        assert_eq!(first.arxiv_id(), Some("1710.10903"));
        assert_eq!(first.extra.get("citations").map(String::as_str), Some("9000"));
        assert_eq!(first.extra.get("venue").map(String::as_str), Some("ICLR"));

        let second = &records[1];
        assert_eq!(second.primary_url, "https://www.semanticscholar.org/paper/def456");
        assert_eq!(second.year, crate::models::UNKNOWN_YEAR);
        assert!(!second.extra.contains_key("venue"));
    }

    #[test]
    fn test_paper_without_link_falls_back_to_search_page() {
        let paper: S2Paper =
            serde_json::from_str(r#"{"title": "Orphaned Abstract", "authors": []}"#).unwrap();

        let record = SemanticScholarSource::parse_paper(&paper);

        assert_eq!(
            record.primary_url,
            "https://www.semanticscholar.org/search?q=Orphaned%20Abstract"
        );
        assert!(record.pdf_url.is_none());
        assert!(record.has_location());
    }

    #[tokio::test]
    async fn test_failures_become_search_link() {
        for (status, body) in [
            (500, "oops"),
            (200, "{not json"),
            (200, r#"{"total": 0, "data": []}"#),
        ] {
            let result = search_stub(status, body).await;
            let records = result.records();
            assert_eq!(records.len(), 1, "status {} body {}", status, body);
            assert!(records[0].is_notice());
            assert_eq!(
                records[0].primary_url,
                "https://www.semanticscholar.org/search?q=graph%20attention"
            );
        }
    }

    #[tokio::test]
    async fn test_unreachable_host_becomes_search_link() {
        let source =
            SemanticScholarSource::with_base_url("http://127.0.0.1:9", Duration::from_secs(2));
        let result = source
            .search(&SearchQuery::new("graph attention"), &context())
            .await
            .unwrap();
        assert!(result.records()[0].is_notice());
    }
}
