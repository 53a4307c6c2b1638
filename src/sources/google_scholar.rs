//! Google Scholar source implementation.
//!
//! Google Scholar has no public API, so results are scraped from the HTML
//! result page. Scholar blocks automated traffic aggressively; every terminal
//! condition (CAPTCHA, rate limiting, unreadable page, no results, network
//! failure) is returned as an informational record rather than an error, and
//! two alternate engines are always appended so the user has somewhere to go.

use async_trait::async_trait;
use regex::Regex;
use scraper::{ElementRef, Html};
use std::sync::LazyLock;

use crate::models::{
    PaperBuilder, PaperRecord, SearchQuery, SearchResponse, SearchResult, SourceType,
};
use crate::sources::notice::{alternate_engines, notice_record, NoticeKind};
use crate::sources::{SearchContext, Source, SourceCapabilities, SourceError};
use crate::utils::html::{element_text, looks_like_captcha, selector};
use crate::utils::{extract_doi, with_retry, RetryError, Retryable};

const GOOGLE_SCHOLAR_URL: &str = "https://scholar.google.com";

static YEAR_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{4})\b").expect("valid year pattern"));

static CITED_BY_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Cited by (\d+)").expect("valid citation pattern"));

/// Google Scholar HTML scraper
#[derive(Debug, Clone)]
pub struct GoogleScholarSource {
    base_url: String,
}

/// Failure of one fetch attempt
#[derive(Debug)]
enum FetchError {
    Captcha,
    Status(u16),
    Transport(String),
}

impl std::fmt::Display for FetchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FetchError::Captcha => write!(f, "CAPTCHA challenge"),
            FetchError::Status(status) => write!(f, "HTTP {}", status),
            FetchError::Transport(message) => write!(f, "{}", message),
        }
    }
}

impl Retryable for FetchError {
    fn is_transient(&self) -> bool {
        match self {
            FetchError::Captcha => false,
            FetchError::Status(status) => matches!(status, 403 | 429 | 500..=599),
            FetchError::Transport(_) => true,
        }
    }
}

/// What the result page contained
enum ParsedPage {
    NoBlocks,
    Records(Vec<PaperRecord>),
}

impl GoogleScholarSource {
    pub fn new() -> Self {
        Self::with_base_url(GOOGLE_SCHOLAR_URL)
    }

    /// Point the source at another host (used by tests)
    pub fn with_base_url(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn search_url(&self, query: &str) -> String {
        format!(
            "{}/scholar?q={}&hl=en&as_sdt=0,5",
            self.base_url,
            urlencoding::encode(query)
        )
    }

    async fn fetch(&self, url: &str, ctx: &SearchContext) -> Result<String, FetchError> {
        let response = ctx
            .client
            .get(url)
            .timeout(ctx.timeout)
            .send()
            .await
            .map_err(|e| FetchError::Transport(SourceError::request(url, e).to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| FetchError::Transport(SourceError::request(url, e).to_string()))?;

        // Scholar serves its challenge page with 200 as well as 429
        if looks_like_captcha(&body) {
            return Err(FetchError::Captcha);
        }
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }
        Ok(body)
    }

    fn parse_results(
        &self,
        html: &str,
        max_results: usize,
    ) -> Result<ParsedPage, SourceError> {
        let document = Html::parse_document(html);
        let primary = selector("div.gs_r.gs_or.gs_scl")?;
        let fallback = selector("div.gs_ri")?;

        let mut blocks: Vec<ElementRef<'_>> = document.select(&primary).collect();
        if blocks.is_empty() {
            blocks = document.select(&fallback).collect();
        }
        if blocks.is_empty() {
            return Ok(ParsedPage::NoBlocks);
        }

        let mut records = Vec::new();
        for block in blocks.into_iter().take(max_results) {
            if let Some(record) = self.parse_block(&block)? {
                records.push(record);
            }
        }
        Ok(ParsedPage::Records(records))
    }

    fn parse_block(&self, block: &ElementRef<'_>) -> Result<Option<PaperRecord>, SourceError> {
        let title_sel = selector("h3.gs_rt")?;
        let link_sel = selector("h3.gs_rt a")?;
        let meta_sel = selector("div.gs_a")?;
        let snippet_sel = selector("div.gs_rs")?;
        let pdf_sel = selector("div.gs_or_ggsm a")?;
        let footer_sel = selector("div.gs_fl a, div.gs_flb a")?;

        let anchor = block.select(&link_sel).next();
        let title = match anchor {
            Some(a) => element_text(&a),
            None => match block.select(&title_sel).next() {
                // citation-only entries have a title but no link; strip the [CITATION] tags
                Some(h3) => element_text(&h3)
                    .split(']')
                    .next_back()
                    .unwrap_or_default()
                    .trim()
                    .to_string(),
                None => return Ok(None),
            },
        };
        if title.is_empty() {
            return Ok(None);
        }

        let link = anchor
            .and_then(|a| a.value().attr("href"))
            .map(str::to_string)
            .unwrap_or_else(|| self.search_url(&title));

        let meta = block
            .select(&meta_sel)
            .next()
            .map(|el| element_text(&el))
            .unwrap_or_default();
        let mut meta_parts = meta.split(" - ");
        let authors = meta_parts
            .next()
            .unwrap_or_default()
            .trim()
            .trim_end_matches('…')
            .trim()
            .to_string();
        let venue = meta_parts.next().map(str::trim).unwrap_or_default();
        let year = YEAR_PATTERN
            .captures(&meta)
            .map(|caps| caps[1].to_string())
            .unwrap_or_default();

        let snippet = block
            .select(&snippet_sel)
            .next()
            .map(|el| element_text(&el))
            .unwrap_or_default();

        let pdf_url = block
            .select(&pdf_sel)
            .find(|a| {
                let text = element_text(a);
                let href = a.value().attr("href").unwrap_or_default().to_lowercase();
                text.contains("[PDF]") || href.contains("pdf")
            })
            .and_then(|a| a.value().attr("href"))
            .map(str::to_string);

        let citations = block.select(&footer_sel).find_map(|a| {
            CITED_BY_PATTERN
                .captures(&element_text(&a))
                .map(|caps| caps[1].to_string())
        });

        let mut builder = PaperBuilder::new(title.clone(), link.clone(), SourceType::GoogleScholar)
            .authors(authors)
            .year(year)
            .abstract_text(snippet)
            .opaque_from(&format!("{}|{}", title, link));
        if let Some(pdf) = pdf_url {
            builder = builder.pdf_url(pdf);
        }
        if let Some(doi) = extract_doi(&link) {
            builder = builder.doi(doi);
        }
        if !venue.is_empty() {
            builder = builder.extra("venue", venue);
        }
        if let Some(count) = citations {
            builder = builder.extra("citations", count);
        }
        Ok(Some(builder.build()))
    }

    fn notice(&self, kind: NoticeKind, query: &str, detail: &str) -> PaperRecord {
        tracing::warn!("Google Scholar: {} for '{}'", kind.tag(), query);
        notice_record(
            SourceType::GoogleScholar,
            &kind,
            query,
            detail,
            &self.search_url(query),
        )
    }
}

impl Default for GoogleScholarSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Source for GoogleScholarSource {
    fn source_type(&self) -> SourceType {
        SourceType::GoogleScholar
    }

    fn capabilities(&self) -> SourceCapabilities {
        SourceCapabilities::SEARCH
            | SourceCapabilities::NETWORK
            | SourceCapabilities::SOFT_BLOCKING
            | SourceCapabilities::PDF_LINKS
            | SourceCapabilities::DOI
    }

    async fn search(
        &self,
        query: &SearchQuery,
        ctx: &SearchContext,
    ) -> Result<SearchResult, SourceError> {
        let text = query.text();
        let (mut records, status) = if text.is_empty() {
            (
                vec![self.notice(NoticeKind::NoResults, text, "the query was empty")],
                "empty query".to_string(),
            )
        } else {
            let url = self.search_url(text);
            tracing::debug!("Searching Google Scholar: {}", url);

            match with_retry(ctx.retry, &ctx.cancel, || self.fetch(&url, ctx)).await {
                Ok(html) => match self.parse_results(&html, query.max_results) {
                    Ok(ParsedPage::Records(records)) if !records.is_empty() => {
                        let status = format!("found {} papers", records.len());
                        (records, status)
                    }
                    Ok(ParsedPage::Records(_)) => (
                        vec![self.notice(NoticeKind::NoResults, text, "")],
                        "no matching papers".to_string(),
                    ),
                    Ok(ParsedPage::NoBlocks) => (
                        vec![self.notice(NoticeKind::NoParse, text, "")],
                        "result page not recognized".to_string(),
                    ),
                    Err(e) => (
                        vec![self.notice(NoticeKind::Exception(e.kind()), text, &e.to_string())],
                        "search failed".to_string(),
                    ),
                },
                Err(RetryError::Cancelled) => return Err(SourceError::Cancelled),
                Err(RetryError::Failed { error, attempts }) => {
                    let detail = error.to_string();
                    let kind = match error {
                        FetchError::Captcha => NoticeKind::Captcha,
                        FetchError::Status(status @ (403 | 429)) => NoticeKind::RateLimited(status),
                        FetchError::Status(status) if status >= 500 => {
                            NoticeKind::AllAttemptsFailed(attempts)
                        }
                        FetchError::Status(status) => NoticeKind::ErrorStatus(status),
                        FetchError::Transport(message) => NoticeKind::ConnectionError(message),
                    };
                    let status = format!("blocked or failed: {}", kind.tag());
                    (vec![self.notice(kind, text, &detail)], status)
                }
            }
        };

        records.extend(alternate_engines(SourceType::GoogleScholar, text));
        Ok(SearchResult::Records(
            SearchResponse::new(records, SourceType::GoogleScholar, &query.query).with_status(status),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HttpConfig;
    use crate::models::RecordKind;
    use crate::utils::{CancelFlag, HttpClient, RetryPolicy};
    use std::time::Duration;

    const RESULTS_PAGE: &str = r#"<html><body>
<div class="gs_r gs_or gs_scl">
  <div class="gs_ggs gs_fl"><div class="gs_ggsd"><div class="gs_or_ggsm">
    <a href="https://arxiv.org/pdf/1706.03762">[PDF] arxiv.org</a>
  </div></div></div>
  <div class="gs_ri">
    <h3 class="gs_rt"><a href="https://doi.org/10.5555/3295222.3295349">Attention is all you need</a></h3>
    <div class="gs_a">A Vaswani, N Shazeer - Advances in neural information processing systems, 2017 - proceedings.neurips.cc</div>
    <div class="gs_rs">The dominant sequence transduction models are based on complex recurrent networks.</div>
    <div class="gs_fl"><a href="/scholar?cites=1">Cited by 100000</a></div>
  </div>
</div>
<div class="gs_r gs_or gs_scl">
  <div class="gs_ri">
    <h3 class="gs_rt"><a href="https://example.org/bert">BERT: Pre-training of deep bidirectional transformers</a></h3>
    <div class="gs_a">J Devlin, MW Chang - arXiv preprint, 2018 - arxiv.org</div>
    <div class="gs_rs">We introduce a new language representation model.</div>
  </div>
</div>
</body></html>"#;

    fn context(attempts: u32) -> SearchContext {
        SearchContext::new(
            HttpClient::new(&HttpConfig::default()).unwrap(),
            Duration::from_secs(5),
            RetryPolicy::fixed(attempts, Duration::ZERO),
            CancelFlag::new(),
        )
    }

    async fn search_with(
        status: usize,
        body: &str,
        attempts: u32,
        hits: usize,
    ) -> (Vec<PaperRecord>, mockito::Mock, mockito::ServerGuard) {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/scholar")
            .match_query(mockito::Matcher::Any)
            .with_status(status)
            .with_header("content-type", "text/html")
            .with_body(body)
            .expect(hits)
            .create_async()
            .await;

        let source = GoogleScholarSource::with_base_url(&server.url());
        let result = source
            .search(&SearchQuery::new("transformers"), &context(attempts))
            .await
            .unwrap();
        (result.into_records(), mock, server)
    }

    #[test]
    fn test_parse_results_page() {
        let source = GoogleScholarSource::new();
        let ParsedPage::Records(records) = source.parse_results(RESULTS_PAGE, 10).unwrap() else {
            panic!("expected records");
        };

        assert_eq!(records.len(), 2);
        let first = &records[0];
        assert_eq!(first.title, "Attention is all you need");
        assert_eq!(first.authors, "A Vaswani, N Shazeer");
        assert_eq!(first.year, "2017");
        assert_eq!(
            first.pdf_url.as_deref(),
            Some("https://arxiv.org/pdf/1706.03762")
        );
        assert_eq!(first.doi(), Some("10.5555/3295222.3295349"));
        assert_eq!(first.extra.get("citations").map(String::as_str), Some("100000"));
        assert_eq!(
            first.extra.get("venue").map(String::as_str),
            Some("Advances in neural information processing systems, 2017")
        );

        assert_eq!(records[1].year, "2018");
        assert!(records[1].pdf_url.is_none());
    }

    #[test]
    fn test_fallback_block_selector() {
        let html = r#"<div class="gs_ri"><h3 class="gs_rt"><a href="https://x.org/p">Only inner block</a></h3></div>"#;
        let source = GoogleScholarSource::new();
        let ParsedPage::Records(records) = source.parse_results(html, 10).unwrap() else {
            panic!("expected records");
        };
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].title, "Only inner block");
    }

    #[tokio::test]
    async fn test_success_appends_alternates() {
        let (records, _mock, _server) = search_with(200, RESULTS_PAGE, 1, 1).await;

        assert_eq!(records.len(), 4);
        assert!(records[0].is_paper());
        assert!(records[1].is_paper());
        assert!(records[2].is_alternate());
        assert!(records[3].is_alternate());
    }

    #[tokio::test]
    async fn test_captcha_yields_notice_and_two_alternates() {
        let page = "<html><body>Please show you're not a robot. verify you're a human</body></html>";
        let (records, mock, _server) = search_with(200, page, 3, 1).await;

        assert_eq!(records.len(), 3);
        assert_eq!(records[0].kind, RecordKind::Notice);
        assert_eq!(records[0].extra.get("notice").map(String::as_str), Some("captcha"));
        assert_eq!(
            records.iter().filter(|r| r.kind == RecordKind::Alternate).count(),
            2
        );
        // a CAPTCHA is not retried
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_rate_limit_is_retried_then_reported() {
        let (records, mock, _server) = search_with(429, "slow down", 3, 3).await;

        assert_eq!(
            records[0].extra.get("notice").map(String::as_str),
            Some("rate_limited")
        );
        assert_eq!(records.len(), 3);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_unrecognized_page() {
        let (records, _mock, _server) =
            search_with(200, "<html><body><p>Nothing here</p></body></html>", 1, 1).await;
        assert_eq!(records[0].extra.get("notice").map(String::as_str), Some("no_parse"));
    }

    #[tokio::test]
    async fn test_error_status() {
        let (records, _mock, _server) = search_with(404, "gone", 1, 1).await;
        assert_eq!(
            records[0].extra.get("notice").map(String::as_str),
            Some("error_status")
        );
    }

    #[tokio::test]
    async fn test_connection_error() {
        let source = GoogleScholarSource::with_base_url("http://127.0.0.1:9");
        let records = source
            .search(&SearchQuery::new("transformers"), &context(1))
            .await
            .unwrap()
            .into_records();

        assert_eq!(
            records[0].extra.get("notice").map(String::as_str),
            Some("connection_error")
        );
        assert_eq!(records.len(), 3);
    }

    #[tokio::test]
    async fn test_cancelled_between_attempts() {
        let ctx = context(3);
        ctx.cancel.cancel();
        let err = GoogleScholarSource::with_base_url("http://127.0.0.1:9")
            .search(&SearchQuery::new("transformers"), &ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, SourceError::Cancelled));
    }
}
