//! Informational and alternate-engine records.
//!
//! Search failures are surfaced to the user as results: a notice record that
//! explains the condition and links to a page where the search can be run by
//! hand, optionally followed by links to alternate search engines.

use crate::models::{ErrorKind, PaperBuilder, PaperRecord, RecordKind, SourceType};

/// Author line used on synthetic records
pub const NOTICE_AUTHORS: &str = "system notice";

/// Conditions that produce an informational record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NoticeKind {
    Captcha,
    /// Page fetched but no result blocks matched
    NoParse,
    /// Result blocks matched but none yielded a record
    NoResults,
    RateLimited(u16),
    ErrorStatus(u16),
    ConnectionError(String),
    AllAttemptsFailed(u32),
    /// Any other fault, with its error kind
    Exception(ErrorKind),
}

impl NoticeKind {
    /// Stable tag used in `extra["notice"]` and the opaque id
    pub fn tag(&self) -> &'static str {
        match self {
            NoticeKind::Captcha => "captcha",
            NoticeKind::NoParse => "no_parse",
            NoticeKind::NoResults => "no_results",
            NoticeKind::RateLimited(_) => "rate_limited",
            NoticeKind::ErrorStatus(_) => "error_status",
            NoticeKind::ConnectionError(_) => "connection_error",
            NoticeKind::AllAttemptsFailed(_) => "all_attempts_failed",
            NoticeKind::Exception(_) => "exception",
        }
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            NoticeKind::Captcha | NoticeKind::RateLimited(_) => Some(ErrorKind::Blocked),
            NoticeKind::NoParse => Some(ErrorKind::ParseFailure),
            NoticeKind::NoResults => None,
            NoticeKind::ErrorStatus(_)
            | NoticeKind::ConnectionError(_)
            | NoticeKind::AllAttemptsFailed(_) => Some(ErrorKind::RequestFailed),
            NoticeKind::Exception(kind) => Some(*kind),
        }
    }

    fn title(&self, source: SourceType) -> String {
        match self {
            NoticeKind::Captcha => format!("{} asked for human verification (CAPTCHA)", source),
            NoticeKind::NoParse => format!("{} returned a page that could not be read", source),
            NoticeKind::NoResults => format!("{} found no results", source),
            NoticeKind::RateLimited(status) => {
                format!("{} is rate limiting requests (HTTP {})", source, status)
            }
            NoticeKind::ErrorStatus(status) => format!("{} returned HTTP {}", source, status),
            NoticeKind::ConnectionError(_) => format!("Could not connect to {}", source),
            NoticeKind::AllAttemptsFailed(attempts) => {
                format!("{} failed after {} attempts", source, attempts)
            }
            NoticeKind::Exception(_) => format!("{} search failed", source),
        }
    }

    fn explanation(&self) -> String {
        match self {
            NoticeKind::Captcha => {
                "The site detected automated access. Open the link in a browser, solve the \
                 challenge and search there, or try one of the alternate engines below."
                    .to_string()
            }
            NoticeKind::NoParse => "The result page layout was not recognized; the site may \
                 have changed. Open the link to see the results in a browser."
                .to_string(),
            NoticeKind::NoResults => {
                "No matching papers were found. Try different keywords or another source."
                    .to_string()
            }
            NoticeKind::RateLimited(_) => "Too many requests were sent. Wait a few minutes or \
                 switch networks, then retry; alternate engines are listed below."
                .to_string(),
            NoticeKind::ErrorStatus(_) => {
                "The server refused the request. Retry later or open the link directly."
                    .to_string()
            }
            NoticeKind::ConnectionError(detail) => format!(
                "The network request failed ({}). Check your connection or proxy and retry.",
                detail
            ),
            NoticeKind::AllAttemptsFailed(_) => {
                "Every attempt failed. Retry later or open the link directly.".to_string()
            }
            NoticeKind::Exception(kind) => {
                format!("{}. {}", capitalize(kind.label()), kind.next_step())
            }
        }
    }
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Build an informational record.
///
/// `detail` is appended to the explanation when non-empty; `fallback_url` is a
/// page where the user can run the search by hand.
pub fn notice_record(
    source: SourceType,
    kind: &NoticeKind,
    query: &str,
    detail: &str,
    fallback_url: &str,
) -> PaperRecord {
    let mut text = kind.explanation();
    if !detail.is_empty() {
        text = format!("{} Details: {}", text, detail);
    }

    let mut builder = PaperBuilder::new(kind.title(source), fallback_url, source)
        .kind(RecordKind::Notice)
        .authors(NOTICE_AUTHORS)
        .abstract_text(text)
        .opaque_from(&format!("{}_{}", kind.tag(), query))
        .extra("notice", kind.tag());
    if let Some(error) = kind.error_kind() {
        builder = builder.extra("error_kind", error.label());
    }
    builder.build()
}

/// Informational record for a fault raised by a source
pub fn fault_record(source: SourceType, query: &str, kind: ErrorKind, detail: &str) -> PaperRecord {
    notice_record(
        source,
        &NoticeKind::Exception(kind),
        query,
        detail,
        &search_page_url(source, query),
    )
}

/// Links to the two alternate engines offered when a source soft-blocks
pub fn alternate_engines(source: SourceType, query: &str) -> Vec<PaperRecord> {
    let encoded = urlencoding::encode(query.trim());
    [
        (
            "Baidu Xueshu",
            format!("https://xueshu.baidu.com/s?wd={}", encoded),
        ),
        (
            "CNKI",
            format!("https://kns.cnki.net/kns8/defaultresult/index?kw={}", encoded),
        ),
    ]
    .into_iter()
    .map(|(engine, url)| {
        PaperBuilder::new(format!("Search \"{}\" on {}", query.trim(), engine), url, source)
            .kind(RecordKind::Alternate)
            .authors(NOTICE_AUTHORS)
            .abstract_text(format!(
                "Alternate search engine. Open the link to run the same query on {}.",
                engine
            ))
            .opaque_from(&format!("alternate_{}_{}", engine, query))
            .extra("engine", engine)
            .build()
    })
    .collect()
}

/// Public search page of a source, used as the manual fallback link
pub fn search_page_url(source: SourceType, query: &str) -> String {
    let encoded = urlencoding::encode(query.trim());
    match source {
        SourceType::Arxiv => format!("https://arxiv.org/search/?query={}&searchtype=all", encoded),
        SourceType::SciHub | SourceType::GoogleScholar => {
            format!("https://scholar.google.com/scholar?q={}", encoded)
        }
        SourceType::IeeeXplore => format!(
            "https://ieeexplore.ieee.org/search/searchresult.jsp?queryText={}",
            encoded
        ),
        SourceType::PubMed => format!("https://pubmed.ncbi.nlm.nih.gov/?term={}", encoded),
        SourceType::SemanticScholar => {
            format!("https://www.semanticscholar.org/search?q={}", encoded)
        }
        SourceType::Google => format!("https://www.google.com/search?q={}", encoded),
    }
}
