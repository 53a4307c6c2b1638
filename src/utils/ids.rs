//! DOI and arXiv identifier extraction.

use regex::Regex;
use std::sync::LazyLock;
use url::Url;

use crate::models::DocumentId;

static DOI_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\b(10\.\d{4,9}/[-._;()/:A-Z0-9]+)\b"#).expect("valid DOI pattern")
});

static ARXIV_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:arxiv:\s*)?(\d{4}\.\d{4,5}(?:v\d+)?)$").expect("valid arXiv pattern")
});

static ARXIV_URL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)arxiv\.org/(?:abs|pdf)/(\d{4}\.\d{4,5}(?:v\d+)?)")
        .expect("valid arXiv URL pattern")
});

/// Extract the first DOI from free text.
///
/// When the text is an http(s) URL the percent-decoded path is searched first,
/// then each decoded query value, so `https://x.org/view?doi=10.1000%2F182`
/// yields `10.1000/182`.
pub fn extract_doi(text: &str) -> Option<String> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    if let Ok(url) = Url::parse(text) {
        if matches!(url.scheme(), "http" | "https") {
            let path = urlencoding::decode(url.path())
                .map(|p| p.into_owned())
                .unwrap_or_else(|_| url.path().to_string());
            if let Some(doi) = find_doi(&path) {
                return Some(doi);
            }
            for (_, value) in url.query_pairs() {
                if let Some(doi) = find_doi(&value) {
                    return Some(doi);
                }
            }
        }
    }

    find_doi(text)
}

fn find_doi(text: &str) -> Option<String> {
    DOI_PATTERN.captures(text).map(|caps| {
        caps[1]
            .trim_end_matches(['.', ',', ';'])
            .to_string()
    })
}

/// Extract an arXiv id from `2301.12345`, `arXiv:2301.12345v2` or an
/// `arxiv.org/abs/...` / `arxiv.org/pdf/...` URL
pub fn extract_arxiv_id(text: &str) -> Option<String> {
    let text = text.trim();
    if let Some(caps) = ARXIV_URL_PATTERN.captures(text) {
        return Some(caps[1].to_string());
    }
    ARXIV_PATTERN.captures(text).map(|caps| caps[1].to_string())
}

/// Recognize what kind of identifier the user typed.
///
/// arXiv ids are checked first since an arXiv DOI (`10.48550/arXiv.2301.12345`)
/// is still a DOI and must not be mistaken for a bare arXiv id.
pub fn detect_identifier(input: &str) -> Option<DocumentId> {
    if let Some(id) = extract_arxiv_id(input) {
        return Some(DocumentId::Arxiv(id));
    }
    extract_doi(input).map(DocumentId::Doi)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_doi() {
        assert_eq!(
            extract_doi("10.1038/nature12373").as_deref(),
            Some("10.1038/nature12373")
        );
        assert_eq!(
            extract_doi("see doi:10.1145/3292500.3330701 for details.").as_deref(),
            Some("10.1145/3292500.3330701")
        );
        assert_eq!(
            extract_doi("Paper (10.1000/XYZ-123), 2020").as_deref(),
            Some("10.1000/XYZ-123")
        );
    }

    #[test]
    fn test_doi_in_url_path() {
        assert_eq!(
            extract_doi("https://doi.org/10.1038/nature12373").as_deref(),
            Some("10.1038/nature12373")
        );
        assert_eq!(
            extract_doi("https://dl.acm.org/doi/10.1145%2F3292500.3330701").as_deref(),
            Some("10.1145/3292500.3330701")
        );
    }

    #[test]
    fn test_doi_in_url_query() {
        assert_eq!(
            extract_doi("https://example.com/view?id=7&doi=10.1000%2F182&x=1").as_deref(),
            Some("10.1000/182")
        );
    }

    #[test]
    fn test_no_doi() {
        assert_eq!(extract_doi(""), None);
        assert_eq!(extract_doi("quantum computing"), None);
        assert_eq!(extract_doi("10.12/too-short-prefix"), None);
        assert_eq!(extract_doi("https://example.com/search?q=graphs"), None);
    }

    #[test]
    fn test_arxiv_ids() {
        assert_eq!(extract_arxiv_id("2301.12345").as_deref(), Some("2301.12345"));
        assert_eq!(
            extract_arxiv_id("arXiv:2301.12345v2").as_deref(),
            Some("2301.12345v2")
        );
        assert_eq!(
            extract_arxiv_id("https://arxiv.org/abs/1706.03762").as_deref(),
            Some("1706.03762")
        );
        assert_eq!(
            extract_arxiv_id("https://arxiv.org/pdf/1706.03762v7").as_deref(),
            Some("1706.03762v7")
        );
        assert_eq!(extract_arxiv_id("quantum 2301.12345 paper"), None);
    }

    #[test]
    fn test_detect_identifier() {
        assert_eq!(
            detect_identifier("1706.03762"),
            Some(DocumentId::Arxiv("1706.03762".to_string()))
        );
        assert_eq!(
            detect_identifier("10.48550/arXiv.1706.03762"),
            Some(DocumentId::Doi("10.48550/arXiv.1706.03762".to_string()))
        );
        assert_eq!(
            detect_identifier("https://doi.org/10.1038/nature12373"),
            Some(DocumentId::Doi("10.1038/nature12373".to_string()))
        );
        assert_eq!(detect_identifier("attention is all you need"), None);
    }
}
