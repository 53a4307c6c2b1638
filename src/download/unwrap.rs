//! Extract the document link from HTML wrapper pages.
//!
//! Mirrors and publishers often answer a PDF URL with an HTML page that embeds
//! or links to the real file. Links are looked for in a fixed order and the
//! first hit wins.

use regex::Regex;
use scraper::Html;
use std::sync::LazyLock;
use url::Url;

use crate::utils::html::{element_text, selector};

static REFRESH_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)url\s*=\s*['"]?([^'";]+)"#).expect("valid refresh pattern")
});

/// Where in the page a document link was found
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkKind {
    /// `<meta http-equiv="refresh" content="0; url=...">`
    MetaRefresh,
    /// `<iframe>` or `<embed>` PDF viewer
    EmbeddedViewer,
    /// First anchor whose target ends in `.pdf`
    PdfAnchor,
    /// Anchor whose text reads "download"
    DownloadAnchor,
}

/// Find the document link in `html`, resolved against `base`.
///
/// Priority: meta refresh, embedded viewer, `.pdf` anchor, download anchor.
pub fn find_document_link(html: &str, base: &Url) -> Option<(LinkKind, Url)> {
    let document = Html::parse_document(html);

    let finders: [(LinkKind, fn(&Html, &Url) -> Option<Url>); 4] = [
        (LinkKind::MetaRefresh, meta_refresh),
        (LinkKind::EmbeddedViewer, embedded_viewer),
        (LinkKind::PdfAnchor, pdf_anchor),
        (LinkKind::DownloadAnchor, download_anchor),
    ];
    finders
        .into_iter()
        .find_map(|(kind, find)| find(&document, base).map(|url| (kind, url)))
}

fn meta_refresh(document: &Html, base: &Url) -> Option<Url> {
    let meta = selector("meta[http-equiv]").ok()?;
    document
        .select(&meta)
        .filter(|el| {
            el.value()
                .attr("http-equiv")
                .is_some_and(|v| v.trim().eq_ignore_ascii_case("refresh"))
        })
        .filter_map(|el| el.value().attr("content"))
        .filter_map(|content| REFRESH_URL.captures(content))
        .find_map(|caps| resolve(caps[1].trim(), base))
}

fn embedded_viewer(document: &Html, base: &Url) -> Option<Url> {
    let viewers = selector("iframe[src], embed[src]").ok()?;
    document
        .select(&viewers)
        .filter(|el| {
            let attrs = el.value();
            let src = attrs.attr("src").unwrap_or_default().to_lowercase();
            src.contains(".pdf")
                || attrs.id().is_some_and(|id| id.eq_ignore_ascii_case("pdf"))
                || attrs
                    .attr("type")
                    .is_some_and(|t| t.eq_ignore_ascii_case("application/pdf"))
        })
        .filter_map(|el| el.value().attr("src"))
        .find_map(|src| resolve(src, base))
}

fn pdf_anchor(document: &Html, base: &Url) -> Option<Url> {
    let anchors = selector("a[href]").ok()?;
    document
        .select(&anchors)
        .filter_map(|el| el.value().attr("href"))
        .filter_map(|href| resolve(href, base))
        .find(|url| url.path().to_lowercase().ends_with(".pdf"))
}

fn download_anchor(document: &Html, base: &Url) -> Option<Url> {
    let anchors = selector("a[href]").ok()?;
    document
        .select(&anchors)
        .filter(|el| {
            let text = element_text(el).to_lowercase();
            text.contains("download") || text.contains("下载")
        })
        .filter_map(|el| el.value().attr("href"))
        .find_map(|href| resolve(href, base))
}

/// Resolve a link found in a page; protocol-relative links become https
fn resolve(link: &str, base: &Url) -> Option<Url> {
    let link = link.trim();
    if link.is_empty() || link.starts_with('#') || link.to_lowercase().starts_with("javascript:") {
        return None;
    }
    let url = if let Some(rest) = link.strip_prefix("//") {
        Url::parse(&format!("https://{}", rest)).ok()?
    } else {
        base.join(link).ok()?
    };
    matches!(url.scheme(), "http" | "https").then_some(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://sci-hub.se/10.1038/nature12373").unwrap()
    }

    #[test]
    fn test_meta_refresh_wins() {
        let html = r#"<html><head><meta http-equiv="Refresh" content="0; URL='/files/foo.pdf'"></head>
            <body><iframe src="/viewer/other.pdf"></iframe></body></html>"#;
        let (kind, url) = find_document_link(html, &base()).unwrap();
        assert_eq!(kind, LinkKind::MetaRefresh);
        assert_eq!(url.as_str(), "https://sci-hub.se/files/foo.pdf");
    }

    #[test]
    fn test_embedded_viewer_protocol_relative() {
        let html = r#"<div id="article"><iframe id="pdf" src="//moscow.sci-hub.se/3/abc/paper.pdf#view=FitH"></iframe></div>"#;
        let (kind, url) = find_document_link(html, &base()).unwrap();
        assert_eq!(kind, LinkKind::EmbeddedViewer);
        assert_eq!(url.host_str(), Some("moscow.sci-hub.se"));
        assert_eq!(url.scheme(), "https");
    }

    #[test]
    fn test_embed_by_type() {
        let html = r#"<embed type="application/pdf" src="/stream/12345">"#;
        let (kind, url) = find_document_link(html, &base()).unwrap();
        assert_eq!(kind, LinkKind::EmbeddedViewer);
        assert_eq!(url.path(), "/stream/12345");
    }

    #[test]
    fn test_first_pdf_anchor() {
        let html = r##"<a href="#top">top</a><a href="/about">About</a>
            <a href="papers/one.PDF">one</a><a href="papers/two.pdf">two</a>"##;
        let (kind, url) = find_document_link(html, &base()).unwrap();
        assert_eq!(kind, LinkKind::PdfAnchor);
        assert_eq!(url.as_str(), "https://sci-hub.se/10.1038/papers/one.PDF");
    }

    #[test]
    fn test_download_anchor_text() {
        let html = r#"<a href="/get?id=7">Download full text</a>"#;
        let (kind, url) = find_document_link(html, &base()).unwrap();
        assert_eq!(kind, LinkKind::DownloadAnchor);
        assert_eq!(url.as_str(), "https://sci-hub.se/get?id=7");

        let html = r#"<a href="/fetch/8">点击下载</a>"#;
        assert_eq!(
            find_document_link(html, &base()).unwrap().1.path(),
            "/fetch/8"
        );
    }

    #[test]
    fn test_nothing_found() {
        let html = r#"<html><body><a href="javascript:void(0)">download</a><p>Sign in</p></body></html>"#;
        assert!(find_document_link(html, &base()).is_none());
    }
}
