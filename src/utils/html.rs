//! HTML helpers shared by the scraping source and the download engine.

use scraper::{ElementRef, Selector};

use crate::sources::SourceError;

/// Substrings that identify a CAPTCHA or bot-check page
pub const CAPTCHA_MARKERS: &[&str] = &[
    "verify you're a human",
    "检查您的网络安全",
    "unusual traffic from your computer network",
    "gs_captcha",
    "g-recaptcha",
];

/// Substrings that identify a login wall
pub const LOGIN_MARKERS: &[&str] = &["login", "log in", "sign in", "登录"];

/// Parse a CSS selector, reporting a parse failure instead of panicking
pub fn selector(css: &str) -> Result<Selector, SourceError> {
    Selector::parse(css).map_err(|e| SourceError::Parse(format!("bad selector '{}': {}", css, e)))
}

/// Text content of an element with whitespace collapsed
pub fn element_text(element: &ElementRef<'_>) -> String {
    collapse_whitespace(&element.text().collect::<String>())
}

/// Collapse runs of whitespace (including newlines) into single spaces
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Whether the page looks like a CAPTCHA challenge
pub fn looks_like_captcha(body: &str) -> bool {
    let lower = body.to_lowercase();
    CAPTCHA_MARKERS.iter().any(|marker| lower.contains(marker))
}

/// Whether the page looks like a login wall
pub fn looks_like_login_wall(body: &str) -> bool {
    let lower = body.to_lowercase();
    LOGIN_MARKERS.iter().any(|marker| lower.contains(marker))
}
