//! Utility modules shared by sources, the dispatcher and the download engine.
//!
//! - [`HttpClient`]: HTTP client with an immutable browser-like header set
//! - [`RetryPolicy`] / [`with_retry`]: scheduled retries that observe a [`CancelFlag`]
//! - [`extract_doi`] / [`detect_identifier`]: DOI and arXiv id recognition
//! - [`html`]: selector and page-classification helpers

mod cancel;
pub mod html;
mod http;
mod ids;
mod retry;

pub use cancel::CancelFlag;
pub use html::collapse_whitespace;
pub use http::{HttpClient, BROWSER_USER_AGENT};
pub use ids::{detect_identifier, extract_arxiv_id, extract_doi};
pub use retry::{with_retry, Backoff, RetryError, RetryPolicy, Retryable};
