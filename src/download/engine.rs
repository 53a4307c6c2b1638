//! The download engine: candidate walking, content verification, unwrapping
//! of HTML wrapper pages and collision-safe persistence.

use futures_util::StreamExt;
use reqwest::header::CONTENT_TYPE;
use reqwest::Response;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use url::Url;

use super::filename::{reserve_file, target_stem};
use super::mirrors::MirrorResolver;
use super::progress::ProgressSink;
use super::unwrap::find_document_link;
use super::DownloadError;
use crate::config::{Config, DownloadConfig};
use crate::models::{DownloadOutcome, DownloadRequest, ErrorKind};
use crate::sources::SourceError;
use crate::utils::html::{looks_like_captcha, looks_like_login_wall};
use crate::utils::{with_retry, CancelFlag, HttpClient, RetryError, RetryPolicy};

/// Settings for one engine
#[derive(Debug, Clone)]
pub struct DownloadSettings {
    pub directory: PathBuf,
    /// Minimum size for a PDF from a generic host
    pub min_pdf_bytes: u64,
    /// Minimum size for a PDF from a mirror host
    pub min_mirror_pdf_bytes: u64,
    /// Per-request timeout
    pub timeout: Duration,
    /// Pause before moving on to the next candidate
    pub inter_attempt_delay: Duration,
    /// Same-URL retries for transient failures
    pub retry: RetryPolicy,
}

impl DownloadSettings {
    pub fn from_config(config: &DownloadConfig) -> Self {
        Self {
            directory: config.directory.clone(),
            min_pdf_bytes: config.min_pdf_bytes,
            min_mirror_pdf_bytes: config.min_mirror_pdf_bytes,
            timeout: config.timeout(),
            inter_attempt_delay: config.inter_attempt_delay(),
            retry: config.retry_policy(),
        }
    }
}

/// A document saved by one successful attempt
#[derive(Debug)]
struct Saved {
    path: PathBuf,
    bytes: u64,
    url: String,
}

/// Downloads documents from an ordered list of candidate URLs.
///
/// Candidates are tried strictly in order. Each one gets its own retry budget
/// for transient failures and may follow one link out of an HTML wrapper page.
#[derive(Debug, Clone)]
pub struct DownloadEngine {
    client: HttpClient,
    resolver: MirrorResolver,
    settings: DownloadSettings,
}

impl DownloadEngine {
    pub fn new(client: HttpClient, resolver: MirrorResolver, settings: DownloadSettings) -> Self {
        Self {
            client,
            resolver,
            settings,
        }
    }

    /// Build an engine configured from `config`
    pub fn from_config(config: &Config) -> Result<Self, SourceError> {
        Ok(Self::new(
            HttpClient::new(&config.http)?,
            MirrorResolver::from_config(&config.mirrors),
            DownloadSettings::from_config(&config.downloads),
        ))
    }

    pub fn resolver(&self) -> &MirrorResolver {
        &self.resolver
    }

    pub fn settings(&self) -> &DownloadSettings {
        &self.settings
    }

    /// Download the document behind `request`.
    ///
    /// Never fails: every problem is reported through
    /// [`DownloadOutcome::Failure`] with the URLs tried and links to try by hand.
    pub async fn download(
        &self,
        request: &DownloadRequest,
        progress: &dyn ProgressSink,
        cancel: &CancelFlag,
    ) -> DownloadOutcome {
        let stem = target_stem(&request.suggested_filename, request.identifier.as_ref());
        let mut attempted: Vec<String> = Vec::new();
        let mut last_error: Option<DownloadError> = None;

        for (index, url) in request.candidate_urls.iter().enumerate() {
            if index > 0 && !self.settings.inter_attempt_delay.is_zero() {
                tokio::time::sleep(self.settings.inter_attempt_delay).await;
            }
            if cancel.is_cancelled() {
                last_error = Some(DownloadError::Cancelled);
                break;
            }

            tracing::info!(
                "Trying {} ({}/{})",
                url,
                index + 1,
                request.candidate_urls.len()
            );
            attempted.push(url.clone());
            progress.on_attempt(url);

            let result = with_retry(self.settings.retry, cancel, || {
                self.attempt(url, &stem, progress)
            })
            .await;

            match result {
                Ok(saved) => {
                    tracing::info!(
                        "Saved {} bytes from {} to {}",
                        saved.bytes,
                        saved.url,
                        saved.path.display()
                    );
                    return DownloadOutcome::Success {
                        file_path: saved.path,
                        bytes_written: saved.bytes,
                        url: saved.url,
                    };
                }
                Err(RetryError::Cancelled) => {
                    last_error = Some(DownloadError::Cancelled);
                    break;
                }
                Err(RetryError::Failed { error, attempts }) => {
                    tracing::warn!("{} failed after {} attempt(s): {}", url, attempts, error);
                    let fatal = error.is_fatal();
                    last_error = Some(error);
                    if fatal {
                        break;
                    }
                }
            }
        }

        let (reason, detail) = match &last_error {
            Some(error) => (error.kind(), error.to_string()),
            None => (ErrorKind::RequestFailed, "no candidate URLs to try".to_string()),
        };
        let alternate_links = self.alternate_links(request, &attempted);
        tracing::warn!("Download failed ({}): {}", reason, detail);

        DownloadOutcome::Failure {
            reason,
            message: format!("{}. {}", detail, reason.next_step()),
            attempted_urls: attempted,
            alternate_links,
        }
    }

    /// One attempt against one candidate, following at most one wrapper link
    async fn attempt(
        &self,
        url: &str,
        stem: &str,
        progress: &dyn ProgressSink,
    ) -> Result<Saved, DownloadError> {
        let parsed = Url::parse(url).map_err(|_| DownloadError::InvalidUrl {
            url: url.to_string(),
        })?;

        // the mirror threshold follows the candidate, wherever the file is hosted
        let from_mirror = self.resolver.is_mirror_url(url);

        let response = self.fetch(&parsed).await?;
        if is_pdf_response(&response, &parsed) {
            return self.save(response, stem, from_mirror, progress).await;
        }

        let content_type = content_type(&response);
        if !is_html(&content_type) {
            return Err(DownloadError::ContentMismatch {
                url: url.to_string(),
                detail: format!("unexpected content type '{}'", content_type),
            });
        }

        let page_url = response.url().clone();
        let body = response
            .text()
            .await
            .map_err(|e| DownloadError::network(url, e))?;

        let Some((kind, link)) = find_document_link(&body, &page_url) else {
            return Err(classify_page(url, &body));
        };
        tracing::debug!("Following {:?} link {} found on {}", kind, link, page_url);

        let from_mirror = from_mirror || self.resolver.is_mirror_url(link.as_str());
        let response = self.fetch(&link).await?;
        if is_pdf_response(&response, &link) {
            return self.save(response, stem, from_mirror, progress).await;
        }

        let content_type = self::content_type(&response);
        if !is_html(&content_type) {
            return Err(DownloadError::ContentMismatch {
                url: link.to_string(),
                detail: format!("linked resource is '{}', not a PDF", content_type),
            });
        }

        // a second wrapper page is never followed, only explained
        let body = response
            .text()
            .await
            .map_err(|e| DownloadError::network(link.as_str(), e))?;
        Err(classify_page(link.as_str(), &body))
    }

    async fn fetch(&self, url: &Url) -> Result<Response, DownloadError> {
        tracing::debug!("GET {}", url);
        let response = self
            .client
            .get(url.as_str())
            .timeout(self.settings.timeout)
            .send()
            .await
            .map_err(|e| DownloadError::network(url.as_str(), e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::http_status(url.as_str(), status.as_u16()));
        }
        Ok(response)
    }

    /// Stream a PDF response to a freshly reserved file and verify its size
    async fn save(
        &self,
        response: Response,
        stem: &str,
        from_mirror: bool,
        progress: &dyn ProgressSink,
    ) -> Result<Saved, DownloadError> {
        let url = response.url().to_string();
        let minimum = if from_mirror || self.resolver.is_mirror_url(&url) {
            self.settings.min_mirror_pdf_bytes
        } else {
            self.settings.min_pdf_bytes
        };

        let (file, path) = reserve_file(&self.settings.directory, stem).await?;
        let bytes = match stream_to_file(file, response, &url, &path, progress).await {
            Ok(bytes) => bytes,
            Err(e) => {
                discard(&path).await;
                return Err(e);
            }
        };

        if bytes < minimum {
            discard(&path).await;
            return Err(DownloadError::TooSmall {
                url,
                size: bytes,
                minimum,
            });
        }

        Ok(Saved { path, bytes, url })
    }

    /// Untried candidates, then unattempted mirror URLs, then manual links
    fn alternate_links(&self, request: &DownloadRequest, attempted: &[String]) -> Vec<String> {
        let mut links: Vec<String> = Vec::new();
        let mut push = |url: String| {
            if !attempted.contains(&url) && !links.contains(&url) {
                links.push(url);
            }
        };

        request.candidate_urls.iter().cloned().for_each(&mut push);
        if let Some(id) = &request.identifier {
            self.resolver.resolve(id).into_iter().for_each(&mut push);
            self.resolver.fallback_links(id).into_iter().for_each(&mut push);
        }
        links
    }
}

/// Streams response body to file, returning bytes written.
async fn stream_to_file(
    file: File,
    response: Response,
    url: &str,
    path: &Path,
    progress: &dyn ProgressSink,
) -> Result<u64, DownloadError> {
    let total = response.content_length();
    let mut writer = BufWriter::new(file);
    let mut stream = response.bytes_stream();
    let mut written: u64 = 0;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| DownloadError::network(url, e))?;
        writer
            .write_all(&chunk)
            .await
            .map_err(|e| DownloadError::io(path, e))?;
        written += chunk.len() as u64;
        progress.on_progress(written, total);
    }

    writer.flush().await.map_err(|e| DownloadError::io(path, e))?;
    Ok(written)
}

async fn discard(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        tracing::warn!("Could not remove {}: {}", path.display(), e);
    }
}

fn content_type(response: &Response) -> String {
    response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_lowercase()
}

fn is_html(content_type: &str) -> bool {
    content_type.is_empty() || content_type.contains("html")
}

fn ends_with_pdf(url: &Url) -> bool {
    url.path().to_lowercase().ends_with(".pdf")
}

/// PDF by content type, or by the requested or final URL path
fn is_pdf_response(response: &Response, requested: &Url) -> bool {
    content_type(response).contains("application/pdf")
        || ends_with_pdf(requested)
        || ends_with_pdf(response.url())
}

/// Explain an HTML page that links to no document
fn classify_page(url: &str, body: &str) -> DownloadError {
    if looks_like_captcha(body) {
        DownloadError::Blocked {
            url: url.to_string(),
            reason: "CAPTCHA challenge".to_string(),
        }
    } else if looks_like_login_wall(body) {
        DownloadError::LoginRequired {
            url: url.to_string(),
        }
    } else {
        DownloadError::ContentMismatch {
            url: url.to_string(),
            detail: "HTML page without a document link".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HttpConfig;
    use crate::download::NoProgress;
    use crate::models::DocumentId;
    use std::sync::atomic::{AtomicU64, Ordering};

    fn engine(dir: &Path, attempts: u32) -> DownloadEngine {
        DownloadEngine::new(
            HttpClient::new(&HttpConfig::default()).unwrap(),
            MirrorResolver::default(),
            DownloadSettings {
                directory: dir.to_path_buf(),
                min_pdf_bytes: 1024,
                min_mirror_pdf_bytes: 10_000,
                timeout: Duration::from_secs(5),
                inter_attempt_delay: Duration::ZERO,
                retry: RetryPolicy::fixed(attempts, Duration::ZERO),
            },
        )
    }

    fn pdf_bytes(len: usize) -> Vec<u8> {
        let mut body = b"%PDF-1.7\n".to_vec();
        body.resize(len, b'0');
        body
    }

    fn dir_entries(dir: &Path) -> usize {
        std::fs::read_dir(dir).unwrap().count()
    }

    #[tokio::test]
    async fn test_direct_pdf_with_progress() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/paper")
            .with_status(200)
            .with_header("content-type", "application/pdf")
            .with_body(pdf_bytes(4096))
            .create_async()
            .await;
        let dir = tempfile::tempdir().unwrap();

        let last = AtomicU64::new(0);
        let sink = |downloaded: u64, _total: Option<u64>| last.store(downloaded, Ordering::SeqCst);
        let request = DownloadRequest::new(vec![format!("{}/paper", server.url())], "My Paper");

        let outcome = engine(dir.path(), 1)
            .download(&request, &sink, &CancelFlag::new())
            .await;

        match outcome {
            DownloadOutcome::Success {
                file_path,
                bytes_written,
                ..
            } => {
                assert_eq!(bytes_written, 4096);
                assert_eq!(file_path.file_name().unwrap(), "My Paper.pdf");
                assert_eq!(std::fs::metadata(&file_path).unwrap().len(), 4096);
            }
            other => panic!("expected success, got {:?}", other),
        }
        assert_eq!(last.load(Ordering::SeqCst), 4096);
    }

    #[tokio::test]
    async fn test_tiny_pdf_is_rejected_and_removed() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/tiny.pdf")
            .with_status(200)
            .with_header("content-type", "application/pdf")
            .with_body("%PDF-1.4\n")
            .create_async()
            .await;
        let dir = tempfile::tempdir().unwrap();
        let request = DownloadRequest::new(vec![format!("{}/tiny.pdf", server.url())], "tiny");

        let outcome = engine(dir.path(), 1)
            .download(&request, &NoProgress, &CancelFlag::new())
            .await;

        assert_eq!(outcome.reason(), Some(ErrorKind::FileTooSmall));
        assert_eq!(dir_entries(dir.path()), 0);
    }

    #[tokio::test]
    async fn test_wrapper_page_one_hop() {
        let mut server = mockito::Server::new_async().await;
        let page = server
            .mock("GET", "/landing")
            .with_status(200)
            .with_header("content-type", "text/html; charset=utf-8")
            .with_body(r#"<html><head><meta http-equiv="refresh" content="0;url=/files/foo.pdf"></head></html>"#)
            .expect(1)
            .create_async()
            .await;
        let file = server
            .mock("GET", "/files/foo.pdf")
            .with_status(200)
            .with_header("content-type", "application/pdf")
            .with_body(pdf_bytes(20 * 1024))
            .expect(1)
            .create_async()
            .await;
        let dir = tempfile::tempdir().unwrap();
        let request = DownloadRequest::new(vec![format!("{}/landing", server.url())], "foo");

        let outcome = engine(dir.path(), 1)
            .download(&request, &NoProgress, &CancelFlag::new())
            .await;

        page.assert_async().await;
        file.assert_async().await;
        match outcome {
            DownloadOutcome::Success { url, bytes_written, .. } => {
                assert!(url.ends_with("/files/foo.pdf"));
                assert_eq!(bytes_written, 20 * 1024);
            }
            other => panic!("expected success, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_second_hop_is_not_followed() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/first")
            .with_status(200)
            .with_header("content-type", "text/html")
            .with_body(r#"<a href="/second">Download</a>"#)
            .create_async()
            .await;
        let second = server
            .mock("GET", "/second")
            .with_status(200)
            .with_header("content-type", "text/html")
            .with_body(r#"<a href="/third.pdf">pdf</a>"#)
            .expect(1)
            .create_async()
            .await;
        let dir = tempfile::tempdir().unwrap();
        let request = DownloadRequest::new(vec![format!("{}/first", server.url())], "x");

        let outcome = engine(dir.path(), 1)
            .download(&request, &NoProgress, &CancelFlag::new())
            .await;

        second.assert_async().await;
        assert_eq!(outcome.reason(), Some(ErrorKind::ContentMismatch));
    }

    #[tokio::test]
    async fn test_mirror_threshold_follows_candidate_through_hop() {
        let mut server = mockito::Server::new_async().await;
        let port = server.socket_address().port();
        server
            .mock("GET", "/10.5/small")
            .with_status(200)
            .with_header("content-type", "text/html")
            .with_body(format!(
                r#"<div id="article"><iframe id="pdf" src="http://localhost:{}/stub.pdf"></iframe></div>"#,
                port
            ))
            .create_async()
            .await;
        let file = server
            .mock("GET", "/stub.pdf")
            .with_status(200)
            .with_header("content-type", "application/pdf")
            .with_body(pdf_bytes(5_000))
            .expect(1)
            .create_async()
            .await;
        let dir = tempfile::tempdir().unwrap();

        // only the 127.0.0.1 host is a mirror; the embedded file lives on localhost
        let mut engine = engine(dir.path(), 1);
        engine.resolver = MirrorResolver::new(vec![server.url()]);
        let stub = format!("http://localhost:{}/stub.pdf", port);
        assert!(!engine.resolver.is_mirror_url(&stub));

        let request = DownloadRequest::new(vec![format!("{}/10.5/small", server.url())], "x");
        let outcome = engine.download(&request, &NoProgress, &CancelFlag::new()).await;

        file.assert_async().await;
        assert_eq!(outcome.reason(), Some(ErrorKind::FileTooSmall));
        assert_eq!(dir_entries(dir.path()), 0);
    }

    #[tokio::test]
    async fn test_captcha_after_hop_is_blocked() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/landing")
            .with_status(200)
            .with_header("content-type", "text/html")
            .with_body(r#"<iframe id="pdf" src="/viewer"></iframe>"#)
            .create_async()
            .await;
        server
            .mock("GET", "/viewer")
            .with_status(200)
            .with_header("content-type", "text/html")
            .with_body("<p>Please verify you're a human</p>")
            .create_async()
            .await;
        let dir = tempfile::tempdir().unwrap();
        let request = DownloadRequest::new(vec![format!("{}/landing", server.url())], "x");

        let outcome = engine(dir.path(), 1)
            .download(&request, &NoProgress, &CancelFlag::new())
            .await;

        assert_eq!(outcome.reason(), Some(ErrorKind::Blocked));
    }

    #[tokio::test]
    async fn test_page_classification() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/captcha")
            .with_status(200)
            .with_header("content-type", "text/html")
            .with_body(r#"<div class="g-recaptcha"></div>"#)
            .create_async()
            .await;
        server
            .mock("GET", "/login")
            .with_status(200)
            .with_header("content-type", "text/html")
            .with_body("<form>Please sign in to continue</form>")
            .create_async()
            .await;
        server
            .mock("GET", "/json")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body("{}")
            .create_async()
            .await;
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(dir.path(), 1);

        for (path, expected) in [
            ("/captcha", ErrorKind::Blocked),
            ("/login", ErrorKind::ContentMismatch),
            ("/json", ErrorKind::ContentMismatch),
        ] {
            let request = DownloadRequest::new(vec![format!("{}{}", server.url(), path)], "x");
            let outcome = engine.download(&request, &NoProgress, &CancelFlag::new()).await;
            assert_eq!(outcome.reason(), Some(expected), "{}", path);
        }

        let request = DownloadRequest::new(vec![format!("{}/login", server.url())], "x");
        match engine.download(&request, &NoProgress, &CancelFlag::new()).await {
            DownloadOutcome::Failure { message, .. } => assert!(message.contains("signing in")),
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_transient_status_is_retried() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/flaky.pdf")
            .with_status(503)
            .expect(2)
            .create_async()
            .await;
        let dir = tempfile::tempdir().unwrap();
        let request = DownloadRequest::new(vec![format!("{}/flaky.pdf", server.url())], "x");

        let outcome = engine(dir.path(), 2)
            .download(&request, &NoProgress, &CancelFlag::new())
            .await;

        mock.assert_async().await;
        assert_eq!(outcome.reason(), Some(ErrorKind::RequestFailed));
    }

    #[tokio::test]
    async fn test_falls_back_to_next_candidate() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/missing.pdf")
            .with_status(404)
            .create_async()
            .await;
        server
            .mock("GET", "/found.pdf")
            .with_status(200)
            .with_body(pdf_bytes(2048))
            .create_async()
            .await;
        let dir = tempfile::tempdir().unwrap();
        let request = DownloadRequest::new(
            vec![
                format!("{}/missing.pdf", server.url()),
                format!("{}/found.pdf", server.url()),
            ],
            "x",
        );

        let outcome = engine(dir.path(), 1)
            .download(&request, &NoProgress, &CancelFlag::new())
            .await;
        match outcome {
            DownloadOutcome::Success { url, .. } => assert!(url.ends_with("/found.pdf")),
            other => panic!("expected success, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_failure_lists_alternates() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/gone.pdf")
            .with_status(404)
            .create_async()
            .await;
        let dir = tempfile::tempdir().unwrap();
        let request = DownloadRequest::new(vec![format!("{}/gone.pdf", server.url())], "x")
            .with_identifier(DocumentId::Doi("10.1/x".into()));

        let outcome = engine(dir.path(), 1)
            .download(&request, &NoProgress, &CancelFlag::new())
            .await;

        match outcome {
            DownloadOutcome::Failure {
                reason,
                message,
                attempted_urls,
                alternate_links,
            } => {
                assert_eq!(reason, ErrorKind::RequestFailed);
                assert!(message.contains("404"));
                assert_eq!(attempted_urls.len(), 1);
                assert_eq!(alternate_links[0], "https://sci-hub.se/10.1/x");
                assert!(alternate_links.contains(&"https://doi.org/10.1/x".to_string()));
            }
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_no_candidates() {
        let dir = tempfile::tempdir().unwrap();
        let outcome = engine(dir.path(), 1)
            .download(
                &DownloadRequest::new(Vec::new(), "x"),
                &NoProgress,
                &CancelFlag::new(),
            )
            .await;
        assert_eq!(outcome.reason(), Some(ErrorKind::RequestFailed));
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/paper.pdf")
            .expect(0)
            .create_async()
            .await;
        let dir = tempfile::tempdir().unwrap();
        let cancel = CancelFlag::new();
        cancel.cancel();
        let request = DownloadRequest::new(vec![format!("{}/paper.pdf", server.url())], "x");

        let outcome = engine(dir.path(), 1)
            .download(&request, &NoProgress, &cancel)
            .await;

        mock.assert_async().await;
        assert_eq!(outcome.reason(), Some(ErrorKind::Cancelled));
    }

    #[tokio::test]
    async fn test_storage_error_stops_download() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/a.pdf")
            .with_status(200)
            .with_body(pdf_bytes(2048))
            .create_async()
            .await;
        let second = server
            .mock("GET", "/b.pdf")
            .expect(0)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, b"file").unwrap();
        let request = DownloadRequest::new(
            vec![
                format!("{}/a.pdf", server.url()),
                format!("{}/b.pdf", server.url()),
            ],
            "x",
        );

        let outcome = engine(&blocker.join("sub"), 1)
            .download(&request, &NoProgress, &CancelFlag::new())
            .await;

        second.assert_async().await;
        assert_eq!(outcome.reason(), Some(ErrorKind::Storage));
    }
}
