//! HTTP client utilities.

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, UPGRADE_INSECURE_REQUESTS};
use reqwest::{redirect, Client, RequestBuilder};
use std::sync::Arc;
use std::time::Duration;

use crate::config::HttpConfig;
use crate::sources::SourceError;

/// Browser user agent; several sources and mirrors reject library agents
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

const BROWSER_ACCEPT: &str =
    "text/html,application/xhtml+xml,application/xml;q=0.9,application/pdf,*/*;q=0.8";

/// Shared HTTP client carrying an immutable header set.
///
/// Cloning is cheap and every clone sends the same headers, so adapters
/// cannot interfere with each other by mutating a session.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Arc<Client>,
    request_timeout: Duration,
}

impl HttpClient {
    /// Build a client from configuration
    pub fn new(config: &HttpConfig) -> Result<Self, SourceError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(BROWSER_ACCEPT));
        headers.insert(UPGRADE_INSECURE_REQUESTS, HeaderValue::from_static("1"));
        let language = HeaderValue::from_str(&config.accept_language).map_err(|e| {
            SourceError::InvalidRequest(format!(
                "invalid Accept-Language '{}': {}",
                config.accept_language, e
            ))
        })?;
        headers.insert(ACCEPT_LANGUAGE, language);

        let request_timeout = Duration::from_secs(config.request_timeout_secs);
        let client = Client::builder()
            .user_agent(config.user_agent.as_str())
            .default_headers(headers)
            .timeout(request_timeout)
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .redirect(redirect::Policy::limited(config.max_redirects))
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .map_err(|e| SourceError::InvalidRequest(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client: Arc::new(client),
            request_timeout,
        })
    }

    /// Start a GET request
    pub fn get(&self, url: &str) -> RequestBuilder {
        self.client.get(url)
    }

    /// Default per-request timeout
    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_from_default_config() {
        let client = HttpClient::new(&HttpConfig::default()).unwrap();
        assert_eq!(client.request_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_rejects_invalid_header() {
        let config = HttpConfig {
            accept_language: "en\nUS".to_string(),
            ..HttpConfig::default()
        };
        assert!(matches!(
            HttpClient::new(&config),
            Err(SourceError::InvalidRequest(_))
        ));
    }
}
