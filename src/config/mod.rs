//! Configuration management.
//!
//! Settings come from built-in defaults, an optional TOML file and
//! `SCHOLAR_FETCH__`-prefixed environment variables, in that order of
//! precedence (later wins). Nested keys use `__`, for example
//! `SCHOLAR_FETCH__DOWNLOADS__DIRECTORY=./papers`.

mod file_config;

pub use ::config::ConfigError;
pub use file_config::{render_default_config, write_default_config, ConfigFileError};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::utils::{RetryPolicy, BROWSER_USER_AGENT};

/// Prefix for environment overrides
pub const ENV_PREFIX: &str = "SCHOLAR_FETCH";

/// File name looked up in the working directory
pub const LOCAL_CONFIG_FILE: &str = "scholar-fetch.toml";

/// Application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Headers and timeouts applied to every request
    #[serde(default)]
    pub http: HttpConfig,

    /// Download settings
    #[serde(default)]
    pub downloads: DownloadConfig,

    /// Mirror hosts
    #[serde(default)]
    pub mirrors: MirrorConfig,

    /// Per-source endpoints and limits
    #[serde(default)]
    pub sources: SourcesConfig,
}

/// HTTP client configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    #[serde(default = "default_accept_language")]
    pub accept_language: String,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            accept_language: default_accept_language(),
            connect_timeout_secs: default_connect_timeout(),
            request_timeout_secs: default_request_timeout(),
            max_redirects: default_max_redirects(),
        }
    }
}

fn default_user_agent() -> String {
    BROWSER_USER_AGENT.to_string()
}

fn default_accept_language() -> String {
    "en-US,en;q=0.9,zh-CN;q=0.8,zh;q=0.7".to_string()
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_request_timeout() -> u64 {
    30
}

fn default_max_redirects() -> usize {
    10
}

/// Download configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Root directory for saved PDFs
    #[serde(default = "default_download_dir")]
    pub directory: PathBuf,

    /// Minimum accepted size for a PDF from a generic host
    #[serde(default = "default_min_pdf_bytes")]
    pub min_pdf_bytes: u64,

    /// Minimum accepted size for a PDF served by a mirror host
    #[serde(default = "default_min_mirror_pdf_bytes")]
    pub min_mirror_pdf_bytes: u64,

    /// Timeout for a single document request
    #[serde(default = "default_download_timeout")]
    pub timeout_secs: u64,

    /// Pause before moving on to the next candidate URL
    #[serde(default = "default_inter_attempt_delay")]
    pub inter_attempt_delay_ms: u64,

    /// Attempts per URL for transient failures
    #[serde(default = "default_attempts_per_url")]
    pub attempts_per_url: u32,

    /// Delay between attempts on the same URL
    #[serde(default = "default_retry_delay")]
    pub retry_delay_ms: u64,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            directory: default_download_dir(),
            min_pdf_bytes: default_min_pdf_bytes(),
            min_mirror_pdf_bytes: default_min_mirror_pdf_bytes(),
            timeout_secs: default_download_timeout(),
            inter_attempt_delay_ms: default_inter_attempt_delay(),
            attempts_per_url: default_attempts_per_url(),
            retry_delay_ms: default_retry_delay(),
        }
    }
}

impl DownloadConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn inter_attempt_delay(&self) -> Duration {
        Duration::from_millis(self.inter_attempt_delay_ms)
    }

    /// Same-URL retry policy for transient failures
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::fixed(
            self.attempts_per_url,
            Duration::from_millis(self.retry_delay_ms),
        )
    }
}

fn default_download_dir() -> PathBuf {
    PathBuf::from("./downloads")
}

fn default_min_pdf_bytes() -> u64 {
    1024
}

fn default_min_mirror_pdf_bytes() -> u64 {
    10_000
}

fn default_download_timeout() -> u64 {
    40
}

fn default_inter_attempt_delay() -> u64 {
    2000
}

fn default_attempts_per_url() -> u32 {
    2
}

fn default_retry_delay() -> u64 {
    2000
}

/// Mirror hosts, tried in listed order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MirrorConfig {
    /// Hosts used to resolve a DOI into download URLs
    #[serde(default = "default_download_mirrors")]
    pub download: Vec<String>,

    /// Hosts offered as links by the Sci-Hub source
    #[serde(default = "default_search_mirrors")]
    pub search: Vec<String>,
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            download: default_download_mirrors(),
            search: default_search_mirrors(),
        }
    }
}

fn default_search_mirrors() -> Vec<String> {
    ["https://sci-hub.se", "https://sci-hub.ru", "https://sci-hub.st", "https://sci-hub.ren"]
        .map(String::from)
        .to_vec()
}

fn default_download_mirrors() -> Vec<String> {
    let mut mirrors = default_search_mirrors();
    mirrors.extend(["https://sci-hub.ee", "https://sci-hub.wf"].map(String::from));
    mirrors
}

/// Per-source endpoints and limits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourcesConfig {
    #[serde(default = "default_arxiv_url")]
    pub arxiv_url: String,

    #[serde(default = "default_scholar_url")]
    pub scholar_url: String,

    #[serde(default = "default_semantic_url")]
    pub semantic_url: String,

    /// Results requested from sources that page
    #[serde(default = "default_max_results")]
    pub max_results: usize,

    /// Default timeout for a search request
    #[serde(default = "default_search_timeout")]
    pub search_timeout_secs: u64,

    /// Timeout for the Semantic Scholar API, which falls back quickly
    #[serde(default = "default_semantic_timeout")]
    pub semantic_timeout_secs: u64,

    /// Attempts made by sources that retry internally (Google Scholar)
    #[serde(default = "default_search_attempts")]
    pub retry_attempts: u32,

    #[serde(default = "default_search_retry_delay")]
    pub retry_delay_ms: u64,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            arxiv_url: default_arxiv_url(),
            scholar_url: default_scholar_url(),
            semantic_url: default_semantic_url(),
            max_results: default_max_results(),
            search_timeout_secs: default_search_timeout(),
            semantic_timeout_secs: default_semantic_timeout(),
            retry_attempts: default_search_attempts(),
            retry_delay_ms: default_search_retry_delay(),
        }
    }
}

impl SourcesConfig {
    pub fn search_timeout(&self) -> Duration {
        Duration::from_secs(self.search_timeout_secs)
    }

    pub fn semantic_timeout(&self) -> Duration {
        Duration::from_secs(self.semantic_timeout_secs)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::linear(
            self.retry_attempts,
            Duration::from_millis(self.retry_delay_ms),
        )
    }
}

fn default_arxiv_url() -> String {
    "http://export.arxiv.org/api/query".to_string()
}

fn default_scholar_url() -> String {
    "https://scholar.google.com".to_string()
}

fn default_semantic_url() -> String {
    "https://api.semanticscholar.org".to_string()
}

fn default_max_results() -> usize {
    20
}

fn default_search_timeout() -> u64 {
    30
}

fn default_semantic_timeout() -> u64 {
    5
}

fn default_search_attempts() -> u32 {
    3
}

fn default_search_retry_delay() -> u64 {
    1000
}

/// Load configuration from an optional file plus environment overrides
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    let mut builder = config::Config::builder();
    if let Some(path) = path {
        builder = builder.add_source(config::File::from(path));
    }

    let settings = builder
        .add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("mirrors.download")
                .with_list_parse_key("mirrors.search"),
        )
        .build()?;

    settings.try_deserialize()
}

/// Find a configuration file in the working directory or the user config dir
pub fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from(LOCAL_CONFIG_FILE);
    if local.is_file() {
        return Some(local);
    }

    dirs::config_dir()
        .map(|dir| dir.join("scholar-fetch").join("config.toml"))
        .filter(|path| path.is_file())
}
