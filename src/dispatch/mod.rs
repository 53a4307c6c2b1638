//! Search dispatch.
//!
//! [`SearchDispatcher`] resolves a source by name, builds a fresh
//! [`SearchContext`] for the call and is the single place where adapter faults
//! (errors and panics alike) become informational records. A caller-owned
//! [`CancelFlag`] is checked before the adapter runs and again when it returns.

mod task;

pub use task::SearchTask;

use futures_util::future::join_all;
use futures_util::FutureExt;
use serde::Serialize;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::models::{ErrorKind, SearchQuery, SearchResponse, SearchResult, SourceType};
use crate::sources::notice::{alternate_engines, fault_record};
use crate::sources::{SearchContext, Source, SourceError, SourceRegistry};
use crate::utils::{CancelFlag, HttpClient, RetryPolicy};

/// Per-call settings handed to every adapter
#[derive(Debug, Clone, Copy)]
pub struct DispatchSettings {
    pub timeout: Duration,
    pub retry: RetryPolicy,
    pub max_results: usize,
}

impl DispatchSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            timeout: config.sources.search_timeout(),
            retry: config.sources.retry_policy(),
            max_results: config.sources.max_results,
        }
    }
}

/// How a dispatched search ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "status", content = "kind")]
pub enum DispatchStatus {
    /// At least one real search hit
    Success,
    /// The source answered with no records at all
    Empty,
    /// Only informational or alternate records
    Notice,
    /// The source reported a condition to show verbatim
    SoftError,
    /// The adapter failed; the records explain why
    Failed(ErrorKind),
    Cancelled,
    Unsupported,
}

impl DispatchStatus {
    /// The error kind behind an unsuccessful dispatch, if any
    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            DispatchStatus::Failed(kind) => Some(*kind),
            DispatchStatus::Cancelled => Some(ErrorKind::Cancelled),
            DispatchStatus::Unsupported => Some(ErrorKind::UnsupportedSource),
            _ => None,
        }
    }
}

/// Result of one dispatched search
#[derive(Debug, Clone, Serialize)]
pub struct DispatchResponse {
    /// The resolved source, `None` when the name was not recognized
    pub source: Option<SourceType>,
    pub query: String,
    pub status: DispatchStatus,
    pub message: String,
    pub result: SearchResult,
}

impl DispatchResponse {
    pub fn records(&self) -> &[crate::models::PaperRecord] {
        self.result.records()
    }

    fn unsupported(name: &str, query: &str) -> Self {
        let message = format!("{}: {}", ErrorKind::UnsupportedSource.label(), name);
        Self {
            source: None,
            query: query.to_string(),
            status: DispatchStatus::Unsupported,
            result: SearchResult::soft_error(message.clone()),
            message,
        }
    }

    fn cancelled(source: SourceType, query: &str) -> Self {
        Self {
            source: Some(source),
            query: query.to_string(),
            status: DispatchStatus::Cancelled,
            message: format!("{} search cancelled", source),
            result: SearchResult::Records(
                SearchResponse::new(Vec::new(), source, query).with_status("cancelled"),
            ),
        }
    }
}

/// Routes queries to adapters and normalizes every outcome
#[derive(Debug, Clone)]
pub struct SearchDispatcher {
    registry: SourceRegistry,
    client: HttpClient,
    settings: DispatchSettings,
}

impl SearchDispatcher {
    pub fn new(registry: SourceRegistry, client: HttpClient, settings: DispatchSettings) -> Self {
        Self {
            registry,
            client,
            settings,
        }
    }

    /// Build a dispatcher over every source, configured from `config`
    pub fn from_config(config: &Config) -> Result<Self, SourceError> {
        Ok(Self::new(
            SourceRegistry::from_config(config),
            HttpClient::new(&config.http)?,
            DispatchSettings::from_config(config),
        ))
    }

    pub fn registry(&self) -> &SourceRegistry {
        &self.registry
    }

    pub fn settings(&self) -> DispatchSettings {
        self.settings
    }

    /// Run `query` against the source named `source_name`.
    ///
    /// Never fails: unknown names, adapter errors, adapter panics and
    /// cancellation are all reported through the response status.
    pub async fn dispatch(
        &self,
        query: &str,
        source_name: &str,
        cancel: &CancelFlag,
    ) -> DispatchResponse {
        let Some(source) = self.registry.resolve(source_name).cloned() else {
            tracing::warn!("Unsupported source requested: {}", source_name);
            return DispatchResponse::unsupported(source_name, query);
        };
        let source_type = source.source_type();

        if cancel.is_cancelled() {
            return DispatchResponse::cancelled(source_type, query);
        }

        let search_query = SearchQuery::new(query).max_results(self.settings.max_results);
        let ctx = SearchContext::new(
            self.client.clone(),
            self.settings.timeout,
            self.settings.retry,
            cancel.clone(),
        );

        tracing::debug!("Dispatching '{}' to {}", query, source_type);
        let outcome = AssertUnwindSafe(source.search(&search_query, &ctx))
            .catch_unwind()
            .await;

        // the adapter may have finished after the caller gave up
        if cancel.is_cancelled() {
            tracing::info!("{} search cancelled, discarding result", source_type);
            return DispatchResponse::cancelled(source_type, query);
        }

        match outcome {
            Ok(Ok(result)) => Self::completed(source_type, query, result),
            Ok(Err(SourceError::Cancelled)) => DispatchResponse::cancelled(source_type, query),
            Ok(Err(err)) => {
                tracing::warn!("{} search failed: {}", source_type, err);
                Self::fault(source.as_ref(), query, err.kind(), &err.to_string())
            }
            Err(panic) => {
                let detail = panic_message(panic.as_ref());
                tracing::error!("{} adapter panicked: {}", source_type, detail);
                Self::fault(source.as_ref(), query, ErrorKind::ParseFailure, &detail)
            }
        }
    }

    /// Run `query` against several sources concurrently with one shared flag
    pub async fn dispatch_many(
        &self,
        query: &str,
        source_names: &[&str],
        cancel: &CancelFlag,
    ) -> Vec<DispatchResponse> {
        join_all(
            source_names
                .iter()
                .map(|name| self.dispatch(query, name, cancel)),
        )
        .await
    }

    /// Run `query` against every registered source
    pub async fn dispatch_all(&self, query: &str, cancel: &CancelFlag) -> Vec<DispatchResponse> {
        let ids = self.registry.ids();
        self.dispatch_many(query, &ids, cancel).await
    }

    /// Run a search on a background task that can be cancelled
    pub fn spawn(self: &Arc<Self>, query: impl Into<String>, source: impl Into<String>) -> SearchTask {
        let cancel = CancelFlag::new();
        let dispatcher = Arc::clone(self);
        let query = query.into();
        let source = source.into();
        let flag = cancel.clone();

        let handle =
            tokio::spawn(async move { dispatcher.dispatch(&query, &source, &flag).await });
        SearchTask::new(cancel, handle)
    }

    fn completed(source: SourceType, query: &str, result: SearchResult) -> DispatchResponse {
        let (status, message) = match &result {
            SearchResult::SoftError { message } => (DispatchStatus::SoftError, message.clone()),
            SearchResult::Records(response) => {
                let status = if response.records.is_empty() {
                    DispatchStatus::Empty
                } else if response.paper_count() == 0 {
                    DispatchStatus::Notice
                } else {
                    DispatchStatus::Success
                };
                (status, response.status.clone())
            }
        };

        tracing::info!("{}: {}", source, message);
        DispatchResponse {
            source: Some(source),
            query: query.to_string(),
            status,
            message,
            result,
        }
    }

    fn fault(source: &dyn Source, query: &str, kind: ErrorKind, detail: &str) -> DispatchResponse {
        let source_type = source.source_type();
        let mut records = vec![fault_record(source_type, query, kind, detail)];
        if source.is_soft_blocking() {
            records.extend(alternate_engines(source_type, query));
        }

        DispatchResponse {
            source: Some(source_type),
            query: query.to_string(),
            status: DispatchStatus::Failed(kind),
            message: format!("{} search failed: {}", source_type, detail),
            result: SearchResult::Records(
                SearchResponse::new(records, source_type, query).with_status(kind.label()),
            ),
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "adapter panicked".to_string()
    }
}
