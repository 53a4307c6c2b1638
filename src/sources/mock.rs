//! Mock source for testing purposes.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::models::{SearchQuery, SearchResult, SourceType};
use crate::sources::{SearchContext, Source, SourceCapabilities, SourceError};
use crate::utils::CancelFlag;

/// What a [`MockSource`] does when searched
#[derive(Debug, Clone)]
pub enum MockBehavior {
    /// Return this result
    Respond(SearchResult),
    /// Fail with a parse error carrying this message
    Fail(String),
    /// Panic with this message
    Panic(String),
    /// Set the given flag while "in flight", then return the result
    CancelDuring(CancelFlag, SearchResult),
}

/// A mock source that stands in for any [`SourceType`]
#[derive(Debug)]
pub struct MockSource {
    source_type: SourceType,
    capabilities: SourceCapabilities,
    behavior: Mutex<MockBehavior>,
    calls: AtomicUsize,
}

impl MockSource {
    pub fn new(source_type: SourceType, behavior: MockBehavior) -> Self {
        Self {
            source_type,
            capabilities: SourceCapabilities::SEARCH,
            behavior: Mutex::new(behavior),
            calls: AtomicUsize::new(0),
        }
    }

    /// Override the advertised capabilities
    pub fn with_capabilities(mut self, capabilities: SourceCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Replace the behavior for subsequent calls
    pub fn set_behavior(&self, behavior: MockBehavior) {
        let mut guard = self.behavior.lock().unwrap_or_else(|e| e.into_inner());
        *guard = behavior;
    }

    /// Number of times `search` has been called
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Source for MockSource {
    fn source_type(&self) -> SourceType {
        self.source_type
    }

    fn capabilities(&self) -> SourceCapabilities {
        self.capabilities
    }

    async fn search(
        &self,
        _query: &SearchQuery,
        _ctx: &SearchContext,
    ) -> Result<SearchResult, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let behavior = self
            .behavior
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone();

        match behavior {
            MockBehavior::Respond(result) => Ok(result),
            MockBehavior::Fail(message) => Err(SourceError::Parse(message)),
            MockBehavior::Panic(message) => panic!("{}", message),
            MockBehavior::CancelDuring(flag, result) => {
                flag.cancel();
                tokio::task::yield_now().await;
                Ok(result)
            }
        }
    }
}
