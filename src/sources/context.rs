//! Per-call search context.

use std::time::Duration;

use crate::utils::{CancelFlag, HttpClient, RetryPolicy};

/// Client configuration handed to a source for one search call.
///
/// Built fresh by the dispatcher for every call and never mutated by sources,
/// so one adapter's settings cannot leak into another's.
#[derive(Debug, Clone)]
pub struct SearchContext {
    pub client: HttpClient,
    /// Timeout applied to each request
    pub timeout: Duration,
    /// Policy for sources that retry internally
    pub retry: RetryPolicy,
    pub cancel: CancelFlag,
}

impl SearchContext {
    pub fn new(client: HttpClient, timeout: Duration, retry: RetryPolicy, cancel: CancelFlag) -> Self {
        Self {
            client,
            timeout,
            retry,
            cancel,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}
