//! Background search tasks.

use tokio::task::{JoinError, JoinHandle};

use super::DispatchResponse;
use crate::utils::CancelFlag;

/// A search running on a Tokio task.
///
/// Cancelling sets the flag the dispatcher checks; a request already in flight
/// runs to completion and its result is discarded.
#[derive(Debug)]
pub struct SearchTask {
    cancel: CancelFlag,
    handle: JoinHandle<DispatchResponse>,
}

impl SearchTask {
    pub(super) fn new(cancel: CancelFlag, handle: JoinHandle<DispatchResponse>) -> Self {
        Self { cancel, handle }
    }

    /// Request cancellation
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_flag(&self) -> &CancelFlag {
        &self.cancel
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the search to finish
    pub async fn wait(self) -> Result<DispatchResponse, JoinError> {
        self.handle.await
    }
}
