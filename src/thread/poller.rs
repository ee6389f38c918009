use std::sync::Arc;

use super::service::ThreadService;
use super::types::{Comment, ThreadHandle};
use crate::retry::{RetryError, RetryPolicy, RetryState};

/// Fetches the complete comment list of a thread. Deltas are computed locally by the cursor.
pub struct CommentPoller {
    service: Arc<dyn ThreadService>,
    retry: RetryPolicy,
    state: RetryState,
}

impl CommentPoller {
    pub fn new(service: Arc<dyn ThreadService>, retry: RetryPolicy) -> Self {
        Self {
            service,
            retry,
            state: RetryState::default(),
        }
    }

    pub async fn poll(&mut self, handle: &ThreadHandle) -> Result<Vec<Comment>, RetryError> {
        let service = &self.service;
        let id = handle.id;
        self.retry
            .run("poll comments", &mut self.state, || service.list_comments(id))
            .await
    }

    pub fn retry_state(&self) -> &RetryState {
        &self.state
    }
}
