use std::sync::Arc;

use tracing::info;

use super::service::ThreadService;
use super::types::{PostedComment, ThreadHandle};
use crate::retry::{RetryError, RetryPolicy, RetryState};

/// Posts composed messages. Each attempt is a single `post` call: it either lands whole
/// or fails, and cancellation is only observed between attempts.
pub struct ThreadPoster {
    service: Arc<dyn ThreadService>,
    retry: RetryPolicy,
    state: RetryState,
}

impl ThreadPoster {
    pub fn new(service: Arc<dyn ThreadService>, retry: RetryPolicy) -> Self {
        Self {
            service,
            retry,
            state: RetryState::default(),
        }
    }

    pub async fn post(
        &mut self,
        handle: &ThreadHandle,
        message: &str,
    ) -> Result<PostedComment, RetryError> {
        let service = &self.service;
        let id = handle.id;
        let posted = self
            .retry
            .run("post comment", &mut self.state, || service.post(id, message))
            .await?;
        info!(thread = id, comment = %posted.id, "Posted comment");
        Ok(posted)
    }
}
