use async_trait::async_trait;

use super::types::{Comment, PostedComment, ThreadId, ThreadSummary};
use crate::error::ApiError;

pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// The shared, append-only comment log. Implementations never retry internally;
/// retry is the caller's concern.
#[async_trait]
pub trait ThreadService: Send + Sync {
    async fn get(&self, id: ThreadId) -> ApiResult<ThreadSummary>;

    /// Full current comment list, oldest first. Never a delta.
    async fn list_comments(&self, id: ThreadId) -> ApiResult<Vec<Comment>>;

    /// Open threads loosely matching `query`.
    async fn search(&self, query: &str) -> ApiResult<Vec<ThreadSummary>>;

    async fn create(&self, title: &str, body: &str) -> ApiResult<ThreadSummary>;

    async fn post(&self, id: ThreadId, body: &str) -> ApiResult<PostedComment>;

    async fn close(&self, id: ThreadId, reason: &str) -> ApiResult<()>;
}
