//! The shared discussion thread.
//!
//! - `ThreadService`: remote comment log abstraction (`GhThreadService` for GitHub issues)
//! - `ThreadLocator`: find, join or create the thread for a topic without duplicating it
//! - `CommentPoller` / `ThreadPoster`: retried reads and writes

mod github;
mod locator;
mod poller;
mod poster;
mod service;
mod types;

pub use github::GhThreadService;
pub use locator::{Resolution, ResolveOutcome, ThreadLocator, keywords, similarity};
pub use poller::CommentPoller;
pub use poster::ThreadPoster;
pub use service::{ApiResult, ThreadService};
pub use types::{
    Comment, PostedComment, ThreadHandle, ThreadId, ThreadOrigin, ThreadSummary, compare_ids,
};
