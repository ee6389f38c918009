//! In-memory thread service with a deterministic clock and failure injection.

use std::collections::{BTreeMap, VecDeque};

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use parking_lot::Mutex;

use discuss_pilot::error::ApiError;
use discuss_pilot::thread::{
    ApiResult, Comment, PostedComment, ThreadId, ThreadService, ThreadSummary,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Get,
    List,
    Search,
    Create,
    Post,
    Close,
}

struct StoredThread {
    summary: ThreadSummary,
    open: bool,
    comments: Vec<Comment>,
}

struct State {
    threads: BTreeMap<ThreadId, StoredThread>,
    next_thread: ThreadId,
    next_comment: u64,
    clock: DateTime<Utc>,
    failures: VecDeque<(Op, ApiError)>,
    race_on_create: Option<String>,
    close_error: Option<ApiError>,
    calls: Vec<Op>,
}

pub struct MemoryThreadService {
    author: String,
    state: Mutex<State>,
}

impl MemoryThreadService {
    /// `author` is the account login used for comments posted through the trait.
    pub fn new(author: &str) -> Self {
        Self {
            author: author.to_string(),
            state: Mutex::new(State {
                threads: BTreeMap::new(),
                next_thread: 1,
                next_comment: 1000,
                clock: Utc.with_ymd_and_hms(2026, 3, 10, 9, 0, 0).unwrap(),
                failures: VecDeque::new(),
                race_on_create: None,
                close_error: None,
                calls: Vec::new(),
            }),
        }
    }

    /// Fail the next `count` calls of `op` with `error`.
    pub fn fail_next(&self, op: Op, count: usize, error: ApiError) {
        let mut state = self.state.lock();
        for _ in 0..count {
            state.failures.push_back((op, error.clone()));
        }
    }

    /// Simulate another agent creating `title` just before our create lands.
    pub fn race_on_create(&self, title: &str) {
        self.state.lock().race_on_create = Some(title.to_string());
    }

    pub fn fail_close(&self, error: ApiError) {
        self.state.lock().close_error = Some(error);
    }

    pub fn add_thread(&self, title: &str) -> ThreadId {
        let mut state = self.state.lock();
        insert_thread(&mut state, title)
    }

    /// Append a comment as `author`, as if posted by another client.
    pub fn push_comment(&self, thread: ThreadId, author: &str, body: &str) -> Comment {
        let mut state = self.state.lock();
        insert_comment(&mut state, thread, author, body).expect("thread exists")
    }

    pub fn comments(&self, thread: ThreadId) -> Vec<Comment> {
        self.state
            .lock()
            .threads
            .get(&thread)
            .map(|t| t.comments.clone())
            .unwrap_or_default()
    }

    pub fn thread_ids(&self) -> Vec<ThreadId> {
        self.state.lock().threads.keys().copied().collect()
    }

    pub fn is_open(&self, thread: ThreadId) -> bool {
        self.state
            .lock()
            .threads
            .get(&thread)
            .is_some_and(|t| t.open)
    }

    pub fn call_count(&self, op: Op) -> usize {
        self.state.lock().calls.iter().filter(|c| **c == op).count()
    }

    fn enter(&self, op: Op) -> ApiResult<parking_lot::MutexGuard<'_, State>> {
        let mut state = self.state.lock();
        state.calls.push(op);
        if let Some(idx) = state.failures.iter().position(|(o, _)| *o == op)
            && let Some((_, err)) = state.failures.remove(idx)
        {
            return Err(err);
        }
        Ok(state)
    }
}

fn tick(state: &mut State) -> DateTime<Utc> {
    state.clock += Duration::seconds(1);
    state.clock
}

fn insert_thread(state: &mut State, title: &str) -> ThreadId {
    let id = state.next_thread;
    state.next_thread += 1;
    let created_at = tick(state);
    state.threads.insert(
        id,
        StoredThread {
            summary: ThreadSummary {
                id,
                title: title.to_string(),
                url: Some(format!("https://github.com/acme/widgets/issues/{}", id)),
                created_at,
            },
            open: true,
            comments: Vec::new(),
        },
    );
    id
}

fn insert_comment(state: &mut State, thread: ThreadId, author: &str, body: &str) -> Option<Comment> {
    let created_at = tick(state);
    let id = state.next_comment;
    state.next_comment += 1;
    let stored = state.threads.get_mut(&thread)?;
    let comment = Comment::new(id.to_string(), author, body, created_at);
    stored.comments.push(comment.clone());
    Some(comment)
}

#[async_trait]
impl ThreadService for MemoryThreadService {
    async fn get(&self, id: ThreadId) -> ApiResult<ThreadSummary> {
        let state = self.enter(Op::Get)?;
        state
            .threads
            .get(&id)
            .map(|t| t.summary.clone())
            .ok_or_else(|| ApiError::NotFound(format!("issue #{}", id)))
    }

    async fn list_comments(&self, id: ThreadId) -> ApiResult<Vec<Comment>> {
        let state = self.enter(Op::List)?;
        state
            .threads
            .get(&id)
            .map(|t| t.comments.clone())
            .ok_or_else(|| ApiError::NotFound(format!("issue #{}", id)))
    }

    async fn search(&self, _query: &str) -> ApiResult<Vec<ThreadSummary>> {
        let state = self.enter(Op::Search)?;
        Ok(state
            .threads
            .values()
            .filter(|t| t.open)
            .map(|t| t.summary.clone())
            .collect())
    }

    /// The issue body is not part of the comment list, matching GitHub.
    async fn create(&self, title: &str, _body: &str) -> ApiResult<ThreadSummary> {
        let mut state = self.enter(Op::Create)?;
        if let Some(other) = state.race_on_create.take() {
            insert_thread(&mut state, &other);
        }
        let id = insert_thread(&mut state, title);
        Ok(state.threads[&id].summary.clone())
    }

    async fn post(&self, id: ThreadId, body: &str) -> ApiResult<PostedComment> {
        let mut state = self.enter(Op::Post)?;
        let author = self.author.clone();
        let comment = insert_comment(&mut state, id, &author, body)
            .ok_or_else(|| ApiError::NotFound(format!("issue #{}", id)))?;
        Ok(PostedComment {
            id: comment.id,
            url: None,
            created_at: comment.created_at,
        })
    }

    async fn close(&self, id: ThreadId, _reason: &str) -> ApiResult<()> {
        let mut state = self.enter(Op::Close)?;
        if let Some(err) = state.close_error.clone() {
            return Err(err);
        }
        match state.threads.get_mut(&id) {
            Some(t) => {
                t.open = false;
                Ok(())
            }
            None => Err(ApiError::NotFound(format!("issue #{}", id))),
        }
    }
}
