use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{debug, warn};

use super::service::{ApiResult, ThreadService};
use super::types::{Comment, PostedComment, ThreadId, ThreadSummary};
use crate::error::ApiError;
use crate::git::GhRunner;

const SEARCH_LIMIT: &str = "50";

/// GitHub issues as discussion threads, through the `gh` CLI.
pub struct GhThreadService {
    gh: GhRunner,
    label: Option<String>,
}

impl GhThreadService {
    pub fn new(gh: GhRunner) -> Self {
        Self { gh, label: None }
    }

    pub fn with_label(mut self, label: Option<String>) -> Self {
        self.label = label;
        self
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawIssue {
    number: u64,
    title: String,
    #[serde(default)]
    url: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<RawIssue> for ThreadSummary {
    fn from(raw: RawIssue) -> Self {
        Self {
            id: raw.number,
            title: raw.title,
            url: raw.url,
            created_at: raw.created_at,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawComments {
    #[serde(default)]
    comments: Vec<RawComment>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawComment {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    author: Option<RawAuthor>,
    #[serde(default)]
    body: Option<String>,
    #[serde(default)]
    created_at: Option<String>,
    #[serde(default)]
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawAuthor {
    login: String,
}

fn parse_json<T: serde::de::DeserializeOwned>(json: &str) -> ApiResult<T> {
    serde_json::from_str(json)
        .map_err(|e| ApiError::ParseError(format!("Failed to parse gh output: {}", e)))
}

/// Decode `gh issue view --json comments`. Entries without a usable timestamp cannot be
/// ordered against the cursor and are dropped with a warning; everything else is kept
/// as-is for the batch parser to judge.
pub(crate) fn parse_comments(json: &str) -> ApiResult<Vec<Comment>> {
    let raw: RawComments = parse_json(json)?;
    let mut comments = Vec::with_capacity(raw.comments.len());

    for (index, c) in raw.comments.into_iter().enumerate() {
        let created_at = match c
            .created_at
            .as_deref()
            .map(DateTime::parse_from_rfc3339)
        {
            Some(Ok(ts)) => ts.with_timezone(&Utc),
            _ => {
                warn!(index, "Skipping comment without a valid createdAt");
                continue;
            }
        };

        let id = c
            .url
            .as_deref()
            .and_then(comment_id_from_url)
            .or(c.id)
            .unwrap_or_default();

        comments.push(Comment {
            id,
            // Deleted accounts come back without an author.
            author: c.author.map(|a| a.login).unwrap_or_else(|| "ghost".into()),
            body: c.body.unwrap_or_default(),
            created_at,
        });
    }

    Ok(comments)
}

/// `.../issues/12#issuecomment-345` → `345`
pub(crate) fn comment_id_from_url(url: &str) -> Option<String> {
    let (_, fragment) = url.rsplit_once("#issuecomment-")?;
    let digits: String = fragment.chars().take_while(|c| c.is_ascii_digit()).collect();
    (!digits.is_empty()).then_some(digits)
}

/// `https://github.com/o/r/issues/12` → `12`
pub(crate) fn issue_number_from_url(url: &str) -> Option<u64> {
    url.trim()
        .trim_end_matches('/')
        .rsplit_once("/issues/")?
        .1
        .split(['#', '?'])
        .next()?
        .parse()
        .ok()
}

#[async_trait]
impl ThreadService for GhThreadService {
    async fn get(&self, id: ThreadId) -> ApiResult<ThreadSummary> {
        let number = id.to_string();
        let output = self
            .gh
            .run(&["issue", "view", &number, "--json", "number,title,url,createdAt"])
            .await?;
        let raw: RawIssue = parse_json(&output)?;
        Ok(raw.into())
    }

    async fn list_comments(&self, id: ThreadId) -> ApiResult<Vec<Comment>> {
        let number = id.to_string();
        let output = self
            .gh
            .run(&["issue", "view", &number, "--json", "comments"])
            .await?;
        let comments = parse_comments(&output)?;
        debug!(thread = id, count = comments.len(), "Fetched comments");
        Ok(comments)
    }

    async fn search(&self, query: &str) -> ApiResult<Vec<ThreadSummary>> {
        let mut args = vec![
            "issue",
            "list",
            "--state",
            "open",
            "--search",
            query,
            "--limit",
            SEARCH_LIMIT,
            "--json",
            "number,title,url,createdAt",
        ];
        if let Some(label) = &self.label {
            args.extend(["--label", label.as_str()]);
        }

        let output = self.gh.run(&args).await?;
        let raw: Vec<RawIssue> = parse_json(&output)?;
        Ok(raw.into_iter().map(Into::into).collect())
    }

    async fn create(&self, title: &str, body: &str) -> ApiResult<ThreadSummary> {
        let mut args = vec!["issue", "create", "--title", title, "--body", body];
        if let Some(label) = &self.label {
            args.extend(["--label", label.as_str()]);
        }

        let output = self.gh.run(&args).await?;
        let url = output.trim().lines().last().unwrap_or_default().to_string();
        let id = issue_number_from_url(&url).ok_or_else(|| {
            ApiError::ParseError(format!("gh issue create returned no issue URL: {}", url))
        })?;

        Ok(ThreadSummary {
            id,
            title: title.to_string(),
            url: Some(url),
            created_at: Utc::now(),
        })
    }

    async fn post(&self, id: ThreadId, body: &str) -> ApiResult<PostedComment> {
        let number = id.to_string();
        let output = self
            .gh
            .run(&["issue", "comment", &number, "--body", body])
            .await?;
        let url = output.trim().lines().last().unwrap_or_default().to_string();
        let comment_id = comment_id_from_url(&url).ok_or_else(|| {
            ApiError::ParseError(format!("gh issue comment returned no comment URL: {}", url))
        })?;

        Ok(PostedComment {
            id: comment_id,
            url: Some(url),
            created_at: Utc::now(),
        })
    }

    async fn close(&self, id: ThreadId, reason: &str) -> ApiResult<()> {
        let number = id.to_string();
        self.gh
            .run(&["issue", "close", &number, "--comment", reason])
            .await?;
        Ok(())
    }
}
