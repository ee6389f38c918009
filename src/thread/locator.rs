use std::collections::HashSet;
use std::sync::Arc;

use tracing::{info, warn};

use super::service::ThreadService;
use super::types::{ThreadHandle, ThreadId, ThreadOrigin, ThreadSummary};
use crate::config::ThreadConfig;
use crate::error::{DiscussError, Result};
use crate::identity::AgentIdentity;
use crate::retry::{RetryPolicy, RetryState};

const STOP_WORDS: &[&str] = &[
    "the", "and", "for", "with", "from", "into", "about", "should", "could", "would", "what",
    "when", "how", "why", "are", "was", "this", "that", "our", "use", "using", "discuss",
    "discussion",
];

/// How the thread for a session was obtained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveOutcome {
    Explicit,
    Matched { similarity_pct: u8 },
    Created,
    /// A duplicate we created was closed in favour of the older thread.
    Reconciled { closed: ThreadId },
}

#[derive(Debug, Clone)]
pub struct Resolution {
    pub handle: ThreadHandle,
    pub outcome: ResolveOutcome,
}

pub struct ThreadLocator {
    service: Arc<dyn ThreadService>,
    retry: RetryPolicy,
    config: ThreadConfig,
}

impl ThreadLocator {
    pub fn new(service: Arc<dyn ThreadService>, retry: RetryPolicy, config: ThreadConfig) -> Self {
        Self {
            service,
            retry,
            config,
        }
    }

    pub async fn resolve(
        &self,
        topic: &str,
        explicit_id: Option<ThreadId>,
        identity: &AgentIdentity,
    ) -> Result<Resolution> {
        let mut state = RetryState::default();

        if let Some(id) = explicit_id {
            let summary = self
                .retry
                .run("get thread", &mut state, || self.service.get(id))
                .await?;
            info!(thread = id, title = %summary.title, "Joined explicit thread");
            return Ok(Resolution {
                handle: summary.into_handle(ThreadOrigin::Existing),
                outcome: ResolveOutcome::Explicit,
            });
        }

        if let Some((existing, score)) = self.find_match(topic, &mut state, None).await? {
            info!(
                thread = existing.id,
                similarity = score,
                "Found existing thread for topic"
            );
            return Ok(Resolution {
                handle: existing.into_handle(ThreadOrigin::Existing),
                outcome: ResolveOutcome::Matched {
                    similarity_pct: (score * 100.0).round() as u8,
                },
            });
        }

        let title = self.title_for(topic);
        let body = opening_body(topic, identity);
        let created = self
            .retry
            .run("create thread", &mut state, || {
                self.service.create(&title, &body)
            })
            .await?;
        info!(thread = created.id, "Created discussion thread");

        // Another agent may have created the same topic between our search and create.
        if let Some((existing, _)) = self.find_match(topic, &mut state, Some(created.id)).await?
            && existing.id < created.id
        {
            return self.reconcile(existing, created, &mut state).await;
        }

        Ok(Resolution {
            handle: created.into_handle(ThreadOrigin::ThisAgent),
            outcome: ResolveOutcome::Created,
        })
    }

    async fn reconcile(
        &self,
        existing: ThreadSummary,
        created: ThreadSummary,
        state: &mut RetryState,
    ) -> Result<Resolution> {
        warn!(
            existing = existing.id,
            created = created.id,
            "Duplicate discussion thread detected, keeping the older one"
        );

        let reason = format!("Duplicate of #{}; continuing the discussion there.", existing.id);
        let created_id = created.id;
        self.retry
            .run("close duplicate thread", state, || {
                self.service.close(created_id, &reason)
            })
            .await
            .map_err(|e| DiscussError::ThreadCreationConflict {
                existing: existing.id.to_string(),
                created: created_id.to_string(),
                reason: DiscussError::from(e).to_string(),
            })?;

        Ok(Resolution {
            handle: existing.into_handle(ThreadOrigin::Existing),
            outcome: ResolveOutcome::Reconciled { closed: created_id },
        })
    }

    /// Best open thread at or above the similarity threshold; ties go to the oldest.
    async fn find_match(
        &self,
        topic: &str,
        state: &mut RetryState,
        exclude: Option<ThreadId>,
    ) -> Result<Option<(ThreadSummary, f64)>> {
        let topic_words = keywords(topic);
        if topic_words.is_empty() {
            warn!(
                topic = topic.trim(),
                "Topic has no distinctive keywords, matching open threads on the exact title only"
            );
            let wanted = normalize_title(topic);
            let query = format!("{} in:title", topic.trim());
            let candidates = self.search(&query, state).await?;
            return Ok(candidates
                .into_iter()
                .filter(|c| Some(c.id) != exclude)
                .filter(|c| normalize_title(self.strip_prefix(&c.title)) == wanted)
                .min_by_key(|c| c.id)
                .map(|c| (c, 1.0)));
        }

        let mut terms: Vec<&str> = topic_words.iter().map(String::as_str).collect();
        terms.sort_unstable();
        let query = format!("{} in:title", terms.join(" "));
        let candidates = self.search(&query, state).await?;

        let best = candidates
            .into_iter()
            .filter(|c| Some(c.id) != exclude)
            .map(|c| {
                let score = similarity(&topic_words, &keywords(self.strip_prefix(&c.title)));
                (c, score)
            })
            .filter(|(_, score)| *score >= self.config.match_threshold)
            .min_by(|(a, sa), (b, sb)| sb.total_cmp(sa).then(a.id.cmp(&b.id)));

        Ok(best)
    }

    async fn search(&self, query: &str, state: &mut RetryState) -> Result<Vec<ThreadSummary>> {
        Ok(self
            .retry
            .run("search threads", state, || self.service.search(query))
            .await?)
    }

    fn title_for(&self, topic: &str) -> String {
        if self.config.title_prefix.is_empty() {
            topic.trim().to_string()
        } else {
            format!("{} {}", self.config.title_prefix, topic.trim())
        }
    }

    fn strip_prefix<'a>(&self, title: &'a str) -> &'a str {
        title
            .strip_prefix(self.config.title_prefix.as_str())
            .unwrap_or(title)
            .trim()
    }
}

/// Lower-cased, whitespace-collapsed title for exact comparison.
fn normalize_title(title: &str) -> String {
    title
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

fn opening_body(topic: &str, identity: &AgentIdentity) -> String {
    format!(
        "## Discussion: {}\n\n\
         Opened by agent `{}` on branch `{}` in `{}`.\n\n\
         Agents sign every comment with an `**Agent**` footer. \
         Humans are welcome to join; unsigned comments are treated as human input.",
        topic.trim(),
        identity.hostname,
        identity.branch,
        identity.repo_slug()
    )
}

/// Lower-cased alphanumeric tokens of length >= 3, stop words removed.
pub fn keywords(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.len() >= 3)
        .map(str::to_lowercase)
        .filter(|w| !STOP_WORDS.contains(&w.as_str()))
        .collect()
}

/// Jaccard similarity of two keyword sets.
pub fn similarity(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let shared = a.intersection(b).count() as f64;
    let union = a.union(b).count() as f64;
    shared / union
}
