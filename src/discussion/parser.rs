use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::mentions::{Mention, MentionExtractor, MentionKind, Signature};
use crate::config::MentionConfig;
use crate::error::{DiscussError, Result};
use crate::identity::AgentIdentity;
use crate::thread::Comment;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedComment {
    pub comment: Comment,
    pub is_self: bool,
    pub mentions: Vec<Mention>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<Signature>,
}

impl ParsedComment {
    /// Who is speaking: the signing agent's hostname, or the account login for unsigned
    /// (human) comments. Agents commonly share one account, so the login alone is not enough.
    pub fn speaker(&self) -> &str {
        self.signature
            .as_ref()
            .map(|s| s.hostname.as_str())
            .unwrap_or(&self.comment.author)
    }

    pub fn is_agent(&self) -> bool {
        self.signature.is_some()
    }

    pub fn mentions_of(&self, kind: MentionKind) -> impl Iterator<Item = &str> {
        self.mentions
            .iter()
            .filter(move |m| m.kind == kind)
            .map(|m| m.value.as_str())
    }

    /// Body without the signature footer.
    pub fn text(&self) -> &str {
        match self.comment.body.rfind("\n---\n**Agent**") {
            Some(idx) => self.comment.body[..idx].trim_end(),
            None => self.comment.body.trim_end(),
        }
    }
}

/// Classifies comments as self/other and extracts mentions.
pub struct CommentBatchParser {
    identity: AgentIdentity,
    extractor: MentionExtractor,
}

impl CommentBatchParser {
    pub fn new(identity: AgentIdentity, config: &MentionConfig) -> Self {
        Self {
            identity,
            extractor: MentionExtractor::new(config),
        }
    }

    pub fn identity(&self) -> &AgentIdentity {
        &self.identity
    }

    pub fn parse(&self, comment: &Comment) -> Result<ParsedComment> {
        if comment.id.trim().is_empty() {
            return Err(DiscussError::Parse {
                comment_id: "<missing>".into(),
                reason: "comment has no id".into(),
            });
        }
        if comment.author.trim().is_empty() {
            return Err(DiscussError::Parse {
                comment_id: comment.id.clone(),
                reason: "comment has no author".into(),
            });
        }
        if comment.body.trim().is_empty() {
            return Err(DiscussError::Parse {
                comment_id: comment.id.clone(),
                reason: "comment body is empty".into(),
            });
        }
        if comment.body.contains('\0') {
            return Err(DiscussError::Parse {
                comment_id: comment.id.clone(),
                reason: "comment body contains NUL bytes".into(),
            });
        }

        // The footer is appended last; an earlier signature is most likely a quote.
        let signature = self.extractor.signatures(&comment.body).pop();
        let is_self = signature.as_ref().is_some_and(|sig| {
            sig.branch
                .as_deref()
                .is_some_and(|branch| self.identity.matches(&sig.hostname, branch))
        });

        Ok(ParsedComment {
            comment: comment.clone(),
            is_self,
            mentions: self.extractor.extract(&comment.body),
            signature,
        })
    }

    /// Parse every comment of a batch. Malformed comments are logged and skipped.
    pub fn parse_batch(&self, batch: &[Comment]) -> Vec<ParsedComment> {
        let parsed: Vec<ParsedComment> = batch
            .iter()
            .filter_map(|c| match self.parse(c) {
                Ok(p) => Some(p),
                Err(e) => {
                    warn!(error = %e, "Skipping malformed comment");
                    None
                }
            })
            .collect();

        debug!(
            received = batch.len(),
            parsed = parsed.len(),
            own = parsed.iter().filter(|p| p.is_self).count(),
            "Parsed comment batch"
        );
        parsed
    }
}
